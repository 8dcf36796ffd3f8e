//! Render-result cache keyed by artifact fingerprint
//!
//! Only successful renders are cached; a failed render is retried the next
//! time the same text comes through.

use crate::error::ServiceError;
use crate::services::{RenderOutcome, RenderService};
use cadloop_artifact::{Artifact, ContentHash};
use moka::future::Cache;

/// Fingerprint -> render outcome
#[derive(Debug, Clone)]
pub struct RenderCache {
    inner: Cache<ContentHash, RenderOutcome>,
}

impl RenderCache {
    /// Create cache with max capacity
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
        }
    }

    /// Cached outcome for a fingerprint
    pub async fn get(&self, fingerprint: &ContentHash) -> Option<RenderOutcome> {
        self.inner.get(fingerprint).await
    }

    /// Cached outcome, or render and remember a success
    ///
    /// # Errors
    /// Propagates the renderer's [`ServiceError`]; errors are not cached.
    pub async fn get_or_render(
        &self,
        artifact: &Artifact,
        renderer: &dyn RenderService,
    ) -> Result<RenderOutcome, ServiceError> {
        let key = artifact.fingerprint();
        if let Some(hit) = self.inner.get(&key).await {
            tracing::debug!(fingerprint = %key.short(), "render cache hit");
            return Ok(hit);
        }

        let outcome = renderer.render(artifact).await?;
        if outcome.success {
            self.inner.insert(key, outcome.clone()).await;
        }
        Ok(outcome)
    }
}

impl Default for RenderCache {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRenderer {
        calls: AtomicUsize,
        succeed: bool,
    }

    #[async_trait]
    impl RenderService for CountingRenderer {
        async fn render(&self, _artifact: &Artifact) -> Result<RenderOutcome, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                Ok(RenderOutcome::success("output/model.stl"))
            } else {
                Ok(RenderOutcome::failure("NameError: Box"))
            }
        }
    }

    #[tokio::test]
    async fn identical_artifacts_render_once() {
        let cache = RenderCache::new(8);
        let renderer = CountingRenderer {
            calls: AtomicUsize::new(0),
            succeed: true,
        };
        let a = Artifact::new("x = 1", vec!["a".into()]);
        let b = Artifact::new("x = 1", vec!["b".into()]);

        assert!(cache.get_or_render(&a, &renderer).await.unwrap().success);
        assert!(cache.get_or_render(&b, &renderer).await.unwrap().success);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
        assert!(cache.get(&a.fingerprint()).await.is_some());
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = RenderCache::new(8);
        let renderer = CountingRenderer {
            calls: AtomicUsize::new(0),
            succeed: false,
        };
        let a = Artifact::new("broken", vec![]);

        assert!(!cache.get_or_render(&a, &renderer).await.unwrap().success);
        assert!(!cache.get_or_render(&a, &renderer).await.unwrap().success);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
    }
}
