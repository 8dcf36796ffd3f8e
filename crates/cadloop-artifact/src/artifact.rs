//! Assembled artifacts
//!
//! An [`Artifact`] is the single script produced by one assembly pass: the
//! full text, its fingerprint, and the order in which parts were emitted.

use crate::hash::ContentHash;
use serde::{Deserialize, Serialize};

/// Assembled output ready for rendering
///
/// # Invariants
/// - `fingerprint` is always `ContentHash::of_text(&text)`
/// - Immutable after construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    text: String,
    fingerprint: ContentHash,
    part_order: Vec<String>,
}

impl Artifact {
    /// Create an artifact, computing its fingerprint
    #[must_use]
    pub fn new(text: impl Into<String>, part_order: Vec<String>) -> Self {
        let text = text.into();
        let fingerprint = ContentHash::of_text(&text);
        Self {
            text,
            fingerprint,
            part_order,
        }
    }

    /// Full script text
    #[inline]
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Content fingerprint
    #[inline]
    #[must_use]
    pub fn fingerprint(&self) -> ContentHash {
        self.fingerprint
    }

    /// Parts in the order they were emitted
    #[inline]
    #[must_use]
    pub fn part_order(&self) -> &[String] {
        &self.part_order
    }

    /// Whether the artifact carries no text
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Replace the text (e.g. after merging human edits), keeping part order
    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        Self::new(text, self.part_order)
    }

    /// Check that the stored fingerprint still matches the text
    #[must_use]
    pub fn verify(&self) -> bool {
        ContentHash::of_text(&self.text) == self.fingerprint
    }

    /// Consume into the raw text
    #[inline]
    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }
}
