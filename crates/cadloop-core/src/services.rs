//! External collaborators
//!
//! The workflow talks to four services through these traits. Implementations
//! are injected as `Arc<dyn ...>` and may wrap a language-model API, a CAD
//! kernel subprocess, or a test double.

use crate::error::ServiceError;
use async_trait::async_trait;
use cadloop_artifact::Artifact;
use cadloop_plan::PlanItem;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Proposes a part plan for a request
#[async_trait]
pub trait PlanningService: Send + Sync {
    /// Raw planning text; parsed by the workflow
    ///
    /// `feedback` carries the previous inspection verdict after the first
    /// iteration.
    async fn plan(&self, request: &str, feedback: Option<&str>) -> Result<String, ServiceError>;
}

/// Writes code for one part
#[async_trait]
pub trait PartCodeService: Send + Sync {
    /// Code fragment for `item`; may reference `available_parameters`
    async fn generate(
        &self,
        item: &PlanItem,
        available_parameters: &[String],
    ) -> Result<String, ServiceError>;
}

/// Executes assembled scripts
#[async_trait]
pub trait RenderService: Send + Sync {
    /// Show the artifact on the render surface; default does nothing
    async fn publish(&self, _artifact: &Artifact) {}

    /// Execute the script and report the result
    async fn render(&self, artifact: &Artifact) -> Result<RenderOutcome, ServiceError>;
}

/// Judges an artifact against the request
#[async_trait]
pub trait InspectionService: Send + Sync {
    /// Free-text verdict; see [`crate::verdict`]
    async fn inspect(
        &self,
        artifact: &Artifact,
        request: &str,
        render: &RenderOutcome,
    ) -> Result<String, ServiceError>;
}

/// Result of one render
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOutcome {
    /// Script ran and exported
    pub success: bool,
    /// Exported model, when there is one
    pub output_path: Option<String>,
    /// Renderer output or failure reason
    pub diagnostic: String,
}

impl RenderOutcome {
    /// Successful render
    #[must_use]
    pub fn success(output_path: impl Into<String>) -> Self {
        Self {
            success: true,
            output_path: Some(output_path.into()),
            diagnostic: String::new(),
        }
    }

    /// Failed render with a reason
    #[must_use]
    pub fn failure(diagnostic: impl Into<String>) -> Self {
        Self {
            success: false,
            output_path: None,
            diagnostic: diagnostic.into(),
        }
    }
}

/// The four collaborators of a workflow
#[derive(Clone)]
pub struct Services {
    pub planner: Arc<dyn PlanningService>,
    pub coder: Arc<dyn PartCodeService>,
    pub renderer: Arc<dyn RenderService>,
    pub inspector: Arc<dyn InspectionService>,
}

impl Services {
    /// Bundle collaborators
    pub fn new(
        planner: Arc<dyn PlanningService>,
        coder: Arc<dyn PartCodeService>,
        renderer: Arc<dyn RenderService>,
        inspector: Arc<dyn InspectionService>,
    ) -> Self {
        Self {
            planner,
            coder,
            renderer,
            inspector,
        }
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
