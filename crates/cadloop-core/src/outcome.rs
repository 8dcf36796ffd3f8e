//! Workflow states and run outcomes

use crate::events::WorkflowEvent;
use crate::verdict::InspectionResult;
use cadloop_artifact::Artifact;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of the generation loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Planning,
    PerPartGeneration,
    Assembly,
    Inspection,
    Done,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Planning => "planning",
            Self::PerPartGeneration => "per_part_generation",
            Self::Assembly => "assembly",
            Self::Inspection => "inspection",
            Self::Done => "done",
        })
    }
}

/// Why a run stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    /// Inspection passed
    Passed,
    /// Ceiling reached; pass imposed
    ForcedPass,
    /// Planning failed; the artifact is unchanged
    PlanningFailed { reason: String },
    /// Cancelled before completion
    Cancelled,
}

impl Termination {
    /// Whether the run ended in a (possibly forced) pass
    #[inline]
    #[must_use]
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Passed | Self::ForcedPass)
    }
}

/// Result of [`crate::WorkflowOrchestrator::run`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub termination: Termination,
    /// Iterations performed in this run
    pub iterations: u32,
    /// Session artifact at the end of the run
    pub artifact: Option<Artifact>,
    /// Last inspection result, if inspection ran
    pub inspection: Option<InspectionResult>,
    pub events: Vec<WorkflowEvent>,
}

impl RunOutcome {
    /// Feedback of the last inspection
    #[must_use]
    pub fn feedback(&self) -> Option<&str> {
        self.inspection.as_ref().map(|i| i.feedback.as_str())
    }
}
