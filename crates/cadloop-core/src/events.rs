//! Workflow events
//!
//! Every recoverable occurrence in a run is recorded as a [`WorkflowEvent`],
//! returned with the outcome and mirrored to `tracing` when recorded.

use crate::verdict::Verdict;
use serde::{Deserialize, Serialize};

/// Recoverable occurrence during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// Plan parsed and loaded
    PlanAccepted { iteration: u32, parts: Vec<String> },
    /// Planning failed or returned an unusable plan
    PlanRejected { iteration: u32, reason: String },
    /// Validator findings, with one suggestion per category
    PlanIssues {
        iteration: u32,
        issues: Vec<String>,
        suggestions: Vec<String>,
    },
    /// Graph cycles or dangling references
    GraphIssues { iteration: u32, issues: Vec<String> },
    /// Locked part kept from the previous iteration
    LockedPartKept { iteration: u32, part: String },
    /// Part generation failed; an inline marker was emitted
    PartFailed {
        iteration: u32,
        part: String,
        error: String,
    },
    /// Script assembled
    Assembled {
        iteration: u32,
        fingerprint: String,
        merged_edits: bool,
    },
    /// Render failed; the diagnostic went to inspection
    RenderFailed { iteration: u32, diagnostic: String },
    /// Inspection service failed
    InspectionFailed { iteration: u32, error: String },
    /// Inspection verdict
    Verdict {
        iteration: u32,
        verdict: Verdict,
        feedback: String,
    },
    /// Ceiling reached; verdict forced to pass
    ForcedPass { iteration: u32 },
    /// Run cancelled
    Cancelled { iteration: u32 },
    /// History could not be written
    HistoryFailed { error: String },
}

impl WorkflowEvent {
    /// Mirror to `tracing` at a level matching severity
    pub fn trace(&self) {
        match self {
            Self::PlanAccepted { iteration, parts } => {
                tracing::info!(iteration, parts = parts.len(), "plan accepted");
            }
            Self::PlanRejected { iteration, reason } => {
                tracing::error!(iteration, %reason, "plan rejected; halting");
            }
            Self::PlanIssues {
                iteration, issues, ..
            } => {
                tracing::warn!(iteration, count = issues.len(), "plan validation issues");
                for issue in issues {
                    tracing::debug!(iteration, %issue, "plan issue");
                }
            }
            Self::GraphIssues { iteration, issues } => {
                tracing::warn!(iteration, ?issues, "graph integrity issues");
            }
            Self::LockedPartKept { iteration, part } => {
                tracing::debug!(iteration, %part, "locked part carried over");
            }
            Self::PartFailed {
                iteration,
                part,
                error,
            } => {
                tracing::warn!(iteration, %part, %error, "part generation failed");
            }
            Self::Assembled {
                iteration,
                fingerprint,
                merged_edits,
            } => {
                tracing::info!(iteration, %fingerprint, merged_edits, "artifact assembled");
            }
            Self::RenderFailed {
                iteration,
                diagnostic,
            } => {
                tracing::warn!(iteration, %diagnostic, "render failed");
            }
            Self::InspectionFailed { iteration, error } => {
                tracing::warn!(iteration, %error, "inspection failed");
            }
            Self::Verdict {
                iteration, verdict, ..
            } => {
                tracing::info!(iteration, %verdict, "inspection verdict");
            }
            Self::ForcedPass { iteration } => {
                tracing::warn!(iteration, "maximum iterations reached; forcing pass");
            }
            Self::Cancelled { iteration } => {
                tracing::warn!(iteration, "workflow cancelled");
            }
            Self::HistoryFailed { error } => {
                tracing::warn!(%error, "history write failed");
            }
        }
    }
}

/// Ordered event record of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventLog(Vec<WorkflowEvent>);

impl EventLog {
    /// Record and trace an event
    pub fn record(&mut self, event: WorkflowEvent) {
        event.trace();
        self.0.push(event);
    }

    /// Events in order
    #[inline]
    #[must_use]
    pub fn events(&self) -> &[WorkflowEvent] {
        &self.0
    }

    /// Number of events
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no event was recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume into the events
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> Vec<WorkflowEvent> {
        self.0
    }
}
