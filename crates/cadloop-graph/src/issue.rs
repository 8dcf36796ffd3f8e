//! Graph integrity issues

use serde::{Deserialize, Serialize};

/// Problem found by [`crate::PartDependencyGraph::validate`]
///
/// Issues are reported, never repaired automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphIssue {
    /// Part reachable from itself along dependency edges
    #[error("Circular dependency detected for {part}")]
    Cycle {
        /// Part on the cycle
        part: String,
    },

    /// Dependency on an unregistered part
    #[error("{part} depends on non-existent part {missing}")]
    Dangling {
        /// Declaring part
        part: String,
        /// Missing target
        missing: String,
    },
}

impl GraphIssue {
    /// Part the issue is attached to
    #[must_use]
    pub fn part(&self) -> &str {
        match self {
            Self::Cycle { part } | Self::Dangling { part, .. } => part,
        }
    }

    /// Whether this is a cycle
    #[inline]
    #[must_use]
    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::Cycle { .. })
    }
}
