//! Inspection verdicts
//!
//! The inspection service answers in free text. A response passes iff its
//! upper-cased form contains `PASS` and does not contain `FAIL`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Appended to feedback when the ceiling forces a pass
pub const FORCED_PASS_NOTE: &str = " (maximum iterations reached, forced pass)";

/// Pass or fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    /// Read a verdict from inspection text
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let upper = text.to_uppercase();
        if upper.contains("PASS") && !upper.contains("FAIL") {
            Self::Pass
        } else {
            Self::Fail
        }
    }

    /// Whether this is a pass
    #[inline]
    #[must_use]
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        })
    }
}

/// Verdict with its feedback, after the ceiling policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionResult {
    pub verdict: Verdict,
    pub feedback: String,
    /// Pass imposed by the ceiling rather than earned
    pub forced: bool,
}

impl InspectionResult {
    /// Apply the ceiling policy to raw inspection text
    ///
    /// At or past `max_iterations` a failing verdict becomes a forced pass
    /// and the feedback is annotated.
    #[must_use]
    pub fn judge(text: impl Into<String>, iteration: u32, max_iterations: u32) -> Self {
        let feedback = text.into();
        let verdict = Verdict::from_text(&feedback);
        Self::with_verdict(verdict, feedback, iteration, max_iterations)
    }

    /// Apply the ceiling policy to a known verdict
    #[must_use]
    pub fn with_verdict(
        verdict: Verdict,
        mut feedback: String,
        iteration: u32,
        max_iterations: u32,
    ) -> Self {
        if verdict.is_pass() {
            return Self {
                verdict,
                feedback,
                forced: false,
            };
        }
        if iteration >= max_iterations {
            feedback.push_str(FORCED_PASS_NOTE);
            return Self {
                verdict: Verdict::Pass,
                feedback,
                forced: true,
            };
        }
        Self {
            verdict,
            feedback,
            forced: false,
        }
    }
}
