//! Planning-response parsing
//!
//! The planning service answers in free text that should contain JSON. Two
//! shapes are accepted:
//! - a bare array of plan items
//! - an object with `parts` (or `structure`), optional `rationale`
//!   (or `explanation`) and optional `parameters`
//!
//! Markdown code fences and prose around the JSON are ignored.

use crate::types::{Plan, PlanItem};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};

/// Planning output that is not a well-formed plan
#[derive(Debug, thiserror::Error)]
pub enum PlanParseError {
    /// No JSON array or object in the response
    #[error("planning response contains no JSON plan")]
    NoJson,

    /// JSON present but not a plan
    #[error("malformed plan: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Plan has no parts
    #[error("plan contains no parts")]
    Empty,

    /// Two parts share a name
    #[error("duplicate part name in plan: {0}")]
    DuplicatePart(String),
}

#[derive(Deserialize)]
struct PlanDocument {
    #[serde(alias = "structure")]
    parts: Vec<PlanItem>,
    #[serde(default, alias = "explanation")]
    rationale: String,
    #[serde(default)]
    parameters: BTreeMap<String, f64>,
}

impl Plan {
    /// Parse a planning-service response
    ///
    /// # Errors
    /// Returns [`PlanParseError`] when the text holds no JSON, the JSON is
    /// not a plan, the plan is empty, or part names repeat.
    pub fn parse_response(response: &str) -> Result<Self, PlanParseError> {
        let body = strip_fences(response);
        let plan = match json_slice(&body) {
            Some(JsonShape::Array(slice)) => Plan::new(serde_json::from_str(slice)?),
            Some(JsonShape::Object(slice)) => {
                let doc: PlanDocument = serde_json::from_str(slice)?;
                Plan {
                    items: doc.parts,
                    rationale: doc.rationale,
                    parameters: doc.parameters,
                }
            }
            None => return Err(PlanParseError::NoJson),
        };

        if plan.is_empty() {
            return Err(PlanParseError::Empty);
        }

        let mut seen = HashSet::new();
        for name in plan.names() {
            if !seen.insert(name) {
                return Err(PlanParseError::DuplicatePart(name.to_string()));
            }
        }

        tracing::debug!(parts = plan.len(), "parsed plan response");
        Ok(plan)
    }
}

enum JsonShape<'a> {
    Array(&'a str),
    Object(&'a str),
}

/// Locate the outermost JSON value, picking whichever bracket opens first
fn json_slice(text: &str) -> Option<JsonShape<'_>> {
    let first_array = text.find('[');
    let first_object = text.find('{');

    let use_array = match (first_array, first_object) {
        (Some(a), Some(o)) => a < o,
        (Some(_), None) => true,
        (None, Some(_)) => false,
        (None, None) => return None,
    };

    if use_array {
        let start = first_array?;
        let end = text.rfind(']')?;
        (end > start).then(|| JsonShape::Array(&text[start..=end]))
    } else {
        let start = first_object?;
        let end = text.rfind('}')?;
        (end > start).then(|| JsonShape::Object(&text[start..=end]))
    }
}

fn strip_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}
