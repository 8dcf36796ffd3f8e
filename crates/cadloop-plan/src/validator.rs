//! Plan validation
//!
//! Catches structurally suspicious plans before any code is generated:
//! - floating parts (raised, unsupported, no dependencies)
//! - suspicious dimensions found in descriptions
//! - dependencies on parts the plan does not contain
//!
//! The checks are heuristics over plan data and description text. They do
//! not test geometric contact and do not know which number means what.

use crate::types::PlanItem;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// Literal pattern; compiling it cannot fail.
#[allow(clippy::unwrap_used)]
static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-+]?\d*\.?\d+").unwrap());

/// Validator thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Parts above this height need support
    pub ground_height: f64,
    /// XY radius within which a lower part counts as support
    pub xy_proximity: f64,
    /// Largest plausible dimension magnitude
    pub max_dimension: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            ground_height: 0.0,
            xy_proximity: 100.0,
            max_dimension: 10_000.0,
        }
    }
}

/// Issue category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanIssueKind {
    /// Raised part with nothing below it and no dependencies
    Floating,
    /// Negative number in a description, not next to "angle"
    NegativeDimension,
    /// Number whose magnitude exceeds the maximum
    OversizedDimension,
    /// Dependency on a part missing from the plan
    MissingDependency,
}

impl PlanIssueKind {
    /// Generic remediation advice for this category
    #[must_use]
    pub fn remediation(&self) -> &'static str {
        match self {
            Self::Floating => {
                "Consider adding a dependency or adjusting Z position to ground level"
            }
            Self::NegativeDimension => {
                "Check if negative values are intentional (e.g., for coordinate offsets)"
            }
            Self::OversizedDimension => {
                "Check units; dimensions above the maximum are usually unit mistakes"
            }
            Self::MissingDependency => {
                "Add the missing part to the plan or remove the dependency"
            }
        }
    }
}

/// One problem found in a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanIssue {
    /// Category
    pub kind: PlanIssueKind,
    /// Offending part
    pub part: String,
    /// Human-readable description
    pub message: String,
}

impl fmt::Display for PlanIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Result of validating a plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// All issues, grouped by check in check order
    pub issues: Vec<PlanIssue>,
}

impl ValidationReport {
    /// True iff no issues were produced
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issues of one category
    pub fn of_kind(&self, kind: PlanIssueKind) -> impl Iterator<Item = &PlanIssue> {
        self.issues.iter().filter(move |i| i.kind == kind)
    }

    /// Issue messages
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.issues.iter().map(|i| i.message.clone()).collect()
    }
}

/// Structural plan validator
#[derive(Debug, Clone, Default)]
pub struct PlanValidator {
    config: ValidatorConfig,
}

impl PlanValidator {
    /// Create validator with default thresholds
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With custom thresholds
    #[inline]
    #[must_use]
    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Thresholds in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Run all checks; none short-circuits
    #[must_use]
    pub fn validate(&self, items: &[PlanItem]) -> ValidationReport {
        let mut issues = self.check_floating(items);
        issues.extend(self.check_dimensions(items));
        issues.extend(Self::check_dependencies(items));

        if !issues.is_empty() {
            tracing::debug!(count = issues.len(), "plan validation found issues");
        }
        ValidationReport { issues }
    }

    /// One remediation per issue category present, in first-seen order
    #[must_use]
    pub fn suggest_fixes(issues: &[PlanIssue]) -> Vec<&'static str> {
        let mut seen = HashSet::new();
        issues
            .iter()
            .filter(|i| seen.insert(i.kind))
            .map(|i| i.kind.remediation())
            .collect()
    }

    fn check_floating(&self, items: &[PlanItem]) -> Vec<PlanIssue> {
        let mut issues = Vec::new();

        for (i, item) in items.iter().enumerate() {
            let here = item.placement;
            if here.height() <= self.config.ground_height || !item.dependencies.is_empty() {
                continue;
            }

            let supported = items.iter().enumerate().any(|(j, other)| {
                j != i
                    && other.placement.height() < here.height()
                    && here.xy_distance(&other.placement) < self.config.xy_proximity
            });

            if !supported {
                issues.push(PlanIssue {
                    kind: PlanIssueKind::Floating,
                    part: item.name.clone(),
                    message: format!(
                        "Warning: '{}' at Z={} may be floating (no dependencies or support below)",
                        item.name,
                        here.height()
                    ),
                });
            }
        }

        issues
    }

    fn check_dimensions(&self, items: &[PlanItem]) -> Vec<PlanIssue> {
        let mut issues = Vec::new();

        for item in items {
            for token in numeric_tokens(&item.description) {
                if token.value < 0.0 && !token.beside_angle {
                    issues.push(PlanIssue {
                        kind: PlanIssueKind::NegativeDimension,
                        part: item.name.clone(),
                        message: format!(
                            "Warning: '{}' has negative dimension: {}",
                            item.name, token.value
                        ),
                    });
                }
                if token.value.abs() > self.config.max_dimension {
                    issues.push(PlanIssue {
                        kind: PlanIssueKind::OversizedDimension,
                        part: item.name.clone(),
                        message: format!(
                            "Warning: '{}' has very large dimension: {}",
                            item.name, token.value
                        ),
                    });
                }
            }
        }

        issues
    }

    fn check_dependencies(items: &[PlanItem]) -> Vec<PlanIssue> {
        let names: HashSet<&str> = items.iter().map(|i| i.name.as_str()).collect();

        items
            .iter()
            .flat_map(|item| {
                item.dependencies
                    .iter()
                    .filter(|dep| !names.contains(dep.as_str()))
                    .map(move |dep| PlanIssue {
                        kind: PlanIssueKind::MissingDependency,
                        part: item.name.clone(),
                        message: format!(
                            "Error: '{}' depends on non-existent part '{}'",
                            item.name, dep
                        ),
                    })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct NumericToken {
    value: f64,
    beside_angle: bool,
}

/// Extract numbers from free text.
///
/// A sign glued to a preceding letter or digit is a hyphen ("part-2",
/// "100-50"), so the number reads as positive.
fn numeric_tokens(text: &str) -> Vec<NumericToken> {
    NUMBER
        .find_iter(text)
        .filter_map(|m| {
            let raw = m.as_str();
            let mut value: f64 = raw.parse().ok()?;

            let glued = text[..m.start()]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric() || c == '_');
            if glued && raw.starts_with(['-', '+']) {
                value = value.abs();
            }

            let beside_angle = word_before(&text[..m.start()])
                .into_iter()
                .chain(word_after(&text[m.end()..]))
                .any(|w| w.to_ascii_lowercase().contains("angle"));

            Some(NumericToken {
                value,
                beside_angle,
            })
        })
        .collect()
}

fn is_word_char(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn word_before(prefix: &str) -> Option<&str> {
    let trimmed = prefix.trim_end_matches(|c: char| !c.is_alphanumeric());
    let start = trimmed
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_word_char(*c))
        .last()
        .map(|(i, _)| i)?;
    Some(&trimmed[start..])
}

fn word_after(suffix: &str) -> Option<&str> {
    let trimmed = suffix.trim_start_matches(|c: char| !c.is_alphanumeric());
    let end = trimmed
        .char_indices()
        .take_while(|(_, c)| is_word_char(*c))
        .last()
        .map(|(i, c)| i + c.len_utf8())?;
    Some(&trimmed[..end])
}
