//! Diff guard
//!
//! Reconciles freshly generated code with a human's edits of an earlier
//! version. Two mechanisms, applied in order:
//! 1. positional: edited parameter lines overwrite the same line index
//! 2. identifier-keyed: assignments to protected variables take the value
//!    the human last gave them, wherever the line moved to
//!
//! The second survives line shifts and is the one to rely on.

use crate::params::{assigns, parse_assignment, rejoin};
use serde::{Deserialize, Serialize};
use similar::{capture_diff_slices, Algorithm, DiffOp};
use std::collections::{BTreeMap, BTreeSet};

/// Guard tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Edits at most this many lines past a region's end extend it
    pub region_gap: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self { region_gap: 2 }
    }
}

/// Inclusive range of edited lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedRegion {
    pub start: usize,
    pub end: usize,
}

/// Edits of one human session relative to the baseline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditRecord {
    /// Edited-text line index -> final content of that line
    pub edits: BTreeMap<usize, String>,
    /// Coalesced ranges of edited lines
    pub regions: Vec<ProtectedRegion>,
    /// Variables whose values survive regeneration
    pub protected_variables: BTreeSet<String>,
}

/// Read-only view of what the guard protects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectedInfo {
    pub protected_regions: Vec<ProtectedRegion>,
    pub protected_variables: Vec<String>,
    pub user_edit_count: usize,
}

/// Guard over one artifact's text
#[derive(Debug, Clone, Default)]
pub struct DiffGuard {
    baseline: String,
    record: EditRecord,
    config: GuardConfig,
}

impl DiffGuard {
    /// Create an empty guard
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With custom tuning
    #[inline]
    #[must_use]
    pub fn with_config(config: GuardConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Store the machine-generated reference text
    ///
    /// Clears tracked edits and regions. Protected variables are kept.
    pub fn set_baseline(&mut self, code: impl Into<String>) {
        self.baseline = code.into();
        self.record.edits.clear();
        self.record.regions.clear();
    }

    /// Current baseline
    #[inline]
    #[must_use]
    pub fn baseline(&self) -> &str {
        &self.baseline
    }

    /// Record the difference between the baseline and a complete edited text
    ///
    /// The edit map is rebuilt from scratch on every call, so tracking the
    /// same text twice changes nothing. A protected variable with a tracked
    /// assignment stays tracked even where its line matches the baseline.
    pub fn track_edit(&mut self, edited: &str) {
        let old: Vec<&str> = self.baseline.lines().collect();
        let new: Vec<&str> = edited.lines().collect();

        let pinned: Vec<String> = self
            .record
            .protected_variables
            .iter()
            .filter(|name| self.last_edited_assignment(name).is_some())
            .cloned()
            .collect();

        self.record.edits.clear();
        for op in capture_diff_slices(Algorithm::Myers, &old, &new) {
            match op {
                DiffOp::Insert {
                    new_index, new_len, ..
                }
                | DiffOp::Replace {
                    new_index, new_len, ..
                } => {
                    for (offset, line) in new[new_index..new_index + new_len].iter().enumerate() {
                        self.record
                            .edits
                            .insert(new_index + offset, (*line).to_string());
                    }
                }
                DiffOp::Equal { .. } | DiffOp::Delete { .. } => {}
            }
        }

        // A protected value equal to the baseline produces no diff but stays pinned.
        for name in pinned {
            if self.last_edited_assignment(&name).is_some() {
                continue;
            }
            if let Some(index) = new.iter().rposition(|line| assigns(line, &name)) {
                self.record.edits.insert(index, new[index].to_string());
            }
        }

        self.record.regions = coalesce(self.record.edits.keys().copied(), self.config.region_gap);
        tracing::debug!(
            edits = self.record.edits.len(),
            regions = self.record.regions.len(),
            "tracked human edit"
        );
    }

    /// Keep a variable's human-set value across regeneration
    pub fn protect_variable(&mut self, name: impl Into<String>) {
        self.record.protected_variables.insert(name.into());
    }

    /// Stop protecting a variable
    pub fn unprotect_variable(&mut self, name: &str) {
        self.record.protected_variables.remove(name);
    }

    /// Whether a variable is protected
    #[inline]
    #[must_use]
    pub fn is_protected(&self, name: &str) -> bool {
        self.record.protected_variables.contains(name)
    }

    /// Whether there is anything to reconcile
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.record.edits.is_empty() || !self.record.protected_variables.is_empty()
    }

    /// Tracked state
    #[inline]
    #[must_use]
    pub fn record(&self) -> &EditRecord {
        &self.record
    }

    /// Reconcile fresh code with tracked edits
    ///
    /// Identity when nothing is tracked or protected.
    #[must_use]
    pub fn merge_code(&self, fresh: &str) -> String {
        if !self.is_active() {
            return fresh.to_string();
        }

        let mut lines: Vec<String> = fresh.lines().map(str::to_string).collect();

        // Protected variables are restored by name below, not by position.
        for (&index, content) in &self.record.edits {
            let Some((name, _)) = parse_assignment(content) else {
                continue;
            };
            if index < lines.len() && !self.record.protected_variables.contains(name) {
                lines[index].clone_from(content);
            }
        }

        for name in &self.record.protected_variables {
            let Some(replacement) = self.last_edited_assignment(name) else {
                continue;
            };
            for line in lines.iter_mut().filter(|l| assigns(l, name)) {
                line.clone_from(replacement);
            }
        }

        rejoin(lines, fresh)
    }

    /// Merge fresh machine output and make `fresh` the new baseline
    ///
    /// The merged text is tracked against `fresh`, so later edits are
    /// measured from the latest machine output while the restored values
    /// stay tracked. Returns the merged text.
    pub fn rebase(&mut self, fresh: &str) -> String {
        let merged = self.merge_code(fresh);
        self.baseline = fresh.to_string();
        self.track_edit(&merged);
        merged
    }

    fn last_edited_assignment(&self, name: &str) -> Option<&String> {
        self.record
            .edits
            .values()
            .rev()
            .find(|line| assigns(line, name))
    }

    /// Human-readable summary of tracked edits, listing at most five
    #[must_use]
    pub fn edit_summary(&self) -> String {
        if self.record.edits.is_empty() {
            return "No user edits tracked".to_string();
        }

        let mut summary = format!("User edited {} lines:\n", self.record.edits.len());
        for (index, content) in self.record.edits.iter().take(5) {
            let head: String = content.chars().take(50).collect();
            summary.push_str(&format!("  Line {index}: {head}...\n"));
        }
        if self.record.edits.len() > 5 {
            summary.push_str(&format!("  ... and {} more\n", self.record.edits.len() - 5));
        }
        summary
    }

    /// Protected regions, variables and edit count
    #[must_use]
    pub fn protected_info(&self) -> ProtectedInfo {
        ProtectedInfo {
            protected_regions: self.record.regions.clone(),
            protected_variables: self.record.protected_variables.iter().cloned().collect(),
            user_edit_count: self.record.edits.len(),
        }
    }

    /// Forget baseline, edits and protected variables
    pub fn clear(&mut self) {
        self.baseline.clear();
        self.record = EditRecord::default();
    }
}

fn coalesce(indices: impl Iterator<Item = usize>, gap: usize) -> Vec<ProtectedRegion> {
    let mut regions: Vec<ProtectedRegion> = Vec::new();
    for index in indices {
        match regions.last_mut() {
            Some(region) if index <= region.end + gap => region.end = index,
            _ => regions.push(ProtectedRegion {
                start: index,
                end: index,
            }),
        }
    }
    regions
}
