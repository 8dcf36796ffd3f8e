//! Script assembly
//!
//! Output layout, top to bottom:
//! 1. fixed preamble (toolkit imports)
//! 2. each included part's code under a `# === name ===` label
//! 3. assembly block combining every included part
//! 4. export block

use crate::templates;
use cadloop_artifact::Artifact;
use cadloop_graph::{safe_identifier, Part, PartDependencyGraph};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Which parts an emission covers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmitScope {
    /// Every registered part
    #[default]
    All,
    /// Parts flagged dirty
    OnlyDirty,
    /// Named parts; unknown names are ignored
    Selected(Vec<String>),
}

/// Assembles graphs into scripts
#[derive(Debug, Clone)]
pub struct CodeEmitter {
    output_dir: String,
}

impl Default for CodeEmitter {
    fn default() -> Self {
        Self {
            output_dir: "output".to_string(),
        }
    }
}

impl CodeEmitter {
    /// Emitter exporting to `output`
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With export directory
    #[inline]
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<String>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Export directory written into scripts
    #[inline]
    #[must_use]
    pub fn output_dir(&self) -> &str {
        &self.output_dir
    }

    /// Included part names in topological order
    #[must_use]
    pub fn working_set(graph: &PartDependencyGraph, scope: &EmitScope) -> Vec<String> {
        let wanted: HashSet<String> = match scope {
            EmitScope::All => graph.names().map(str::to_string).collect(),
            EmitScope::OnlyDirty => graph.dirty_parts().into_iter().collect(),
            EmitScope::Selected(names) => names
                .iter()
                .filter(|n| graph.contains(n))
                .cloned()
                .collect(),
        };

        graph
            .topological_order()
            .into_iter()
            .filter(|name| wanted.contains(name))
            .collect()
    }

    /// Assemble the script for `scope`; empty when no part is included
    #[must_use]
    pub fn emit(&self, graph: &PartDependencyGraph, scope: &EmitScope) -> String {
        let names = Self::working_set(graph, scope);
        self.render(graph, &names)
    }

    /// Like [`Self::emit`], wrapped with fingerprint and part order
    #[must_use]
    pub fn emit_artifact(&self, graph: &PartDependencyGraph, scope: &EmitScope) -> Option<Artifact> {
        let names = Self::working_set(graph, scope);
        if names.is_empty() {
            return None;
        }
        let text = self.render(graph, &names);
        Some(Artifact::new(text, names))
    }

    fn render(&self, graph: &PartDependencyGraph, names: &[String]) -> String {
        if names.is_empty() {
            return String::new();
        }

        let mut code = String::from(templates::PREAMBLE);
        for part in names.iter().filter_map(|n| graph.get(n)) {
            if part.code.is_empty() {
                continue;
            }
            code.push_str(&format!("# === {} ===\n", part.name));
            code.push_str(&part.code);
            code.push_str("\n\n");
        }

        let safe: Vec<String> = names.iter().map(|n| safe_identifier(n)).collect();
        code.push_str(&templates::assembly(&safe));
        code.push_str(&templates::export(&self.output_dir));

        tracing::debug!(parts = names.len(), bytes = code.len(), "emitted script");
        code
    }

    /// Fresh template code for one part
    #[must_use]
    pub fn emit_part(&self, part: &Part) -> String {
        templates::part_template(part)
    }

    /// Store regenerated code for a part and clear its dirty flag
    ///
    /// Returns false if the part is unknown.
    pub fn update_part_code(
        &self,
        graph: &mut PartDependencyGraph,
        name: &str,
        code: impl Into<String>,
    ) -> bool {
        let Some(part) = graph.get_mut(name) else {
            return false;
        };
        part.code = code.into();
        graph.mark_clean(name)
    }
}
