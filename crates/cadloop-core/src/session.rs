//! Workflow sessions
//!
//! A [`WorkflowSession`] owns all mutable state of one design conversation:
//! the part graph, the diff guard, the current artifact and plan. Runs and
//! human edits both go through `&mut` access, so a session is never shared.

use crate::error::WorkflowError;
use crate::history::SessionId;
use crate::outcome::WorkflowState;
use cadloop_artifact::Artifact;
use cadloop_emitter::{CodeEmitter, EmitScope};
use cadloop_graph::PartDependencyGraph;
use cadloop_guard::{extract_parameters, update_parameters, DiffGuard, GuardConfig};
use cadloop_plan::Plan;
use indexmap::IndexMap;

/// State of one design session
#[derive(Debug)]
pub struct WorkflowSession {
    id: SessionId,
    pub(crate) graph: PartDependencyGraph,
    pub(crate) guard: DiffGuard,
    pub(crate) artifact: Option<Artifact>,
    pub(crate) plan: Option<Plan>,
    pub(crate) state: WorkflowState,
    pub(crate) iteration: u32,
    emitter: CodeEmitter,
}

impl WorkflowSession {
    /// Empty session with a fresh id
    #[must_use]
    pub fn new(emitter: CodeEmitter, guard: GuardConfig) -> Self {
        Self::with_id(SessionId::generate(), emitter, guard)
    }

    /// Empty session with a given id
    #[must_use]
    pub fn with_id(id: SessionId, emitter: CodeEmitter, guard: GuardConfig) -> Self {
        Self {
            id,
            graph: PartDependencyGraph::new(),
            guard: DiffGuard::with_config(guard),
            artifact: None,
            plan: None,
            state: WorkflowState::Planning,
            iteration: 0,
            emitter,
        }
    }

    /// Session id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Part graph
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &PartDependencyGraph {
        &self.graph
    }

    /// Diff guard
    #[inline]
    #[must_use]
    pub fn guard(&self) -> &DiffGuard {
        &self.guard
    }

    /// Latest artifact
    #[inline]
    #[must_use]
    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    /// Latest accepted plan
    #[inline]
    #[must_use]
    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    /// Current workflow state
    #[inline]
    #[must_use]
    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// Iterations run so far in the current request
    #[inline]
    #[must_use]
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Record a complete human-edited version of the artifact
    ///
    /// The edited text becomes the current artifact and its diff against the
    /// last machine output is tracked by the guard.
    ///
    /// # Errors
    /// Returns [`WorkflowError::NoArtifact`] before the first assembly.
    pub fn record_human_edit(&mut self, code: &str) -> Result<(), WorkflowError> {
        let artifact = self.artifact.take().ok_or(WorkflowError::NoArtifact)?;
        if self.guard.baseline().is_empty() {
            self.guard.set_baseline(artifact.text());
        }
        self.guard.track_edit(code);
        self.artifact = Some(artifact.with_text(code));

        tracing::info!(
            session = %self.id,
            edits = self.guard.record().edits.len(),
            "human edit recorded"
        );
        Ok(())
    }

    /// Set one parameter in the artifact and protect it
    ///
    /// # Errors
    /// Returns [`WorkflowError::NoArtifact`] before the first assembly, or
    /// [`WorkflowError::UnknownParameter`] if no line assigns `name`.
    pub fn set_parameter(&mut self, name: &str, value: f64) -> Result<(), WorkflowError> {
        self.set_parameters(&IndexMap::from([(name.to_string(), value)]))
    }

    /// Set several parameters as one human edit and protect all of them
    ///
    /// Nothing changes unless every name is assigned in the artifact.
    ///
    /// # Errors
    /// Returns [`WorkflowError::NoArtifact`] before the first assembly, or
    /// [`WorkflowError::UnknownParameter`] naming the first unknown parameter.
    pub fn set_parameters(&mut self, updates: &IndexMap<String, f64>) -> Result<(), WorkflowError> {
        let current = self.artifact.as_ref().ok_or(WorkflowError::NoArtifact)?;
        let known = extract_parameters(current.text());
        if let Some(unknown) = updates.keys().find(|name| !known.contains_key(*name)) {
            return Err(WorkflowError::UnknownParameter(unknown.clone()));
        }
        let updated = update_parameters(current.text(), updates);

        for name in updates.keys() {
            self.guard.protect_variable(name.as_str());
        }
        self.record_human_edit(&updated)
    }

    /// Protect a part from regeneration; false if unknown
    pub fn lock_part(&mut self, name: &str) -> bool {
        self.graph.lock(name)
    }

    /// Release a part lock; false if unknown
    pub fn unlock_part(&mut self, name: &str) -> bool {
        self.graph.unlock(name)
    }

    /// Mark a part and everything depending on it dirty
    ///
    /// Returns the parts marked, the edited part first. Empty if unknown.
    pub fn mark_edited(&mut self, part: &str) -> Vec<String> {
        if !self.graph.mark_dirty(part) {
            return Vec::new();
        }
        let mut marked = vec![part.to_string()];
        for name in self.graph.affected_by(part) {
            self.graph.mark_dirty(&name);
            marked.push(name);
        }
        marked
    }

    /// Preview script covering only dirty parts
    #[must_use]
    pub fn regenerate_dirty(&self) -> String {
        self.emitter.emit(&self.graph, &EmitScope::OnlyDirty)
    }

    /// Emitter used for previews
    #[inline]
    #[must_use]
    pub fn emitter(&self) -> &CodeEmitter {
        &self.emitter
    }
}
