//! Testing utilities for cadloop workspace
//!
//! Scripted service doubles, plan fixtures, and a session builder.

#![allow(missing_docs)]

use async_trait::async_trait;
use cadloop_artifact::Artifact;
use cadloop_core::{
    HistoryEntry, HistoryError, HistoryStore, InspectionService, PartCodeService,
    PlanningService, RenderOutcome, RenderService, ServiceError, SessionDocument, SessionId,
    SessionSummary, Services, WorkflowConfig, WorkflowOrchestrator,
};
use cadloop_graph::safe_identifier;
use cadloop_plan::PlanItem;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Three-part table: base, leg on the base, top on the leg
pub const TABLE_PLAN: &str = r#"```json
{
  "parts": [
    {"name": "base", "description": "floor plate", "location": [0, 0, 0], "dependencies": []},
    {"name": "leg", "description": "single post", "location": [0, 0, 0], "dependencies": ["base"]},
    {"name": "top", "description": "round top", "location": [0, 0, 75], "dependencies": ["leg"], "operation": "revolve"}
  ],
  "rationale": "stack the top on a post",
  "parameters": {"table_height": 75}
}
```"#;

/// Two parts that depend on each other
pub const CYCLIC_PLAN: &str = r#"[
  {"name": "a", "dependencies": ["b"]},
  {"name": "b", "dependencies": ["a"]}
]"#;

/// A on the ground, B resting on A, C raised far away with no support
pub const FLOATING_PLAN: &str = r#"[
  {"name": "A", "location": [0, 0, 0], "dependencies": []},
  {"name": "B", "location": [0, 0, 0], "dependencies": ["A"]},
  {"name": "C", "location": [500, 0, 50], "dependencies": []}
]"#;

/// Planning text without any JSON
pub const PROSE_PLAN: &str = "I would build a table with four legs.";

/// Planner returning scripted responses; the last one repeats
#[derive(Debug, Default)]
pub struct ScriptedPlanner {
    responses: Vec<Result<String, ServiceError>>,
    calls: Mutex<Vec<Option<String>>>,
}

impl ScriptedPlanner {
    pub fn new(responses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            responses: responses.into_iter().map(|r| Ok(r.into())).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always(response: &str) -> Self {
        Self::new([response])
    }

    pub fn failing(error: ServiceError) -> Self {
        Self {
            responses: vec![Err(error)],
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Feedback passed on each call, in order
    pub fn feedback_seen(&self) -> Vec<Option<String>> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl PlanningService for ScriptedPlanner {
    async fn plan(&self, _request: &str, feedback: Option<&str>) -> Result<String, ServiceError> {
        let index = {
            let mut calls = self.calls.lock();
            calls.push(feedback.map(str::to_string));
            calls.len() - 1
        };
        self.responses
            .get(index)
            .or_else(|| self.responses.last())
            .cloned()
            .unwrap_or_else(|| Err(ServiceError::failed("planner", "no scripted response")))
    }
}

/// Coder answering with a fenced fragment per part
#[derive(Debug, Default)]
pub struct TemplateCoder {
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    growing: bool,
    padded: bool,
    calls: Mutex<Vec<String>>,
}

impl TemplateCoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail generation for `part`
    pub fn failing_for(mut self, part: &str) -> Self {
        self.failing.insert(part.to_string());
        self
    }

    /// Delay the answer for `part`
    pub fn delayed(mut self, part: &str, delay: Duration) -> Self {
        self.delays.insert(part.to_string(), delay);
        self
    }

    /// Size 10 on the first request for a part, 20 on the second, and so on
    pub fn growing(mut self) -> Self {
        self.growing = true;
        self
    }

    /// Separate fragment lines with runs of blank lines
    pub fn padded(mut self) -> Self {
        self.padded = true;
        self
    }

    /// Parts requested, in call order
    pub fn requested(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Fragment produced for a part
    pub fn fragment(name: &str) -> String {
        Self::fragment_sized(name, 10.0)
    }

    /// Fragment with a given size parameter
    pub fn fragment_sized(name: &str, size: f64) -> String {
        let safe = safe_identifier(name);
        format!("{safe}_size = {size:.1}\n{safe}_part = Part() + Box({safe}_size, {safe}_size, {safe}_size)")
    }
}

#[async_trait]
impl PartCodeService for TemplateCoder {
    async fn generate(
        &self,
        item: &PlanItem,
        _available_parameters: &[String],
    ) -> Result<String, ServiceError> {
        let requests = {
            let mut calls = self.calls.lock();
            calls.push(item.name.clone());
            calls.iter().filter(|name| **name == item.name).count()
        };
        if let Some(delay) = self.delays.get(&item.name) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(&item.name) {
            return Err(ServiceError::failed("coder", "model refused"));
        }
        let size = if self.growing {
            10.0 * f64::from(u32::try_from(requests).unwrap_or(u32::MAX))
        } else {
            10.0
        };
        let mut fragment = Self::fragment_sized(&item.name, size);
        if self.padded {
            fragment = fragment.replace('\n', "\n\n\n\n");
        }
        Ok(format!("```python\n{fragment}\n```"))
    }
}

/// Renderer counting calls; optionally hangs after signalling
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    renders: AtomicUsize,
    published: Mutex<Vec<Artifact>>,
    fail_with: Option<String>,
    hang: bool,
    started: Notify,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report every render as failed
    pub fn failing(diagnostic: &str) -> Self {
        Self {
            fail_with: Some(diagnostic.to_string()),
            ..Self::default()
        }
    }

    /// Never finish a render
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    /// Resolves once a render has begun
    pub async fn render_started(&self) {
        self.started.notified().await;
    }

    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub fn published(&self) -> Vec<Artifact> {
        self.published.lock().clone()
    }
}

#[async_trait]
impl RenderService for RecordingRenderer {
    async fn publish(&self, artifact: &Artifact) {
        self.published.lock().push(artifact.clone());
    }

    async fn render(&self, _artifact: &Artifact) -> Result<RenderOutcome, ServiceError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        if self.hang {
            std::future::pending::<()>().await;
        }
        Ok(match &self.fail_with {
            Some(diagnostic) => RenderOutcome::failure(diagnostic.clone()),
            None => RenderOutcome::success("output/model.stl"),
        })
    }
}

/// Inspector returning scripted verdict texts; the last one repeats
#[derive(Debug, Default)]
pub struct ScriptedInspector {
    responses: Vec<String>,
    unavailable: bool,
    calls: Mutex<Vec<RenderOutcome>>,
}

impl ScriptedInspector {
    pub fn new(responses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            responses: responses.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn always_fail() -> Self {
        Self::new(["FAIL: the top is too thin"])
    }

    pub fn always_pass() -> Self {
        Self::new(["PASS: looks like a table"])
    }

    /// Every call errors
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Render outcomes seen, in call order
    pub fn renders_seen(&self) -> Vec<RenderOutcome> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl InspectionService for ScriptedInspector {
    async fn inspect(
        &self,
        _artifact: &Artifact,
        _request: &str,
        render: &RenderOutcome,
    ) -> Result<String, ServiceError> {
        let index = {
            let mut calls = self.calls.lock();
            calls.push(render.clone());
            calls.len() - 1
        };
        if self.unavailable {
            return Err(ServiceError::Transport("connection refused".to_string()));
        }
        Ok(self
            .responses
            .get(index)
            .or_else(|| self.responses.last())
            .cloned()
            .unwrap_or_default())
    }
}

/// History store whose writes always fail
#[derive(Debug, Default)]
pub struct BrokenHistory;

#[async_trait]
impl HistoryStore for BrokenHistory {
    async fn append(&self, _session: &SessionId, _entry: HistoryEntry) -> Result<(), HistoryError> {
        Err(HistoryError::Io(std::io::Error::other("disk full")))
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, HistoryError> {
        Ok(Vec::new())
    }

    async fn load(&self, filename: &str) -> Result<SessionDocument, HistoryError> {
        Err(HistoryError::NotFound(filename.to_string()))
    }

    async fn delete(&self, filename: &str) -> Result<(), HistoryError> {
        Err(HistoryError::NotFound(filename.to_string()))
    }
}

/// Doubles wired into an orchestrator, kept for assertions
pub struct TestHarness {
    pub planner: Arc<ScriptedPlanner>,
    pub coder: Arc<TemplateCoder>,
    pub renderer: Arc<RecordingRenderer>,
    pub inspector: Arc<ScriptedInspector>,
}

impl TestHarness {
    pub fn new(
        planner: ScriptedPlanner,
        coder: TemplateCoder,
        renderer: RecordingRenderer,
        inspector: ScriptedInspector,
    ) -> Self {
        Self {
            planner: Arc::new(planner),
            coder: Arc::new(coder),
            renderer: Arc::new(renderer),
            inspector: Arc::new(inspector),
        }
    }

    /// Table plan, template coder, succeeding renderer, given inspector
    pub fn table(inspector: ScriptedInspector) -> Self {
        Self::new(
            ScriptedPlanner::always(TABLE_PLAN),
            TemplateCoder::new(),
            RecordingRenderer::new(),
            inspector,
        )
    }

    pub fn services(&self) -> Services {
        Services::new(
            self.planner.clone(),
            self.coder.clone(),
            self.renderer.clone(),
            self.inspector.clone(),
        )
    }

    pub fn orchestrator(&self, config: WorkflowConfig) -> WorkflowOrchestrator {
        WorkflowOrchestrator::new(config, self.services()).unwrap()
    }
}
