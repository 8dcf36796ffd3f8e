//! Workflow orchestrator
//!
//! Drives one request through the generation loop:
//!
//! ```text
//! Planning -> PerPartGeneration -> Assembly -> Inspection -> Done
//!    ^                                             |
//!    +--------------- FAIL, below ceiling ---------+
//! ```
//!
//! # Workflow
//! 1. Ask the planning service for parts, validate, load into the graph
//! 2. Generate code for every unlocked part; failures become markers
//! 3. Emit the script and reconcile it with human edits
//! 4. Render (cached, bounded, cancellable) and inspect
//!
//! Service failures never abort a run. They are recorded as events and the
//! run ends with a [`Termination`].

use crate::cache::RenderCache;
use crate::config::WorkflowConfig;
use crate::error::{PartGenerationError, ServiceError, WorkflowError};
use crate::events::{EventLog, WorkflowEvent};
use crate::history::{HistoryEntry, HistoryStore, Role, SessionId};
use crate::outcome::{RunOutcome, Termination, WorkflowState};
use crate::services::{RenderOutcome, Services};
use crate::session::WorkflowSession;
use crate::verdict::{InspectionResult, Verdict};
use cadloop_emitter::{format_code, strip_code_fences, CodeEmitter, EmitScope};
use cadloop_graph::Part;
use cadloop_plan::{Plan, PlanItem, PlanValidator};
use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Runs requests against injected collaborators
pub struct WorkflowOrchestrator {
    config: WorkflowConfig,
    services: Services,
    history: Option<Arc<dyn HistoryStore>>,
    validator: PlanValidator,
    emitter: CodeEmitter,
    cache: RenderCache,
}

impl fmt::Debug for WorkflowOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowOrchestrator")
            .field("config", &self.config)
            .field("history", &self.history.is_some())
            .finish_non_exhaustive()
    }
}

/// Where the planning stage leaves the loop
enum PlanningStep {
    Proceed,
    GraphRejected(String),
    Failed(String),
}

impl WorkflowOrchestrator {
    /// Create an orchestrator
    ///
    /// # Errors
    /// Returns [`WorkflowError::Config`] if the configuration is invalid.
    pub fn new(config: WorkflowConfig, services: Services) -> Result<Self, WorkflowError> {
        config.validate()?;
        Ok(Self {
            validator: PlanValidator::with_config(config.validator),
            emitter: CodeEmitter::new().with_output_dir(config.output_dir.clone()),
            cache: RenderCache::new(config.render_cache_capacity),
            history: None,
            services,
            config,
        })
    }

    /// With history persistence
    #[inline]
    #[must_use]
    pub fn with_history(mut self, store: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(store);
        self
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Render-result cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    /// Fresh session using this orchestrator's emitter and guard settings
    #[must_use]
    pub fn new_session(&self) -> WorkflowSession {
        WorkflowSession::new(self.emitter.clone(), self.config.guard)
    }

    /// Run a request to completion
    pub async fn run(&self, session: &mut WorkflowSession, request: &str) -> RunOutcome {
        self.run_with_cancel(session, request, &CancellationToken::new())
            .await
    }

    /// Run a request, stopping early when `cancel` fires
    pub async fn run_with_cancel(
        &self,
        session: &mut WorkflowSession,
        request: &str,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        let mut events = EventLog::default();
        let mut feedback: Option<String> = None;
        let mut inspection: Option<InspectionResult> = None;

        session.iteration = 0;
        session.state = WorkflowState::Planning;
        tracing::info!(session = %session.id(), "workflow started");
        self.remember(session.id(), HistoryEntry::new(Role::User, request), &mut events)
            .await;

        let termination = loop {
            if cancel.is_cancelled() {
                events.record(WorkflowEvent::Cancelled {
                    iteration: session.iteration,
                });
                break Termination::Cancelled;
            }
            tracing::info!(iteration = session.iteration, state = %session.state, "workflow stage");

            match session.state {
                WorkflowState::Planning => {
                    match self
                        .plan(session, request, feedback.as_deref(), &mut events)
                        .await
                    {
                        PlanningStep::Proceed => session.state = WorkflowState::PerPartGeneration,
                        PlanningStep::GraphRejected(issues) => {
                            let result = InspectionResult::with_verdict(
                                Verdict::Fail,
                                format!("FAIL: the part graph is inconsistent:\n{issues}"),
                                session.iteration,
                                self.config.max_iterations,
                            );
                            feedback = Some(result.feedback.clone());
                            let done = Self::conclude(session, &result, &mut events);
                            inspection = Some(result);
                            if let Some(termination) = done {
                                break termination;
                            }
                        }
                        PlanningStep::Failed(reason) => {
                            break Termination::PlanningFailed { reason };
                        }
                    }
                }
                WorkflowState::PerPartGeneration => {
                    self.generate_parts(session, &mut events).await;
                    session.state = WorkflowState::Assembly;
                }
                WorkflowState::Assembly => {
                    self.assemble(session, &mut events).await;
                    session.state = WorkflowState::Inspection;
                }
                WorkflowState::Inspection => {
                    let Some(result) = self.inspect(session, request, cancel, &mut events).await
                    else {
                        break Termination::Cancelled;
                    };
                    feedback = Some(result.feedback.clone());
                    let done = Self::conclude(session, &result, &mut events);
                    inspection = Some(result);
                    if let Some(termination) = done {
                        break termination;
                    }
                }
                // runs always start from Planning; Done is entered through conclude
                WorkflowState::Done => break Termination::Passed,
            }
        };

        session.state = WorkflowState::Done;
        tracing::info!(
            session = %session.id(),
            iterations = session.iteration,
            ?termination,
            "workflow finished"
        );

        RunOutcome {
            termination,
            iterations: session.iteration,
            artifact: session.artifact.clone(),
            inspection,
            events: events.into_inner(),
        }
    }

    /// Record the verdict; `Some` when the run is over
    fn conclude(
        session: &mut WorkflowSession,
        result: &InspectionResult,
        events: &mut EventLog,
    ) -> Option<Termination> {
        let iteration = session.iteration;
        events.record(WorkflowEvent::Verdict {
            iteration,
            verdict: result.verdict,
            feedback: result.feedback.clone(),
        });

        if !result.verdict.is_pass() {
            session.state = WorkflowState::Planning;
            return None;
        }

        session.state = WorkflowState::Done;
        if result.forced {
            events.record(WorkflowEvent::ForcedPass { iteration });
            Some(Termination::ForcedPass)
        } else {
            Some(Termination::Passed)
        }
    }

    async fn plan(
        &self,
        session: &mut WorkflowSession,
        request: &str,
        feedback: Option<&str>,
        events: &mut EventLog,
    ) -> PlanningStep {
        let response = with_timeout(
            "planning",
            self.config.service_timeout(),
            self.services.planner.plan(request, feedback),
        )
        .await;
        session.iteration += 1;
        let iteration = session.iteration;

        let parsed = response
            .map_err(|e| e.to_string())
            .and_then(|text| Plan::parse_response(&text).map_err(|e| e.to_string()));
        let plan = match parsed {
            Ok(plan) => plan,
            Err(reason) => {
                events.record(WorkflowEvent::PlanRejected {
                    iteration,
                    reason: reason.clone(),
                });
                return PlanningStep::Failed(reason);
            }
        };

        let report = self.validator.validate(&plan.items);
        if !report.is_valid() {
            events.record(WorkflowEvent::PlanIssues {
                iteration,
                issues: report.messages(),
                suggestions: PlanValidator::suggest_fixes(&report.issues)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            });
        }

        self.load_plan(session, &plan, events);
        events.record(WorkflowEvent::PlanAccepted {
            iteration,
            parts: plan.names().map(str::to_string).collect(),
        });

        let summary = if plan.rationale.is_empty() {
            format!("planned {} parts", plan.len())
        } else {
            plan.rationale.clone()
        };
        self.remember(
            session.id(),
            HistoryEntry::new(Role::Planner, summary)
                .with_plan(session.graph.to_snapshot())
                .with_iteration(iteration),
            events,
        )
        .await;
        session.plan = Some(plan);

        let issues = session.graph.validate();
        if issues.is_empty() {
            return PlanningStep::Proceed;
        }
        let messages: Vec<String> = issues.iter().map(ToString::to_string).collect();
        events.record(WorkflowEvent::GraphIssues {
            iteration,
            issues: messages.clone(),
        });

        if self.config.strict_graph {
            PlanningStep::GraphRejected(messages.join("\n"))
        } else {
            PlanningStep::Proceed
        }
    }

    /// Rebuild the graph, keeping code and lock of locked parts that reappear
    fn load_plan(&self, session: &mut WorkflowSession, plan: &Plan, events: &mut EventLog) {
        let locked: Vec<(String, String)> = session
            .graph
            .parts()
            .filter(|p| p.is_locked())
            .map(|p| (p.name.clone(), p.code.clone()))
            .collect();

        session.graph.load_plan(&plan.items);

        for (name, code) in locked {
            if self.emitter.update_part_code(&mut session.graph, &name, code) {
                session.graph.lock(&name);
                events.record(WorkflowEvent::LockedPartKept {
                    iteration: session.iteration,
                    part: name,
                });
            }
        }
    }

    async fn generate_parts(&self, session: &mut WorkflowSession, events: &mut EventLog) {
        let iteration = session.iteration;
        let Some(plan) = session.plan.as_ref() else {
            return;
        };

        let available = plan.available_parameters();
        let jobs: Vec<PlanItem> = plan
            .items
            .iter()
            .filter(|item| !session.graph.get(&item.name).is_some_and(Part::is_locked))
            .cloned()
            .collect();
        let limit = self.config.service_timeout();

        // buffered keeps plan order while running up to `generation_concurrency` calls
        let results: IndexMap<String, Result<String, ServiceError>> = stream::iter(jobs)
            .map(|item| {
                let coder = Arc::clone(&self.services.coder);
                let available = available.clone();
                async move {
                    let result =
                        with_timeout("part-code", limit, coder.generate(&item, &available)).await;
                    (item.name, result)
                }
            })
            .buffered(self.config.generation_concurrency)
            .collect()
            .await;

        for (name, result) in results {
            let code = match result {
                Ok(text) => {
                    let code = format_code(&strip_code_fences(&text));
                    if code.is_empty() {
                        session
                            .graph
                            .get(&name)
                            .map(|part| self.emitter.emit_part(part))
                            .unwrap_or_default()
                    } else {
                        code
                    }
                }
                Err(source) => {
                    let err = PartGenerationError {
                        part: name.clone(),
                        source,
                    };
                    events.record(WorkflowEvent::PartFailed {
                        iteration,
                        part: name.clone(),
                        error: err.source.to_string(),
                    });
                    err.marker()
                }
            };
            tracing::debug!(iteration, part = %name, bytes = code.len(), "part code stored");
            self.emitter.update_part_code(&mut session.graph, &name, code);
        }
    }

    async fn assemble(&self, session: &mut WorkflowSession, events: &mut EventLog) {
        let iteration = session.iteration;
        let Some(fresh) = self.emitter.emit_artifact(&session.graph, &EmitScope::All) else {
            tracing::warn!(iteration, "nothing to assemble");
            session.artifact = None;
            return;
        };

        let merged_edits = session.guard.is_active();
        let merged = session.guard.rebase(fresh.text());
        let artifact = if merged_edits {
            fresh.with_text(merged)
        } else {
            fresh
        };

        events.record(WorkflowEvent::Assembled {
            iteration,
            fingerprint: artifact.fingerprint().short(),
            merged_edits,
        });
        self.services.renderer.publish(&artifact).await;
        self.remember(
            session.id(),
            HistoryEntry::new(
                Role::Generator,
                format!("assembled {} parts", artifact.part_order().len()),
            )
            .with_code(artifact.text())
            .with_iteration(iteration),
            events,
        )
        .await;

        session.artifact = Some(artifact);
    }

    /// Render and inspect; `None` if cancelled during the render
    async fn inspect(
        &self,
        session: &WorkflowSession,
        request: &str,
        cancel: &CancellationToken,
        events: &mut EventLog,
    ) -> Option<InspectionResult> {
        let iteration = session.iteration;
        let max = self.config.max_iterations;
        let Some(artifact) = session.artifact.as_ref() else {
            return Some(InspectionResult::with_verdict(
                Verdict::Fail,
                "FAIL: no artifact could be assembled".to_string(),
                iteration,
                max,
            ));
        };

        let limit = self.config.render_timeout();
        let render = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                events.record(WorkflowEvent::Cancelled { iteration });
                return None;
            }
            result = tokio::time::timeout(
                limit,
                self.cache.get_or_render(artifact, self.services.renderer.as_ref()),
            ) => match result {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => RenderOutcome::failure(e.to_string()),
                Err(_) => RenderOutcome::failure(
                    ServiceError::Timeout {
                        service: "render".to_string(),
                        secs: limit.as_secs(),
                    }
                    .to_string(),
                ),
            },
        };

        if !render.success {
            events.record(WorkflowEvent::RenderFailed {
                iteration,
                diagnostic: render.diagnostic.clone(),
            });
        }

        let text = match with_timeout(
            "inspection",
            self.config.service_timeout(),
            self.services.inspector.inspect(artifact, request, &render),
        )
        .await
        {
            Ok(text) => text,
            Err(e) => {
                events.record(WorkflowEvent::InspectionFailed {
                    iteration,
                    error: e.to_string(),
                });
                format!("FAIL: inspection unavailable: {e}")
            }
        };

        let result = InspectionResult::judge(text, iteration, max);
        self.remember(
            session.id(),
            HistoryEntry::new(Role::Inspector, result.feedback.clone()).with_iteration(iteration),
            events,
        )
        .await;
        Some(result)
    }

    /// Append to history; failures are recorded, never raised
    async fn remember(&self, session: &SessionId, entry: HistoryEntry, events: &mut EventLog) {
        let Some(store) = &self.history else {
            return;
        };
        if let Err(e) = store.append(session, entry).await {
            events.record(WorkflowEvent::HistoryFailed {
                error: e.to_string(),
            });
        }
    }
}

async fn with_timeout<T, F>(service: &str, limit: Duration, call: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::Timeout {
            service: service.to_string(),
            secs: limit.as_secs(),
        }),
    }
}
