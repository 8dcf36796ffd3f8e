//! End-to-end workflow runs against scripted services

use cadloop_core::{
    CancellationToken, HistoryStore, JsonFileHistory, Role, ServiceError, Termination,
    WorkflowConfig, WorkflowError, WorkflowEvent, WorkflowOrchestrator, WorkflowState,
    FORCED_PASS_NOTE,
};
use cadloop_test_utils::{
    BrokenHistory, RecordingRenderer, ScriptedInspector, ScriptedPlanner, TemplateCoder,
    TestHarness, CYCLIC_PLAN, FLOATING_PLAN, PROSE_PLAN, TABLE_PLAN,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn count(events: &[WorkflowEvent], pred: impl Fn(&WorkflowEvent) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

#[tokio::test]
async fn always_failing_inspection_is_forced_to_pass_at_ceiling() {
    let harness = TestHarness::table(ScriptedInspector::always_fail());
    let orchestrator = harness.orchestrator(WorkflowConfig::default());
    let mut session = orchestrator.new_session();

    let outcome = orchestrator.run(&mut session, "a small table").await;

    assert_eq!(outcome.termination, Termination::ForcedPass);
    assert_eq!(outcome.iterations, 3);
    assert_eq!(
        outcome.feedback().unwrap(),
        format!("FAIL: the top is too thin{FORCED_PASS_NOTE}")
    );
    assert_eq!(
        harness.planner.feedback_seen(),
        vec![
            None,
            Some("FAIL: the top is too thin".to_string()),
            Some("FAIL: the top is too thin".to_string()),
        ]
    );
    assert!(outcome
        .events
        .contains(&WorkflowEvent::ForcedPass { iteration: 3 }));
    assert_eq!(session.state(), WorkflowState::Done);

    let artifact = outcome.artifact.unwrap();
    assert_eq!(artifact.part_order(), ["base", "leg", "top"]);
    let text = artifact.text();
    let base = text.find("# === base ===").unwrap();
    let leg = text.find("# === leg ===").unwrap();
    let top = text.find("# === top ===").unwrap();
    assert!(base < leg && leg < top);
    assert!(text.contains(&TemplateCoder::fragment("leg")));
    assert!(!text.contains("```"));
    assert!(text.contains("Compound(children=[base_part.part, leg_part.part, top_part.part])"));
}

#[tokio::test]
async fn identical_artifacts_are_rendered_once() {
    let harness = TestHarness::table(ScriptedInspector::always_fail());
    let orchestrator = harness.orchestrator(WorkflowConfig::default());
    let mut session = orchestrator.new_session();

    orchestrator.run(&mut session, "a small table").await;

    assert_eq!(harness.renderer.render_count(), 1);
    assert_eq!(harness.renderer.published().len(), 3);
    assert_eq!(harness.inspector.renders_seen().len(), 3);
}

#[tokio::test]
async fn pass_on_second_iteration_uses_feedback() {
    let harness = TestHarness::table(ScriptedInspector::new(["FAIL: legs missing", "PASS"]));
    let orchestrator = harness.orchestrator(WorkflowConfig::default());
    let mut session = orchestrator.new_session();

    let outcome = orchestrator.run(&mut session, "a small table").await;

    assert_eq!(outcome.termination, Termination::Passed);
    assert_eq!(outcome.iterations, 2);
    assert_eq!(
        harness.planner.feedback_seen(),
        vec![None, Some("FAIL: legs missing".to_string())]
    );
    assert!(!outcome.inspection.unwrap().forced);
}

#[tokio::test]
async fn unparseable_plan_halts_without_artifact() {
    let harness = TestHarness::new(
        ScriptedPlanner::always(PROSE_PLAN),
        TemplateCoder::new(),
        RecordingRenderer::new(),
        ScriptedInspector::always_pass(),
    );
    let orchestrator = harness.orchestrator(WorkflowConfig::default());
    let mut session = orchestrator.new_session();

    let outcome = orchestrator.run(&mut session, "a small table").await;

    assert!(matches!(
        &outcome.termination,
        Termination::PlanningFailed { reason } if reason.contains("no JSON")
    ));
    assert_eq!(outcome.iterations, 1);
    assert!(outcome.artifact.is_none());
    assert!(harness.coder.requested().is_empty());
    assert_eq!(harness.renderer.render_count(), 0);
}

#[tokio::test]
async fn planner_error_halts_with_planning_failed() {
    let harness = TestHarness::new(
        ScriptedPlanner::failing(ServiceError::failed("planner", "rate limited")),
        TemplateCoder::new(),
        RecordingRenderer::new(),
        ScriptedInspector::always_pass(),
    );
    let orchestrator = harness.orchestrator(WorkflowConfig::default());
    let mut session = orchestrator.new_session();

    let outcome = orchestrator.run(&mut session, "a small table").await;

    assert!(matches!(
        &outcome.termination,
        Termination::PlanningFailed { reason } if reason.contains("rate limited")
    ));
    assert!(outcome.events.iter().any(|e| matches!(
        e,
        WorkflowEvent::PlanRejected { iteration: 1, reason } if reason == "planner failed: rate limited"
    )));
    assert_eq!(outcome.iterations, 1);
    assert!(outcome.artifact.is_none());
    assert!(harness.coder.requested().is_empty());
    assert!(harness.inspector.renders_seen().is_empty());
}

#[tokio::test]
async fn floating_part_is_reported_every_iteration() {
    let harness = TestHarness::new(
        ScriptedPlanner::always(FLOATING_PLAN),
        TemplateCoder::new(),
        RecordingRenderer::new(),
        ScriptedInspector::always_fail(),
    );
    let orchestrator = harness.orchestrator(WorkflowConfig::default());
    let mut session = orchestrator.new_session();

    let outcome = orchestrator.run(&mut session, "three blocks").await;

    let reported: Vec<&Vec<String>> = outcome
        .events
        .iter()
        .filter_map(|e| match e {
            WorkflowEvent::PlanIssues { issues, .. } => Some(issues),
            _ => None,
        })
        .collect();
    assert_eq!(reported.len(), 3);
    for issues in reported {
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("'C'"));
        assert!(issues[0].contains("floating"));
    }

    assert_eq!(outcome.iterations, 3);
    assert_eq!(outcome.termination, Termination::ForcedPass);
    assert!(outcome.feedback().unwrap().ends_with(FORCED_PASS_NOTE));
    assert_eq!(outcome.artifact.unwrap().part_order().len(), 3);
}

#[tokio::test]
async fn empty_assembly_is_not_inspected_with_the_previous_artifact() {
    let harness = TestHarness::new(
        ScriptedPlanner::new([TABLE_PLAN, CYCLIC_PLAN]),
        TemplateCoder::new(),
        RecordingRenderer::new(),
        ScriptedInspector::new(["FAIL: legs missing", "PASS"]),
    );
    let orchestrator = harness.orchestrator(WorkflowConfig::default());
    let mut session = orchestrator.new_session();

    let outcome = orchestrator.run(&mut session, "a small table").await;

    // only the table iteration produced something to look at
    assert_eq!(harness.inspector.renders_seen().len(), 1);
    assert_eq!(harness.renderer.published().len(), 1);
    assert_eq!(outcome.termination, Termination::ForcedPass);
    assert!(outcome
        .feedback()
        .unwrap()
        .starts_with("FAIL: no artifact could be assembled"));
    assert!(outcome.artifact.is_none());
    assert!(session.artifact().is_none());
}

#[tokio::test]
async fn later_planning_failure_keeps_previous_artifact() {
    let harness = TestHarness::new(
        ScriptedPlanner::new([TABLE_PLAN, PROSE_PLAN]),
        TemplateCoder::new(),
        RecordingRenderer::new(),
        ScriptedInspector::always_fail(),
    );
    let orchestrator = harness.orchestrator(WorkflowConfig::default());
    let mut session = orchestrator.new_session();

    let outcome = orchestrator.run(&mut session, "a small table").await;

    assert!(matches!(outcome.termination, Termination::PlanningFailed { .. }));
    assert_eq!(outcome.iterations, 2);
    let artifact = outcome.artifact.unwrap();
    assert_eq!(artifact.part_order(), ["base", "leg", "top"]);
    assert_eq!(session.artifact(), Some(&artifact));
}

#[tokio::test]
async fn part_failure_leaves_marker_and_run_continues() {
    let harness = TestHarness::new(
        ScriptedPlanner::always(TABLE_PLAN),
        TemplateCoder::new().failing_for("leg"),
        RecordingRenderer::new(),
        ScriptedInspector::always_pass(),
    );
    let orchestrator = harness.orchestrator(WorkflowConfig::default());
    let mut session = orchestrator.new_session();

    let outcome = orchestrator.run(&mut session, "a small table").await;

    assert_eq!(outcome.termination, Termination::Passed);
    let text = outcome.artifact.as_ref().unwrap().text();
    assert!(text.contains("# Error generating leg: coder failed: model refused"));
    assert!(text.contains(&TemplateCoder::fragment("base")));
    assert!(text.contains(&TemplateCoder::fragment("top")));
    assert_eq!(
        count(&outcome.events, |e| matches!(
            e,
            WorkflowEvent::PartFailed { part, .. } if part == "leg"
        )),
        1
    );
}

#[tokio::test]
async fn cancellation_during_render_stops_the_run() {
    let harness = TestHarness::new(
        ScriptedPlanner::always(TABLE_PLAN),
        TemplateCoder::new(),
        RecordingRenderer::hanging(),
        ScriptedInspector::always_pass(),
    );
    let orchestrator = harness.orchestrator(WorkflowConfig::default());
    let mut session = orchestrator.new_session();
    let cancel = CancellationToken::new();

    let (outcome, ()) = tokio::join!(
        orchestrator.run_with_cancel(&mut session, "a small table", &cancel),
        async {
            harness.renderer.render_started().await;
            cancel.cancel();
        }
    );

    assert_eq!(outcome.termination, Termination::Cancelled);
    assert_eq!(
        outcome.events.last(),
        Some(&WorkflowEvent::Cancelled { iteration: 1 })
    );
    assert!(harness.inspector.renders_seen().is_empty());
    assert!(outcome.inspection.is_none());
}

#[tokio::test]
async fn cancelled_before_start_does_nothing() {
    let harness = TestHarness::table(ScriptedInspector::always_pass());
    let orchestrator = harness.orchestrator(WorkflowConfig::default());
    let mut session = orchestrator.new_session();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = orchestrator
        .run_with_cancel(&mut session, "a small table", &cancel)
        .await;

    assert_eq!(outcome.termination, Termination::Cancelled);
    assert_eq!(outcome.iterations, 0);
    assert_eq!(harness.planner.call_count(), 0);
}

#[tokio::test]
async fn render_failure_reaches_inspection_and_is_not_cached() {
    let harness = TestHarness::new(
        ScriptedPlanner::always(TABLE_PLAN),
        TemplateCoder::new(),
        RecordingRenderer::failing("NameError: name 'Box' is not defined"),
        ScriptedInspector::always_fail(),
    );
    let orchestrator = harness.orchestrator(WorkflowConfig::default().with_max_iterations(2));
    let mut session = orchestrator.new_session();

    let outcome = orchestrator.run(&mut session, "a small table").await;

    assert_eq!(outcome.termination, Termination::ForcedPass);
    assert_eq!(harness.renderer.render_count(), 2);
    let seen = harness.inspector.renders_seen();
    assert!(!seen[0].success);
    assert_eq!(seen[0].diagnostic, "NameError: name 'Box' is not defined");
    assert_eq!(
        count(&outcome.events, |e| matches!(e, WorkflowEvent::RenderFailed { .. })),
        2
    );
}

#[tokio::test]
async fn unavailable_inspector_counts_as_failure() {
    let harness = TestHarness::table(ScriptedInspector::unavailable());
    let orchestrator = harness.orchestrator(WorkflowConfig::default().with_max_iterations(2));
    let mut session = orchestrator.new_session();

    let outcome = orchestrator.run(&mut session, "a small table").await;

    assert_eq!(outcome.termination, Termination::ForcedPass);
    assert_eq!(
        count(&outcome.events, |e| matches!(e, WorkflowEvent::InspectionFailed { .. })),
        2
    );
    let feedback = harness.planner.feedback_seen()[1].clone().unwrap();
    assert!(feedback.starts_with("FAIL: inspection unavailable"));
}

#[tokio::test]
async fn strict_graph_rejects_cyclic_plans_before_generation() {
    let harness = TestHarness::new(
        ScriptedPlanner::always(CYCLIC_PLAN),
        TemplateCoder::new(),
        RecordingRenderer::new(),
        ScriptedInspector::always_pass(),
    );
    let config = WorkflowConfig::default()
        .with_max_iterations(2)
        .with_strict_graph(true);
    let orchestrator = harness.orchestrator(config);
    let mut session = orchestrator.new_session();

    let outcome = orchestrator.run(&mut session, "two linked parts").await;

    assert_eq!(outcome.termination, Termination::ForcedPass);
    assert!(outcome.artifact.is_none());
    assert!(harness.coder.requested().is_empty());
    assert_eq!(harness.renderer.render_count(), 0);
    assert!(harness.inspector.renders_seen().is_empty());

    let feedback = harness.planner.feedback_seen()[1].clone().unwrap();
    assert!(feedback.contains("Circular dependency detected for a"));
}

#[tokio::test]
async fn lenient_graph_reports_issues_and_continues() {
    let harness = TestHarness::new(
        ScriptedPlanner::always(CYCLIC_PLAN),
        TemplateCoder::new(),
        RecordingRenderer::new(),
        ScriptedInspector::always_pass(),
    );
    let orchestrator = harness.orchestrator(WorkflowConfig::default().with_max_iterations(1));
    let mut session = orchestrator.new_session();

    let outcome = orchestrator.run(&mut session, "two linked parts").await;

    assert_eq!(
        count(&outcome.events, |e| matches!(e, WorkflowEvent::GraphIssues { .. })),
        1
    );
    assert_eq!(harness.coder.requested(), vec!["a", "b"]);
    // both parts sit on the cycle, so nothing can be assembled
    assert!(outcome.artifact.is_none());
    assert_eq!(outcome.termination, Termination::ForcedPass);
}

#[tokio::test]
async fn locked_parts_survive_the_next_run() {
    let harness = TestHarness::table(ScriptedInspector::always_pass());
    let orchestrator = harness.orchestrator(WorkflowConfig::default());
    let mut session = orchestrator.new_session();

    orchestrator.run(&mut session, "a small table").await;
    let leg_code = session.graph().get("leg").unwrap().code.clone();
    assert!(session.lock_part("leg"));

    let outcome = orchestrator.run(&mut session, "a taller table").await;

    assert_eq!(
        harness.coder.requested(),
        vec!["base", "leg", "top", "base", "top"]
    );
    assert!(outcome.events.contains(&WorkflowEvent::LockedPartKept {
        iteration: 1,
        part: "leg".into(),
    }));
    let leg = session.graph().get("leg").unwrap();
    assert!(leg.is_locked());
    assert_eq!(leg.code, leg_code);
}

#[tokio::test]
async fn protected_parameter_survives_regeneration() {
    let harness = TestHarness::table(ScriptedInspector::always_pass());
    let orchestrator = harness.orchestrator(WorkflowConfig::default());
    let mut session = orchestrator.new_session();

    orchestrator.run(&mut session, "a small table").await;
    session.set_parameter("top_size", 42.0).unwrap();

    let outcome = orchestrator.run(&mut session, "a small table").await;

    let text = outcome.artifact.unwrap().text().to_string();
    assert!(text.contains("top_size = 42.0"));
    assert!(!text.contains("top_size = 10.0"));
    assert!(text.contains("base_size = 10.0"));
    assert!(outcome.events.iter().any(|e| matches!(
        e,
        WorkflowEvent::Assembled {
            merged_edits: true,
            ..
        }
    )));
}

#[tokio::test]
async fn edits_are_measured_from_the_latest_machine_output() {
    let harness = TestHarness::new(
        ScriptedPlanner::always(TABLE_PLAN),
        TemplateCoder::new().growing(),
        RecordingRenderer::new(),
        ScriptedInspector::always_pass(),
    );
    let orchestrator = harness.orchestrator(WorkflowConfig::default());
    let mut session = orchestrator.new_session();

    orchestrator.run(&mut session, "a small table").await;
    session.set_parameter("top_size", 42.0).unwrap();

    let second = orchestrator.run(&mut session, "a small table").await;
    let text = second.artifact.unwrap().text().to_string();
    assert!(text.contains("base_size = 20.0"));
    assert!(text.contains("top_size = 42.0"));

    let edited = text.replace("# === Assembly ===", "# === Assembly (checked) ===");
    session.record_human_edit(&edited).unwrap();
    assert_eq!(session.guard().record().edits.len(), 2);

    let third = orchestrator.run(&mut session, "a small table").await;
    let text = third.artifact.unwrap().text().to_string();
    assert!(text.contains("base_size = 30.0"));
    assert!(text.contains("leg_size = 30.0"));
    assert!(text.contains("top_size = 42.0"));
    assert!(!text.contains("base_size = 20.0"));
    assert!(text.contains("# === Assembly ===\n"));
    assert_eq!(session.guard().record().edits.len(), 1);
}

#[tokio::test]
async fn generated_part_code_is_tidied_before_storing() {
    let harness = TestHarness::new(
        ScriptedPlanner::always(TABLE_PLAN),
        TemplateCoder::new().padded(),
        RecordingRenderer::new(),
        ScriptedInspector::always_pass(),
    );
    let orchestrator = harness.orchestrator(WorkflowConfig::default());
    let mut session = orchestrator.new_session();

    orchestrator.run(&mut session, "a small table").await;

    for name in ["base", "leg", "top"] {
        let code = &session.graph().get(name).unwrap().code;
        assert_eq!(code, &TemplateCoder::fragment(name).replace('\n', "\n\n"));
    }
}

#[tokio::test]
async fn concurrent_generation_keeps_plan_order() {
    let harness = TestHarness::new(
        ScriptedPlanner::always(TABLE_PLAN),
        TemplateCoder::new().delayed("base", Duration::from_millis(50)),
        RecordingRenderer::new(),
        ScriptedInspector::always_pass(),
    );
    let orchestrator =
        harness.orchestrator(WorkflowConfig::default().with_generation_concurrency(3));
    let mut session = orchestrator.new_session();

    let outcome = orchestrator.run(&mut session, "a small table").await;

    assert_eq!(outcome.termination, Termination::Passed);
    for name in ["base", "leg", "top"] {
        let part = session.graph().get(name).unwrap();
        assert_eq!(part.code, TemplateCoder::fragment(name));
        assert!(!part.is_dirty());
    }
}

#[tokio::test]
async fn history_records_each_stage() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(JsonFileHistory::open(dir.path()).await.unwrap());
    let harness = TestHarness::table(ScriptedInspector::always_pass());
    let orchestrator = harness
        .orchestrator(WorkflowConfig::default())
        .with_history(store.clone());
    let mut session = orchestrator.new_session();

    let outcome = orchestrator.run(&mut session, "a small table").await;

    let doc = store.load(&session.id().filename()).await.unwrap();
    let roles: Vec<Role> = doc.history.iter().map(|e| e.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Planner, Role::Generator, Role::Inspector]
    );
    assert_eq!(doc.title, "a small table");
    assert_eq!(doc.history[1].content, "stack the top on a post");
    assert_eq!(doc.history[1].plan.as_ref().unwrap().parts.len(), 3);
    assert_eq!(
        doc.history[2].code.as_deref(),
        outcome.artifact.as_ref().map(|a| a.text())
    );
    assert_eq!(doc.history[3].iteration, Some(1));
}

#[tokio::test]
async fn history_failures_do_not_abort() {
    let harness = TestHarness::table(ScriptedInspector::always_pass());
    let orchestrator = harness
        .orchestrator(WorkflowConfig::default())
        .with_history(Arc::new(BrokenHistory));
    let mut session = orchestrator.new_session();

    let outcome = orchestrator.run(&mut session, "a small table").await;

    assert_eq!(outcome.termination, Termination::Passed);
    assert_eq!(
        count(&outcome.events, |e| matches!(e, WorkflowEvent::HistoryFailed { .. })),
        4
    );
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let harness = TestHarness::table(ScriptedInspector::always_pass());
    let result = WorkflowOrchestrator::new(
        WorkflowConfig::default().with_max_iterations(0),
        harness.services(),
    );
    assert!(matches!(result, Err(WorkflowError::Config(_))));
}
