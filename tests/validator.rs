//! Tests for static workflow validation.
mod common;
use common::*;
use kousei::prelude::*;
use uuid::Uuid;

#[test]
fn valid_workflows_pass() {
    assert!(validate(&create_agent_workflow()).valid);
    assert!(validate(&create_branch_workflow()).valid);
}

#[test]
fn all_violations_are_reported_together() {
    let mut ir = create_agent_workflow();
    ir.trigger.trigger_config = None; // loses path + httpMethod
    ir.steps[0].agent = None; // agent step without a spec
    ir.edges.push(EdgeSpec::new("respond", "ghost"));

    let report = validate(&ir);
    assert!(!report.valid);
    assert!(report.errors.len() >= 4, "expected at least 4 errors, got {:?}", report.errors);
    assert!(report.errors.iter().any(|e| e.contains("path")));
    assert!(report.errors.iter().any(|e| e.contains("httpMethod")));
    assert!(report.errors.iter().any(|e| e.contains("agent")));
    assert!(report.errors.iter().any(|e| e.contains("ghost")));
}

#[test]
fn branch_with_single_condition_is_rejected() {
    let mut ir = create_branch_workflow();
    if let Some(conditions) = &mut ir.steps[0].branch_conditions {
        conditions.truncate(1);
    }
    let report = validate(&ir);
    assert!(!report.valid);
    assert!(
        report
            .errors
            .iter()
            .any(|e| e.contains("route") && e.contains("branch_conditions"))
    );
}

#[test]
fn branch_with_sparse_output_indices_is_rejected() {
    let mut ir = create_branch_workflow();
    // Shift the second edge to index 2, leaving index 1 uncovered.
    ir.edges[2].output_index = Some(2);
    let report = validate(&ir);
    assert!(!report.valid);
    assert!(report.errors.iter().any(|e| e.contains("output_index")));
}

#[test]
fn duplicate_step_names_are_rejected() {
    // Diamond fan-out where both middle steps carry the same display name.
    // Compiled nodes and connections are keyed by name, so this must not
    // reach the compiler.
    let mut left = StepSpec::new("a", "Same Name", StepType::Action, "n8n-nodes-base.noOp");
    left.description = Some("left path".to_string());
    let mut right = StepSpec::new("b", "Same Name", StepType::Action, "n8n-nodes-base.noOp");
    right.description = Some("right path".to_string());
    let join = StepSpec::new("m", "Join", StepType::Merge, "n8n-nodes-base.merge");

    let ir = WorkflowIR {
        id: Uuid::from_u128(3),
        name: "Fan Out".to_string(),
        description: "diamond".to_string(),
        trigger: webhook_trigger("incoming", "fanout"),
        steps: vec![left, right, join],
        edges: vec![
            EdgeSpec::new("incoming", "a"),
            EdgeSpec::new("incoming", "b"),
            EdgeSpec::new("a", "m"),
            EdgeSpec::new("b", "m"),
        ],
        error_strategy: ErrorStrategy::default(),
        test_invariants: vec![],
        metadata: Default::default(),
        tags: vec![],
    };

    let report = validate(&ir);
    assert!(!report.valid);
    assert!(
        report
            .errors
            .iter()
            .any(|e| e.contains("Duplicate step name 'Same Name'"))
    );
}

#[test]
fn branch_edges_with_condition_names_validate_cleanly() {
    let mut ir = create_branch_workflow();
    ir.edges[1].output_index = None;
    ir.edges[1].condition = Some("urgent".to_string());
    ir.edges[2].output_index = None;
    ir.edges[2].condition = Some("normal".to_string());

    let report = validate(&ir);
    assert!(report.valid, "unexpected errors: {:?}", report.errors);
}

#[test]
fn cycles_are_detected() {
    let mut ir = create_agent_workflow();
    ir.edges.push(EdgeSpec::new("respond", "summarize"));
    let report = validate(&ir);
    assert!(report.errors.iter().any(|e| e.contains("Cycle")));
}

#[test]
fn schedule_trigger_requires_its_config_keys() {
    let mut ir = create_agent_workflow();
    ir.trigger.trigger_type = Some(TriggerType::Schedule);
    ir.trigger.trigger_config = Some(serde_json::Map::new());
    let report = validate(&ir);
    let missing: Vec<&String> = report
        .errors
        .iter()
        .filter(|e| e.contains("Schedule trigger"))
        .collect();
    assert_eq!(missing.len(), 3, "mode, value, and unit must all be reported");
}

#[test]
fn validation_does_not_mutate_the_workflow() {
    let ir = create_agent_workflow();
    let before = serde_json::to_string(&ir).unwrap();
    let _ = validate(&ir);
    assert_eq!(serde_json::to_string(&ir).unwrap(), before);
}
