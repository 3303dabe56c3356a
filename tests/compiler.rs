//! Tests for IR-to-n8n compilation.
mod common;
use common::*;
use kousei::prelude::*;
use serde_json::json;

#[test]
fn compiles_three_node_workflow_with_two_connections() {
    let ir = create_agent_workflow();
    let compiler = N8nCompiler::builder()
        .with_agent_runner_url("https://runner.example.com")
        .build();
    let compiled = compiler.compile(&ir).expect("Failed to compile");

    assert_eq!(compiled.nodes.len(), 3);
    assert_eq!(compiled.connections.len(), 2);
    assert_eq!(compiled.settings["executionOrder"], json!("v1"));
    assert_eq!(compiled.settings["saveManualExecutions"], json!(true));
    assert_eq!(
        compiled.settings["callerPolicy"],
        json!("workflowsFromSameOwner")
    );

    // Trigger compiles first; its connection targets the agent by name.
    assert_eq!(compiled.nodes[0].name, "Incoming Webhook");
    let trigger_targets = &compiled.connections["Incoming Webhook"]["main"][0];
    assert_eq!(trigger_targets[0]["node"], json!("Summarize Ticket"));
    assert_eq!(trigger_targets[0]["type"], json!("main"));
    assert_eq!(trigger_targets[0]["index"], json!(0));
}

#[test]
fn node_ids_are_sequential_and_deterministic() {
    let ir = create_agent_workflow();
    let compiler = N8nCompiler::default();
    let compiled = compiler.compile(&ir).expect("Failed to compile");

    let ids: Vec<&str> = compiled.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["node-0000", "node-0001", "node-0002"]);
}

#[test]
fn recompiling_identical_ir_yields_byte_identical_json() {
    let ir = create_agent_workflow();
    let compiler = N8nCompiler::default();

    let first = serde_json::to_string(&compiler.compile(&ir).unwrap()).unwrap();
    let second = serde_json::to_string(&compiler.compile(&ir).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn unknown_node_type_is_a_compile_error() {
    let mut ir = create_agent_workflow();
    ir.steps[1].platform_node_type = "n8n-nodes-base.doesNotExist".to_string();
    let result = N8nCompiler::default().compile(&ir);

    match result {
        Err(CompileError::UnknownNodeType { step_id, node_type }) => {
            assert_eq!(step_id, "respond");
            assert_eq!(node_type, "n8n-nodes-base.doesNotExist");
        }
        other => panic!("expected UnknownNodeType, got {:?}", other),
    }
}

#[test]
fn agent_steps_compile_to_http_request_v4() {
    let ir = create_agent_workflow();
    let compiler = N8nCompiler::builder()
        .with_agent_runner_url("https://runner.example.com")
        .build();
    let compiled = compiler.compile(&ir).unwrap();

    let agent_node = compiled
        .nodes
        .iter()
        .find(|n| n.name == "Summarize Ticket")
        .unwrap();
    assert_eq!(agent_node.node_type, "n8n-nodes-base.httpRequest");
    assert_eq!(agent_node.type_version, 4);
    assert_eq!(
        agent_node.parameters["url"],
        json!("https://runner.example.com/api/agent/run")
    );
    assert_eq!(agent_node.parameters["options"]["timeout"], json!(120_000));
}

#[test]
fn webhook_trigger_gets_path_and_stable_webhook_id() {
    let ir = create_agent_workflow();
    let compiler = N8nCompiler::default();
    let compiled = compiler.compile(&ir).unwrap();

    assert_eq!(compiled.webhook_path(), Some("tickets"));
    assert_eq!(compiled.webhook_method(), "POST");

    let webhook_id = compiled.nodes[0].webhook_id.clone().unwrap();
    let recompiled = compiler.compile(&ir).unwrap();
    assert_eq!(recompiled.nodes[0].webhook_id.as_deref(), Some(webhook_id.as_str()));
}

#[test]
fn branch_workflow_compiles_switch_rules_and_indexed_bundles() {
    let ir = create_branch_workflow();
    let compiled = N8nCompiler::default().compile(&ir).unwrap();

    let switch = compiled
        .nodes
        .iter()
        .find(|n| n.name == "Route By Priority")
        .unwrap();
    let rules = &switch.parameters["rules"]["rules"];
    assert_eq!(rules.as_array().unwrap().len(), 2);
    assert_eq!(rules[0]["outputKey"], json!("urgent"));

    let bundles = compiled.connections["Route By Priority"]["main"]
        .as_array()
        .unwrap();
    assert_eq!(bundles.len(), 2);
    assert_eq!(bundles[0][0]["node"], json!("Escalate"));
    assert_eq!(bundles[1][0]["node"], json!("Queue"));
}

#[test]
fn edge_condition_names_resolve_to_output_indices() {
    let mut ir = create_branch_workflow();
    // Use condition names instead of explicit indices.
    ir.edges[1].output_index = None;
    ir.edges[1].condition = Some("urgent".to_string());
    ir.edges[2].output_index = None;
    ir.edges[2].condition = Some("normal".to_string());

    let compiled = N8nCompiler::default().compile(&ir).unwrap();
    let bundles = compiled.connections["Route By Priority"]["main"]
        .as_array()
        .unwrap();
    assert_eq!(bundles[0][0]["node"], json!("Escalate"));
    assert_eq!(bundles[1][0]["node"], json!("Queue"));
}

#[test]
fn unknown_edge_condition_is_an_invalid_branch_error() {
    let mut ir = create_branch_workflow();
    ir.edges[1].output_index = None;
    ir.edges[1].condition = Some("nonexistent".to_string());

    let result = N8nCompiler::default().compile(&ir);
    assert!(matches!(result, Err(CompileError::InvalidBranch { .. })));
}

#[test]
fn validate_compiled_flags_duplicate_names() {
    let mut ir = create_agent_workflow();
    ir.steps[0].name = "Same Name".to_string();
    ir.steps[1].name = "Same Name".to_string();
    let compiler = N8nCompiler::default();
    let compiled = compiler.compile(&ir).unwrap();

    let findings = compiler.validate_compiled(&compiled);
    assert!(findings.iter().any(|f| f.contains("Duplicate node name")));
}

#[test]
fn clean_compile_passes_the_sanity_check() {
    let compiler = N8nCompiler::default();
    let compiled = compiler.compile(&create_branch_workflow()).unwrap();
    assert!(compiler.validate_compiled(&compiled).is_empty());
}
