//! Common test utilities for building workflow IRs.
use kousei::prelude::*;
use serde_json::json;
use uuid::Uuid;

/// Creates a webhook trigger step with a configured path and method.
#[allow(dead_code)]
pub fn webhook_trigger(id: &str, path: &str) -> StepSpec {
    let mut trigger = StepSpec::new(id, "Incoming Webhook", StepType::Trigger, "n8n-nodes-base.webhook");
    trigger.trigger_type = Some(TriggerType::Webhook);
    trigger.description = Some("Receives the incoming request".to_string());
    let mut config = serde_json::Map::new();
    config.insert("path".to_string(), json!(path));
    config.insert("httpMethod".to_string(), json!("POST"));
    trigger.trigger_config = Some(config);
    trigger
}

/// Creates a simple, valid three-node workflow:
/// webhook trigger -> agent step -> respond-to-webhook.
#[allow(dead_code)]
pub fn create_agent_workflow() -> WorkflowIR {
    let mut agent = StepSpec::new(
        "summarize",
        "Summarize Ticket",
        StepType::Agent,
        "n8n-nodes-base.httpRequest",
    );
    agent.description = Some("Summarizes the ticket with the support agent".to_string());
    agent.agent = Some(AgentSpec {
        name: "ticket_summarizer".to_string(),
        role: "Summarize the support ticket in two sentences".to_string(),
        system_prompt: None,
        tools_allowed: vec![],
        max_tokens: 2048,
        temperature: 0.7,
    });

    let mut respond = StepSpec::new(
        "respond",
        "Send Response",
        StepType::Action,
        "n8n-nodes-base.respondToWebhook",
    );
    respond.description = Some("Returns the summary to the caller".to_string());

    WorkflowIR {
        id: Uuid::from_u128(1),
        name: "Ticket Summarizer".to_string(),
        description: "Summarizes incoming support tickets".to_string(),
        trigger: webhook_trigger("incoming", "tickets"),
        steps: vec![agent, respond],
        edges: vec![
            EdgeSpec::new("incoming", "summarize"),
            EdgeSpec::new("summarize", "respond"),
        ],
        error_strategy: ErrorStrategy::default(),
        test_invariants: vec![TestInvariant {
            name: "produces_output".to_string(),
            description: "Every run must produce some output".to_string(),
            check: InvariantCheck::ExecutionSuccess,
        }],
        metadata: Default::default(),
        tags: vec!["support".to_string()],
    }
}

/// Creates a workflow with a two-way branch:
/// webhook trigger -> switch -> (urgent | normal) responders.
#[allow(dead_code)]
pub fn create_branch_workflow() -> WorkflowIR {
    let mut branch = StepSpec::new(
        "route",
        "Route By Priority",
        StepType::Branch,
        "n8n-nodes-base.switch",
    );
    branch.description = Some("Routes tickets by priority".to_string());
    branch.branch_conditions = Some(vec![
        BranchCondition {
            output: Some("urgent".to_string()),
            field: "priority".to_string(),
            value: json!("high"),
            operation: "equals".to_string(),
        },
        BranchCondition {
            output: Some("normal".to_string()),
            field: "priority".to_string(),
            value: json!("low"),
            operation: "equals".to_string(),
        },
    ]);

    let mut urgent = StepSpec::new("urgent", "Escalate", StepType::Action, "n8n-nodes-base.noOp");
    urgent.description = Some("Escalates urgent tickets".to_string());
    let mut normal = StepSpec::new("normal", "Queue", StepType::Action, "n8n-nodes-base.noOp");
    normal.description = Some("Queues normal tickets".to_string());

    let mut urgent_edge = EdgeSpec::new("route", "urgent");
    urgent_edge.output_index = Some(0);
    let mut normal_edge = EdgeSpec::new("route", "normal");
    normal_edge.output_index = Some(1);

    WorkflowIR {
        id: Uuid::from_u128(2),
        name: "Priority Router".to_string(),
        description: "Routes tickets by priority".to_string(),
        trigger: webhook_trigger("incoming", "route"),
        steps: vec![branch, urgent, normal],
        edges: vec![EdgeSpec::new("incoming", "route"), urgent_edge, normal_edge],
        error_strategy: ErrorStrategy::default(),
        test_invariants: vec![],
        metadata: Default::default(),
        tags: vec![],
    }
}
