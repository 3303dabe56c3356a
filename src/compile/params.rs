//! Per-node parameter shaping.
//!
//! Planner-produced parameter maps are rarely in the exact shape n8n
//! expects. This module normalizes them node type by node type: filling
//! defaults, building switch rules from branch conditions, converting
//! flat Set values into the typed v1 format, and rewriting node
//! references that only resolve in the planner's head.

use serde_json::{Map, Value, json};

use crate::ir::{BranchCondition, StepSpec};

fn set_default(params: &mut Map<String, Value>, key: &str, value: Value) {
    params.entry(key.to_string()).or_insert(value);
}

/// Shapes the parameters of a non-agent step for its node type.
pub fn build_parameters(step: &StepSpec) -> Map<String, Value> {
    let mut params = step.parameters.clone();

    match step.platform_node_type.as_str() {
        "n8n-nodes-base.webhook" => {
            set_default(&mut params, "httpMethod", json!("POST"));
            let default_path = step
                .trigger_config
                .as_ref()
                .and_then(|c| c.get("path"))
                .cloned()
                .unwrap_or_else(|| json!(default_webhook_path(&step.id)));
            set_default(&mut params, "path", default_path);
            set_default(&mut params, "responseMode", json!("responseNode"));
            set_default(&mut params, "options", json!({}));
        }
        "n8n-nodes-base.switch" => {
            if let Some(conditions) = step.branch_conditions.as_deref() {
                params.insert("rules".to_string(), build_switch_rules(conditions));
            }
            set_default(&mut params, "mode", json!("rules"));
        }
        "n8n-nodes-base.if" => {
            if let Some(condition) = step.branch_conditions.as_deref().and_then(|c| c.first()) {
                params.insert("conditions".to_string(), build_if_conditions(condition));
            }
        }
        "n8n-nodes-base.respondToWebhook" => {
            set_default(&mut params, "respondWith", json!("json"));
            // Handles both agent envelopes (.output) and plain payloads.
            params.insert(
                "responseBody".to_string(),
                json!("={{ $json.output || $json }}"),
            );
        }
        "n8n-nodes-base.set" => {
            fix_set_params(&mut params);
        }
        "n8n-nodes-base.itemLists" => {
            set_default(&mut params, "operation", json!("splitOutItems"));
            set_default(&mut params, "include", json!("noOtherFields"));
            set_default(&mut params, "options", json!({}));
        }
        "n8n-nodes-base.aggregate" => {
            set_default(&mut params, "aggregate", json!("aggregateAllItemData"));
            set_default(&mut params, "destinationFieldName", json!("results"));
            set_default(&mut params, "options", json!({}));
        }
        "n8n-nodes-base.splitInBatches" => {
            set_default(&mut params, "batchSize", json!(10));
            set_default(&mut params, "options", json!({}));
        }
        "n8n-nodes-base.merge" => {
            set_default(&mut params, "mode", json!("combine"));
            set_default(&mut params, "combinationMode", json!("mergeByPosition"));
            set_default(&mut params, "options", json!({}));
        }
        "n8n-nodes-base.noOp" => {
            params = Map::new();
        }
        _ => {}
    }

    params
}

/// Deterministic webhook path derived from the step id.
pub fn default_webhook_path(step_id: &str) -> String {
    let prefix: String = step_id.chars().take(8).collect();
    format!("workflow-{prefix}")
}

/// Builds HTTP Request v4 parameters calling the agent runner.
///
/// The body is an n8n expression that JSON-stringifies the agent envelope
/// at execution time so the incoming payload flows through.
pub fn build_agent_parameters(step: &StepSpec, agent_runner_url: &str) -> Map<String, Value> {
    let (agent_name, task) = match &step.agent {
        Some(agent) => {
            let task = if agent.role.is_empty() {
                format!("Process data as {}", agent.name)
            } else {
                agent.role.clone()
            };
            (agent.name.clone(), task)
        }
        None => (step.name.clone(), step.description.clone().unwrap_or_else(|| step.name.clone())),
    };
    let task_escaped = task.replace('"', "\\\"");

    let body = format!(
        "={{{{ JSON.stringify({{\n  \"agent_name\": \"{agent_name}\",\n  \"input\": Object.assign({{}}, ($json.body || $json), {{ task: \"{task_escaped}\" }}),\n  \"context\": {{}},\n  \"tools_allowed\": [],\n  \"n8n_workflow_id\": $workflow.id,\n  \"node_id\": \"{step_id}\"\n}}) }}}}",
        step_id = step.id,
    );

    let mut params = Map::new();
    params.insert("method".to_string(), json!("POST"));
    params.insert(
        "url".to_string(),
        json!(format!("{agent_runner_url}/api/agent/run")),
    );
    params.insert("authentication".to_string(), json!("none"));
    params.insert("sendBody".to_string(), json!(true));
    params.insert("specifyBody".to_string(), json!("string"));
    params.insert("body".to_string(), Value::String(body));
    params.insert("contentType".to_string(), json!("raw"));
    params.insert("rawContentType".to_string(), json!("application/json"));
    // Agent runs are slow; give them two minutes.
    params.insert("options".to_string(), json!({ "timeout": 120_000 }));
    params
}

fn build_switch_rules(conditions: &[BranchCondition]) -> Value {
    let rules: Vec<Value> = conditions
        .iter()
        .enumerate()
        .map(|(i, condition)| {
            json!({
                "outputKey": condition
                    .output
                    .clone()
                    .unwrap_or_else(|| format!("output{i}")),
                "conditions": {
                    "options": {
                        "caseSensitive": true,
                        "leftValue": "",
                        "typeValidation": "loose",
                    },
                    "conditions": [
                        {
                            "leftValue": condition.field,
                            "rightValue": condition.value,
                            "operator": {
                                "type": "string",
                                "operation": condition.operation,
                            },
                        },
                    ],
                    "combinator": "and",
                },
            })
        })
        .collect();

    json!({
        "rules": rules,
        "fallbackOutput": "extra",
    })
}

fn build_if_conditions(condition: &BranchCondition) -> Value {
    json!({
        "options": {
            "caseSensitive": true,
            "leftValue": "",
            "typeValidation": "loose",
        },
        "conditions": [
            {
                "leftValue": condition.field,
                "rightValue": condition.value,
                "operator": {
                    "type": "string",
                    "operation": condition.operation,
                },
            },
        ],
        "combinator": "and",
    })
}

/// Normalizes Set node values to the typed v1 format.
///
/// Planners tend to emit a flat `{"field": "value"}` map; n8n v1 expects
/// `{"string": [{"name", "value"}]}`. Node references in values are
/// rewritten to `$json` along the way.
fn fix_set_params(params: &mut Map<String, Value>) {
    let Some(values) = params.get("values").cloned() else {
        return;
    };
    let Value::Object(values) = values else {
        return;
    };

    if let Some(Value::Array(entries)) = values.get("string") {
        // Already typed; just sanitize the references.
        let fixed: Vec<Value> = entries
            .iter()
            .map(|entry| {
                let mut entry = entry.clone();
                if let Value::Object(map) = &mut entry {
                    if let Some(Value::String(value)) = map.get("value") {
                        let rewritten = rewrite_node_references(value);
                        map.insert("value".to_string(), Value::String(rewritten));
                    }
                }
                entry
            })
            .collect();
        let mut typed = values.clone();
        typed.insert("string".to_string(), Value::Array(fixed));
        params.insert("values".to_string(), Value::Object(typed));
        return;
    }

    let mut string_values = Vec::new();
    for (key, value) in &values {
        if matches!(key.as_str(), "string" | "number" | "boolean") {
            continue;
        }
        let rendered = match value {
            Value::String(s) => rewrite_node_references(s),
            other => other.to_string(),
        };
        string_values.push(json!({ "name": key, "value": rendered }));
    }

    if !string_values.is_empty() {
        params.insert("values".to_string(), json!({ "string": string_values }));
        set_default(params, "options", json!({}));
    }
}

/// Rewrites `$('node')…` expressions to the equivalent `$json` reference.
///
/// Planners reference nodes by step id, but n8n resolves `$('…')` by node
/// name; `$json` (the previous node's output) is the reliable substitute.
/// Handles `.item.json.field`, `.item(0).json.field`, `.json.field`, and
/// bare references.
pub fn rewrite_node_references(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = String::with_capacity(value.len());
    let mut i = 0;

    while i < bytes.len() {
        if value[i..].starts_with("$('") || value[i..].starts_with("$(\"") {
            let quote = bytes[i + 2];
            // Find the closing quote + paren.
            let rest = &value[i + 3..];
            let close = rest
                .find(|c: char| c == quote as char)
                .filter(|pos| rest.as_bytes().get(pos + 1) == Some(&b')'));
            let Some(close) = close else {
                out.push(value[i..].chars().next().unwrap_or('$'));
                i += 1;
                continue;
            };
            let mut tail_start = i + 3 + close + 2;

            // Consume optional accessors: .item, .item(0), .json, .field
            let tail = &value[tail_start..];
            let mut consumed = 0;
            let mut field: Option<&str> = None;

            let mut remaining = tail;
            if let Some(stripped) = remaining.strip_prefix(".item") {
                let mut skipped = ".item".len();
                let mut after = stripped;
                if let Some(inner) = after.strip_prefix('(') {
                    if let Some(end) = inner.find(')') {
                        if inner[..end].bytes().all(|b| b.is_ascii_digit()) {
                            skipped += 1 + end + 1;
                            after = &inner[end + 1..];
                        }
                    }
                }
                remaining = after;
                consumed += skipped;
            }
            if let Some(stripped) = remaining.strip_prefix(".json") {
                remaining = stripped;
                consumed += ".json".len();
            }
            if let Some(stripped) = remaining.strip_prefix('.') {
                let end = stripped
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(stripped.len());
                if end > 0 && !stripped.as_bytes()[0].is_ascii_digit() {
                    field = Some(&stripped[..end]);
                    consumed += 1 + end;
                }
            }
            tail_start += consumed;

            match field {
                Some(field) => {
                    out.push_str("$json.");
                    out.push_str(field);
                }
                None => out.push_str("$json"),
            }
            i = tail_start;
        } else {
            let ch = value[i..].chars().next().unwrap_or('\0');
            out.push(ch);
            i += ch.len_utf8();
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{StepType, TriggerType};

    #[test]
    fn webhook_defaults_are_filled() {
        let mut step = StepSpec::new("hook-step", "Hook", StepType::Trigger, "n8n-nodes-base.webhook");
        step.trigger_type = Some(TriggerType::Webhook);
        let params = build_parameters(&step);
        assert_eq!(params["httpMethod"], json!("POST"));
        assert_eq!(params["path"], json!("workflow-hook-ste"));
        assert_eq!(params["responseMode"], json!("responseNode"));
    }

    #[test]
    fn webhook_path_from_trigger_config_wins() {
        let mut step = StepSpec::new("t", "Hook", StepType::Trigger, "n8n-nodes-base.webhook");
        let mut config = Map::new();
        config.insert("path".to_string(), json!("orders"));
        step.trigger_config = Some(config);
        let params = build_parameters(&step);
        assert_eq!(params["path"], json!("orders"));
    }

    #[test]
    fn switch_rules_built_from_branch_conditions() {
        let mut step = StepSpec::new("sw", "Route", StepType::Branch, "n8n-nodes-base.switch");
        step.branch_conditions = Some(vec![
            BranchCondition {
                output: Some("urgent".to_string()),
                field: "priority".to_string(),
                value: json!("high"),
                operation: "equals".to_string(),
            },
            BranchCondition {
                output: None,
                field: "priority".to_string(),
                value: json!("low"),
                operation: "equals".to_string(),
            },
        ]);
        let params = build_parameters(&step);
        let rules = &params["rules"]["rules"];
        assert_eq!(rules[0]["outputKey"], json!("urgent"));
        assert_eq!(rules[1]["outputKey"], json!("output1"));
        assert_eq!(params["rules"]["fallbackOutput"], json!("extra"));
    }

    #[test]
    fn set_node_flat_values_are_normalized() {
        let mut step = StepSpec::new("s", "Set", StepType::Transform, "n8n-nodes-base.set");
        step.parameters
            .insert("values".to_string(), json!({ "status": "done" }));
        let params = build_parameters(&step);
        assert_eq!(
            params["values"]["string"][0],
            json!({ "name": "status", "value": "done" })
        );
    }

    #[test]
    fn rewrites_node_references_to_json() {
        assert_eq!(
            rewrite_node_references("={{ $('analyze').item.json.score }}"),
            "={{ $json.score }}"
        );
        assert_eq!(
            rewrite_node_references("={{ $('fetch').json.body }}"),
            "={{ $json.body }}"
        );
        assert_eq!(rewrite_node_references("={{ $('fetch') }}"), "={{ $json }}");
        assert_eq!(
            rewrite_node_references("={{ $('a').item(0).json.x }}"),
            "={{ $json.x }}"
        );
        assert_eq!(rewrite_node_references("plain text"), "plain text");
    }

    #[test]
    fn agent_parameters_target_the_runner() {
        let mut step = StepSpec::new("ag", "Summarize", StepType::Agent, "n8n-nodes-base.httpRequest");
        step.agent = Some(crate::ir::AgentSpec {
            name: "summarizer".to_string(),
            role: "Summarize the ticket".to_string(),
            system_prompt: None,
            tools_allowed: vec![],
            max_tokens: 2048,
            temperature: 0.7,
        });
        let params = build_agent_parameters(&step, "https://runner.example.com");
        assert_eq!(
            params["url"],
            json!("https://runner.example.com/api/agent/run")
        );
        assert_eq!(params["options"]["timeout"], json!(120_000));
        let body = params["body"].as_str().unwrap();
        assert!(body.contains("\"agent_name\": \"summarizer\""));
        assert!(body.contains("\"node_id\": \"ag\""));
    }
}
