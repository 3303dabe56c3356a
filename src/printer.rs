//! Text rendering of compiled workflows.
//!
//! Used by the CLI to show what a compiled workflow looks like without
//! opening the n8n editor.

use std::fmt::Write;

use serde_json::Value;

use crate::compile::N8nWorkflow;

const RULE: &str = "------------------------------------------------------------";

/// Renders compiled workflows as sectioned plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowPrinter {
    /// Include node parameters in the output.
    pub include_params: bool,
}

impl WorkflowPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(mut self) -> Self {
        self.include_params = true;
        self
    }

    /// Formats the workflow as human-readable text.
    pub fn format(&self, workflow: &N8nWorkflow) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "{}", "=".repeat(60));
        let _ = writeln!(out, "  WORKFLOW: {}", workflow.name);
        let _ = writeln!(out, "{}", "=".repeat(60));
        let _ = writeln!(out);

        let _ = writeln!(out, "  NODES:");
        let _ = writeln!(out, "  {RULE}");
        for (i, node) in workflow.nodes.iter().enumerate() {
            let short_type = node
                .node_type
                .strip_prefix("n8n-nodes-base.")
                .unwrap_or(&node.node_type);
            let _ = writeln!(out, "  [{}] {}", i + 1, node.name);
            let _ = writeln!(out, "      Type: {short_type} (v{})", node.type_version);
            let _ = writeln!(
                out,
                "      Position: ({}, {})",
                node.position[0], node.position[1]
            );
            if self.include_params && !node.parameters.is_empty() {
                let _ = writeln!(out, "      Parameters:");
                for (key, value) in &node.parameters {
                    let _ = writeln!(out, "        - {key}: {}", render_param(value));
                }
            }
            let _ = writeln!(out);
        }

        let _ = writeln!(out, "  FLOW:");
        let _ = writeln!(out, "  {RULE}");
        if workflow.connections.is_empty() {
            let _ = writeln!(out, "  (no connections)");
        } else {
            for (source, outputs) in &workflow.connections {
                let bundles = outputs
                    .get("main")
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                for (output_index, bundle) in bundles.iter().enumerate() {
                    let entries = bundle.as_array().map(Vec::as_slice).unwrap_or_default();
                    for entry in entries {
                        let target = entry.get("node").and_then(Value::as_str).unwrap_or("?");
                        if bundles.len() > 1 {
                            let _ = writeln!(out, "  {source} -[{output_index}]-> {target}");
                        } else {
                            let _ = writeln!(out, "  {source} -> {target}");
                        }
                    }
                }
            }
        }
        let _ = writeln!(out);

        if let Some(path) = workflow.webhook_path() {
            let _ = writeln!(out, "  WEBHOOK:");
            let _ = writeln!(out, "  {RULE}");
            let _ = writeln!(out, "  Method: {}", workflow.webhook_method());
            let _ = writeln!(out, "  Path: /{path}");
            let _ = writeln!(out);
        }

        let _ = writeln!(out, "{}", "=".repeat(60));
        out
    }
}

fn render_param(value: &Value) -> String {
    let rendered = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if rendered.chars().count() > 60 {
        let head: String = rendered.chars().take(57).collect();
        format!("{head}...")
    } else {
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::N8nCompiler;
    use crate::ir::{EdgeSpec, StepSpec, StepType, TriggerType, WorkflowIR};
    use serde_json::json;

    fn compiled() -> N8nWorkflow {
        let mut trigger =
            StepSpec::new("t", "Webhook In", StepType::Trigger, "n8n-nodes-base.webhook");
        trigger.trigger_type = Some(TriggerType::Webhook);
        let mut config = serde_json::Map::new();
        config.insert("path".to_string(), json!("orders"));
        config.insert("httpMethod".to_string(), json!("POST"));
        trigger.trigger_config = Some(config);

        let ir = WorkflowIR {
            id: uuid::Uuid::nil(),
            name: "print me".to_string(),
            description: String::new(),
            trigger,
            steps: vec![StepSpec::new("a", "Reply", StepType::Action, "n8n-nodes-base.respondToWebhook")],
            edges: vec![EdgeSpec::new("t", "a")],
            error_strategy: Default::default(),
            test_invariants: vec![],
            metadata: Default::default(),
            tags: vec![],
        };
        N8nCompiler::default().compile(&ir).unwrap()
    }

    #[test]
    fn rendering_includes_all_sections() {
        let text = WorkflowPrinter::new().format(&compiled());
        assert!(text.contains("WORKFLOW: print me"));
        assert!(text.contains("NODES:"));
        assert!(text.contains("Webhook In -> Reply"));
        assert!(text.contains("Path: /orders"));
    }

    #[test]
    fn parameters_are_hidden_by_default() {
        let workflow = compiled();
        let plain = WorkflowPrinter::new().format(&workflow);
        let detailed = WorkflowPrinter::new().with_params().format(&workflow);
        assert!(!plain.contains("Parameters:"));
        assert!(detailed.contains("Parameters:"));
    }
}
