//! Compilation of a [`WorkflowIR`] into n8n workflow JSON.
//!
//! The compiler is deterministic: the same IR always produces
//! byte-identical JSON. Node ids come from a sequential namespace, node
//! order follows a BFS from the trigger, and no timestamps or random ids
//! enter the output. This is what makes iteration diffs meaningful.

pub mod catalog;
pub mod params;

pub use catalog::{NodeCatalog, NodeDefinition, NodeParameter};

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::CompileError;
use crate::ir::{StepSpec, StepType, WorkflowIR};

const DEFAULT_AGENT_RUNNER_URL: &str = "https://agent-runner.invalid";

/// One node of a compiled n8n workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct N8nNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(rename = "typeVersion")]
    pub type_version: u32,
    pub position: [i64; 2],
    pub parameters: Map<String, Value>,
    #[serde(rename = "webhookId", default, skip_serializing_if = "Option::is_none")]
    pub webhook_id: Option<String>,
}

/// A compiled n8n workflow, ready to push to the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct N8nWorkflow {
    pub name: String,
    pub nodes: Vec<N8nNode>,
    /// Source node name -> `{"main": [[entries per output index]]}`.
    pub connections: Map<String, Value>,
    pub settings: Map<String, Value>,
}

impl N8nWorkflow {
    /// The webhook path of the trigger node, when there is one.
    pub fn webhook_path(&self) -> Option<&str> {
        self.nodes
            .iter()
            .find(|n| n.node_type == "n8n-nodes-base.webhook")
            .and_then(|n| n.parameters.get("path"))
            .and_then(Value::as_str)
    }

    /// The HTTP method of the webhook trigger; `POST` when unspecified.
    pub fn webhook_method(&self) -> &str {
        self.nodes
            .iter()
            .find(|n| n.node_type == "n8n-nodes-base.webhook")
            .and_then(|n| n.parameters.get("httpMethod"))
            .and_then(Value::as_str)
            .unwrap_or("POST")
    }
}

/// Builder for [`N8nCompiler`].
#[derive(Debug, Default)]
pub struct N8nCompilerBuilder {
    catalog: Option<NodeCatalog>,
    extra_definitions: Vec<NodeDefinition>,
    agent_runner_url: Option<String>,
}

impl N8nCompilerBuilder {
    /// Replaces the default core-node catalog.
    pub fn with_catalog(mut self, catalog: NodeCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Registers one additional node definition.
    pub fn with_node_definition(mut self, definition: NodeDefinition) -> Self {
        self.extra_definitions.push(definition);
        self
    }

    /// Sets the agent-runner base URL used for agent steps.
    pub fn with_agent_runner_url(mut self, url: impl Into<String>) -> Self {
        self.agent_runner_url = Some(url.into());
        self
    }

    pub fn build(self) -> N8nCompiler {
        let mut catalog = self.catalog.unwrap_or_default();
        for definition in self.extra_definitions {
            catalog.register(definition);
        }
        N8nCompiler {
            catalog,
            agent_runner_url: self
                .agent_runner_url
                .unwrap_or_else(|| DEFAULT_AGENT_RUNNER_URL.to_string()),
        }
    }
}

/// Compiles workflow IRs into n8n workflow JSON.
#[derive(Debug, Clone)]
pub struct N8nCompiler {
    catalog: NodeCatalog,
    agent_runner_url: String,
}

impl Default for N8nCompiler {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl N8nCompiler {
    pub fn builder() -> N8nCompilerBuilder {
        N8nCompilerBuilder::default()
    }

    /// Compiles the IR into an [`N8nWorkflow`].
    ///
    /// Pure in `ir`: identical input yields byte-identical serialized
    /// output.
    pub fn compile(&self, ir: &WorkflowIR) -> Result<N8nWorkflow, CompileError> {
        info!(workflow = %ir.name, "compile start");

        let ordered = self.ordered_steps(ir);

        let mut nodes = Vec::with_capacity(ordered.len());
        for (index, step) in ordered.iter().enumerate() {
            nodes.push(self.compile_step(step, index)?);
        }

        let connections = self.compile_connections(ir, &ordered)?;

        let mut settings = Map::new();
        settings.insert("executionOrder".to_string(), Value::String("v1".to_string()));
        settings.insert("saveManualExecutions".to_string(), Value::Bool(true));
        settings.insert(
            "callerPolicy".to_string(),
            Value::String("workflowsFromSameOwner".to_string()),
        );

        info!(
            workflow = %ir.name,
            nodes = nodes.len(),
            sources = connections.len(),
            "compile complete"
        );

        Ok(N8nWorkflow {
            name: ir.name.clone(),
            nodes,
            connections,
            settings,
        })
    }

    /// Steps in BFS order from the trigger; unreachable steps append in
    /// declaration order.
    fn ordered_steps<'a>(&self, ir: &'a WorkflowIR) -> Vec<&'a StepSpec> {
        let mut ordered: Vec<&StepSpec> = vec![&ir.trigger];
        let mut visited: AHashMap<&str, ()> = AHashMap::new();
        visited.insert(ir.trigger.id.as_str(), ());

        let mut queue = std::collections::VecDeque::new();
        queue.push_back(ir.trigger.id.as_str());
        while let Some(current) = queue.pop_front() {
            for next in ir.downstream(current) {
                if visited.contains_key(next) {
                    continue;
                }
                if let Some(step) = ir.step(next) {
                    visited.insert(next, ());
                    ordered.push(step);
                    queue.push_back(next);
                }
            }
        }

        for step in &ir.steps {
            if !visited.contains_key(step.id.as_str()) {
                ordered.push(step);
            }
        }
        ordered
    }

    fn compile_step(&self, step: &StepSpec, index: usize) -> Result<N8nNode, CompileError> {
        let definition = self.catalog.get(&step.platform_node_type).ok_or_else(|| {
            CompileError::UnknownNodeType {
                step_id: step.id.clone(),
                node_type: step.platform_node_type.clone(),
            }
        })?;

        let (node_type, type_version, parameters) =
            if step.step_type == StepType::Agent && step.agent.is_some() {
                debug!(step = %step.id, "compiling agent step to runner call");
                (
                    "n8n-nodes-base.httpRequest".to_string(),
                    4,
                    params::build_agent_parameters(step, &self.agent_runner_url),
                )
            } else {
                (
                    step.platform_node_type.clone(),
                    step.platform_type_version.max(1),
                    params::build_parameters(step),
                )
            };

        // Catalog-required parameters must be present once defaults are in.
        if node_type == step.platform_node_type {
            for required in definition.parameters.iter().filter(|p| p.required) {
                if !parameters.contains_key(&required.name) {
                    return Err(CompileError::MissingParameter {
                        step_id: step.id.clone(),
                        parameter: required.name.clone(),
                        node_type: node_type.clone(),
                    });
                }
            }
        }

        let webhook_id = (step.platform_node_type == "n8n-nodes-base.webhook")
            .then(|| derive_webhook_id(&step.id));

        Ok(N8nNode {
            id: format!("node-{index:04}"),
            name: step.name.clone(),
            node_type,
            type_version,
            position: [step.position.x, step.position.y],
            parameters,
            webhook_id,
        })
    }

    fn compile_connections(
        &self,
        ir: &WorkflowIR,
        ordered: &[&StepSpec],
    ) -> Result<Map<String, Value>, CompileError> {
        let mut connections = Map::new();

        for source in ordered {
            let edges: Vec<_> = ir.edges.iter().filter(|e| e.from_step == source.id).collect();
            if edges.is_empty() {
                continue;
            }

            let mut by_index: AHashMap<u32, Vec<Value>> = AHashMap::new();
            for edge in &edges {
                let Some(target) = ir.step(&edge.to_step) else {
                    continue;
                };
                let output_index = match (edge.output_index, &edge.condition) {
                    (Some(index), _) => index,
                    (None, Some(condition)) => {
                        branch_output_index(source, condition).ok_or_else(|| {
                            CompileError::InvalidBranch {
                                step_id: source.id.clone(),
                                reason: format!(
                                    "edge condition '{condition}' matches no branch condition"
                                ),
                            }
                        })?
                    }
                    (None, None) => 0,
                };
                by_index.entry(output_index).or_default().push(serde_json::json!({
                    "node": target.name,
                    "type": edge.target_input,
                    "index": 0,
                }));
            }

            let max_index = by_index.keys().copied().max().unwrap_or(0);
            let main: Vec<Value> = (0..=max_index)
                .map(|i| Value::Array(by_index.remove(&i).unwrap_or_default()))
                .collect();

            connections.insert(
                source.name.clone(),
                serde_json::json!({ "main": main }),
            );
        }

        Ok(connections)
    }

    /// Sanity pass over a compiled workflow. Returns findings, empty when
    /// clean.
    pub fn validate_compiled(&self, workflow: &N8nWorkflow) -> Vec<String> {
        let mut findings = Vec::new();

        if workflow.name.is_empty() {
            findings.push("Workflow name is empty".to_string());
        }
        if workflow.nodes.is_empty() {
            findings.push("Workflow has no nodes".to_string());
        }

        let mut names = std::collections::HashSet::new();
        for node in &workflow.nodes {
            if !names.insert(node.name.as_str()) {
                findings.push(format!("Duplicate node name: {}", node.name));
            }
        }

        for (source, outputs) in &workflow.connections {
            if !names.contains(source.as_str()) {
                findings.push(format!("Connection source not found: {source}"));
            }
            let bundles = outputs
                .get("main")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            for bundle in bundles {
                let entries = bundle.as_array().map(Vec::as_slice).unwrap_or_default();
                for entry in entries {
                    let target = entry.get("node").and_then(Value::as_str).unwrap_or("");
                    if !names.contains(target) {
                        findings.push(format!("Connection target not found: {target}"));
                    }
                }
            }
        }

        findings
    }
}

/// Maps an edge condition name to the output index of the matching branch
/// condition (by output name, then by value).
fn branch_output_index(step: &StepSpec, condition: &str) -> Option<u32> {
    let conditions = step.branch_conditions.as_deref()?;
    conditions
        .iter()
        .position(|c| {
            c.output.as_deref() == Some(condition)
                || c.value.as_str() == Some(condition)
        })
        .map(|i| i as u32)
}

/// Deterministic webhook id derived from the step id: stable across
/// recompiles, unique per step. Fixed seeds keep the hash reproducible.
fn derive_webhook_id(step_id: &str) -> String {
    use std::hash::BuildHasher;
    let state = ahash::RandomState::with_seeds(0x6b6f, 0x7573, 0x6569, 0x3031);
    format!("{:016x}", state.hash_one(step_id))
}
