//! Local stub execution of a workflow.
//!
//! The simulator walks the graph from the trigger and applies per-step
//! stub semantics. It exists so the iteration loop can score workflows
//! without a reachable platform; it makes no attempt to reproduce real
//! n8n execution.

use serde_json::{Map, Value, json};
use tracing::debug;

use crate::ir::{BranchCondition, StepSpec, StepType, WorkflowIR};

/// Deterministic local workflow walker.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowSimulator;

impl WorkflowSimulator {
    pub fn new() -> Self {
        Self
    }

    /// Runs the workflow against the input and returns the final payload.
    ///
    /// BFS from the trigger; each visited step transforms the running
    /// payload according to its stub semantics.
    pub fn run(&self, ir: &WorkflowIR, input: &Value) -> Value {
        let mut payload = input.clone();

        let mut visited: Vec<&str> = vec![ir.trigger.id.as_str()];
        let mut queue: std::collections::VecDeque<&str> =
            ir.downstream(&ir.trigger.id).into_iter().collect();

        while let Some(step_id) = queue.pop_front() {
            if visited.contains(&step_id) {
                continue;
            }
            let Some(step) = ir.step(step_id) else {
                continue;
            };
            visited.push(step_id);

            payload = simulate_step(step, &payload);
            debug!(step = %step.id, "simulated step");

            for next in ir.downstream(step_id) {
                if !visited.contains(&next) {
                    queue.push_back(next);
                }
            }
        }

        payload
    }
}

fn simulate_step(step: &StepSpec, input: &Value) -> Value {
    match step.step_type {
        StepType::Agent => match &step.agent {
            Some(agent) => json!({
                "output": {
                    "simulated": true,
                    "agent_name": agent.name,
                    "input": input,
                },
            }),
            None => input.clone(),
        },
        StepType::Transform => {
            let mut map = as_object(input);
            map.insert("transformed".to_string(), Value::Bool(true));
            Value::Object(map)
        }
        StepType::Branch => {
            let branch = step
                .branch_conditions
                .as_deref()
                .and_then(|conditions| pick_branch(conditions, input))
                .unwrap_or_else(|| "default".to_string());
            let mut map = as_object(input);
            map.insert("branch_taken".to_string(), Value::String(branch));
            Value::Object(map)
        }
        StepType::Trigger | StepType::Action | StepType::Merge => input.clone(),
    }
}

/// First condition matching the input wins; `None` means the fallback
/// output.
fn pick_branch(conditions: &[BranchCondition], input: &Value) -> Option<String> {
    conditions.iter().enumerate().find_map(|(index, condition)| {
        let actual = input.get(&condition.field)?;
        let matches = match condition.operation.as_str() {
            "contains" => match (actual.as_str(), condition.value.as_str()) {
                (Some(actual), Some(expected)) => actual.contains(expected),
                _ => false,
            },
            // equals and anything unrecognized compare exactly
            _ => actual == &condition.value,
        };
        matches.then(|| {
            condition
                .output
                .clone()
                .unwrap_or_else(|| format!("output{index}"))
        })
    })
}

fn as_object(value: &Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.clone(),
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other.clone());
            map
        }
    }
}
