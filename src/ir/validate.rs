//! Static validation of a [`WorkflowIR`].
//!
//! Validation is a reporting pass, not a constructor guard: it collects
//! every violation it can find so a synthesis loop can address all of them
//! in one round instead of discovering them one at a time.

use ahash::{AHashMap, AHashSet};

use crate::ir::{BranchCondition, StepType, TriggerType, WorkflowIR};

/// Outcome of validating a workflow IR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Validates a workflow IR, collecting all violations.
///
/// Checks run in a fixed order: trigger shape, id/edge integrity, cycles
/// and rootedness, branch arity, merge arity, then supplementary step
/// checks. The cycle walk is skipped when edge endpoints failed to
/// resolve.
pub fn validate(ir: &WorkflowIR) -> ValidationReport {
    let mut errors = Vec::new();

    check_trigger(ir, &mut errors);
    let endpoints_ok = check_ids_and_edges(ir, &mut errors);
    if endpoints_ok {
        check_graph(ir, &mut errors);
    }
    check_branches(ir, &mut errors);
    check_merges(ir, &mut errors);
    check_steps(ir, &mut errors);

    ValidationReport::from_errors(errors)
}

fn check_trigger(ir: &WorkflowIR, errors: &mut Vec<String>) {
    let trigger = &ir.trigger;

    if trigger.step_type != StepType::Trigger {
        errors.push(format!(
            "Trigger step '{}' must have type 'trigger', found '{:?}'",
            trigger.id, trigger.step_type
        ));
    }

    match trigger.trigger_type {
        None => errors.push(format!(
            "Trigger step '{}' has no trigger_type",
            trigger.id
        )),
        Some(TriggerType::Webhook) => {
            for key in ["path", "httpMethod"] {
                let present = trigger
                    .trigger_config
                    .as_ref()
                    .is_some_and(|c| c.contains_key(key));
                if !present {
                    errors.push(format!(
                        "Webhook trigger '{}' is missing '{key}' in trigger_config",
                        trigger.id
                    ));
                }
            }
        }
        Some(TriggerType::Schedule) => {
            for key in ["mode", "value", "unit"] {
                let present = trigger
                    .trigger_config
                    .as_ref()
                    .is_some_and(|c| c.contains_key(key));
                if !present {
                    errors.push(format!(
                        "Schedule trigger '{}' is missing '{key}' in trigger_config",
                        trigger.id
                    ));
                }
            }
        }
        Some(TriggerType::Manual) => {}
    }

    for step in &ir.steps {
        if step.step_type == StepType::Trigger {
            errors.push(format!(
                "Step '{}' has type 'trigger' but only the trigger field may be a trigger",
                step.id
            ));
        }
    }
}

/// Returns `true` when every edge endpoint resolved, so the graph walk is
/// safe to run.
fn check_ids_and_edges(ir: &WorkflowIR, errors: &mut Vec<String>) -> bool {
    let mut seen = AHashSet::new();
    for id in ir.all_step_ids() {
        if !seen.insert(id) {
            errors.push(format!("Duplicate step id '{id}'"));
        }
    }

    // Compiled nodes and connections are keyed by name, so names must be
    // unique too.
    let mut names = AHashSet::new();
    for step in std::iter::once(&ir.trigger).chain(ir.steps.iter()) {
        if !names.insert(step.name.as_str()) {
            errors.push(format!("Duplicate step name '{}'", step.name));
        }
    }

    let mut endpoints_ok = true;
    for edge in &ir.edges {
        if !seen.contains(edge.from_step.as_str()) {
            errors.push(format!(
                "Edge '{}' -> '{}' references unknown source step '{}'",
                edge.from_step, edge.to_step, edge.from_step
            ));
            endpoints_ok = false;
        }
        if !seen.contains(edge.to_step.as_str()) {
            errors.push(format!(
                "Edge '{}' -> '{}' references unknown target step '{}'",
                edge.from_step, edge.to_step, edge.to_step
            ));
            endpoints_ok = false;
        }
        if edge.from_step == edge.to_step {
            errors.push(format!(
                "Edge '{}' -> '{}' is a self-loop",
                edge.from_step, edge.to_step
            ));
        }
    }
    endpoints_ok
}

fn check_graph(ir: &WorkflowIR, errors: &mut Vec<String>) {
    for edge in &ir.edges {
        if edge.to_step == ir.trigger.id {
            errors.push(format!(
                "Edge '{}' -> '{}' targets the trigger; the trigger must be the only root",
                edge.from_step, edge.to_step
            ));
        }
    }

    // Iterative DFS with a grey set for back-edge detection.
    let mut colors: AHashMap<&str, u8> = AHashMap::new(); // 1 = on stack, 2 = done
    let mut stack: Vec<(&str, usize)> = vec![(ir.trigger.id.as_str(), 0)];
    colors.insert(ir.trigger.id.as_str(), 1);

    while let Some((node, next_child)) = stack.pop() {
        let children: Vec<&str> = ir.downstream(node);
        if next_child < children.len() {
            stack.push((node, next_child + 1));
            let child = children[next_child];
            match colors.get(child) {
                Some(1) => errors.push(format!(
                    "Cycle detected through edge '{node}' -> '{child}'"
                )),
                Some(2) => {}
                _ => {
                    colors.insert(child, 1);
                    stack.push((child, 0));
                }
            }
        } else {
            colors.insert(node, 2);
        }
    }
}

fn check_branches(ir: &WorkflowIR, errors: &mut Vec<String>) {
    for step in &ir.steps {
        if step.step_type != StepType::Branch {
            continue;
        }
        let conditions = step.branch_conditions.as_deref().unwrap_or_default();
        if conditions.len() < 2 {
            errors.push(format!(
                "Branch step '{}' must declare at least 2 branch_conditions, found {}",
                step.id,
                conditions.len()
            ));
            continue;
        }

        let mut indices: Vec<u32> = ir
            .edges
            .iter()
            .filter(|e| e.from_step == step.id)
            .filter_map(|e| {
                e.output_index.or_else(|| {
                    e.condition
                        .as_deref()
                        .and_then(|name| condition_output_index(conditions, name))
                })
            })
            .collect();
        indices.sort_unstable();
        indices.dedup();

        let expected: Vec<u32> = (0..conditions.len() as u32).collect();
        if indices != expected {
            errors.push(format!(
                "Branch step '{}' outgoing output_index values must cover 0..{} exactly, found {:?}",
                step.id,
                conditions.len() - 1,
                indices
            ));
        }
    }
}

/// Output index of the branch condition an edge's `condition` name refers
/// to, matched by output name first, then by value.
fn condition_output_index(conditions: &[BranchCondition], name: &str) -> Option<u32> {
    conditions
        .iter()
        .position(|c| c.output.as_deref() == Some(name) || c.value.as_str() == Some(name))
        .map(|i| i as u32)
}

fn check_merges(ir: &WorkflowIR, errors: &mut Vec<String>) {
    for step in &ir.steps {
        if step.step_type != StepType::Merge {
            continue;
        }
        let incoming: AHashSet<&str> = ir.upstream(&step.id).into_iter().collect();
        if incoming.len() < 2 {
            errors.push(format!(
                "Merge step '{}' must have at least 2 distinct incoming edges, found {}",
                step.id,
                incoming.len()
            ));
        }
    }
}

fn check_steps(ir: &WorkflowIR, errors: &mut Vec<String>) {
    for step in std::iter::once(&ir.trigger).chain(ir.steps.iter()) {
        if step.platform_node_type.trim().is_empty() {
            errors.push(format!(
                "Step '{}' has an empty platform_node_type",
                step.id
            ));
        }
        if step.step_type == StepType::Agent && step.agent.is_none() {
            errors.push(format!(
                "Agent step '{}' is missing its agent specification",
                step.id
            ));
        }
    }

    // Reachability from the trigger; only meaningful when endpoints resolve,
    // but unresolved endpoints simply leave targets unreached here.
    let mut reached: AHashSet<&str> = AHashSet::new();
    reached.insert(ir.trigger.id.as_str());
    let mut frontier = vec![ir.trigger.id.as_str()];
    while let Some(node) = frontier.pop() {
        for next in ir.downstream(node) {
            if reached.insert(next) {
                frontier.push(next);
            }
        }
    }
    for step in &ir.steps {
        if !reached.contains(step.id.as_str()) {
            errors.push(format!(
                "Step '{}' is unreachable from the trigger",
                step.id
            ));
        }
    }
}
