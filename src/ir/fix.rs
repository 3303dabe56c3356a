//! Targeted fixes applied between iterations.
//!
//! A [`Fix`] is a small, declarative change to a [`WorkflowIR`] produced by
//! failure analysis. Fixes apply one at a time against a working copy;
//! structural fixes that would leave the workflow invalid are reverted
//! individually so one bad fix cannot poison the batch.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::FixError;
use crate::ir::{EdgeSpec, StepSpec, WorkflowIR, validate};

/// The concrete change a fix performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "fix_type", rename_all = "snake_case")]
pub enum FixChange {
    /// Merge the given parameters into the step's parameter map.
    UpdateParameters { parameters: Map<String, Value> },
    /// Swap the step's platform node type (and version).
    ReplaceNode {
        platform_node_type: String,
        platform_type_version: u32,
    },
    /// Add an edge to the workflow.
    AddEdge { edge: EdgeSpec },
    /// Remove all edges matching the given endpoints.
    RemoveEdge { from_step: String, to_step: String },
    /// Insert a new step (unconnected; pair with `AddEdge`).
    AddStep { step: StepSpec },
    /// Remove the step and every edge touching it.
    RemoveStep,
}

/// One fix targeting a single step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    /// The step the fix targets. For `AddEdge`/`AddStep` this is the step
    /// the failure analysis blamed, kept for traceability.
    pub step_id: String,
    pub description: String,
    #[serde(flatten)]
    pub change: FixChange,
}

/// Result of attempting one fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixOutcome {
    pub step_id: String,
    pub description: String,
    pub applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FixOutcome {
    fn applied(fix: &Fix) -> Self {
        Self {
            step_id: fix.step_id.clone(),
            description: fix.description.clone(),
            applied: true,
            error: None,
        }
    }

    fn rejected(fix: &Fix, error: FixError) -> Self {
        Self {
            step_id: fix.step_id.clone(),
            description: fix.description.clone(),
            applied: false,
            error: Some(error.to_string()),
        }
    }
}

/// Applies a batch of fixes to a workflow, returning the new IR and one
/// outcome per fix.
///
/// Pure: the input IR is untouched. Structural fixes (step/edge addition
/// and removal) are re-validated; if the result is invalid, that single
/// fix is reverted and the remaining fixes continue from the last good
/// state.
pub fn apply_fixes(ir: &WorkflowIR, fixes: &[Fix]) -> (WorkflowIR, Vec<FixOutcome>) {
    let mut current = ir.clone();
    let mut outcomes = Vec::with_capacity(fixes.len());

    for fix in fixes {
        let mut candidate = current.clone();
        match apply_one(&mut candidate, fix) {
            Ok(structural) => {
                if structural {
                    let report = validate(&candidate);
                    if !report.valid {
                        debug!(step_id = %fix.step_id, "fix reverted: result invalid");
                        outcomes.push(FixOutcome::rejected(
                            fix,
                            FixError::InvalidResult {
                                violations: report.errors,
                            },
                        ));
                        continue;
                    }
                }
                current = candidate;
                outcomes.push(FixOutcome::applied(fix));
            }
            Err(err) => {
                debug!(step_id = %fix.step_id, error = %err, "fix rejected");
                outcomes.push(FixOutcome::rejected(fix, err));
            }
        }
    }

    (current, outcomes)
}

/// Applies one fix in place. Returns `true` when the change was structural
/// and needs re-validation.
fn apply_one(ir: &mut WorkflowIR, fix: &Fix) -> Result<bool, FixError> {
    match &fix.change {
        FixChange::UpdateParameters { parameters } => {
            let step = ir.step_mut(&fix.step_id).ok_or(FixError::UnknownStep {
                step_id: fix.step_id.clone(),
            })?;
            for (key, value) in parameters {
                step.parameters.insert(key.clone(), value.clone());
            }
            Ok(false)
        }
        FixChange::ReplaceNode {
            platform_node_type,
            platform_type_version,
        } => {
            let step = ir.step_mut(&fix.step_id).ok_or(FixError::UnknownStep {
                step_id: fix.step_id.clone(),
            })?;
            step.platform_node_type = platform_node_type.clone();
            step.platform_type_version = *platform_type_version;
            Ok(false)
        }
        FixChange::AddEdge { edge } => {
            for endpoint in [&edge.from_step, &edge.to_step] {
                if ir.step(endpoint).is_none() {
                    return Err(FixError::UnknownStep {
                        step_id: endpoint.clone(),
                    });
                }
            }
            ir.edges.push(edge.clone());
            Ok(true)
        }
        FixChange::RemoveEdge { from_step, to_step } => {
            let before = ir.edges.len();
            ir.edges
                .retain(|e| !(e.from_step == *from_step && e.to_step == *to_step));
            if ir.edges.len() == before {
                return Err(FixError::NotApplicable(format!(
                    "no edge '{from_step}' -> '{to_step}' exists"
                )));
            }
            Ok(true)
        }
        FixChange::AddStep { step } => {
            if ir.step(&step.id).is_some() {
                return Err(FixError::NotApplicable(format!(
                    "step '{}' already exists",
                    step.id
                )));
            }
            ir.steps.push(step.clone());
            Ok(true)
        }
        FixChange::RemoveStep => {
            if ir.trigger.id == fix.step_id {
                return Err(FixError::NotApplicable(
                    "the trigger step cannot be removed".to_string(),
                ));
            }
            let before = ir.steps.len();
            ir.steps.retain(|s| s.id != fix.step_id);
            if ir.steps.len() == before {
                return Err(FixError::UnknownStep {
                    step_id: fix.step_id.clone(),
                });
            }
            ir.edges
                .retain(|e| e.from_step != fix.step_id && e.to_step != fix.step_id);
            Ok(true)
        }
    }
}
