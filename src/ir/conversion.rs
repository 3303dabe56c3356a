//! Conversion from lenient external formats into a [`WorkflowIR`].
//!
//! Planner output and hand-written workflow files rarely match the strict
//! IR shape: the trigger is usually listed inline with the other steps and
//! ids may be omitted. [`IntoWorkflowIr`] is the seam for adapting such
//! formats; [`RawWorkflow`] is the built-in lenient format used by the CLI.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::ConversionError;
use crate::ir::{EdgeSpec, ErrorStrategy, StepSpec, StepType, TestInvariant, WorkflowIR};

/// Adapts a custom workflow format into the canonical IR.
pub trait IntoWorkflowIr {
    fn into_workflow_ir(self) -> Result<WorkflowIR, ConversionError>;
}

impl IntoWorkflowIr for WorkflowIR {
    fn into_workflow_ir(self) -> Result<WorkflowIR, ConversionError> {
        Ok(self)
    }
}

/// Lenient workflow file format: the trigger is listed among the steps and
/// identified by its type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawWorkflow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<StepSpec>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
    #[serde(default)]
    pub error_strategy: ErrorStrategy,
    #[serde(default)]
    pub test_invariants: Vec<TestInvariant>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl IntoWorkflowIr for RawWorkflow {
    fn into_workflow_ir(self) -> Result<WorkflowIR, ConversionError> {
        let mut steps = self.steps;
        let trigger_count = steps
            .iter()
            .filter(|s| s.step_type == StepType::Trigger)
            .count();
        if trigger_count != 1 {
            return Err(ConversionError::ValidationError(format!(
                "expected exactly one trigger step, found {trigger_count}"
            )));
        }
        let position = steps
            .iter()
            .position(|s| s.step_type == StepType::Trigger)
            .ok_or_else(|| {
                ConversionError::ValidationError("no trigger step present".to_string())
            })?;
        let trigger = steps.remove(position);

        Ok(WorkflowIR {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            name: self.name,
            description: self.description,
            trigger,
            steps,
            edges: self.edges,
            error_strategy: self.error_strategy,
            test_invariants: self.test_invariants,
            metadata: self.metadata,
            tags: self.tags,
        })
    }
}
