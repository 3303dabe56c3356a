//! Deterministic test-case generation from a workflow IR.
//!
//! The generated suite is a pure function of the IR: no randomness, no
//! timestamps. That keeps suites stable across iterations so score
//! changes reflect workflow changes, not test drift.

use serde_json::{Map, Value, json};

use crate::ir::{ErrorAction, FieldType, StepType, WorkflowIR};
use crate::testing::TestCase;

/// Generates the standard test suite for a workflow.
///
/// One happy-path case, one probe per declared error-strategy branch, one
/// case per branch condition of every branch step, and one malformed-input
/// case.
pub fn generate_test_cases(ir: &WorkflowIR) -> Vec<TestCase> {
    let mut cases = Vec::new();

    cases.push(TestCase::new("happy_path", happy_path_input(ir)));

    match ir.error_strategy.on_error {
        ErrorAction::Retry => cases.push(TestCase::new(
            "error_recovery_retry",
            json!({ "message": "SIMULATE_ERROR: transient failure", "simulate_error": true }),
        )),
        ErrorAction::Fallback => cases.push(TestCase::new(
            "error_recovery_fallback",
            json!({ "message": "SIMULATE_ERROR: route to fallback", "simulate_error": true }),
        )),
        ErrorAction::Continue => cases.push(TestCase::new(
            "error_recovery_continue",
            json!({ "message": "SIMULATE_ERROR: continue past failure", "simulate_error": true }),
        )),
        ErrorAction::Stop => {}
    }

    for step in &ir.steps {
        if step.step_type != StepType::Branch {
            continue;
        }
        let Some(conditions) = step.branch_conditions.as_deref() else {
            continue;
        };
        for (index, condition) in conditions.iter().enumerate() {
            let branch = condition
                .output
                .clone()
                .unwrap_or_else(|| format!("output{index}"));
            let mut input = Map::new();
            input.insert(condition.field.clone(), condition.value.clone());
            cases.push(TestCase::new(
                format!("branch_{}_{branch}", step.id),
                Value::Object(input),
            ));
        }
    }

    cases.push(TestCase::new("malformed_input", json!({})));

    cases
}

/// Builds the happy-path input from the trigger's input contract when one
/// exists, falling back to a generic payload.
fn happy_path_input(ir: &WorkflowIR) -> Value {
    let Some(contract) = &ir.trigger.input_contract else {
        return json!({ "message": "Test input message" });
    };

    let mut input = Map::new();
    for field in &contract.fields {
        let value = field
            .default
            .clone()
            .unwrap_or_else(|| placeholder_for(field.field_type, &field.name));
        input.insert(field.name.clone(), value);
    }
    if input.is_empty() {
        return json!({ "message": "Test input message" });
    }
    Value::Object(input)
}

fn placeholder_for(field_type: FieldType, name: &str) -> Value {
    match field_type {
        FieldType::String | FieldType::Any => json!(format!("test-{name}")),
        FieldType::Number => json!(1),
        FieldType::Boolean => json!(true),
        FieldType::Object => json!({}),
        FieldType::Array => json!([]),
    }
}
