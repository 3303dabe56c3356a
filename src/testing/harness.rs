//! Async test harness.
//!
//! Runs a test suite against a workflow, preferring real execution through
//! the platform webhook and falling back to the local simulator when the
//! platform is unreachable or unconfigured. Every result is labelled with
//! the execution path that actually produced it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::compile::N8nWorkflow;
use crate::ir::{InvariantCheck, TestInvariant, WorkflowIR};
use crate::platform::PlatformClient;
use crate::testing::{
    ExecutionMode, TestCase, TestResult, TestRunSummary, generate_test_cases,
    simulator::WorkflowSimulator,
};

/// Options for one test run.
#[derive(Debug, Clone)]
pub struct TestRunOptions {
    /// Platform workflow id; required for real execution.
    pub platform_workflow_id: Option<String>,
    /// Prefer real execution when possible.
    pub force_real: bool,
    /// Explicit test cases; the generated suite is used when absent.
    pub test_cases: Option<Vec<TestCase>>,
}

impl Default for TestRunOptions {
    fn default() -> Self {
        Self {
            platform_workflow_id: None,
            force_real: true,
            test_cases: None,
        }
    }
}

/// Test execution harness.
pub struct TestHarness {
    client: Option<Arc<dyn PlatformClient>>,
    simulator: WorkflowSimulator,
}

impl TestHarness {
    pub fn new(client: Option<Arc<dyn PlatformClient>>) -> Self {
        Self {
            client,
            simulator: WorkflowSimulator::new(),
        }
    }

    /// A harness that only ever simulates.
    pub fn simulated() -> Self {
        Self::new(None)
    }

    /// Runs the suite and returns the summary.
    pub async fn run_tests(
        &self,
        ir: &WorkflowIR,
        compiled: &N8nWorkflow,
        options: TestRunOptions,
    ) -> TestRunSummary {
        let cases = options
            .test_cases
            .unwrap_or_else(|| generate_test_cases(ir));

        let webhook_path = compiled.webhook_path().map(str::to_string);
        let use_real = self.client.is_some()
            && options.platform_workflow_id.is_some()
            && options.force_real
            && webhook_path.is_some();

        info!(
            workflow = %ir.name,
            tests = cases.len(),
            real_execution = use_real,
            "test run start"
        );

        let mut results = Vec::with_capacity(cases.len());
        for case in &cases {
            let result = if use_real {
                self.run_real(
                    ir,
                    case,
                    webhook_path.as_deref().unwrap_or_default(),
                    compiled.webhook_method(),
                )
                .await
            } else {
                self.run_simulated(ir, case).await
            };
            results.push(result);
        }

        let summary = TestRunSummary::from_results(results);
        info!(
            workflow = %ir.name,
            passed = summary.passed_count(),
            total = summary.total_count(),
            real = summary.real_execution_count(),
            "test run complete"
        );
        summary
    }

    /// Real execution via the platform webhook. A client error or timeout
    /// fails over to the simulator for this case.
    async fn run_real(
        &self,
        ir: &WorkflowIR,
        case: &TestCase,
        webhook_path: &str,
        webhook_method: &str,
    ) -> TestResult {
        let Some(client) = &self.client else {
            return self.run_simulated(ir, case).await;
        };

        let budget = Duration::from_millis(case.timeout_ms());
        let started = Instant::now();

        let call = client.trigger_webhook(webhook_path, webhook_method, &case.input, budget);
        let response = match tokio::time::timeout(budget, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                warn!(test = %case.name, error = %err, "real execution failed, simulating");
                return self.run_simulated(ir, case).await;
            }
            Err(_) => {
                warn!(test = %case.name, "real execution timed out, simulating");
                return self.run_simulated(ir, case).await;
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;

        if !response.success {
            return TestResult {
                test_name: case.name.clone(),
                passed: false,
                input_payload: case.input.clone(),
                actual_output: response.body,
                expected_output: None,
                failure_reason: Some(format!(
                    "Webhook failed: {}",
                    response.error.as_deref().unwrap_or("unknown error")
                )),
                duration_ms,
                execution_mode: ExecutionMode::Real,
                executed_at: Utc::now(),
            };
        }

        if let Some(expected) = case.expected_status {
            if response.status_code != expected {
                return TestResult {
                    test_name: case.name.clone(),
                    passed: false,
                    input_payload: case.input.clone(),
                    actual_output: response.body,
                    expected_output: None,
                    failure_reason: Some(format!(
                        "Expected status {expected}, got {}",
                        response.status_code
                    )),
                    duration_ms,
                    execution_mode: ExecutionMode::Real,
                    executed_at: Utc::now(),
                };
            }
        }

        let output = response.body.unwrap_or(Value::Null);
        let failure = self.evaluate(ir, case, &output);
        TestResult {
            test_name: case.name.clone(),
            passed: failure.is_none(),
            input_payload: case.input.clone(),
            actual_output: Some(output),
            expected_output: None,
            failure_reason: failure,
            duration_ms,
            execution_mode: ExecutionMode::Real,
            executed_at: Utc::now(),
        }
    }

    /// Simulated execution. The walk is synchronous, so the budget is
    /// enforced by measuring elapsed time against the case's limit.
    async fn run_simulated(&self, ir: &WorkflowIR, case: &TestCase) -> TestResult {
        let budget = Duration::from_millis(case.timeout_ms());
        let started = Instant::now();

        let output = self.simulator.run(ir, &case.input);
        let elapsed = started.elapsed();
        let duration_ms = elapsed.as_millis() as u64;

        if elapsed >= budget {
            return TestResult {
                test_name: case.name.clone(),
                passed: false,
                input_payload: case.input.clone(),
                actual_output: None,
                expected_output: None,
                failure_reason: Some("timeout".to_string()),
                duration_ms,
                execution_mode: ExecutionMode::Simulated,
                executed_at: Utc::now(),
            };
        }

        let failure = self.evaluate(ir, case, &output);
        debug!(test = %case.name, passed = failure.is_none(), "simulated test done");
        TestResult {
            test_name: case.name.clone(),
            passed: failure.is_none(),
            input_payload: case.input.clone(),
            actual_output: Some(output),
            expected_output: None,
            failure_reason: failure,
            duration_ms,
            execution_mode: ExecutionMode::Simulated,
            executed_at: Utc::now(),
        }
    }

    /// Checks case expectations and workflow invariants against the output.
    /// Returns the first failure, `None` when everything holds.
    fn evaluate(&self, ir: &WorkflowIR, case: &TestCase, output: &Value) -> Option<String> {
        if let Some(expected_keys) = &case.expected_output_contains {
            if let Some(missing) = missing_keys(output, expected_keys) {
                return Some(format!("Missing in output: {missing:?}"));
            }
        }

        for invariant in &ir.test_invariants {
            if let Some(failure) = check_invariant(invariant, output) {
                return Some(failure);
            }
        }

        None
    }
}

fn missing_keys(output: &Value, expected: &[String]) -> Option<Vec<String>> {
    let rendered = output.to_string().to_lowercase();
    let missing: Vec<String> = expected
        .iter()
        .filter(|key| {
            let as_key = output.get(key.as_str()).is_some();
            let as_substring = rendered.contains(&key.to_lowercase());
            !as_key && !as_substring
        })
        .cloned()
        .collect();
    (!missing.is_empty()).then_some(missing)
}

fn check_invariant(invariant: &TestInvariant, output: &Value) -> Option<String> {
    match &invariant.check {
        InvariantCheck::ExecutionSuccess => {
            (output.is_null()).then(|| format!("{}: no output received", invariant.name))
        }
        InvariantCheck::NoError => output
            .get("error")
            .map(|error| format!("{}: error in output: {error}", invariant.name)),
        InvariantCheck::OutputContains { keys } => missing_keys(output, keys)
            .map(|missing| format!("{}: missing in output: {missing:?}", invariant.name)),
        InvariantCheck::OutputEquals { expected } => (output != expected).then(|| {
            format!(
                "{}: output mismatch: expected {expected}, got {output}",
                invariant.name
            )
        }),
        InvariantCheck::BranchTaken { branch } => {
            let actual = output.get("branch_taken").and_then(Value::as_str);
            (actual != Some(branch.as_str())).then(|| {
                format!(
                    "{}: wrong branch: expected {branch}, got {}",
                    invariant.name,
                    actual.unwrap_or("none")
                )
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_keys_matches_keys_and_substrings() {
        let output = json!({ "reply": "All done", "score": 10 });
        assert!(missing_keys(&output, &["reply".to_string()]).is_none());
        assert!(missing_keys(&output, &["done".to_string()]).is_none());
        let missing = missing_keys(&output, &["absent".to_string()]).unwrap();
        assert_eq!(missing, vec!["absent".to_string()]);
    }

    #[test]
    fn no_error_invariant_flags_error_keys() {
        let invariant = TestInvariant {
            name: "clean".to_string(),
            description: String::new(),
            check: InvariantCheck::NoError,
        };
        assert!(check_invariant(&invariant, &json!({ "ok": true })).is_none());
        assert!(check_invariant(&invariant, &json!({ "error": "boom" })).is_some());
    }

    #[test]
    fn branch_taken_invariant_reads_the_simulator_marker() {
        let invariant = TestInvariant {
            name: "routed".to_string(),
            description: String::new(),
            check: InvariantCheck::BranchTaken {
                branch: "urgent".to_string(),
            },
        };
        assert!(check_invariant(&invariant, &json!({ "branch_taken": "urgent" })).is_none());
        assert!(check_invariant(&invariant, &json!({ "branch_taken": "normal" })).is_some());
    }
}
