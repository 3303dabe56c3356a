//! Test execution against compiled workflows.
//!
//! A test run takes a set of [`TestCase`]s and produces a
//! [`TestRunSummary`]. Execution is either real (through the platform
//! client, against a pushed workflow) or simulated (a local graph walk);
//! every result says truthfully which path produced it.

pub mod generator;
pub mod harness;
pub mod simulator;

pub use generator::generate_test_cases;
pub use harness::{TestHarness, TestRunOptions};
pub use simulator::WorkflowSimulator;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default per-test budget.
pub const DEFAULT_TEST_TIMEOUT_MS: u64 = 30_000;

/// How a test result was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Real,
    Simulated,
}

/// One test to run against a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output_contains: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl TestCase {
    /// Creates a case with just a name and input payload.
    pub fn new(name: impl Into<String>, input: Value) -> Self {
        Self {
            name: name.into(),
            input,
            expected_output_contains: None,
            expected_status: None,
            timeout_ms: None,
        }
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(DEFAULT_TEST_TIMEOUT_MS)
    }
}

/// Outcome of one test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub test_name: String,
    pub passed: bool,
    pub input_payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub duration_ms: u64,
    pub execution_mode: ExecutionMode,
    pub executed_at: DateTime<Utc>,
}

/// Aggregate of a full test run.
///
/// Only constructible through [`TestRunSummary::from_results`], so the
/// counts can never drift from the result list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRunSummary {
    results: Vec<TestResult>,
    passed_count: usize,
    total_count: usize,
    all_passed: bool,
    real_execution_count: usize,
    simulated_execution_count: usize,
}

impl TestRunSummary {
    pub fn from_results(results: Vec<TestResult>) -> Self {
        let passed_count = results.iter().filter(|r| r.passed).count();
        let total_count = results.len();
        let real_execution_count = results
            .iter()
            .filter(|r| r.execution_mode == ExecutionMode::Real)
            .count();
        Self {
            passed_count,
            total_count,
            all_passed: passed_count == total_count && total_count > 0,
            real_execution_count,
            simulated_execution_count: total_count - real_execution_count,
            results,
        }
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn passed_count(&self) -> usize {
        self.passed_count
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn all_passed(&self) -> bool {
        self.all_passed
    }

    pub fn real_execution_count(&self) -> usize {
        self.real_execution_count
    }

    pub fn simulated_execution_count(&self) -> usize {
        self.simulated_execution_count
    }

    /// Results that failed, for fix analysis.
    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| !r.passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(name: &str, passed: bool, mode: ExecutionMode) -> TestResult {
        TestResult {
            test_name: name.to_string(),
            passed,
            input_payload: json!({}),
            actual_output: None,
            expected_output: None,
            failure_reason: (!passed).then(|| "boom".to_string()),
            duration_ms: 1,
            execution_mode: mode,
            executed_at: Utc::now(),
        }
    }

    #[test]
    fn counts_are_consistent_with_the_results() {
        let summary = TestRunSummary::from_results(vec![
            result("a", true, ExecutionMode::Real),
            result("b", false, ExecutionMode::Simulated),
            result("c", true, ExecutionMode::Simulated),
        ]);
        assert_eq!(summary.total_count(), 3);
        assert_eq!(summary.passed_count(), 2);
        assert!(!summary.all_passed());
        assert_eq!(summary.real_execution_count(), 1);
        assert_eq!(summary.simulated_execution_count(), 2);
    }

    #[test]
    fn empty_run_never_counts_as_passing() {
        let summary = TestRunSummary::from_results(vec![]);
        assert!(!summary.all_passed());
        assert_eq!(summary.total_count(), 0);
    }
}
