//! Deterministic workflow scoring.
//!
//! The score drives the iteration stop rules, so it must be a pure
//! function of the IR and the test summary: same inputs, same score,
//! every time. Weights: correctness 50, simplicity 25, clarity 15,
//! robustness 10.

use serde::{Deserialize, Serialize};

use crate::ir::{ErrorAction, StepSpec, WorkflowIR};
use crate::testing::TestRunSummary;

/// Node-plus-edge count at which the simplicity component bottoms out.
/// Stable across compared versions so iteration deltas stay meaningful.
pub const SIMPLICITY_BASELINE: f64 = 12.0;

/// Passing threshold used by the iteration driver.
pub const PASSING_SCORE: u32 = 85;

/// Per-dimension score components, each in its weighted range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// 0..=50, share of passing tests.
    pub correctness: f64,
    /// 0..=25, penalizes workflows beyond the size baseline.
    pub simplicity: f64,
    /// 0..=15, share of named and described steps.
    pub clarity: f64,
    /// 0..=10, error-strategy coverage.
    pub robustness: f64,
}

/// A workflow's score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Rounded sum of the breakdown, clamped to 0..=100.
    pub total: u32,
    pub breakdown: ScoreBreakdown,
}

/// Scores a workflow against its latest test summary.
pub fn score(ir: &WorkflowIR, summary: &TestRunSummary) -> Score {
    let breakdown = ScoreBreakdown {
        correctness: correctness(summary),
        simplicity: simplicity(ir),
        clarity: clarity(ir),
        robustness: robustness(ir),
    };
    let sum =
        breakdown.correctness + breakdown.simplicity + breakdown.clarity + breakdown.robustness;
    Score {
        total: (sum.round().clamp(0.0, 100.0)) as u32,
        breakdown,
    }
}

fn correctness(summary: &TestRunSummary) -> f64 {
    if summary.total_count() == 0 {
        return 0.0;
    }
    50.0 * summary.passed_count() as f64 / summary.total_count() as f64
}

fn simplicity(ir: &WorkflowIR) -> f64 {
    let size = (ir.node_count() + ir.edges.len()) as f64;
    let factor = (1.0 - (size - SIMPLICITY_BASELINE) / SIMPLICITY_BASELINE).clamp(0.0, 1.0);
    25.0 * factor
}

fn clarity(ir: &WorkflowIR) -> f64 {
    let steps: Vec<&StepSpec> = std::iter::once(&ir.trigger).chain(ir.steps.iter()).collect();
    let clear = steps.iter().filter(|s| is_clear(s)).count();
    15.0 * clear as f64 / steps.len() as f64
}

fn is_clear(step: &StepSpec) -> bool {
    let named = !step.name.trim().is_empty() && step.name != step.id;
    let described = step
        .description
        .as_deref()
        .is_some_and(|d| !d.trim().is_empty());
    named && described
}

fn robustness(ir: &WorkflowIR) -> f64 {
    let strategy_factor = if ir.error_strategy.on_error == ErrorAction::Stop {
        0.3
    } else {
        1.0
    };
    let retry_factor = if ir.error_strategy.retry_config.is_some() {
        1.0
    } else {
        0.6
    };
    10.0 * strategy_factor * retry_factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{EdgeSpec, ErrorStrategy, StepSpec, StepType, TriggerType, WorkflowIR};
    use crate::testing::{ExecutionMode, TestResult, TestRunSummary};
    use chrono::Utc;
    use serde_json::json;

    fn described_step(id: &str, name: &str) -> StepSpec {
        let mut step = StepSpec::new(id, name, StepType::Action, "n8n-nodes-base.set");
        step.description = Some(format!("{name} does its thing"));
        step
    }

    fn small_ir() -> WorkflowIR {
        let mut trigger =
            StepSpec::new("t", "Webhook In", StepType::Trigger, "n8n-nodes-base.webhook");
        trigger.trigger_type = Some(TriggerType::Webhook);
        trigger.description = Some("receives requests".to_string());
        WorkflowIR {
            id: uuid::Uuid::nil(),
            name: "small".to_string(),
            description: "small".to_string(),
            trigger,
            steps: vec![described_step("a", "Prepare"), described_step("b", "Respond")],
            edges: vec![EdgeSpec::new("t", "a"), EdgeSpec::new("a", "b")],
            error_strategy: Default::default(),
            test_invariants: vec![],
            metadata: Default::default(),
            tags: vec![],
        }
    }

    fn summary(passed: usize, failed: usize) -> TestRunSummary {
        let mut results = Vec::new();
        for i in 0..passed + failed {
            results.push(TestResult {
                test_name: format!("t{i}"),
                passed: i < passed,
                input_payload: json!({}),
                actual_output: None,
                expected_output: None,
                failure_reason: None,
                duration_ms: 1,
                execution_mode: ExecutionMode::Simulated,
                executed_at: Utc::now(),
            });
        }
        TestRunSummary::from_results(results)
    }

    #[test]
    fn perfect_small_workflow_scores_full_marks() {
        let result = score(&small_ir(), &summary(4, 0));
        assert_eq!(result.breakdown.correctness, 50.0);
        assert_eq!(result.breakdown.simplicity, 25.0);
        assert_eq!(result.breakdown.clarity, 15.0);
        assert_eq!(result.breakdown.robustness, 10.0);
        assert_eq!(result.total, 100);
    }

    #[test]
    fn empty_test_run_gives_zero_correctness() {
        let result = score(&small_ir(), &summary(0, 0));
        assert_eq!(result.breakdown.correctness, 0.0);
    }

    #[test]
    fn stop_strategy_without_retry_hurts_robustness() {
        let mut ir = small_ir();
        ir.error_strategy = ErrorStrategy {
            on_error: ErrorAction::Stop,
            retry_config: None,
            fallback_step_id: None,
        };
        let result = score(&ir, &summary(4, 0));
        assert!((result.breakdown.robustness - 1.8).abs() < 1e-9);
    }

    #[test]
    fn oversized_workflows_lose_simplicity() {
        let mut ir = small_ir();
        for i in 0..20 {
            let id = format!("extra{i}");
            ir.steps.push(described_step(&id, &format!("Extra {i}")));
            ir.edges.push(EdgeSpec::new("b", &id));
        }
        let result = score(&ir, &summary(4, 0));
        assert_eq!(result.breakdown.simplicity, 0.0);
    }

    #[test]
    fn scoring_is_deterministic() {
        let ir = small_ir();
        let s = summary(2, 2);
        assert_eq!(score(&ir, &s), score(&ir, &s));
    }

    #[test]
    fn total_stays_in_range() {
        let result = score(&small_ir(), &summary(0, 10));
        assert!(result.total <= 100);
    }
}
