//! The auto-iteration driver.
//!
//! Drives a workflow through compile, push, test, and score rounds until
//! it passes or a stop rule fires. The driver never returns an error:
//! anything that goes wrong internally ends the run as `Failed` with an
//! `error:` stop reason, and the iterations completed up to that point
//! are kept.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use itertools::Itertools;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::compile::{N8nCompiler, N8nWorkflow};
use crate::error::PlatformError;
use crate::ir::{Fix, FixChange, WorkflowIR, apply_fixes, validate};
use crate::iterate::{IterationDraft, IterationLog, IterationState, StopReason};
use crate::platform::{PlatformClient, PushSerializer};
use crate::score::{PASSING_SCORE, score};
use crate::testing::{TestHarness, TestRunOptions, TestRunSummary};

/// Default number of rounds before giving up.
pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

/// Produces fixes for a failed test run.
///
/// The deterministic built-in is [`StructuralAnalyzer`]; smarter
/// collaborators (LLM-backed analysis) plug in through this trait.
#[async_trait]
pub trait FixAnalyzer: Send + Sync {
    async fn analyze(&self, ir: &WorkflowIR, summary: &TestRunSummary) -> Vec<Fix>;
}

/// Deterministic failure analysis: maps each failing test to a suspect
/// step and proposes one parameter fix per distinct step.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralAnalyzer;

#[async_trait]
impl FixAnalyzer for StructuralAnalyzer {
    async fn analyze(&self, ir: &WorkflowIR, summary: &TestRunSummary) -> Vec<Fix> {
        summary
            .failures()
            .map(|failure| {
                let step_id = suspect_step(ir, &failure.test_name);
                Fix {
                    step_id: step_id.clone(),
                    description: format!(
                        "Loosen output handling of '{step_id}' after failing test '{}'",
                        failure.test_name
                    ),
                    change: FixChange::UpdateParameters {
                        parameters: always_output_data(),
                    },
                }
            })
            .unique_by(|fix| fix.step_id.clone())
            .collect()
    }
}

fn always_output_data() -> Map<String, Value> {
    let mut parameters = Map::new();
    parameters.insert("alwaysOutputData".to_string(), json!(true));
    parameters
}

/// Maps a failing test name to the step most likely responsible.
///
/// Branch coverage tests name their step; everything else blames the last
/// step in the flow (the one shaping the final output).
fn suspect_step(ir: &WorkflowIR, test_name: &str) -> String {
    for step in &ir.steps {
        if test_name.starts_with(&format!("branch_{}_", step.id)) {
            return step.id.clone();
        }
    }
    ir.steps
        .last()
        .map(|s| s.id.clone())
        .unwrap_or_else(|| ir.trigger.id.clone())
}

/// Options for one driver run.
#[derive(Clone, Default)]
pub struct RunOptions {
    /// Push each version to the platform before testing. Requires a
    /// client.
    pub push_to_platform: bool,
    /// Checked between iterations; a set flag stops the run with
    /// `cancelled`. Completed iterations are kept.
    pub cancel: Option<Arc<AtomicBool>>,
}

/// Final result of a driver run.
#[derive(Debug)]
pub struct IterationOutcome {
    pub log: IterationLog,
    pub state: IterationState,
    pub stop_reason: Option<StopReason>,
    pub success: bool,
    pub final_score: Option<u32>,
}

/// Compile-test-score loop with fix application between rounds.
pub struct IterationDriver {
    compiler: N8nCompiler,
    client: Option<Arc<dyn PlatformClient>>,
    analyzer: Arc<dyn FixAnalyzer>,
    push_serializer: PushSerializer,
    max_iterations: u32,
    passing_score: u32,
}

impl IterationDriver {
    pub fn new(compiler: N8nCompiler, client: Option<Arc<dyn PlatformClient>>) -> Self {
        Self {
            compiler,
            client,
            analyzer: Arc::new(StructuralAnalyzer),
            push_serializer: PushSerializer::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            passing_score: PASSING_SCORE,
        }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn FixAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_passing_score(mut self, passing_score: u32) -> Self {
        self.passing_score = passing_score.min(100);
        self
    }

    /// Runs the loop to completion. Infallible by contract: internal
    /// errors become a `Failed` outcome with an `error:` stop reason.
    pub async fn run(&self, initial_ir: WorkflowIR, options: RunOptions) -> IterationOutcome {
        let mut log = IterationLog::new(initial_ir.id);

        let report = validate(&initial_ir);
        if !report.valid {
            let reason = StopReason::Error(format!(
                "initial workflow invalid: {}",
                report.errors.join("; ")
            ));
            return finish(log, IterationState::Failed, Some(reason));
        }

        let mut current_ir = initial_ir;
        let mut rationale = "initial draft".to_string();
        let mut platform_id: Option<String> = None;
        let mut previous_score: Option<u32> = None;

        loop {
            if !log.is_empty() && is_cancelled(&options) {
                info!(workflow = %log.workflow_id, "run cancelled");
                return finish(log, IterationState::Failed, Some(StopReason::Cancelled));
            }

            let round = self
                .run_round(&current_ir, &rationale, &options, &mut platform_id)
                .await;
            let (mut draft, summary) = match round {
                Ok(round) => round,
                Err(message) => {
                    warn!(workflow = %log.workflow_id, error = %message, "iteration failed");
                    return finish(
                        log,
                        IterationState::Failed,
                        Some(StopReason::Error(message)),
                    );
                }
            };

            let version = log.len() as u32 + 1;
            let current_score = draft.score.unwrap_or(0);
            info!(
                version,
                score = current_score,
                passed = summary.passed_count(),
                total = summary.total_count(),
                "iteration complete"
            );

            if summary.all_passed() && current_score >= self.passing_score {
                info!(
                    version,
                    score = current_score,
                    state = ?IterationState::Passing,
                    "workflow passed"
                );
                log.append(draft);
                return finish(log, IterationState::Deployed, None);
            }

            if version >= 2 && previous_score.is_some_and(|previous| current_score <= previous) {
                log.append(draft);
                return finish(
                    log,
                    IterationState::Failed,
                    Some(StopReason::NoImprovement),
                );
            }

            if version >= self.max_iterations {
                log.append(draft);
                return finish(
                    log,
                    IterationState::Failed,
                    Some(StopReason::MaxIterations),
                );
            }

            let fixes = self.analyzer.analyze(&current_ir, &summary).await;
            draft.fix_plan = Some(fixes.clone());
            log.append(draft);

            if fixes.is_empty() {
                return finish(
                    log,
                    IterationState::Failed,
                    Some(StopReason::Error("no fixes proposed".to_string())),
                );
            }

            info!(
                version,
                fixes = fixes.len(),
                state = ?IterationState::Iterating,
                "applying fixes"
            );
            previous_score = Some(current_score);
            let (next_ir, outcomes) = apply_fixes(&current_ir, &fixes);
            let applied: Vec<&str> = outcomes
                .iter()
                .filter(|o| o.applied)
                .map(|o| o.description.as_str())
                .collect();
            rationale = if applied.is_empty() {
                "no fixes applied".to_string()
            } else {
                format!("applied fixes: {}", applied.join("; "))
            };
            current_ir = next_ir;
        }
    }

    /// One compile / push / test / score round.
    async fn run_round(
        &self,
        ir: &WorkflowIR,
        rationale: &str,
        options: &RunOptions,
        platform_id: &mut Option<String>,
    ) -> Result<(IterationDraft, TestRunSummary), String> {
        debug!(workflow = %ir.name, state = ?IterationState::Drafting, "compiling draft");
        let compiled = self.compiler.compile(ir).map_err(|e| e.to_string())?;
        let compiled_json = serde_json::to_value(&compiled).map_err(|e| e.to_string())?;

        if options.push_to_platform {
            *platform_id = Some(
                self.push(ir, &compiled, platform_id.take())
                    .await
                    .map_err(|e| e.to_string())?,
            );
        }

        debug!(workflow = %ir.name, state = ?IterationState::Testing, "running test suite");
        let harness = TestHarness::new(self.client.clone());
        let summary = harness
            .run_tests(
                ir,
                &compiled,
                TestRunOptions {
                    platform_workflow_id: platform_id.clone(),
                    ..TestRunOptions::default()
                },
            )
            .await;

        let result = score(ir, &summary);
        let draft = IterationDraft {
            workflow_ir: ir.clone(),
            compiled_json,
            rationale: rationale.to_string(),
            score: Some(result.total),
            score_breakdown: Some(result.breakdown),
            fix_plan: None,
        };
        Ok((draft, summary))
    }

    /// Pushes one version: create (replacing the previous version) and
    /// activate, serialized per workflow id.
    async fn push(
        &self,
        ir: &WorkflowIR,
        compiled: &N8nWorkflow,
        previous_id: Option<String>,
    ) -> Result<String, PlatformError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| PlatformError::NotConfigured("no platform client".to_string()))?;

        let lock = self.push_serializer.lock_for(&ir.id.to_string()).await;
        let _guard = lock.lock().await;

        if let Some(previous) = previous_id {
            if let Err(err) = client.delete_workflow(&previous).await {
                warn!(workflow_id = %previous, error = %err, "stale version cleanup failed");
            }
        }

        let new_id = client.create_workflow(compiled).await?;
        client.activate_workflow(&new_id).await?;
        Ok(new_id)
    }
}

fn is_cancelled(options: &RunOptions) -> bool {
    options
        .cancel
        .as_ref()
        .is_some_and(|flag| flag.load(Ordering::SeqCst))
}

fn finish(
    log: IterationLog,
    state: IterationState,
    stop_reason: Option<StopReason>,
) -> IterationOutcome {
    let final_score = log.latest().and_then(|i| i.score);
    IterationOutcome {
        success: state == IterationState::Deployed,
        log,
        state,
        stop_reason,
        final_score,
    }
}

impl std::fmt::Debug for IterationDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IterationDriver")
            .field("max_iterations", &self.max_iterations)
            .field("passing_score", &self.passing_score)
            .field("has_client", &self.client.is_some())
            .finish()
    }
}
