//! Iteration history of a workflow under synthesis.
//!
//! Every compile-test-score round produces an immutable [`Iteration`];
//! the [`IterationLog`] is the append-only history those rounds
//! accumulate in. Versions are allocated by the log itself, so they are
//! gapless and strictly increasing by construction.

pub mod driver;
pub mod snapshot;

pub use driver::{
    FixAnalyzer, IterationDriver, IterationOutcome, RunOptions, StructuralAnalyzer,
};
pub use snapshot::{load_log, save_log};

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::ir::{Fix, WorkflowIR};
use crate::score::ScoreBreakdown;

/// Lifecycle state of a workflow under iteration.
///
/// The intermediate states surface in the driver's structured logs as a
/// run progresses; `Deployed` and `Failed` are the terminal states an
/// [`IterationOutcome`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationState {
    Drafting,
    Testing,
    Passing,
    Iterating,
    Deployed,
    Failed,
}

/// Why an iteration run stopped without success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    MaxIterations,
    NoImprovement,
    Cancelled,
    Error(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::MaxIterations => write!(f, "max_iterations"),
            StopReason::NoImprovement => write!(f, "no_improvement"),
            StopReason::Cancelled => write!(f, "cancelled"),
            StopReason::Error(message) => write!(f, "error:{message}"),
        }
    }
}

/// One immutable compile-test-score round.
///
/// An iteration is never mutated after creation; improvements land as new
/// iterations that supersede it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Iteration {
    pub id: Uuid,
    pub workflow_id: Uuid,
    /// 1-based, allocated by [`IterationLog::append`].
    pub version: u32,
    pub workflow_ir: WorkflowIR,
    pub compiled_json: Value,
    /// Why this iteration exists (initial draft, or which fixes it applied).
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_breakdown: Option<ScoreBreakdown>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_plan: Option<Vec<Fix>>,
    pub created_at: DateTime<Utc>,
}

/// Content of a not-yet-versioned iteration; the log assigns the version.
#[derive(Debug, Clone)]
pub struct IterationDraft {
    pub workflow_ir: WorkflowIR,
    pub compiled_json: Value,
    pub rationale: String,
    pub score: Option<u32>,
    pub score_breakdown: Option<ScoreBreakdown>,
    pub fix_plan: Option<Vec<Fix>>,
}

/// Append-only iteration history for one workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationLog {
    pub workflow_id: Uuid,
    iterations: Vec<Iteration>,
}

impl IterationLog {
    pub fn new(workflow_id: Uuid) -> Self {
        Self {
            workflow_id,
            iterations: Vec::new(),
        }
    }

    /// Appends a draft, allocating the next version. This is the only way
    /// iterations enter the log.
    pub fn append(&mut self, draft: IterationDraft) -> &Iteration {
        let version = self.iterations.last().map(|i| i.version).unwrap_or(0) + 1;
        self.iterations.push(Iteration {
            id: Uuid::new_v4(),
            workflow_id: self.workflow_id,
            version,
            workflow_ir: draft.workflow_ir,
            compiled_json: draft.compiled_json,
            rationale: draft.rationale,
            score: draft.score,
            score_breakdown: draft.score_breakdown,
            fix_plan: draft.fix_plan,
            created_at: Utc::now(),
        });
        self.iterations.last().unwrap_or_else(|| unreachable!())
    }

    pub fn iterations(&self) -> &[Iteration] {
        &self.iterations
    }

    pub fn latest(&self) -> Option<&Iteration> {
        self.iterations.last()
    }

    pub fn len(&self) -> usize {
        self.iterations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }
}
