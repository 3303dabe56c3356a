//! Prelude module for convenient imports
//!
//! Re-exports the most commonly used types and traits from the kousei
//! crate. Import this module to get access to the core functionality
//! without having to import each type individually.
//!
//! # Example
//!
//! ```rust,no_run
//! use kousei::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let raw = std::fs::read_to_string("path/to/workflow.json")?;
//! let ir: WorkflowIR = serde_json::from_str(&raw)?;
//!
//! let report = validate(&ir);
//! if !report.valid {
//!     for error in &report.errors {
//!         eprintln!("invalid: {error}");
//!     }
//!     return Ok(());
//! }
//!
//! let compiler = N8nCompiler::builder().build();
//! let compiled = compiler.compile(&ir)?;
//! println!("{}", WorkflowPrinter::new().format(&compiled));
//! # Ok(())
//! # }
//! ```

// Workflow model and validation
pub use crate::ir::{
    AgentSpec, BranchCondition, DataContract, EdgeSpec, ErrorAction, ErrorStrategy, FieldSchema,
    FieldType, IntoWorkflowIr, InvariantCheck, Position, RetryConfig, StepSpec, StepType,
    TestInvariant, TriggerType, ValidationReport, WorkflowIR, validate,
};
pub use crate::ir::{Fix, FixChange, FixOutcome, apply_fixes};

// Compilation
pub use crate::compile::{N8nCompiler, N8nNode, N8nWorkflow, NodeCatalog, NodeDefinition};

// Testing
pub use crate::testing::{
    ExecutionMode, TestCase, TestHarness, TestResult, TestRunOptions, TestRunSummary,
    generate_test_cases,
};

// Iteration
pub use crate::iterate::{
    FixAnalyzer, Iteration, IterationDriver, IterationLog, IterationOutcome, IterationState,
    RunOptions, StopReason, StructuralAnalyzer,
};

// Scoring and rendering
pub use crate::printer::WorkflowPrinter;
pub use crate::score::{PASSING_SCORE, Score, ScoreBreakdown, score};

// Platform boundary
pub use crate::platform::{PlatformClient, PushSerializer, WebhookResponse, retry_idempotent};

// Error types
pub use crate::error::{CompileError, FixError, PlatformError, SnapshotError};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
