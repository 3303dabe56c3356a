//! # Kousei - Workflow Synthesis and Iteration Engine
//!
//! **Kousei** is a compilation, testing, and iteration engine for automation
//! workflows targeting n8n-style platforms. It operates on a canonical
//! intermediate representation (`WorkflowIR`), compiles it deterministically
//! to n8n workflow JSON, exercises the result with a generated test suite,
//! and iterates on failures until the workflow passes or a stop rule fires.
//!
//! ## Core Workflow
//!
//! The engine is format-agnostic at the edges. The primary workflow is:
//!
//! 1.  **Load Your Data**: Parse your workflow description (planner output,
//!     a JSON file, a builder) into a `WorkflowIR`, implementing
//!     `IntoWorkflowIr` for custom formats.
//! 2.  **Validate**: `validate` reports every structural violation at once,
//!     so a synthesis loop can address all of them in a single round.
//! 3.  **Compile**: `N8nCompiler` transforms the IR into n8n workflow JSON.
//!     Compilation is deterministic: identical IR yields byte-identical
//!     output.
//! 4.  **Test and Iterate**: `TestHarness` runs the generated suite (real
//!     webhook execution when a platform client is configured, local
//!     simulation otherwise), and `IterationDriver` loops
//!     compile-test-score rounds, applying targeted fixes between them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kousei::prelude::*;
//!
//! # async fn run_example() -> Result<()> {
//! let raw = std::fs::read_to_string("workflow.json")?;
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
//! // Compile and inspect.
//! let compiler = N8nCompiler::builder()
//!     .with_agent_runner_url("https://runner.example.com")
//!     .build();
//! let compiled = compiler.compile(&ir)?;
//! println!("{}", WorkflowPrinter::new().format(&compiled));
//!
//! // Run the generated suite locally and score the result.
//! let harness = TestHarness::simulated();
//! let summary = harness
//!     .run_tests(&ir, &compiled, TestRunOptions::default())
//!     .await;
//! let result = score(&ir, &summary);
//! println!("score: {}/100", result.total);
//!
//! // Or let the driver iterate until the workflow passes.
//! let driver = IterationDriver::new(compiler, None);
//! let outcome = driver.run(ir, RunOptions::default()).await;
//! println!("finished after {} iteration(s)", outcome.log.len());
//! # Ok(())
//! # }
//! ```

pub mod compile;
pub mod error;
pub mod ir;
pub mod iterate;
pub mod platform;
#[cfg(feature = "http-client")]
pub mod platform_http;
pub mod prelude;
pub mod printer;
pub mod score;
pub mod testing;
