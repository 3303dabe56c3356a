use clap::Parser;
use kousei::ir::conversion::RawWorkflow;
use kousei::prelude::*;
use std::fs;
use std::time::Instant;

/// A workflow IR validation, compilation, and simulation CLI
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the workflow IR JSON file
    workflow_path: String,

    /// Optional path to write the compiled n8n workflow JSON to
    #[arg(short, long)]
    output: Option<String>,

    /// Base URL of the agent runner used for agent steps
    #[arg(long)]
    agent_runner_url: Option<String>,

    /// Include node parameters in the printed rendering
    #[arg(short, long)]
    params: bool,

    /// Run the generated test suite in simulation and print the score
    #[arg(short, long)]
    test: bool,
}

fn main() {
    let cli = Cli::parse();
    let total_start = Instant::now();

    // --- 1. File Loading ---
    let load_start = Instant::now();
    let workflow_json = fs::read_to_string(&cli.workflow_path).unwrap_or_else(|e| {
        exit_with_error(&format!(
            "Failed to read workflow file '{}': {}",
            &cli.workflow_path, e
        ))
    });
    let load_duration = load_start.elapsed();

    // --- 2. Parsing and Conversion ---
    let raw: RawWorkflow = serde_json::from_str(&workflow_json)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to parse workflow JSON: {}", e)));
    let ir = raw
        .into_workflow_ir()
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to convert workflow: {}", e)));

    // --- 3. Validation ---
    let validate_start = Instant::now();
    let report = validate(&ir);
    let validate_duration = validate_start.elapsed();

    if !report.valid {
        eprintln!("\nWorkflow is invalid ({} violation(s)):", report.errors.len());
        for error in &report.errors {
            eprintln!("  - {}", error);
        }
        std::process::exit(1);
    }
    println!(
        "Validation passed: {} step(s), {} edge(s) in {:?}",
        ir.node_count(),
        ir.edges.len(),
        validate_duration
    );

    // --- 4. Compilation ---
    println!("\nStarting Kousei Workflow Compilation...");
    let compile_start = Instant::now();
    let mut builder = N8nCompiler::builder();
    if let Some(url) = &cli.agent_runner_url {
        builder = builder.with_agent_runner_url(url);
    }
    let compiler = builder.build();
    let compiled = compiler
        .compile(&ir)
        .unwrap_or_else(|e| exit_with_error(&format!("Compilation failed: {}", e)));
    let compile_duration = compile_start.elapsed();

    let findings = compiler.validate_compiled(&compiled);
    if !findings.is_empty() {
        eprintln!("\nCompiled workflow has issues:");
        for finding in &findings {
            eprintln!("  - {}", finding);
        }
        std::process::exit(1);
    }

    println!(
        "Compilation Successful! {} node(s) generated in {:?}",
        compiled.nodes.len(),
        compile_duration
    );

    // --- 5. Rendering ---
    let printer = if cli.params {
        WorkflowPrinter::new().with_params()
    } else {
        WorkflowPrinter::new()
    };
    println!("\n{}", printer.format(&compiled));

    if let Some(output_path) = &cli.output {
        let rendered = serde_json::to_string_pretty(&compiled)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to serialize workflow: {}", e)));
        fs::write(output_path, rendered).unwrap_or_else(|e| {
            exit_with_error(&format!("Failed to write '{}': {}", output_path, e))
        });
        println!("Compiled workflow written to {}", output_path);
    }

    // --- 6. Simulated Test Run (optional) ---
    let mut test_duration = None;
    if cli.test {
        println!("\nRunning Generated Test Suite (simulated)...");
        let test_start = Instant::now();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to start runtime: {}", e)));

        let summary = runtime.block_on(async {
            TestHarness::simulated()
                .run_tests(&ir, &compiled, TestRunOptions::default())
                .await
        });
        test_duration = Some(test_start.elapsed());

        for result in summary.results() {
            let status = if result.passed { "PASS" } else { "FAIL" };
            match &result.failure_reason {
                Some(reason) if !result.passed => {
                    println!("  [{}] {} ({})", status, result.test_name, reason)
                }
                _ => println!("  [{}] {}", status, result.test_name),
            }
        }

        let result = score(&ir, &summary);
        println!(
            "\nTests: {}/{} passed | Score: {}/100",
            summary.passed_count(),
            summary.total_count(),
            result.total
        );
        println!(
            "  correctness: {:.1}  simplicity: {:.1}  clarity: {:.1}  robustness: {:.1}",
            result.breakdown.correctness,
            result.breakdown.simplicity,
            result.breakdown.clarity,
            result.breakdown.robustness
        );
    }

    // --- 7. Summary ---
    let total_duration = total_start.elapsed();
    println!("\n--- Performance Summary ---");
    println!("File Loading:   {:?}", load_duration);
    println!("Validation:     {:?}", validate_duration);
    println!("Compilation:    {:?}", compile_duration);
    if let Some(duration) = test_duration {
        println!("Test Run:       {:?}", duration);
    }
    println!("---------------------------");
    println!("Total Execution: {:?}", total_duration);
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
