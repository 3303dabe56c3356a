use thiserror::Error;

/// Errors that can occur while compiling a `WorkflowIR` to n8n JSON.
///
/// Compilation errors are recoverable by the synthesis/fix stage, not by the
/// caller: they indicate the IR references a platform construct the compiler
/// does not know how to emit.
#[derive(Error, Debug, Clone)]
pub enum CompileError {
    #[error("Step '{step_id}' uses an unknown platform node type: '{node_type}'")]
    UnknownNodeType { step_id: String, node_type: String },

    #[error(
        "Step '{step_id}' is missing required parameter '{parameter}' for node type '{node_type}'"
    )]
    MissingParameter {
        step_id: String,
        parameter: String,
        node_type: String,
    },

    #[error("Branch step '{step_id}' is invalid: {reason}")]
    InvalidBranch { step_id: String, reason: String },
}

impl CompileError {
    /// The id of the step that caused the error.
    pub fn step_id(&self) -> &str {
        match self {
            CompileError::UnknownNodeType { step_id, .. } => step_id,
            CompileError::MissingParameter { step_id, .. } => step_id,
            CompileError::InvalidBranch { step_id, .. } => step_id,
        }
    }
}

/// Errors from the external platform boundary (n8n REST API and webhooks).
#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Platform client is not configured: {0}")]
    NotConfigured(String),

    #[error("Platform request failed: {0}")]
    Request(String),

    #[error("Platform returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Platform call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Errors that can occur when applying a single fix to a `WorkflowIR`.
///
/// A failing fix aborts only itself: fix application continues with the
/// remaining fixes against the unmodified IR.
#[derive(Error, Debug, Clone)]
pub enum FixError {
    #[error("Fix targets unknown step '{step_id}'")]
    UnknownStep { step_id: String },

    #[error("Fix would produce an invalid workflow: {}", violations.join("; "))]
    InvalidResult { violations: Vec<String> },

    #[error("Fix is not applicable: {0}")]
    NotApplicable(String),
}

/// Errors that can occur when persisting or loading an iteration log snapshot.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot I/O failed for '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot (de)serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors that can occur when converting a custom user format into a
/// kousei `WorkflowIR`.
#[derive(Error, Debug, Clone)]
pub enum ConversionError {
    #[error("Invalid workflow definition: {0}")]
    ValidationError(String),
}
