//! The workflow intermediate representation.
//!
//! A [`WorkflowIR`] is the canonical, platform-neutral description of an
//! automation workflow: one trigger, a set of steps, the edges connecting
//! them, an error-handling strategy, and the invariants its tests must hold.
//! It sits between whatever produced the workflow (an LLM planner, a raw
//! JSON file, a builder) and the compiled n8n JSON.

pub mod conversion;
pub mod fix;
pub mod validate;

pub use conversion::IntoWorkflowIr;
pub use fix::{Fix, FixChange, FixOutcome, apply_fixes};
pub use validate::{ValidationReport, validate};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// The kind of work a step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Trigger,
    Action,
    Transform,
    Agent,
    Branch,
    Merge,
}

/// How a workflow is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Webhook,
    Manual,
    Schedule,
}

/// What to do when a step fails at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorAction {
    Stop,
    Retry,
    Fallback,
    Continue,
}

/// Retry configuration for the error strategy.
///
/// The backoff curve is bounded exponential: attempt `n` (0-based) waits
/// `backoff_ms * backoff_multiplier^n`, up to `max_retries` attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    1000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Error handling strategy for the whole workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorStrategy {
    pub on_error: ErrorAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_config: Option<RetryConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_step_id: Option<String>,
}

impl Default for ErrorStrategy {
    fn default() -> Self {
        Self {
            on_error: ErrorAction::Retry,
            retry_config: Some(RetryConfig::default()),
            fallback_step_id: None,
        }
    }
}

/// Data types usable in a [`DataContract`] field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Any,
}

impl FieldType {
    fn json_schema_name(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Array => "array",
            FieldType::Any => "any",
        }
    }
}

/// A single field in a data contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

fn default_true() -> bool {
    true
}

/// Contract defining the shape of data flowing between steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataContract {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

impl DataContract {
    /// Renders this contract as a JSON Schema object.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for field in &self.fields {
            let mut prop = Map::new();
            prop.insert(
                "type".to_string(),
                Value::String(field.field_type.json_schema_name().to_string()),
            );
            if let Some(desc) = &field.description {
                prop.insert("description".to_string(), Value::String(desc.clone()));
            }
            if let Some(default) = &field.default {
                prop.insert("default".to_string(), default.clone());
            }
            properties.insert(field.name.clone(), Value::Object(prop));
            if field.required {
                required.push(Value::String(field.name.clone()));
            }
        }

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Specification for an agent embedded in a workflow step.
///
/// The agent itself executes on an external agent-runner; the spec only
/// carries what the compiler needs to wire up the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub tools_allowed: Vec<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    2048
}
fn default_temperature() -> f32 {
    0.7
}

/// One condition of a branch step. Conditions are matched in order; each
/// condition maps to one outgoing edge via its `output_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchCondition {
    /// Name of the branch output this condition routes to. Edges may
    /// reference it through their `condition` field instead of an index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Field of the incoming payload to test, e.g. `category`.
    pub field: String,
    /// Value to compare against.
    pub value: Value,
    /// Comparison operation, e.g. `equals`, `contains`.
    #[serde(default = "default_operation")]
    pub operation: String,
}

fn default_operation() -> String {
    "equals".to_string()
}

/// 2D position for node layout. Passed through to the compiled JSON
/// unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

/// An invariant the test harness checks against a test's actual output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestInvariant {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub check: InvariantCheck,
}

/// The concrete check an invariant performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InvariantCheck {
    /// Some output was produced.
    ExecutionSuccess,
    /// The output carries no `error` key.
    NoError,
    /// The output contains every listed key (as a map key or substring).
    OutputContains { keys: Vec<String> },
    /// The output equals the expected value exactly.
    OutputEquals { expected: Value },
    /// The simulated run took the named branch.
    BranchTaken { branch: String },
}

/// Specification for a single workflow step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSpec {
    /// Unique step identifier within the workflow.
    pub id: String,
    /// Human-readable step name. Becomes the n8n node name.
    pub name: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Full n8n node type string, e.g. `n8n-nodes-base.httpRequest`.
    pub platform_node_type: String,
    #[serde(default = "default_type_version")]
    pub platform_type_version: u32,
    #[serde(default)]
    pub parameters: Map<String, Value>,

    /// Agent specification; required when `step_type` is `Agent`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentSpec>,

    /// Trigger kind; only meaningful on the workflow's trigger step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_type: Option<TriggerType>,
    /// Trigger-specific configuration (webhook path/method, schedule rule).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_config: Option<Map<String, Value>>,

    /// Branching conditions; required when `step_type` is `Branch`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_conditions: Option<Vec<BranchCondition>>,

    #[serde(default)]
    pub position: Position,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_contract: Option<DataContract>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_contract: Option<DataContract>,
}

fn default_type_version() -> u32 {
    1
}

impl StepSpec {
    /// Creates a minimal step of the given type. Remaining fields take
    /// their defaults and can be filled in struct-update style.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        step_type: StepType,
        platform_node_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            step_type,
            description: None,
            platform_node_type: platform_node_type.into(),
            platform_type_version: 1,
            parameters: Map::new(),
            agent: None,
            trigger_type: None,
            trigger_config: None,
            branch_conditions: None,
            position: Position::default(),
            input_contract: None,
            output_contract: None,
        }
    }
}

/// A directed connection between two steps.
///
/// `from_step`/`to_step` reference step ids (the trigger's id included).
/// Self-loops are invalid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub from_step: String,
    pub to_step: String,
    /// Branch output name this edge is attached to, resolved against the
    /// source step's `branch_conditions`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Explicit source output index for branch steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_index: Option<u32>,
    #[serde(default = "default_main")]
    pub source_output: String,
    #[serde(default = "default_main")]
    pub target_input: String,
}

fn default_main() -> String {
    "main".to_string()
}

impl EdgeSpec {
    /// Creates a plain `main -> main` edge between two steps.
    pub fn new(from_step: impl Into<String>, to_step: impl Into<String>) -> Self {
        Self {
            from_step: from_step.into(),
            to_step: to_step.into(),
            condition: None,
            output_index: None,
            source_output: default_main(),
            target_input: default_main(),
        }
    }
}

/// The canonical in-memory representation of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowIR {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    pub description: String,

    /// The single entry point. Must have `step_type == Trigger`.
    pub trigger: StepSpec,
    /// All non-trigger steps.
    #[serde(default)]
    pub steps: Vec<StepSpec>,
    /// Connections between steps (trigger included as a valid endpoint).
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,

    #[serde(default)]
    pub error_strategy: ErrorStrategy,
    #[serde(default)]
    pub test_invariants: Vec<TestInvariant>,

    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl WorkflowIR {
    /// Looks up a step by id, the trigger included.
    pub fn step(&self, step_id: &str) -> Option<&StepSpec> {
        if self.trigger.id == step_id {
            return Some(&self.trigger);
        }
        self.steps.iter().find(|s| s.id == step_id)
    }

    /// Mutable lookup by id, the trigger included.
    pub fn step_mut(&mut self, step_id: &str) -> Option<&mut StepSpec> {
        if self.trigger.id == step_id {
            return Some(&mut self.trigger);
        }
        self.steps.iter_mut().find(|s| s.id == step_id)
    }

    /// All step ids in declaration order, the trigger first.
    pub fn all_step_ids(&self) -> Vec<&str> {
        std::iter::once(self.trigger.id.as_str())
            .chain(self.steps.iter().map(|s| s.id.as_str()))
            .collect()
    }

    /// Ids of steps directly downstream of `step_id`.
    pub fn downstream(&self, step_id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.from_step == step_id)
            .map(|e| e.to_step.as_str())
            .collect()
    }

    /// Ids of steps directly upstream of `step_id`.
    pub fn upstream(&self, step_id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.to_step == step_id)
            .map(|e| e.from_step.as_str())
            .collect()
    }

    /// Total node count, trigger included.
    pub fn node_count(&self) -> usize {
        self.steps.len() + 1
    }
}
