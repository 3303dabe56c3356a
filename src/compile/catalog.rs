//! Catalog of known n8n node types.
//!
//! The compiler refuses to emit a node it has no definition for; the
//! catalog is what makes that check possible. It ships seeded with the
//! core n8n node set and accepts custom definitions through the compiler
//! builder.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One declared parameter of a node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeParameter {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NodeParameter {
    fn required(name: &str) -> Self {
        Self {
            name: name.to_string(),
            required: true,
            default: None,
            description: None,
        }
    }

    fn optional(name: &str, default: Value) -> Self {
        Self {
            name: name.to_string(),
            required: false,
            default: Some(default),
            description: None,
        }
    }
}

/// Definition of one platform node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    /// Full type string, e.g. `n8n-nodes-base.httpRequest`.
    pub node_type: String,
    pub type_version: u32,
    pub name: String,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub parameters: Vec<NodeParameter>,
    /// Number of input ports.
    pub inputs: u32,
    /// Number of output ports (switch nodes grow beyond this at compile
    /// time based on their rules).
    pub outputs: u32,
}

/// Lookup table of node definitions keyed by node type.
#[derive(Debug, Clone)]
pub struct NodeCatalog {
    definitions: AHashMap<String, NodeDefinition>,
}

impl NodeCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self {
            definitions: AHashMap::new(),
        }
    }

    /// Creates a catalog seeded with the core n8n node set.
    pub fn with_core_nodes() -> Self {
        let mut catalog = Self::new();
        for definition in core_definitions() {
            catalog.register(definition);
        }
        catalog
    }

    /// Registers (or replaces) a definition.
    pub fn register(&mut self, definition: NodeDefinition) {
        self.definitions
            .insert(definition.node_type.clone(), definition);
    }

    pub fn get(&self, node_type: &str) -> Option<&NodeDefinition> {
        self.definitions.get(node_type)
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.definitions.contains_key(node_type)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl Default for NodeCatalog {
    fn default() -> Self {
        Self::with_core_nodes()
    }
}

fn definition(
    node_type: &str,
    type_version: u32,
    name: &str,
    description: &str,
    category: &str,
    parameters: Vec<NodeParameter>,
    inputs: u32,
    outputs: u32,
) -> NodeDefinition {
    NodeDefinition {
        node_type: node_type.to_string(),
        type_version,
        name: name.to_string(),
        description: description.to_string(),
        category: category.to_string(),
        parameters,
        inputs,
        outputs,
    }
}

fn core_definitions() -> Vec<NodeDefinition> {
    use serde_json::json;

    vec![
        definition(
            "n8n-nodes-base.webhook",
            2,
            "Webhook",
            "Receives HTTP requests",
            "trigger",
            vec![
                NodeParameter::required("path"),
                NodeParameter::optional("httpMethod", json!("POST")),
                NodeParameter::optional("responseMode", json!("responseNode")),
            ],
            0,
            1,
        ),
        definition(
            "n8n-nodes-base.manualTrigger",
            1,
            "Manual Trigger",
            "Starts the workflow on manual execution",
            "trigger",
            vec![],
            0,
            1,
        ),
        definition(
            "n8n-nodes-base.scheduleTrigger",
            1,
            "Schedule Trigger",
            "Starts the workflow on a schedule",
            "trigger",
            vec![NodeParameter::required("rule")],
            0,
            1,
        ),
        definition(
            "n8n-nodes-base.httpRequest",
            4,
            "HTTP Request",
            "Makes an HTTP request",
            "action",
            vec![
                NodeParameter::required("url"),
                NodeParameter::optional("method", json!("GET")),
            ],
            1,
            1,
        ),
        definition(
            "n8n-nodes-base.set",
            1,
            "Set",
            "Sets values on items",
            "transform",
            vec![NodeParameter::optional("values", json!({}))],
            1,
            1,
        ),
        definition(
            "n8n-nodes-base.if",
            1,
            "IF",
            "Routes items by condition",
            "branch",
            vec![NodeParameter::required("conditions")],
            1,
            2,
        ),
        definition(
            "n8n-nodes-base.switch",
            1,
            "Switch",
            "Routes items across multiple outputs",
            "branch",
            vec![NodeParameter::required("rules")],
            1,
            4,
        ),
        definition(
            "n8n-nodes-base.merge",
            2,
            "Merge",
            "Merges multiple input streams",
            "merge",
            vec![NodeParameter::optional("mode", json!("append"))],
            2,
            1,
        ),
        definition(
            "n8n-nodes-base.respondToWebhook",
            1,
            "Respond to Webhook",
            "Sends the webhook response",
            "action",
            vec![NodeParameter::optional("respondWith", json!("json"))],
            1,
            1,
        ),
        definition(
            "n8n-nodes-base.noOp",
            1,
            "No Operation",
            "Passes items through unchanged",
            "transform",
            vec![],
            1,
            1,
        ),
        definition(
            "n8n-nodes-base.code",
            2,
            "Code",
            "Runs custom JavaScript",
            "transform",
            vec![NodeParameter::required("jsCode")],
            1,
            1,
        ),
        definition(
            "n8n-nodes-base.itemLists",
            3,
            "Item Lists",
            "Splits and manipulates item lists",
            "transform",
            vec![NodeParameter::optional("operation", json!("splitOutItems"))],
            1,
            1,
        ),
        definition(
            "n8n-nodes-base.aggregate",
            1,
            "Aggregate",
            "Aggregates items into one",
            "transform",
            vec![NodeParameter::optional("aggregate", json!("aggregateAllItemData"))],
            1,
            1,
        ),
        definition(
            "n8n-nodes-base.splitInBatches",
            3,
            "Loop Over Items",
            "Processes items in batches",
            "transform",
            vec![NodeParameter::optional("batchSize", json!(1))],
            1,
            2,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_catalog_contains_the_usual_suspects() {
        let catalog = NodeCatalog::with_core_nodes();
        for node_type in [
            "n8n-nodes-base.webhook",
            "n8n-nodes-base.httpRequest",
            "n8n-nodes-base.switch",
            "n8n-nodes-base.respondToWebhook",
        ] {
            assert!(catalog.contains(node_type), "missing {node_type}");
        }
    }

    #[test]
    fn register_replaces_an_existing_definition() {
        let mut catalog = NodeCatalog::with_core_nodes();
        let mut custom = catalog.get("n8n-nodes-base.set").cloned().unwrap();
        custom.type_version = 3;
        catalog.register(custom);
        assert_eq!(catalog.get("n8n-nodes-base.set").unwrap().type_version, 3);
    }
}
