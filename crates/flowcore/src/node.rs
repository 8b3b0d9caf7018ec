use crate::context::ExecutionContext;
use crate::document::Node;
use crate::workflow::NodeType;
use crate::{FlowError, NodeError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Core trait that all node executors implement
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Type tag this executor handles (e.g. "condition", "llm")
    fn node_type(&self) -> &str;

    /// Execute the node with given context
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError>;

    /// Branching executors select successors through `NodeOutput::branch`;
    /// when they return no branch, nothing downstream runs.
    fn is_branching(&self) -> bool {
        false
    }

    /// Optional: Validate node data at workflow load time
    fn validate(&self, _node: &Node) -> Result<(), NodeError> {
        Ok(())
    }
}

/// Runs a set of nodes to completion inside a context. Implemented by the
/// engine and handed to executors (loops) that drive nested sub-graphs.
#[async_trait]
pub trait NodeRunner: Send + Sync {
    async fn run_nodes(&self, context: &ExecutionContext, node_ids: &[String]) -> Result<(), FlowError>;
}

/// Execution context passed to each executor
#[derive(Clone)]
pub struct NodeContext {
    pub node_id: String,
    pub node_type: NodeType,

    /// Resolved `inputsValues`
    pub inputs: HashMap<String, Value>,

    /// Raw node data from the schema
    pub data: Value,

    /// The context this node runs in
    pub runtime: ExecutionContext,

    /// Cancellation token for graceful shutdown
    pub cancellation: tokio_util::sync::CancellationToken,
}

impl NodeContext {
    pub fn new(node: &Node, inputs: HashMap<String, Value>, runtime: ExecutionContext) -> Self {
        Self {
            node_id: node.id.clone(),
            node_type: node.node_type.clone(),
            inputs,
            data: node.data.clone(),
            cancellation: runtime.cancellation().clone(),
            runtime,
        }
    }

    /// The document node being executed
    pub fn node(&self) -> Option<&Node> {
        self.runtime.document().node(&self.node_id)
    }

    /// Get required input or return error
    pub fn require_input(&self, name: &str) -> Result<&Value, NodeError> {
        self.inputs
            .get(name)
            .filter(|v| !v.is_null())
            .ok_or_else(|| NodeError::MissingInputs(vec![name.to_string()]))
    }

    /// Check several required inputs at once, reporting every missing one
    pub fn require_inputs(&self, names: &[&str]) -> Result<(), NodeError> {
        let missing: Vec<String> = names
            .iter()
            .filter(|name| self.require_input(name).is_err())
            .map(|name| name.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(NodeError::MissingInputs(missing))
        }
    }

    /// Get input with default
    pub fn get_input_or(&self, name: &str, default: Value) -> Value {
        self.inputs.get(name).cloned().unwrap_or(default)
    }

    /// Deserialize the type-specific part of the node data
    pub fn parse_data<T: DeserializeOwned>(&self) -> Result<T, NodeError> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            NodeError::Configuration(format!("invalid {} data: {}", self.node_type, e))
        })
    }
}

/// Output from node execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    /// Output values, written to the variable store under the node id
    pub outputs: HashMap<String, Value>,

    /// Output port to propagate along; `None` means every port
    pub branch: Option<String>,
}

impl NodeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_outputs(outputs: HashMap<String, Value>) -> Self {
        Self {
            outputs,
            branch: None,
        }
    }

    pub fn with_output(mut self, port: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(port.into(), value.into());
        self
    }

    pub fn with_branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch;
        self
    }
}
