use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Node {node_id} failed: {source}")]
    Node {
        node_id: String,
        #[source]
        source: NodeError,
    },

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FlowError {
    pub fn node(node_id: impl Into<String>, source: NodeError) -> Self {
        FlowError::Node {
            node_id: node_id.into(),
            source,
        }
    }

    /// The node-level error, if this failure came from an executor.
    pub fn node_error(&self) -> Option<&NodeError> {
        match self {
            FlowError::Node { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Missing required inputs: {}", .0.join(", "))]
    MissingInputs(Vec<String>),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Timeout after {millis}ms")]
    Timeout { millis: u64 },

    #[error("Cancelled")]
    Cancelled,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("Invalid workflow: {0}")]
    Invalid(String),

    #[error("Invalid edge {edge}: node '{missing}' does not exist")]
    InvalidEdge { edge: String, missing: String },

    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("Edge id {0} is shared by different endpoints")]
    DuplicateEdge(String),

    #[error("Workflow has no {0} node")]
    MissingNode(String),

    #[error("Cyclic dependency detected")]
    CyclicDependency,

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("No executor registered for node type: {0}")]
    UnknownNodeType(String),
}
