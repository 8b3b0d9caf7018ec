//! Core abstractions for the flow engine
//!
//! Schema types, the flattener and document graph, typed variables and the
//! execution context, plus the executor contract every node type implements.
//! The scheduler itself lives in `flowruntime`.

pub mod context;
pub mod document;
mod error;
pub mod events;
pub mod flatten;
mod node;
mod value;
pub mod variable;
mod workflow;

pub use context::{ExecutionContext, Report, Status};
pub use document::{Document, Edge, Node, Port, PortDirection};
pub use error::{FlowError, NodeError, WorkflowError};
pub use events::*;
pub use flatten::{flat_schema, FlatSchema};
pub use node::{NodeContext, NodeExecutor, NodeOutput, NodeRunner};
pub use value::{TypedValue, VariableType};
pub use variable::{Variable, VariableStore};
pub use workflow::{
    EdgeSchema, FlowValue, JsonSchema, NodeMeta, NodeSchema, NodeType, Position, WorkflowSchema,
    ROOT_NODE_ID,
};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
