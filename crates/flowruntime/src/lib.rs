//! Workflow execution runtime
//!
//! This crate provides the engine that walks a workflow document, the
//! registry mapping node types to executors, and the `invoke` entry point
//! returning a cancellable [`Task`].

mod executor;
mod registry;
mod runtime;
mod task;

pub use executor::{ExecutionResult, WorkflowEngine};
pub use registry::{NodeFactory, NodeMetadata, NodeRegistry, PortDefinition};
pub use runtime::{FlowRuntime, JoinPolicy, RuntimeConfig};
pub use task::Task;
