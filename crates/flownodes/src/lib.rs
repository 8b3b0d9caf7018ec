//! Built-in node executors
//!
//! Flow control (start, end, condition, loop) plus model invocation.

pub mod condition;
mod end;
mod llm;
mod loops;
mod start;

pub use condition::{ConditionNode, ConditionNodeFactory};
pub use end::{EndNode, EndNodeFactory};
pub use llm::{LlmNode, LlmNodeFactory, ModelClient, ModelRequest, OpenAiClient};
pub use loops::{locals_id, LoopData, LoopNode, LoopNodeFactory};
pub use start::{StartNode, StartNodeFactory};

use flowruntime::NodeRegistry;
use std::sync::Arc;

/// Register all built-in nodes with a registry
pub fn register_all(registry: &mut NodeRegistry) {
    register_with_client(registry, Arc::new(OpenAiClient::new()));
}

/// Register all built-in nodes, routing model calls through `client`
pub fn register_with_client(registry: &mut NodeRegistry, client: Arc<dyn ModelClient>) {
    registry.register(Arc::new(StartNodeFactory));
    registry.register(Arc::new(EndNodeFactory));
    registry.register(Arc::new(ConditionNodeFactory));
    registry.register(Arc::new(LoopNodeFactory));
    registry.register(Arc::new(LlmNodeFactory::new(client)));
}
