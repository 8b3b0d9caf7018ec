use crate::{executor::WorkflowEngine, registry::NodeRegistry, ExecutionResult, Task};
use flowcore::{Document, EventBus, ExecutionContext, FlowError, NodeType, WorkflowSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Main runtime for executing workflows
pub struct FlowRuntime {
    registry: Arc<NodeRegistry>,
    engine: Arc<WorkflowEngine>,
    event_bus: Arc<EventBus>,
}

impl FlowRuntime {
    /// Create a new runtime with default settings
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a new runtime with custom configuration
    pub fn with_config(config: RuntimeConfig) -> Self {
        let registry = Arc::new(NodeRegistry::new());
        Self::with_registry(registry, config)
    }

    /// Create a new runtime with a pre-configured registry
    pub fn with_registry(registry: Arc<NodeRegistry>, config: RuntimeConfig) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        let engine = Arc::new(WorkflowEngine::new(registry.clone(), config));

        Self {
            registry,
            engine,
            event_bus,
        }
    }

    /// Get access to the node registry
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        self.engine.config()
    }

    /// Start a run. Schema errors are returned right away; everything after
    /// that surfaces through the returned [`Task`]. Must be called from
    /// within a tokio runtime.
    pub fn invoke(
        &self,
        schema: &WorkflowSchema,
        inputs: HashMap<String, Value>,
    ) -> Result<Task, FlowError> {
        let document = Arc::new(Document::new(schema)?);
        let context = ExecutionContext::new(
            document,
            inputs,
            self.engine.clone(),
            self.event_bus.clone(),
        );

        let engine = self.engine.clone();
        let run_context = context.clone();
        let handle = tokio::spawn(async move { engine.execute(run_context).await });

        Ok(Task::new(context, handle))
    }

    /// Run a workflow to completion
    pub async fn execute(
        &self,
        schema: &WorkflowSchema,
        inputs: HashMap<String, Value>,
    ) -> Result<ExecutionResult, FlowError> {
        let task = self.invoke(schema, inputs)?;
        let context = task.context().clone();
        let outputs = task.wait().await?;

        Ok(ExecutionResult {
            execution_id: context.execution_id(),
            outputs,
            report: context.report(),
        })
    }

    /// Build the document and check every node against its executor
    /// without running anything
    pub fn validate(&self, schema: &WorkflowSchema) -> Result<Document, FlowError> {
        let document = Document::new(schema)?;
        for node in document.nodes().filter(|n| n.node_type != NodeType::Root) {
            let executor = self.registry.create_executor(node)?;
            executor
                .validate(node)
                .map_err(|e| FlowError::node(node.id.clone(), e))?;
        }
        Ok(document)
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<flowcore::ExecutionEvent> {
        self.event_bus.subscribe()
    }

    /// Get the event bus for direct access
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }
}

impl Default for FlowRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// How a node with several incoming edges decides it may run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JoinPolicy {
    /// Every incoming edge resolved, at least one of them taken
    #[default]
    WaitAll,
    /// The first taken incoming edge triggers the node
    FirstArrival,
}

impl FromStr for JoinPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wait-all" => Ok(JoinPolicy::WaitAll),
            "first-arrival" => Ok(JoinPolicy::FirstArrival),
            other => Err(format!("unknown join policy: {}", other)),
        }
    }
}

impl fmt::Display for JoinPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinPolicy::WaitAll => f.write_str("wait-all"),
            JoinPolicy::FirstArrival => f.write_str("first-arrival"),
        }
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub max_parallel_nodes: usize,
    pub event_buffer_size: usize,
    pub join_policy: JoinPolicy,
    pub node_timeout_ms: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_parallel_nodes: 10,
            event_buffer_size: 1000,
            join_policy: JoinPolicy::WaitAll,
            node_timeout_ms: None,
        }
    }
}
