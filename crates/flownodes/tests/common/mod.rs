#![allow(dead_code)]

use async_trait::async_trait;
use flowcore::{EdgeSchema, Node, NodeContext, NodeError, NodeExecutor, NodeOutput, NodeSchema};
use flownodes::{ModelClient, ModelRequest};
use flowruntime::{FlowRuntime, NodeFactory, NodeRegistry, RuntimeConfig};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Model client answering `echo: <prompt>` and remembering every request
#[derive(Default)]
pub struct MockClient {
    pub requests: Mutex<Vec<ModelRequest>>,
    pub fail_with: Option<String>,
}

#[async_trait]
impl ModelClient for MockClient {
    async fn complete(&self, request: ModelRequest) -> Result<String, NodeError> {
        let prompt = request.prompt.clone();
        self.requests.lock().push(request);
        match &self.fail_with {
            Some(message) => Err(NodeError::ExecutionFailed(message.clone())),
            None => Ok(format!("echo: {}", prompt)),
        }
    }
}

/// Logs its id when it runs, after an optional `delayMs` from its data,
/// and passes its inputs through
pub struct RecordNode {
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl NodeExecutor for RecordNode {
    fn node_type(&self) -> &str {
        "record"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        if let Some(ms) = ctx.data.get("delayMs").and_then(Value::as_u64) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        self.log.lock().push(ctx.node_id.clone());
        Ok(NodeOutput::from_outputs(ctx.inputs.clone()).with_output("visited", ctx.node_id.clone()))
    }
}

pub struct RecordFactory {
    log: Arc<Mutex<Vec<String>>>,
}

impl NodeFactory for RecordFactory {
    fn create(&self, _node: &Node) -> Result<Box<dyn NodeExecutor>, NodeError> {
        Ok(Box::new(RecordNode {
            log: self.log.clone(),
        }))
    }

    fn node_type(&self) -> &str {
        "record"
    }
}

/// Appends its `item` input to a shared list. Counts how often it can see
/// its own output from an earlier loop iteration.
pub struct AccumulateNode {
    items: Arc<Mutex<Vec<Value>>>,
    indexes: Arc<Mutex<Vec<Value>>>,
    leaks: Arc<Mutex<usize>>,
}

#[async_trait]
impl NodeExecutor for AccumulateNode {
    fn node_type(&self) -> &str {
        "accumulate"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let item = ctx.require_input("item")?.clone();
        if ctx
            .runtime
            .variables
            .get_value(&ctx.node_id, "pushed", &[])
            .is_some()
        {
            *self.leaks.lock() += 1;
        }
        self.items.lock().push(item.clone());
        self.indexes
            .lock()
            .push(ctx.get_input_or("index", Value::Null));
        Ok(NodeOutput::new().with_output("pushed", item))
    }
}

pub struct AccumulateFactory {
    items: Arc<Mutex<Vec<Value>>>,
    indexes: Arc<Mutex<Vec<Value>>>,
    leaks: Arc<Mutex<usize>>,
}

impl NodeFactory for AccumulateFactory {
    fn create(&self, _node: &Node) -> Result<Box<dyn NodeExecutor>, NodeError> {
        Ok(Box::new(AccumulateNode {
            items: self.items.clone(),
            indexes: self.indexes.clone(),
            leaks: self.leaks.clone(),
        }))
    }

    fn node_type(&self) -> &str {
        "accumulate"
    }
}

pub struct FailNode;

#[async_trait]
impl NodeExecutor for FailNode {
    fn node_type(&self) -> &str {
        "fail"
    }

    async fn execute(&self, _ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        Err(NodeError::ExecutionFailed("boom".to_string()))
    }
}

pub struct FailFactory;

impl NodeFactory for FailFactory {
    fn create(&self, _node: &Node) -> Result<Box<dyn NodeExecutor>, NodeError> {
        Ok(Box::new(FailNode))
    }

    fn node_type(&self) -> &str {
        "fail"
    }
}

/// Shared state the test executors write into
#[derive(Default)]
pub struct Harness {
    pub log: Arc<Mutex<Vec<String>>>,
    pub items: Arc<Mutex<Vec<Value>>>,
    pub indexes: Arc<Mutex<Vec<Value>>>,
    pub leaks: Arc<Mutex<usize>>,
    pub client: Arc<MockClient>,
}

impl Harness {
    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn count(&self, node_id: &str) -> usize {
        self.log.lock().iter().filter(|id| id.as_str() == node_id).count()
    }
}

pub fn runtime() -> (FlowRuntime, Harness) {
    runtime_with(RuntimeConfig::default(), MockClient::default())
}

pub fn runtime_with(config: RuntimeConfig, client: MockClient) -> (FlowRuntime, Harness) {
    let harness = Harness {
        client: Arc::new(client),
        ..Harness::default()
    };

    let mut registry = NodeRegistry::new();
    flownodes::register_with_client(&mut registry, harness.client.clone());
    registry.register(Arc::new(RecordFactory {
        log: harness.log.clone(),
    }));
    registry.register(Arc::new(AccumulateFactory {
        items: harness.items.clone(),
        indexes: harness.indexes.clone(),
        leaks: harness.leaks.clone(),
    }));
    registry.register(Arc::new(FailFactory));

    (FlowRuntime::with_registry(Arc::new(registry), config), harness)
}

pub fn node(id: &str, node_type: &str, data: Value) -> NodeSchema {
    NodeSchema::new(id, node_type).with_data(data)
}

pub fn edge(from: &str, to: &str) -> EdgeSchema {
    EdgeSchema::new(from, to)
}

pub fn reference(node_id: &str, key: &str) -> Value {
    json!({ "type": "ref", "content": [node_id, key] })
}

pub fn constant(content: Value) -> Value {
    json!({ "type": "constant", "content": content })
}
