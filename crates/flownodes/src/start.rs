use async_trait::async_trait;
use flowcore::{Node, NodeContext, NodeError, NodeExecutor, NodeOutput};
use flowruntime::{NodeFactory, NodeMetadata};

/// Entry node: publishes the workflow inputs as its outputs
pub struct StartNode;

#[async_trait]
impl NodeExecutor for StartNode {
    fn node_type(&self) -> &str {
        "start"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let inputs = ctx.runtime.io.inputs();
        tracing::debug!("Start node {} seeding {} inputs", ctx.node_id, inputs.len());
        Ok(NodeOutput::from_outputs(inputs))
    }
}

pub struct StartNodeFactory;

impl NodeFactory for StartNodeFactory {
    fn create(&self, _node: &Node) -> Result<Box<dyn NodeExecutor>, NodeError> {
        Ok(Box::new(StartNode))
    }

    fn node_type(&self) -> &str {
        "start"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Workflow entry point, outputs the workflow inputs".to_string(),
            category: "flow".to_string(),
            inputs: vec![],
            outputs: vec![],
        }
    }
}
