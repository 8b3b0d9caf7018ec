use async_trait::async_trait;
use flowcore::{Node, NodeContext, NodeError, NodeExecutor, NodeOutput};
use flowruntime::{NodeFactory, NodeMetadata};

/// Terminal node: its resolved inputs become the workflow outputs
pub struct EndNode;

#[async_trait]
impl NodeExecutor for EndNode {
    fn node_type(&self) -> &str {
        "end"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        ctx.runtime.io.set_outputs(ctx.inputs.clone());
        Ok(NodeOutput::from_outputs(ctx.inputs))
    }
}

pub struct EndNodeFactory;

impl NodeFactory for EndNodeFactory {
    fn create(&self, _node: &Node) -> Result<Box<dyn NodeExecutor>, NodeError> {
        Ok(Box::new(EndNode))
    }

    fn node_type(&self) -> &str {
        "end"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Workflow exit point, collects the workflow outputs".to_string(),
            category: "flow".to_string(),
            inputs: vec![],
            outputs: vec![],
        }
    }
}
