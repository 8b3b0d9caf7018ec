use async_trait::async_trait;
use flowcore::{
    FlowValue, Node, NodeContext, NodeError, NodeExecutor, NodeOutput, TypedValue, Variable,
    VariableType,
};
use flowruntime::{NodeFactory, NodeMetadata, PortDefinition};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopData {
    #[serde(default)]
    pub batch_for: Option<FlowValue>,
}

/// Variable scope holding a loop's per-iteration bindings
pub fn locals_id(loop_id: &str) -> String {
    format!("{}_locals", loop_id)
}

/// Runs the loop body once per item of `batchFor`, one iteration at a time.
/// Each iteration gets its own child context with `item` and `index` bound
/// under `{loopID}_locals`.
pub struct LoopNode;

impl LoopNode {
    fn resolve_batch(&self, ctx: &NodeContext) -> Result<TypedValue, NodeError> {
        let data: LoopData = ctx.parse_data()?;
        let invalid = |actual: &str| NodeError::InvalidInputType {
            field: "batchFor".to_string(),
            expected: "array".to_string(),
            actual: actual.to_string(),
        };

        let batch_for = data.batch_for.ok_or_else(|| invalid("undefined"))?;
        let batch = ctx
            .runtime
            .resolve_flow_value(&batch_for)
            .ok_or_else(|| invalid("undefined"))?;
        if batch.ty != VariableType::Array || !batch.value.is_array() {
            return Err(invalid(batch.ty.as_str()));
        }
        Ok(batch)
    }
}

#[async_trait]
impl NodeExecutor for LoopNode {
    fn node_type(&self) -> &str {
        "loop"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let batch = self.resolve_batch(&ctx)?;
        let items = match batch.value {
            Value::Array(items) => items,
            _ => Vec::new(),
        };
        if items.is_empty() {
            tracing::debug!("Loop {} has nothing to iterate", ctx.node_id);
            return Ok(NodeOutput::new());
        }
        let items_type = batch.items_type.ok_or_else(|| NodeError::InvalidInputType {
            field: "batchFor".to_string(),
            expected: "array with an item type".to_string(),
            actual: "array".to_string(),
        })?;

        let document = ctx.runtime.document().clone();
        let entries: Vec<String> = document
            .children(&ctx.node_id)
            .into_iter()
            .filter(|child| document.prev(&child.id).is_empty())
            .map(|child| child.id.clone())
            .collect();
        if entries.is_empty() {
            tracing::debug!("Loop {} has no body entry node", ctx.node_id);
            return Ok(NodeOutput::new());
        }

        let locals = locals_id(&ctx.node_id);
        let total = items.len();
        for (index, item) in items.into_iter().enumerate() {
            if ctx.cancellation.is_cancelled() {
                return Err(NodeError::Cancelled);
            }
            tracing::debug!("Loop {} iteration {}/{}", ctx.node_id, index + 1, total);

            let iteration = ctx.runtime.sub();
            iteration.variables.set_variable(Variable::new(
                locals.clone(),
                "item",
                TypedValue::new(item, items_type),
            ));
            iteration.variables.set_variable(Variable::new(
                locals.clone(),
                "index",
                TypedValue::new(Value::from(index), VariableType::Integer),
            ));

            let result = ctx.runtime.runner().run_nodes(&iteration, &entries).await;
            iteration.dispose();
            result.map_err(|e| match e.node_error() {
                Some(NodeError::Cancelled) => NodeError::Cancelled,
                _ => NodeError::ExecutionFailed(format!("iteration {} failed: {}", index, e)),
            })?;
        }

        Ok(NodeOutput::new())
    }

    fn validate(&self, node: &Node) -> Result<(), NodeError> {
        let data: LoopData = serde_json::from_value(node.data.clone())
            .map_err(|e| NodeError::Configuration(format!("invalid loop data: {}", e)))?;
        if data.batch_for.is_none() {
            return Err(NodeError::Configuration("loop has no batchFor".to_string()));
        }
        Ok(())
    }
}

pub struct LoopNodeFactory;

impl NodeFactory for LoopNodeFactory {
    fn create(&self, _node: &Node) -> Result<Box<dyn NodeExecutor>, NodeError> {
        Ok(Box::new(LoopNode))
    }

    fn node_type(&self) -> &str {
        "loop"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Runs its body once per array item".to_string(),
            category: "flow".to_string(),
            inputs: vec![PortDefinition::required("batchFor", "Array to iterate over")],
            outputs: vec![],
        }
    }
}
