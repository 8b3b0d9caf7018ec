//! Condition node: ordered clauses, the first one that holds selects the
//! output port to follow.

mod handlers;
pub mod rules;

pub use handlers::evaluate;
pub use rules::{expected_right, Operator, RightOperand};

use async_trait::async_trait;
use flowcore::{FlowValue, Node, NodeContext, NodeError, NodeExecutor, NodeOutput, TypedValue};
use flowruntime::{NodeFactory, NodeMetadata};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionData {
    pub conditions: Vec<ConditionClause>,
}

/// One clause; `key` names the output port taken when it holds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionClause {
    pub key: String,
    pub value: ClauseExpr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClauseExpr {
    #[serde(default)]
    pub left: Option<FlowValue>,
    pub operator: Operator,
    #[serde(default)]
    pub right: Option<FlowValue>,
}

pub struct ConditionNode;

impl ConditionNode {
    /// Evaluate a single clause. `None` when the clause does not apply to
    /// its operands and is skipped.
    fn check(&self, ctx: &NodeContext, clause: &ConditionClause) -> Option<bool> {
        let expr = &clause.value;
        let left = expr
            .left
            .as_ref()
            .and_then(|v| ctx.runtime.resolve_flow_value(v))
            .unwrap_or_else(TypedValue::null);
        let right = expr
            .right
            .as_ref()
            .and_then(|v| ctx.runtime.resolve_flow_value(v))
            .unwrap_or_else(TypedValue::null);

        let Some(rule) = expected_right(left.ty, expr.operator) else {
            tracing::warn!(
                "Condition {} clause '{}': operator {} not applicable to {}, skipping",
                ctx.node_id,
                clause.key,
                expr.operator,
                left.ty
            );
            return None;
        };
        if !rule.accepts(right.ty) {
            tracing::warn!(
                "Condition {} clause '{}': right operand type {} does not match, skipping",
                ctx.node_id,
                clause.key,
                right.ty
            );
            return None;
        }

        Some(evaluate(&left, expr.operator, &right))
    }
}

#[async_trait]
impl NodeExecutor for ConditionNode {
    fn node_type(&self) -> &str {
        "condition"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let data: ConditionData = ctx.parse_data()?;

        let branch = data
            .conditions
            .iter()
            .find(|clause| self.check(&ctx, clause) == Some(true))
            .map(|clause| clause.key.clone());

        match &branch {
            Some(key) => tracing::debug!("Condition {} selected branch '{}'", ctx.node_id, key),
            None => ctx
                .runtime
                .messages
                .info(Some(&ctx.node_id), "no condition matched, nothing downstream runs"),
        }

        Ok(NodeOutput::new().with_branch(branch))
    }

    fn is_branching(&self) -> bool {
        true
    }

    fn validate(&self, node: &Node) -> Result<(), NodeError> {
        serde_json::from_value::<ConditionData>(node.data.clone())
            .map(|_| ())
            .map_err(|e| NodeError::Configuration(format!("invalid condition data: {}", e)))
    }
}

pub struct ConditionNodeFactory;

impl NodeFactory for ConditionNodeFactory {
    fn create(&self, _node: &Node) -> Result<Box<dyn NodeExecutor>, NodeError> {
        Ok(Box::new(ConditionNode))
    }

    fn node_type(&self) -> &str {
        "condition"
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Routes to the port of the first clause that holds".to_string(),
            category: "flow".to_string(),
            inputs: vec![],
            outputs: vec![],
        }
    }
}
