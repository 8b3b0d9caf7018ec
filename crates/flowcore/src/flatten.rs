//! Flattening of nested workflow schemas.
//!
//! Containers (loops) nest their body as `blocks` and `edges`. The document
//! wants one flat node list and one flat edge list, with the container
//! hierarchy kept on the side in two maps.

use crate::workflow::{EdgeSchema, NodeSchema, NodeType, WorkflowSchema};
use serde_json::Value;
use std::collections::HashMap;

/// Edge with its derived id
#[derive(Debug, Clone, PartialEq)]
pub struct FlatEdge {
    pub id: String,
    pub schema: EdgeSchema,
}

/// Result of flattening a workflow schema
#[derive(Debug, Clone, Default)]
pub struct FlatSchema {
    /// Nodes in walk order, synthetic root first. None carry `blocks`/`edges`.
    pub nodes: Vec<NodeSchema>,
    pub edges: Vec<FlatEdge>,
    /// container id -> direct child node ids, in declaration order
    pub node_blocks: HashMap<String, Vec<String>>,
    /// container id -> ids of the edges declared inside it
    pub node_edges: HashMap<String, Vec<String>>,
}

/// Flatten `schema` without touching it.
pub fn flat_schema(schema: &WorkflowSchema) -> FlatSchema {
    let mut flat = FlatSchema::default();
    let root_id = schema.root_id().to_string();

    flat.nodes.push(NodeSchema {
        id: root_id.clone(),
        node_type: NodeType::Root,
        meta: None,
        data: Value::Null,
        blocks: None,
        edges: None,
    });
    flat.walk(&root_id, &schema.nodes, &schema.edges);
    flat
}

impl FlatSchema {
    fn walk(&mut self, container_id: &str, blocks: &[NodeSchema], edges: &[EdgeSchema]) {
        self.node_blocks.insert(
            container_id.to_string(),
            blocks.iter().map(|b| b.id.clone()).collect(),
        );
        self.nodes.extend(blocks.iter().map(strip));

        let mut edge_ids = Vec::with_capacity(edges.len());
        for edge in edges {
            let id = edge.id();
            edge_ids.push(id.clone());
            self.edges.push(FlatEdge {
                id,
                schema: edge.clone(),
            });
        }
        self.node_edges.insert(container_id.to_string(), edge_ids);

        for block in blocks.iter().filter(|b| b.is_container()) {
            self.walk(
                &block.id,
                block.blocks.as_deref().unwrap_or_default(),
                block.edges.as_deref().unwrap_or_default(),
            );
        }
    }

    pub fn node(&self, id: &str) -> Option<&NodeSchema> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

fn strip(node: &NodeSchema) -> NodeSchema {
    NodeSchema {
        id: node.id.clone(),
        node_type: node.node_type.clone(),
        meta: node.meta.clone(),
        data: node.data.clone(),
        blocks: None,
        edges: None,
    }
}
