//! In-memory workflow graph.
//!
//! Nodes, edges and ports live in id-keyed maps owned by the [`Document`];
//! every cross reference (parent, children, prev/next, port and edge lists)
//! is stored as an id and resolved through the document.

use crate::flatten::{flat_schema, FlatSchema};
use crate::workflow::{FlowValue, JsonSchema, NodeSchema, NodeType, Position, WorkflowSchema};
use crate::WorkflowError;
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

pub const DEFAULT_INPUT_PORT: &str = "input";
pub const DEFAULT_OUTPUT_PORT: &str = "output";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    Input,
    Output,
}

impl PortDirection {
    fn as_str(self) -> &'static str {
        match self {
            PortDirection::Input => "input",
            PortDirection::Output => "output",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Port {
    pub id: String,
    /// Port name as written in the schema (`sourcePortID` / `targetPortID`)
    pub key: String,
    pub node_id: String,
    pub direction: PortDirection,
    pub edges: Vec<String>,
}

impl Port {
    pub fn make_id(node_id: &str, direction: PortDirection, key: &str) -> String {
        format!("{}:{}:{}", node_id, direction.as_str(), key)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: String,
    pub from: String,
    pub from_port: String,
    pub to: String,
    pub to_port: String,
}

/// Ids of a node's ports or edges, split by direction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Links {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

/// The parts of node data shared by every node type
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDeclare {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub inputs: Option<JsonSchema>,
    #[serde(default)]
    pub outputs: Option<JsonSchema>,
    #[serde(default)]
    pub inputs_values: BTreeMap<String, FlowValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub node_type: NodeType,
    pub declare: NodeDeclare,
    /// Raw per-type payload
    pub data: Value,
    pub position: Option<Position>,
    pub parent: Option<String>,
    pub children: Vec<String>,
    pub ports: Links,
    pub edges: Links,
    pub prev: Vec<String>,
    pub next: Vec<String>,
    pub is_branch: bool,
}

impl Node {
    fn from_schema(schema: &NodeSchema) -> Result<Self, WorkflowError> {
        let declare = match &schema.data {
            Value::Null => NodeDeclare::default(),
            data => serde_json::from_value(data.clone()).map_err(|e| {
                WorkflowError::Invalid(format!("node {} has malformed data: {}", schema.id, e))
            })?,
        };

        Ok(Self {
            id: schema.id.clone(),
            node_type: schema.node_type.clone(),
            declare,
            data: schema.data.clone(),
            position: schema.meta.as_ref().and_then(|m| m.position),
            parent: None,
            children: Vec::new(),
            ports: Links::default(),
            edges: Links::default(),
            prev: Vec::new(),
            next: Vec::new(),
            is_branch: false,
        })
    }

    pub fn title(&self) -> &str {
        self.declare.title.as_deref().unwrap_or(&self.id)
    }
}

/// Graph built from a flattened workflow schema
#[derive(Debug, Default)]
pub struct Document {
    root_id: String,
    order: Vec<String>,
    nodes: HashMap<String, Node>,
    edge_order: Vec<String>,
    edges: HashMap<String, Edge>,
    ports: HashMap<String, Port>,
}

impl Document {
    pub fn new(schema: &WorkflowSchema) -> Result<Self, WorkflowError> {
        Self::from_flat(flat_schema(schema))
    }

    pub fn from_flat(flat: FlatSchema) -> Result<Self, WorkflowError> {
        let root_id = flat
            .nodes
            .first()
            .map(|n| n.id.clone())
            .ok_or_else(|| WorkflowError::MissingNode("root".to_string()))?;

        let mut doc = Document {
            root_id,
            ..Document::default()
        };

        for schema in &flat.nodes {
            if doc.nodes.contains_key(&schema.id) {
                return Err(WorkflowError::DuplicateNode(schema.id.clone()));
            }
            doc.order.push(schema.id.clone());
            doc.nodes.insert(schema.id.clone(), Node::from_schema(schema)?);
        }

        for parent_id in doc.order.clone() {
            let Some(children) = flat.node_blocks.get(&parent_id) else {
                continue;
            };
            for child_id in children {
                if let Some(child) = doc.nodes.get_mut(child_id) {
                    child.parent = Some(parent_id.clone());
                }
            }
            if let Some(parent) = doc.nodes.get_mut(&parent_id) {
                parent.children = children.clone();
            }
        }

        for flat_edge in &flat.edges {
            doc.add_edge(&flat_edge.id, &flat_edge.schema)?;
        }

        for node in doc.nodes.values_mut() {
            node.is_branch = node.ports.outputs.len() > 1;
        }

        doc.require_single(NodeType::Start)?;
        doc.require_single(NodeType::End)?;
        doc.topological_order()?;

        tracing::debug!(
            nodes = doc.nodes.len(),
            edges = doc.edges.len(),
            "Document built"
        );
        Ok(doc)
    }

    fn add_edge(
        &mut self,
        id: &str,
        schema: &crate::workflow::EdgeSchema,
    ) -> Result<(), WorkflowError> {
        for endpoint in [&schema.source_node_id, &schema.target_node_id] {
            if !self.nodes.contains_key(endpoint) {
                return Err(WorkflowError::InvalidEdge {
                    edge: id.to_string(),
                    missing: endpoint.clone(),
                });
            }
        }
        let from = schema.source_node_id.clone();
        let to = schema.target_node_id.clone();
        let from_key = schema.source_port_id.as_deref().unwrap_or(DEFAULT_OUTPUT_PORT);
        let to_key = schema.target_port_id.as_deref().unwrap_or(DEFAULT_INPUT_PORT);

        if let Some(existing) = self.edges.get(id) {
            let same = existing.from == from
                && existing.to == to
                && existing.from_port == Port::make_id(&from, PortDirection::Output, from_key)
                && existing.to_port == Port::make_id(&to, PortDirection::Input, to_key);
            if !same {
                return Err(WorkflowError::DuplicateEdge(id.to_string()));
            }
            tracing::debug!("Ignoring repeated edge {}", id);
            return Ok(());
        }

        let from_port = self.ensure_port(&from, PortDirection::Output, from_key, id);
        let to_port = self.ensure_port(&to, PortDirection::Input, to_key, id);

        if let Some(source) = self.nodes.get_mut(&from) {
            source.edges.outputs.push(id.to_string());
            if !source.next.contains(&to) {
                source.next.push(to.clone());
            }
        }
        if let Some(target) = self.nodes.get_mut(&to) {
            target.edges.inputs.push(id.to_string());
            if !target.prev.contains(&from) {
                target.prev.push(from.clone());
            }
        }

        self.edge_order.push(id.to_string());
        self.edges.insert(
            id.to_string(),
            Edge {
                id: id.to_string(),
                from,
                from_port,
                to,
                to_port,
            },
        );
        Ok(())
    }

    /// Get or create the port, attach `edge_id` to it, and return its id.
    fn ensure_port(
        &mut self,
        node_id: &str,
        direction: PortDirection,
        key: &str,
        edge_id: &str,
    ) -> String {
        let port_id = Port::make_id(node_id, direction, key);
        let port = self.ports.entry(port_id.clone()).or_insert_with(|| Port {
            id: port_id.clone(),
            key: key.to_string(),
            node_id: node_id.to_string(),
            direction,
            edges: Vec::new(),
        });
        port.edges.push(edge_id.to_string());

        if let Some(node) = self.nodes.get_mut(node_id) {
            let ports = match direction {
                PortDirection::Input => &mut node.ports.inputs,
                PortDirection::Output => &mut node.ports.outputs,
            };
            if !ports.contains(&port_id) {
                ports.push(port_id.clone());
            }
        }
        port_id
    }

    fn require_single(&self, node_type: NodeType) -> Result<(), WorkflowError> {
        let count = self
            .children(&self.root_id)
            .into_iter()
            .filter(|n| n.node_type == node_type)
            .count();
        match count {
            0 => Err(WorkflowError::MissingNode(node_type.to_string())),
            1 => Ok(()),
            n => Err(WorkflowError::Invalid(format!(
                "expected one {} node, found {}",
                node_type, n
            ))),
        }
    }

    /// Node ids in a topological order of the edge graph
    pub fn topological_order(&self) -> Result<Vec<String>, WorkflowError> {
        let mut graph = DiGraph::<&str, ()>::new();
        let mut index = HashMap::new();
        for id in &self.order {
            index.insert(id.as_str(), graph.add_node(id.as_str()));
        }
        for edge in self.edges.values() {
            if let (Some(from), Some(to)) = (index.get(edge.from.as_str()), index.get(edge.to.as_str())) {
                graph.add_edge(*from, *to, ());
            }
        }

        let sorted = toposort(&graph, None).map_err(|_| WorkflowError::CyclicDependency)?;
        Ok(sorted.into_iter().map(|idx| graph[idx].to_string()).collect())
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn require_node(&self, id: &str) -> Result<&Node, WorkflowError> {
        self.node(id)
            .ok_or_else(|| WorkflowError::NodeNotFound(id.to_string()))
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.get(id)
    }

    pub fn port(&self, id: &str) -> Option<&Port> {
        self.ports.get(id)
    }

    /// Nodes in flatten order, root first
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edge_order.iter().filter_map(|id| self.edges.get(id))
    }

    pub fn root(&self) -> Result<&Node, WorkflowError> {
        self.node(&self.root_id)
            .ok_or_else(|| WorkflowError::MissingNode(NodeType::Root.to_string()))
    }

    pub fn start(&self) -> Result<&Node, WorkflowError> {
        self.find_top_level(NodeType::Start)
    }

    pub fn end(&self) -> Result<&Node, WorkflowError> {
        self.find_top_level(NodeType::End)
    }

    fn find_top_level(&self, node_type: NodeType) -> Result<&Node, WorkflowError> {
        self.children(&self.root_id)
            .into_iter()
            .find(|n| n.node_type == node_type)
            .ok_or_else(|| WorkflowError::MissingNode(node_type.to_string()))
    }

    pub fn children(&self, id: &str) -> Vec<&Node> {
        self.resolve(self.node(id).map(|n| n.children.as_slice()))
    }

    pub fn prev(&self, id: &str) -> Vec<&Node> {
        self.resolve(self.node(id).map(|n| n.prev.as_slice()))
    }

    pub fn next(&self, id: &str) -> Vec<&Node> {
        self.resolve(self.node(id).map(|n| n.next.as_slice()))
    }

    pub fn input_edges(&self, id: &str) -> Vec<&Edge> {
        self.node(id)
            .map(|n| n.edges.inputs.iter().filter_map(|e| self.edge(e)).collect())
            .unwrap_or_default()
    }

    pub fn output_edges(&self, id: &str) -> Vec<&Edge> {
        self.node(id)
            .map(|n| n.edges.outputs.iter().filter_map(|e| self.edge(e)).collect())
            .unwrap_or_default()
    }

    /// Key of the output port an edge leaves from
    pub fn source_port_key(&self, edge: &Edge) -> Option<&str> {
        self.port(&edge.from_port).map(|p| p.key.as_str())
    }

    fn resolve(&self, ids: Option<&[String]>) -> Vec<&Node> {
        ids.unwrap_or_default()
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .collect()
    }

    /// Drop every node, edge and port
    pub fn dispose(&mut self) {
        self.order.clear();
        self.nodes.clear();
        self.edge_order.clear();
        self.edges.clear();
        self.ports.clear();
    }
}
