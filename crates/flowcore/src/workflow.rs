use crate::value::{TypedValue, VariableType};
use crate::FlowError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Id of the synthetic container wrapping the top level of a schema
pub const ROOT_NODE_ID: &str = "root";

/// Complete workflow definition, as produced by the editor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub nodes: Vec<NodeSchema>,
    #[serde(default)]
    pub edges: Vec<EdgeSchema>,
}

impl WorkflowSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: NodeSchema) -> String {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    pub fn connect(&mut self, edge: EdgeSchema) {
        self.edges.push(edge);
    }

    /// Find a top-level node by id (nested blocks are not searched)
    pub fn find_node(&self, id: &str) -> Option<&NodeSchema> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn root_id(&self) -> &str {
        self.id.as_deref().unwrap_or(ROOT_NODE_ID)
    }

    pub fn from_json(raw: &str) -> Result<Self, FlowError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Load a workflow saved as JSON
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FlowError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }
}

/// Node type tag. Built-ins are a closed set; anything else is a domain
/// type resolved through the executor registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    Root,
    Start,
    End,
    Condition,
    Loop,
    Llm,
    Custom(String),
}

impl NodeType {
    pub fn as_str(&self) -> &str {
        match self {
            NodeType::Root => "root",
            NodeType::Start => "start",
            NodeType::End => "end",
            NodeType::Condition => "condition",
            NodeType::Loop => "loop",
            NodeType::Llm => "llm",
            NodeType::Custom(tag) => tag,
        }
    }
}

impl From<&str> for NodeType {
    fn from(tag: &str) -> Self {
        match tag {
            "root" => NodeType::Root,
            "start" => NodeType::Start,
            "end" => NodeType::End,
            "condition" => NodeType::Condition,
            "loop" => NodeType::Loop,
            "llm" => NodeType::Llm,
            other => NodeType::Custom(other.to_string()),
        }
    }
}

impl From<String> for NodeType {
    fn from(tag: String) -> Self {
        NodeType::from(tag.as_str())
    }
}

impl From<NodeType> for String {
    fn from(ty: NodeType) -> Self {
        ty.as_str().to_string()
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node definition in a workflow. Containers (loops) carry their body
/// in `blocks` and the body's connections in `edges`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSchema {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<NodeMeta>,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<NodeSchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edges: Option<Vec<EdgeSchema>>,
}

impl NodeSchema {
    pub fn new(id: impl Into<String>, node_type: impl Into<NodeType>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            meta: None,
            data: Value::Null,
            blocks: None,
            edges: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.meta = Some(NodeMeta {
            position: Some(Position { x, y }),
        });
        self
    }

    pub fn with_blocks(mut self, blocks: Vec<NodeSchema>, edges: Vec<EdgeSchema>) -> Self {
        self.blocks = Some(blocks);
        self.edges = Some(edges);
        self
    }

    pub fn is_container(&self) -> bool {
        self.blocks.is_some() || self.edges.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

/// Node position in visual editor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Connection between two node ports
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeSchema {
    #[serde(rename = "sourceNodeID")]
    pub source_node_id: String,
    #[serde(rename = "targetNodeID")]
    pub target_node_id: String,
    #[serde(rename = "sourcePortID", default, skip_serializing_if = "Option::is_none")]
    pub source_port_id: Option<String>,
    #[serde(rename = "targetPortID", default, skip_serializing_if = "Option::is_none")]
    pub target_port_id: Option<String>,
}

impl EdgeSchema {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source_node_id: source.into(),
            target_node_id: target.into(),
            source_port_id: None,
            target_port_id: None,
        }
    }

    pub fn from_port(mut self, port: impl Into<String>) -> Self {
        self.source_port_id = Some(port.into());
        self
    }

    pub fn to_port(mut self, port: impl Into<String>) -> Self {
        self.target_port_id = Some(port.into());
        self
    }

    /// `source[:sourcePort]-target[:targetPort]`, with `\`, `:` and `-`
    /// inside each part escaped by a backslash. Distinct endpoints never
    /// share an id.
    pub fn id(&self) -> String {
        let mut id = escape_id(&self.source_node_id);
        if let Some(port) = &self.source_port_id {
            id.push(':');
            id.push_str(&escape_id(port));
        }
        id.push('-');
        id.push_str(&escape_id(&self.target_node_id));
        if let Some(port) = &self.target_port_id {
            id.push(':');
            id.push_str(&escape_id(port));
        }
        id
    }
}

fn escape_id(part: &str) -> String {
    let mut escaped = String::with_capacity(part.len());
    for c in part.chars() {
        if matches!(c, '\\' | ':' | '-') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// A value slot in node data: a literal, a reference to another node's
/// variable, or a string template over variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FlowValue {
    Constant {
        content: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        schema: Option<JsonSchema>,
    },
    Ref {
        content: Vec<String>,
    },
    Template {
        content: String,
    },
}

impl FlowValue {
    pub fn constant(content: impl Into<Value>) -> Self {
        FlowValue::Constant {
            content: content.into(),
            schema: None,
        }
    }

    pub fn reference<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FlowValue::Ref {
            content: path.into_iter().map(Into::into).collect(),
        }
    }

    pub fn template(content: impl Into<String>) -> Self {
        FlowValue::Template {
            content: content.into(),
        }
    }
}

/// The subset of JSON schema used to declare node inputs and outputs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonSchema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, JsonSchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<JsonSchema>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl JsonSchema {
    pub fn of(ty: VariableType) -> Self {
        Self {
            ty: Some(ty.as_str().to_string()),
            ..Self::default()
        }
    }

    pub fn variable_type(&self) -> Option<VariableType> {
        self.ty
            .as_deref()
            .and_then(|ty| VariableType::from_schema(ty, self.format.as_deref()))
    }

    pub fn items_type(&self) -> Option<VariableType> {
        self.items.as_ref().and_then(|items| items.variable_type())
    }

    pub fn property(&self, key: &str) -> Option<&JsonSchema> {
        self.properties.as_ref().and_then(|props| props.get(key))
    }

    /// Schema one path segment down: a declared property, or the item
    /// schema of an array
    pub fn child(&self, segment: &str) -> Option<&JsonSchema> {
        self.property(segment).or_else(|| match self.variable_type() {
            Some(VariableType::Array) => self.items.as_deref(),
            _ => None,
        })
    }

    /// Type `value` with this schema, falling back to inference for
    /// whatever the schema leaves undeclared.
    pub fn typed(&self, value: Value) -> TypedValue {
        let inferred = TypedValue::infer(value);
        let ty = self.variable_type().unwrap_or(inferred.ty);
        let items_type = self.items_type().or(inferred.items_type);
        TypedValue::new(inferred.value, ty).with_items_type(items_type)
    }
}
