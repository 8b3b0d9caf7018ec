//! Hierarchical variable store.
//!
//! Bindings are keyed by `(node_id, key)`. A child store keeps a weak
//! back-reference to its parent: reads fall through to the parent chain,
//! writes always land locally.

use crate::value::{TypedValue, VariableType};
use crate::workflow::JsonSchema;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// A typed binding owned by one node
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub node_id: String,
    pub key: String,
    pub ty: VariableType,
    pub items_type: Option<VariableType>,
    pub value: Value,
    /// Declared schema, used to type reads below the top level
    pub schema: Option<JsonSchema>,
}

impl Variable {
    pub fn new(node_id: impl Into<String>, key: impl Into<String>, value: TypedValue) -> Self {
        Self {
            node_id: node_id.into(),
            key: key.into(),
            ty: value.ty,
            items_type: value.items_type,
            value: value.value,
            schema: None,
        }
    }

    pub fn with_schema(mut self, schema: Option<JsonSchema>) -> Self {
        self.schema = schema;
        self
    }

    fn typed(&self) -> TypedValue {
        TypedValue::new(self.value.clone(), self.ty).with_items_type(self.items_type)
    }
}

#[derive(Debug, Default)]
pub struct VariableStore {
    id: uuid::Uuid,
    store: RwLock<HashMap<String, HashMap<String, Variable>>>,
    parent: RwLock<Option<Weak<VariableStore>>>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            ..Self::default()
        }
    }

    /// A fresh store whose reads fall back to `parent`
    pub fn sub(parent: &Arc<VariableStore>) -> Self {
        let child = Self::new();
        child.set_parent(parent);
        child
    }

    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    pub fn set_parent(&self, parent: &Arc<VariableStore>) {
        *self.parent.write() = Some(Arc::downgrade(parent));
    }

    fn parent(&self) -> Option<Arc<VariableStore>> {
        self.parent.read().as_ref().and_then(Weak::upgrade)
    }

    /// Create or overwrite a local binding
    pub fn set_variable(&self, variable: Variable) {
        self.store
            .write()
            .entry(variable.node_id.clone())
            .or_default()
            .insert(variable.key.clone(), variable);
    }

    /// Write `value` at `path` inside the binding `(node_id, key)`, keeping
    /// its declared type. A binding only visible through an ancestor is
    /// copied into this store first, so the ancestor is never touched.
    pub fn set_value(&self, node_id: &str, key: &str, path: &[String], value: Value) {
        let existing = self
            .local(node_id, key)
            .or_else(|| self.parent().and_then(|p| p.lookup(node_id, key)));

        let variable = match existing {
            Some(mut variable) => {
                if path.is_empty() {
                    variable.value = value;
                } else {
                    write_path(&mut variable.value, path, value);
                }
                variable
            }
            None if path.is_empty() => Variable::new(node_id, key, TypedValue::infer(value)),
            None => {
                let mut root = Value::Object(Map::new());
                write_path(&mut root, path, value);
                Variable::new(node_id, key, TypedValue::new(root, VariableType::Object))
            }
        };
        self.set_variable(variable);
    }

    /// Resolve `(node_id, key)` and descend along `path`. Returns `None` if
    /// neither this store nor any ancestor binds the key, or the path does
    /// not exist. Nested values are typed from the binding's declared
    /// schema where it covers them, inferred otherwise.
    pub fn get_value(&self, node_id: &str, key: &str, path: &[String]) -> Option<TypedValue> {
        let variable = self.lookup(node_id, key)?;
        if path.is_empty() {
            return Some(variable.typed());
        }
        let mut current = &variable.value;
        let mut schema = variable.schema.as_ref();
        for segment in path {
            current = step(current, segment)?;
            schema = schema.and_then(|s| s.child(segment));
        }
        Some(match schema {
            Some(schema) => schema.typed(current.clone()),
            None => TypedValue::infer(current.clone()),
        })
    }

    fn lookup(&self, node_id: &str, key: &str) -> Option<Variable> {
        self.local(node_id, key)
            .or_else(|| self.parent().and_then(|p| p.lookup(node_id, key)))
    }

    fn local(&self, node_id: &str, key: &str) -> Option<Variable> {
        self.store
            .read()
            .get(node_id)
            .and_then(|vars| vars.get(key))
            .cloned()
    }

    /// Whether the binding exists in this store, ignoring ancestors
    pub fn has_local(&self, node_id: &str, key: &str) -> bool {
        self.local(node_id, key).is_some()
    }

    pub fn clear(&self) {
        self.store.write().clear();
        *self.parent.write() = None;
    }
}

fn step<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn write_path(target: &mut Value, path: &[String], value: Value) {
    let Some((segment, rest)) = path.split_first() else {
        *target = value;
        return;
    };

    if let Value::Array(items) = target {
        if let Ok(index) = segment.parse::<usize>() {
            if index >= items.len() {
                items.resize(index + 1, Value::Null);
            }
            write_path(&mut items[index], rest, value);
            return;
        }
    }

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(map) = target {
        let slot = map.entry(segment.clone()).or_insert(Value::Null);
        write_path(slot, rest, value);
    }
}
