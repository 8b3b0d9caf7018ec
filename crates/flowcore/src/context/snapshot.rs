use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Immutable audit record of one node execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: Uuid,
    pub node_id: String,
    pub inputs: HashMap<String, Value>,
    pub outputs: HashMap<String, Value>,
    pub data: Value,
    pub branch: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(node_id: impl Into<String>, data: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            node_id: node_id.into(),
            inputs: HashMap::new(),
            outputs: HashMap::new(),
            data,
            branch: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_inputs(mut self, inputs: HashMap<String, Value>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_outputs(mut self, outputs: HashMap<String, Value>, branch: Option<String>) -> Self {
        self.outputs = outputs;
        self.branch = branch;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Append-only log of snapshots, shared by a run and all its sub-contexts
#[derive(Debug, Default)]
pub struct SnapshotCenter {
    snapshots: RwLock<Vec<Snapshot>>,
}

impl SnapshotCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, snapshot: Snapshot) {
        self.snapshots.write().push(snapshot);
    }

    pub fn by_node(&self, node_id: &str) -> Vec<Snapshot> {
        self.snapshots
            .read()
            .iter()
            .filter(|s| s.node_id == node_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn export(&self) -> Vec<Snapshot> {
        self.snapshots.read().clone()
    }
}
