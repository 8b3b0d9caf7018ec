use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Succeeded | Status::Failed | Status::Canceled)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEntity {
    pub status: Status,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Default for StatusEntity {
    fn default() -> Self {
        Self {
            status: Status::Pending,
            start_time: None,
            end_time: None,
        }
    }
}

impl StatusEntity {
    fn process(&mut self) {
        self.status = Status::Processing;
        self.start_time = Some(Utc::now());
        self.end_time = None;
    }

    fn finish(&mut self, status: Status) {
        self.status = status;
        self.end_time = Some(Utc::now());
    }

    pub fn terminated(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn time_cost_ms(&self) -> Option<i64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

/// Workflow and per-node status tracking
#[derive(Debug, Default)]
pub struct StatusCenter {
    workflow: RwLock<StatusEntity>,
    nodes: RwLock<HashMap<String, StatusEntity>>,
}

impl StatusCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workflow(&self) -> StatusEntity {
        self.workflow.read().clone()
    }

    pub fn workflow_status(&self) -> Status {
        self.workflow.read().status
    }

    pub fn process_workflow(&self) {
        let mut workflow = self.workflow.write();
        if workflow.status == Status::Pending {
            workflow.process();
        }
    }

    /// Move the workflow into a terminal state. Terminal states are sticky:
    /// returns `false` if the workflow already finished.
    pub fn finish_workflow(&self, status: Status) -> bool {
        let mut workflow = self.workflow.write();
        if workflow.terminated() {
            return false;
        }
        if workflow.start_time.is_none() {
            workflow.start_time = Some(Utc::now());
        }
        workflow.finish(status);
        true
    }

    pub fn node(&self, node_id: &str) -> Option<StatusEntity> {
        self.nodes.read().get(node_id).cloned()
    }

    pub fn node_status(&self, node_id: &str) -> Status {
        self.node(node_id).map(|n| n.status).unwrap_or(Status::Pending)
    }

    /// Nodes inside a loop body re-enter `Processing` on every iteration.
    pub fn process_node(&self, node_id: &str) {
        self.nodes
            .write()
            .entry(node_id.to_string())
            .or_default()
            .process();
    }

    pub fn finish_node(&self, node_id: &str, status: Status) {
        self.nodes
            .write()
            .entry(node_id.to_string())
            .or_default()
            .finish(status);
    }

    pub fn export_nodes(&self) -> HashMap<String, StatusEntity> {
        self.nodes.read().clone()
    }
}
