use super::{IoCenter, MessageCenter, Snapshot, SnapshotCenter, Status, StatusCenter, StatusEntity, WorkflowMessages};
use crate::events::ExecutionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeReport {
    pub id: String,
    pub status: Status,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub time_cost: Option<i64>,
    pub snapshots: Vec<Snapshot>,
}

/// Exportable summary of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: ExecutionId,
    pub inputs: HashMap<String, Value>,
    pub outputs: HashMap<String, Value>,
    pub workflow_status: StatusEntity,
    pub reports: HashMap<String, NodeReport>,
    pub messages: WorkflowMessages,
}

impl Report {
    pub fn node(&self, node_id: &str) -> Option<&NodeReport> {
        self.reports.get(node_id)
    }
}

/// Read-only view assembling a [`Report`] from the shared centers
#[derive(Clone)]
pub struct Reporter {
    id: ExecutionId,
    io: Arc<IoCenter>,
    status: Arc<StatusCenter>,
    snapshots: Arc<SnapshotCenter>,
    messages: Arc<MessageCenter>,
}

impl Reporter {
    pub fn new(
        id: ExecutionId,
        io: Arc<IoCenter>,
        status: Arc<StatusCenter>,
        snapshots: Arc<SnapshotCenter>,
        messages: Arc<MessageCenter>,
    ) -> Self {
        Self {
            id,
            io,
            status,
            snapshots,
            messages,
        }
    }

    pub fn report(&self) -> Report {
        let mut by_node: HashMap<String, Vec<Snapshot>> = HashMap::new();
        for snapshot in self.snapshots.export() {
            by_node
                .entry(snapshot.node_id.clone())
                .or_default()
                .push(snapshot);
        }

        let reports = self
            .status
            .export_nodes()
            .into_iter()
            .map(|(node_id, entity)| {
                let report = NodeReport {
                    id: node_id.clone(),
                    status: entity.status,
                    start_time: entity.start_time,
                    end_time: entity.end_time,
                    time_cost: entity.time_cost_ms(),
                    snapshots: by_node.remove(&node_id).unwrap_or_default(),
                };
                (node_id, report)
            })
            .collect();

        Report {
            id: self.id,
            inputs: self.io.inputs(),
            outputs: self.io.outputs(),
            workflow_status: self.status.workflow(),
            reports,
            messages: self.messages.export(),
        }
    }
}
