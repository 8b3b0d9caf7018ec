use crate::events::{EventBus, ExecutionEvent, ExecutionId};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Log,
    Info,
    Debug,
    Error,
    Warn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub level: MessageLevel,
    pub node_id: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Messages of one run, one ordered list per severity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMessages {
    pub log: Vec<Message>,
    pub info: Vec<Message>,
    pub debug: Vec<Message>,
    pub error: Vec<Message>,
    pub warn: Vec<Message>,
}

impl WorkflowMessages {
    pub fn get(&self, level: MessageLevel) -> &[Message] {
        match level {
            MessageLevel::Log => &self.log,
            MessageLevel::Info => &self.info,
            MessageLevel::Debug => &self.debug,
            MessageLevel::Error => &self.error,
            MessageLevel::Warn => &self.warn,
        }
    }

    fn bucket_mut(&mut self, level: MessageLevel) -> &mut Vec<Message> {
        match level {
            MessageLevel::Log => &mut self.log,
            MessageLevel::Info => &mut self.info,
            MessageLevel::Debug => &mut self.debug,
            MessageLevel::Error => &mut self.error,
            MessageLevel::Warn => &mut self.warn,
        }
    }
}

/// Collects run diagnostics. Every message is mirrored to `tracing` and
/// to the event bus.
pub struct MessageCenter {
    execution_id: ExecutionId,
    messages: RwLock<WorkflowMessages>,
    events: Arc<EventBus>,
}

impl MessageCenter {
    pub fn new(execution_id: ExecutionId, events: Arc<EventBus>) -> Self {
        Self {
            execution_id,
            messages: RwLock::new(WorkflowMessages::default()),
            events,
        }
    }

    pub fn push(&self, level: MessageLevel, node_id: Option<&str>, message: impl Into<String>) {
        let message = Message {
            id: Uuid::new_v4(),
            level,
            node_id: node_id.map(str::to_string),
            message: message.into(),
            timestamp: Utc::now(),
        };

        match level {
            MessageLevel::Error => tracing::error!(node = ?message.node_id, "{}", message.message),
            MessageLevel::Warn => tracing::warn!(node = ?message.node_id, "{}", message.message),
            MessageLevel::Debug => tracing::debug!(node = ?message.node_id, "{}", message.message),
            MessageLevel::Info | MessageLevel::Log => {
                tracing::info!(node = ?message.node_id, "{}", message.message)
            }
        }

        self.events.emit(ExecutionEvent::Message {
            execution_id: self.execution_id,
            level,
            node_id: message.node_id.clone(),
            message: message.message.clone(),
            timestamp: message.timestamp,
        });
        self.messages.write().bucket_mut(level).push(message);
    }

    pub fn log(&self, node_id: Option<&str>, message: impl Into<String>) {
        self.push(MessageLevel::Log, node_id, message);
    }

    pub fn info(&self, node_id: Option<&str>, message: impl Into<String>) {
        self.push(MessageLevel::Info, node_id, message);
    }

    pub fn debug(&self, node_id: Option<&str>, message: impl Into<String>) {
        self.push(MessageLevel::Debug, node_id, message);
    }

    pub fn warn(&self, node_id: Option<&str>, message: impl Into<String>) {
        self.push(MessageLevel::Warn, node_id, message);
    }

    pub fn error(&self, node_id: Option<&str>, message: impl Into<String>) {
        self.push(MessageLevel::Error, node_id, message);
    }

    pub fn export(&self) -> WorkflowMessages {
        self.messages.read().clone()
    }
}
