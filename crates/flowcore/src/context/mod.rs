//! Per-run execution context.
//!
//! One context per workflow run, plus one child per loop iteration. A child
//! gets its own variable scope and resolution state and shares everything
//! else (status, snapshots, io, messages, cancellation) with its parent.

mod io;
mod message;
mod report;
mod snapshot;
mod state;
mod status;

pub use io::IoCenter;
pub use message::{Message, MessageCenter, MessageLevel, WorkflowMessages};
pub use report::{NodeReport, Report, Reporter};
pub use snapshot::{Snapshot, SnapshotCenter};
pub use state::{EdgeState, ResolutionState};
pub use status::{Status, StatusCenter, StatusEntity};

use crate::document::{Document, Node};
use crate::events::{EventBus, ExecutionEvent, ExecutionId};
use crate::node::NodeRunner;
use crate::value::TypedValue;
use crate::variable::{Variable, VariableStore};
use crate::workflow::FlowValue;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// `{{node.key}}` or `{{node.key.path.to.field}}`
static TEMPLATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([\w\-]+(?:\.[\w\-]+)+)\s*\}\}").unwrap());

#[derive(Clone)]
pub struct ExecutionContext {
    id: Uuid,
    execution_id: ExecutionId,
    document: Arc<Document>,
    pub variables: Arc<VariableStore>,
    pub io: Arc<IoCenter>,
    pub status: Arc<StatusCenter>,
    pub snapshots: Arc<SnapshotCenter>,
    pub messages: Arc<MessageCenter>,
    pub state: Arc<ResolutionState>,
    events: Arc<EventBus>,
    runner: Arc<dyn NodeRunner>,
    cancellation: CancellationToken,
}

impl ExecutionContext {
    pub fn new(
        document: Arc<Document>,
        inputs: HashMap<String, Value>,
        runner: Arc<dyn NodeRunner>,
        events: Arc<EventBus>,
    ) -> Self {
        let execution_id = ExecutionId::new_v4();
        Self {
            id: execution_id,
            execution_id,
            document,
            variables: Arc::new(VariableStore::new()),
            io: Arc::new(IoCenter::new(inputs)),
            status: Arc::new(StatusCenter::new()),
            snapshots: Arc::new(SnapshotCenter::new()),
            messages: Arc::new(MessageCenter::new(execution_id, events.clone())),
            state: Arc::new(ResolutionState::new()),
            events,
            runner,
            cancellation: CancellationToken::new(),
        }
    }

    /// Child context: fresh variable scope reading through to this one,
    /// fresh resolution state, everything else shared.
    pub fn sub(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            execution_id: self.execution_id,
            document: self.document.clone(),
            variables: Arc::new(VariableStore::sub(&self.variables)),
            io: self.io.clone(),
            status: self.status.clone(),
            snapshots: self.snapshots.clone(),
            messages: self.messages.clone(),
            state: Arc::new(ResolutionState::new()),
            events: self.events.clone(),
            runner: self.runner.clone(),
            cancellation: self.cancellation.child_token(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Id of the run this context belongs to (shared by sub-contexts)
    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    pub fn runner(&self) -> &Arc<dyn NodeRunner> {
        &self.runner
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_canceled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn emit(&self, event: ExecutionEvent) {
        self.events.emit(event);
    }

    /// Cancel the run: workflow status goes to `Canceled` unless it already
    /// finished, and the cancellation token fires.
    pub fn cancel(&self) {
        if self.status.finish_workflow(Status::Canceled) {
            self.messages.info(None, "workflow canceled");
        }
        self.cancellation.cancel();
    }

    pub fn reporter(&self) -> Reporter {
        Reporter::new(
            self.execution_id,
            self.io.clone(),
            self.status.clone(),
            self.snapshots.clone(),
            self.messages.clone(),
        )
    }

    pub fn report(&self) -> crate::context::Report {
        self.reporter().report()
    }

    /// Resolve a value slot against this context's variables
    pub fn resolve_flow_value(&self, value: &FlowValue) -> Option<TypedValue> {
        match value {
            FlowValue::Constant { content, schema } => Some(match schema {
                Some(schema) => schema.typed(content.clone()),
                None => TypedValue::infer(content.clone()),
            }),
            FlowValue::Ref { content } => {
                let (node_id, rest) = content.split_first()?;
                let (key, path) = rest.split_first()?;
                self.variables.get_value(node_id, key, path)
            }
            FlowValue::Template { content } => Some(TypedValue::from(self.render_template(content))),
        }
    }

    /// Resolve every declared `inputsValues` entry of `node`. Constants take
    /// their type from the node's declared inputs schema; unresolved refs
    /// are left out.
    pub fn resolve_typed_inputs(&self, node: &Node) -> HashMap<String, TypedValue> {
        let declared = node.declare.inputs.as_ref();
        node.declare
            .inputs_values
            .iter()
            .filter_map(|(key, value)| {
                let resolved = match (value, declared.and_then(|s| s.property(key))) {
                    (FlowValue::Constant { content, schema: None }, Some(schema)) => {
                        Some(schema.typed(content.clone()))
                    }
                    _ => self.resolve_flow_value(value),
                };
                resolved.map(|v| (key.clone(), v))
            })
            .collect()
    }

    pub fn resolve_inputs(&self, node: &Node) -> HashMap<String, Value> {
        self.resolve_typed_inputs(node)
            .into_iter()
            .map(|(key, typed)| (key, typed.value))
            .collect()
    }

    /// Store a node's outputs under its id, typed by its declared outputs
    pub fn set_node_outputs(&self, node: &Node, outputs: &HashMap<String, Value>) {
        let declared = node.declare.outputs.as_ref();
        for (key, value) in outputs {
            let schema = declared.and_then(|s| s.property(key));
            let typed = match schema {
                Some(schema) => schema.typed(value.clone()),
                None => TypedValue::infer(value.clone()),
            };
            self.variables.set_variable(
                Variable::new(node.id.clone(), key.clone(), typed).with_schema(schema.cloned()),
            );
        }
    }

    /// Replace `{{node.key.path}}` placeholders with variable values.
    /// Unresolved placeholders render empty.
    pub fn render_template(&self, template: &str) -> String {
        TEMPLATE_PATTERN
            .replace_all(template, |caps: &regex::Captures| {
                let segments: Vec<String> = caps[1].split('.').map(str::to_string).collect();
                match self.variables.get_value(&segments[0], &segments[1], &segments[2..]) {
                    Some(typed) => display_value(&typed.value),
                    None => {
                        tracing::debug!(placeholder = &caps[0], "unresolved template placeholder");
                        String::new()
                    }
                }
            })
            .into_owned()
    }

    /// Drop variable bindings and resolution state. Report data is kept.
    pub fn dispose(&self) {
        self.variables.clear();
        self.state.clear();
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
