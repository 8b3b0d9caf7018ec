use flowcore::{ExecutionContext, ExecutionId, FlowError, Report, Status};
use serde_json::Value;
use std::collections::HashMap;
use tokio::task::JoinHandle;

/// Handle on a running workflow
pub struct Task {
    context: ExecutionContext,
    handle: JoinHandle<Result<HashMap<String, Value>, FlowError>>,
}

impl Task {
    pub(crate) fn new(
        context: ExecutionContext,
        handle: JoinHandle<Result<HashMap<String, Value>, FlowError>>,
    ) -> Self {
        Self { context, handle }
    }

    pub fn id(&self) -> ExecutionId {
        self.context.execution_id()
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn status(&self) -> Status {
        self.context.status.workflow_status()
    }

    pub fn report(&self) -> Report {
        self.context.report()
    }

    /// Stop dispatching new nodes. Executors see the cancellation through
    /// their token; the run resolves with whatever outputs exist so far.
    pub fn cancel(&self) {
        tracing::info!("Canceling workflow {}", self.id());
        self.context.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the run to finish and return the workflow outputs
    pub async fn wait(self) -> Result<HashMap<String, Value>, FlowError> {
        self.handle
            .await
            .map_err(|e| FlowError::Execution(format!("Task join error: {}", e)))?
    }
}
