use crate::registry::NodeRegistry;
use crate::runtime::{JoinPolicy, RuntimeConfig};
use async_trait::async_trait;
use chrono::Utc;
use flowcore::context::{EdgeState, Snapshot};
use flowcore::{
    Document, ExecutionContext, ExecutionEvent, ExecutionId, FlowError, Node, NodeContext,
    NodeError, NodeExecutor, NodeRunner, NodeType, Report, Status,
};
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};

/// Walks a workflow document, dispatching nodes to their executors
pub struct WorkflowEngine {
    registry: Arc<NodeRegistry>,
    config: RuntimeConfig,
}

/// What a finished node hands back to the scheduler
struct NodeOutcome {
    node_id: String,
    taken: Vec<String>,
    is_end: bool,
}

enum Readiness {
    Wait,
    Ready,
    Skip,
}

impl WorkflowEngine {
    pub fn new(registry: Arc<NodeRegistry>, config: RuntimeConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Run a whole workflow in `ctx`, starting from its Start node, and
    /// settle the workflow status. Resolves with the workflow outputs.
    pub async fn execute(&self, ctx: ExecutionContext) -> Result<HashMap<String, Value>, FlowError> {
        let execution_id = ctx.execution_id();
        let start_time = Instant::now();

        ctx.status.process_workflow();
        ctx.emit(ExecutionEvent::WorkflowStarted {
            execution_id,
            timestamp: Utc::now(),
        });
        tracing::info!("Starting workflow execution: {}", execution_id);

        let result = match ctx.document().start() {
            Ok(start) => {
                let entry = [start.id.clone()];
                self.schedule(&ctx, &entry).await
            }
            Err(e) => Err(e.into()),
        };

        let result = if ctx.is_canceled() {
            tracing::info!("Workflow {} canceled", execution_id);
            Ok(ctx.io.outputs())
        } else {
            match result {
                Ok(()) => {
                    ctx.status.finish_workflow(Status::Succeeded);
                    Ok(ctx.io.outputs())
                }
                Err(e) => {
                    ctx.status.finish_workflow(Status::Failed);
                    ctx.messages.error(None, format!("workflow failed: {}", e));
                    Err(e)
                }
            }
        };

        ctx.emit(ExecutionEvent::WorkflowCompleted {
            execution_id,
            status: ctx.status.workflow_status(),
            duration_ms: start_time.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        });
        ctx.dispose();
        result
    }

    /// Run `entries` and everything they activate inside `ctx`
    async fn schedule(&self, ctx: &ExecutionContext, entries: &[String]) -> Result<(), FlowError> {
        let document = ctx.document().clone();
        let mut ready: VecDeque<String> = entries.iter().cloned().collect();
        let mut running = FuturesUnordered::new();
        let mut end_reached = false;
        let max_parallel = self.config.max_parallel_nodes.max(1);

        loop {
            if ctx.is_canceled() {
                tracing::debug!("Context {} canceled, halting dispatch", ctx.id());
                return Ok(());
            }

            while running.len() < max_parallel {
                let Some(node_id) = ready.pop_front() else {
                    break;
                };
                if !ctx.state.try_begin(&node_id) {
                    tracing::debug!("Node {} already resolved in this context", node_id);
                    continue;
                }
                running.push(self.execute_node(ctx, node_id));
            }

            if running.is_empty() {
                break;
            }

            let outcome = tokio::select! {
                biased;
                _ = ctx.cancellation().cancelled() => return Ok(()),
                Some(result) = running.next() => result?,
                else => break,
            };

            if end_reached {
                continue;
            }
            if outcome.is_end {
                tracing::debug!("End node {} reached, draining in-flight nodes", outcome.node_id);
                end_reached = true;
                ready.clear();
                continue;
            }
            self.propagate(ctx, &document, &outcome, &mut ready);
        }

        Ok(())
    }

    /// Resolve the finished node's outgoing edges and queue every successor
    /// that became ready. Successors that can no longer be reached are
    /// skipped, and the skip travels down their own edges.
    fn propagate(
        &self,
        ctx: &ExecutionContext,
        document: &Document,
        outcome: &NodeOutcome,
        ready: &mut VecDeque<String>,
    ) {
        let mut pending = VecDeque::new();
        for edge in document.output_edges(&outcome.node_id) {
            let state = if outcome.taken.contains(&edge.id) {
                EdgeState::Taken
            } else {
                EdgeState::Skipped
            };
            ctx.state.set_edge(&edge.id, state);
            pending.push_back(edge.to.clone());
        }

        while let Some(target) = pending.pop_front() {
            if ctx.state.is_settled(&target) || ready.contains(&target) {
                continue;
            }
            match self.readiness(ctx, document, &target) {
                Readiness::Wait => {}
                Readiness::Ready => ready.push_back(target),
                Readiness::Skip => {
                    if !ctx.state.mark_skipped(&target) {
                        continue;
                    }
                    tracing::debug!("Skipping node {}: no live incoming edge", target);
                    ctx.emit(ExecutionEvent::NodeSkipped {
                        execution_id: ctx.execution_id(),
                        node_id: target.clone(),
                        timestamp: Utc::now(),
                    });
                    for edge in document.output_edges(&target) {
                        ctx.state.set_edge(&edge.id, EdgeState::Skipped);
                        pending.push_back(edge.to.clone());
                    }
                }
            }
        }
    }

    fn readiness(&self, ctx: &ExecutionContext, document: &Document, node_id: &str) -> Readiness {
        let states: Vec<EdgeState> = document
            .input_edges(node_id)
            .iter()
            .map(|edge| ctx.state.edge(&edge.id))
            .collect();
        let any_taken = states.contains(&EdgeState::Taken);
        let any_pending = states.contains(&EdgeState::Pending);

        match self.config.join_policy {
            JoinPolicy::WaitAll if any_pending => Readiness::Wait,
            JoinPolicy::WaitAll if any_taken => Readiness::Ready,
            JoinPolicy::FirstArrival if any_taken => Readiness::Ready,
            JoinPolicy::FirstArrival if any_pending => Readiness::Wait,
            _ => Readiness::Skip,
        }
    }

    async fn execute_node(&self, ctx: &ExecutionContext, node_id: String) -> Result<NodeOutcome, FlowError> {
        let node = ctx.document().require_node(&node_id)?;

        ctx.status.process_node(&node.id);
        ctx.emit(ExecutionEvent::NodeStarted {
            execution_id: ctx.execution_id(),
            node_id: node.id.clone(),
            node_type: node.node_type.to_string(),
            timestamp: Utc::now(),
        });
        tracing::debug!("Starting node: {} ({})", node.id, node.node_type);

        let inputs = ctx.resolve_inputs(node);
        let executor = match self.registry.create_executor(node) {
            Ok(executor) => executor,
            Err(e) => {
                self.record_failure(ctx, node, inputs, &e.to_string());
                return Err(e);
            }
        };

        let start = Instant::now();
        let node_ctx = NodeContext::new(node, inputs.clone(), ctx.clone());
        let result = match self.config.node_timeout_ms {
            Some(millis) => timeout(Duration::from_millis(millis), executor.execute(node_ctx))
                .await
                .unwrap_or(Err(NodeError::Timeout { millis })),
            None => executor.execute(node_ctx).await,
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        if ctx.is_canceled() {
            ctx.status.finish_node(&node.id, Status::Canceled);
            return Ok(NodeOutcome {
                node_id,
                taken: Vec::new(),
                is_end: false,
            });
        }

        match result {
            Ok(output) => {
                tracing::info!("Node {} completed in {}ms", node.id, duration_ms);

                ctx.set_node_outputs(node, &output.outputs);
                ctx.snapshots.record(
                    Snapshot::new(node.id.clone(), node.data.clone())
                        .with_inputs(inputs)
                        .with_outputs(output.outputs.clone(), output.branch.clone()),
                );
                ctx.status.finish_node(&node.id, Status::Succeeded);
                ctx.emit(ExecutionEvent::NodeCompleted {
                    execution_id: ctx.execution_id(),
                    node_id: node.id.clone(),
                    outputs: output.outputs.clone(),
                    branch: output.branch.clone(),
                    duration_ms,
                    timestamp: Utc::now(),
                });

                let taken = self.select_edges(ctx, node, executor.as_ref(), output.branch.as_deref());
                Ok(NodeOutcome {
                    node_id,
                    taken,
                    is_end: node.node_type == NodeType::End,
                })
            }
            Err(e) => {
                self.record_failure(ctx, node, inputs, &e.to_string());
                Err(FlowError::node(node_id, e))
            }
        }
    }

    /// Edges a finished node propagates along
    fn select_edges(
        &self,
        ctx: &ExecutionContext,
        node: &Node,
        executor: &dyn NodeExecutor,
        branch: Option<&str>,
    ) -> Vec<String> {
        if node.node_type == NodeType::End {
            return Vec::new();
        }
        let document = ctx.document();
        let edges = document.output_edges(&node.id);

        match branch {
            Some(branch) => {
                let taken: Vec<String> = edges
                    .iter()
                    .filter(|edge| document.source_port_key(edge) == Some(branch))
                    .map(|edge| edge.id.clone())
                    .collect();
                if taken.is_empty() && !edges.is_empty() {
                    ctx.messages.warn(
                        Some(&node.id),
                        format!("branch '{}' matches no output port", branch),
                    );
                }
                taken
            }
            None if executor.is_branching() => Vec::new(),
            None => edges.iter().map(|edge| edge.id.clone()).collect(),
        }
    }

    fn record_failure(&self, ctx: &ExecutionContext, node: &Node, inputs: HashMap<String, Value>, error: &str) {
        ctx.status.finish_node(&node.id, Status::Failed);
        if ctx.is_canceled() {
            return;
        }
        ctx.snapshots.record(
            Snapshot::new(node.id.clone(), node.data.clone())
                .with_inputs(inputs)
                .with_error(error),
        );
        ctx.messages.error(Some(&node.id), format!("node failed: {}", error));
        ctx.emit(ExecutionEvent::NodeFailed {
            execution_id: ctx.execution_id(),
            node_id: node.id.clone(),
            error: error.to_string(),
            timestamp: Utc::now(),
        });
    }
}

#[async_trait]
impl NodeRunner for WorkflowEngine {
    async fn run_nodes(&self, context: &ExecutionContext, node_ids: &[String]) -> Result<(), FlowError> {
        self.schedule(context, node_ids).await
    }
}

/// Result of workflow execution
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub execution_id: ExecutionId,
    pub outputs: HashMap<String, Value>,
    pub report: Report,
}
