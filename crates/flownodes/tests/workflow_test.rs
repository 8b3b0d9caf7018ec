mod common;

use common::{constant, edge, node, reference, runtime, runtime_with, MockClient};
use flowcore::{
    ExecutionEvent, FlowError, NodeError, Status, WorkflowError, WorkflowSchema,
};
use flowruntime::{JoinPolicy, RuntimeConfig};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

fn inputs(value: Value) -> HashMap<String, Value> {
    serde_json::from_value(value).unwrap()
}

fn llm_schema() -> WorkflowSchema {
    let mut schema = WorkflowSchema::new();
    schema.add_node(node("start_0", "start", json!({})));
    schema.add_node(node(
        "end_0",
        "end",
        json!({ "inputsValues": { "answer": reference("llm_0", "result") } }),
    ));
    schema.add_node(node(
        "llm_0",
        "llm",
        json!({
            "inputsValues": {
                "modelName": constant(json!("test-model")),
                "apiKey": constant(json!("sk-test")),
                "apiHost": constant(json!("http://localhost:1")),
                "temperature": constant(json!(0.5)),
                "prompt": { "type": "template", "content": "Tell me about {{start_0.topic}}" }
            }
        }),
    ));
    schema.connect(edge("start_0", "llm_0"));
    schema.connect(edge("llm_0", "end_0"));
    schema
}

/// start -> a, start -> b, a -> join, b -> join, join -> end
fn diamond(a_data: Value, b_data: Value) -> WorkflowSchema {
    let mut schema = WorkflowSchema::new();
    schema.add_node(node("start_0", "start", json!({})));
    schema.add_node(node("a", "record", a_data));
    schema.add_node(node("b", "record", b_data));
    schema.add_node(node("join", "record", json!({})));
    schema.add_node(node(
        "end_0",
        "end",
        json!({ "inputsValues": { "joined": reference("join", "visited") } }),
    ));
    schema.connect(edge("start_0", "a"));
    schema.connect(edge("start_0", "b"));
    schema.connect(edge("a", "join"));
    schema.connect(edge("b", "join"));
    schema.connect(edge("join", "end_0"));
    schema
}

#[tokio::test]
async fn test_linear_llm_workflow() {
    let (runtime, harness) = runtime();
    let schema = llm_schema();

    let document = runtime.validate(&schema).unwrap();
    let ids: Vec<&str> = document.nodes().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["root", "start_0", "end_0", "llm_0"]);

    let result = runtime
        .execute(&schema, inputs(json!({ "topic": "rust" })))
        .await
        .unwrap();

    assert_eq!(result.outputs, inputs(json!({ "answer": "echo: Tell me about rust" })));
    assert_eq!(result.report.workflow_status.status, Status::Succeeded);
    assert_eq!(result.report.outputs, result.outputs);

    let requests = harness.client.requests.lock();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "test-model");
    assert_eq!(requests[0].temperature, 0.5);
}

#[tokio::test]
async fn test_every_node_runs_exactly_once() {
    let (runtime, harness) = runtime();
    let schema = diamond(json!({}), json!({}));

    let result = runtime.execute(&schema, HashMap::new()).await.unwrap();

    for id in ["a", "b", "join"] {
        assert_eq!(harness.count(id), 1, "{} ran more than once", id);
    }
    let log = harness.log();
    assert_eq!(log.last().map(String::as_str), Some("join"));
    assert_eq!(result.outputs, inputs(json!({ "joined": "join" })));
    for id in ["start_0", "a", "b", "join", "end_0"] {
        let report = result.report.node(id).unwrap();
        assert_eq!(report.status, Status::Succeeded);
        assert_eq!(report.snapshots.len(), 1);
    }
}

#[tokio::test]
async fn test_hyphenated_node_ids_run_every_branch() {
    let (runtime, harness) = runtime();
    let mut schema = WorkflowSchema::new();
    schema.add_node(node("start_0", "start", json!({})));
    for id in ["x", "x-y", "y-z", "z"] {
        schema.add_node(node(id, "record", json!({})));
    }
    schema.add_node(node(
        "end_0",
        "end",
        json!({
            "inputsValues": {
                "left": reference("z", "visited"),
                "right": reference("y-z", "visited")
            }
        }),
    ));
    schema.connect(edge("start_0", "x"));
    schema.connect(edge("start_0", "x-y"));
    schema.connect(edge("x-y", "z"));
    schema.connect(edge("x", "y-z"));
    schema.connect(edge("z", "end_0"));
    schema.connect(edge("y-z", "end_0"));

    let result = runtime.execute(&schema, HashMap::new()).await.unwrap();

    for id in ["x", "x-y", "y-z", "z"] {
        assert_eq!(harness.count(id), 1, "{} did not run once", id);
    }
    assert_eq!(result.report.workflow_status.status, Status::Succeeded);
    assert_eq!(result.outputs, inputs(json!({ "left": "z", "right": "y-z" })));
}

#[tokio::test]
async fn test_wait_all_join_waits_for_slow_branch() {
    let (runtime, harness) = runtime();
    let schema = diamond(json!({}), json!({ "delayMs": 50 }));

    runtime.execute(&schema, HashMap::new()).await.unwrap();

    assert_eq!(harness.log(), vec!["a", "b", "join"]);
}

#[tokio::test]
async fn test_first_arrival_join_fires_on_first_branch() {
    let config = RuntimeConfig {
        join_policy: JoinPolicy::FirstArrival,
        ..RuntimeConfig::default()
    };
    let (runtime, harness) = runtime_with(config, MockClient::default());
    let schema = diamond(json!({}), json!({ "delayMs": 50 }));

    let result = runtime.execute(&schema, HashMap::new()).await.unwrap();

    assert_eq!(harness.log(), vec!["a", "join", "b"]);
    assert_eq!(harness.count("join"), 1);
    assert_eq!(result.report.workflow_status.status, Status::Succeeded);
}

#[tokio::test]
async fn test_node_failure_fails_the_workflow() {
    let (runtime, harness) = runtime();
    let mut schema = WorkflowSchema::new();
    schema.add_node(node("start_0", "start", json!({})));
    schema.add_node(node("fail_0", "fail", json!({})));
    schema.add_node(node("after", "record", json!({})));
    schema.add_node(node("end_0", "end", json!({})));
    schema.connect(edge("start_0", "fail_0"));
    schema.connect(edge("fail_0", "after"));
    schema.connect(edge("after", "end_0"));

    let task = runtime.invoke(&schema, HashMap::new()).unwrap();
    let context = task.context().clone();
    let err = task.wait().await.unwrap_err();

    match &err {
        FlowError::Node { node_id, source } => {
            assert_eq!(node_id, "fail_0");
            assert_eq!(source, &NodeError::ExecutionFailed("boom".to_string()));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let report = context.report();
    assert_eq!(report.workflow_status.status, Status::Failed);
    let failed = report.node("fail_0").unwrap();
    assert_eq!(failed.status, Status::Failed);
    assert!(failed.snapshots[0].error.as_deref().unwrap().contains("boom"));
    assert!(!report.messages.error.is_empty());
    assert!(report.node("after").is_none());
    assert_eq!(harness.count("after"), 0);
}

#[tokio::test]
async fn test_unknown_node_type_is_dispatch_fatal() {
    let (runtime, _) = runtime();
    let mut schema = WorkflowSchema::new();
    schema.add_node(node("start_0", "start", json!({})));
    schema.add_node(node("mystery_0", "mystery", json!({})));
    schema.add_node(node("end_0", "end", json!({})));
    schema.connect(edge("start_0", "mystery_0"));
    schema.connect(edge("mystery_0", "end_0"));

    // construction succeeds, the failure happens when the node is dispatched
    let task = runtime.invoke(&schema, HashMap::new()).unwrap();
    let err = task.wait().await.unwrap_err();

    assert!(matches!(
        err,
        FlowError::Workflow(WorkflowError::UnknownNodeType(ref ty)) if ty == "mystery"
    ));
}

#[tokio::test]
async fn test_invalid_schema_is_rejected_at_invoke() {
    let (runtime, _) = runtime();
    let mut schema = llm_schema();
    schema.connect(edge("llm_0", "nowhere"));

    let err = runtime.invoke(&schema, HashMap::new()).err().unwrap();
    assert!(matches!(
        err,
        FlowError::Workflow(WorkflowError::InvalidEdge { .. })
    ));
}

#[tokio::test]
async fn test_cancel_stops_dispatch() {
    let (runtime, harness) = runtime();
    let mut schema = WorkflowSchema::new();
    schema.add_node(node("start_0", "start", json!({})));
    schema.add_node(node("slow", "record", json!({ "delayMs": 200 })));
    schema.add_node(node("after", "record", json!({})));
    schema.add_node(node("end_0", "end", json!({})));
    schema.connect(edge("start_0", "slow"));
    schema.connect(edge("slow", "after"));
    schema.connect(edge("after", "end_0"));

    let task = runtime.invoke(&schema, HashMap::new()).unwrap();
    let context = task.context().clone();

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!task.is_finished());
    task.cancel();
    let snapshots_at_cancel = context.snapshots.len();

    let outputs = task.wait().await.unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert!(outputs.is_empty());
    assert_eq!(context.status.workflow_status(), Status::Canceled);
    assert_eq!(context.snapshots.len(), snapshots_at_cancel);
    assert!(context.snapshots.by_node("slow").is_empty());
    assert!(harness.log().is_empty());
}

#[tokio::test]
async fn test_node_timeout() {
    let config = RuntimeConfig {
        node_timeout_ms: Some(20),
        ..RuntimeConfig::default()
    };
    let (runtime, harness) = runtime_with(config, MockClient::default());
    let mut schema = WorkflowSchema::new();
    schema.add_node(node("start_0", "start", json!({})));
    schema.add_node(node("slow", "record", json!({ "delayMs": 500 })));
    schema.add_node(node("end_0", "end", json!({})));
    schema.connect(edge("start_0", "slow"));
    schema.connect(edge("slow", "end_0"));

    let err = runtime.execute(&schema, HashMap::new()).await.unwrap_err();

    assert_eq!(err.node_error(), Some(&NodeError::Timeout { millis: 20 }));
    assert_eq!(harness.count("slow"), 0);
}

#[tokio::test]
async fn test_events_trace_the_run() {
    let (runtime, _) = runtime();
    let mut events = runtime.subscribe_events();
    let schema = llm_schema();

    runtime
        .execute(&schema, inputs(json!({ "topic": "graphs" })))
        .await
        .unwrap();

    let mut started = Vec::new();
    loop {
        match events.recv().await.unwrap() {
            ExecutionEvent::NodeStarted { node_id, .. } => started.push(node_id),
            ExecutionEvent::WorkflowCompleted { status, .. } => {
                assert_eq!(status, Status::Succeeded);
                break;
            }
            _ => {}
        }
    }
    assert_eq!(started, vec!["start_0", "llm_0", "end_0"]);
}

#[tokio::test]
async fn test_parallel_limit_of_one_serializes_branches() {
    let config = RuntimeConfig {
        max_parallel_nodes: 1,
        ..RuntimeConfig::default()
    };
    let (runtime, harness) = runtime_with(config, MockClient::default());
    let schema = diamond(json!({ "delayMs": 30 }), json!({}));

    runtime.execute(&schema, HashMap::new()).await.unwrap();

    // with one slot, the slow branch finishes before the fast one starts
    assert_eq!(harness.log(), vec!["a", "b", "join"]);
}
