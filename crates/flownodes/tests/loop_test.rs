mod common;

use common::{constant, edge, node, reference, runtime};
use flowcore::{FlowError, NodeError, Status, WorkflowSchema};
use serde_json::{json, Value};
use std::collections::HashMap;

/// start -> loop_0 { accumulate_0 } -> end
fn loop_schema(batch_for: Value) -> WorkflowSchema {
    let body = vec![node(
        "accumulate_0",
        "accumulate",
        json!({
            "inputsValues": {
                "item": reference("loop_0_locals", "item"),
                "index": reference("loop_0_locals", "index")
            }
        }),
    )];

    let mut schema = WorkflowSchema::new();
    schema.add_node(node("start_0", "start", json!({})));
    schema.add_node(
        node("loop_0", "loop", json!({ "batchFor": batch_for })).with_blocks(body, vec![]),
    );
    schema.add_node(node(
        "end_0",
        "end",
        json!({
            "inputsValues": {
                "done": constant(json!(true)),
                "leaked": reference("loop_0_locals", "item")
            }
        }),
    ));
    schema.connect(edge("start_0", "loop_0"));
    schema.connect(edge("loop_0", "end_0"));
    schema
}

fn items(value: Value) -> HashMap<String, Value> {
    HashMap::from([("items".to_string(), value)])
}

#[tokio::test]
async fn test_loop_accumulates_in_order() {
    let (runtime, harness) = runtime();
    let schema = loop_schema(reference("start_0", "items"));

    let result = runtime
        .execute(&schema, items(json!([1, 2, 3])))
        .await
        .unwrap();

    assert_eq!(*harness.items.lock(), vec![json!(1), json!(2), json!(3)]);
    assert_eq!(*harness.indexes.lock(), vec![json!(0), json!(1), json!(2)]);
    assert_eq!(result.report.workflow_status.status, Status::Succeeded);
    assert_eq!(result.report.node("accumulate_0").unwrap().snapshots.len(), 3);
}

#[tokio::test]
async fn test_iterations_are_isolated() {
    let (runtime, harness) = runtime();
    let schema = loop_schema(reference("start_0", "items"));

    let result = runtime
        .execute(&schema, items(json!(["a", "b", "c"])))
        .await
        .unwrap();

    // no iteration sees the previous iteration's output
    assert_eq!(*harness.leaks.lock(), 0);
    // nor does anything after the loop see its item binding
    assert_eq!(result.outputs, HashMap::from([("done".to_string(), json!(true))]));
}

#[tokio::test]
async fn test_body_reads_outer_scope() {
    let (runtime, harness) = runtime();
    let mut schema = loop_schema(constant(json!([10, 20])));
    let body = vec![node(
        "accumulate_0",
        "accumulate",
        json!({ "inputsValues": { "item": reference("start_0", "label") } }),
    )];
    schema.nodes[1] = node("loop_0", "loop", json!({ "batchFor": constant(json!([10, 20])) }))
        .with_blocks(body, vec![]);

    runtime
        .execute(&schema, HashMap::from([("label".to_string(), json!("outer"))]))
        .await
        .unwrap();

    assert_eq!(*harness.items.lock(), vec![json!("outer"), json!("outer")]);
}

#[tokio::test]
async fn test_chained_body_runs_per_iteration() {
    let (runtime, harness) = runtime();
    let mut schema = loop_schema(constant(json!([1, 2])));
    let body = vec![
        node("first", "record", json!({})),
        node("second", "record", json!({})),
    ];
    schema.nodes[1] = node("loop_0", "loop", json!({ "batchFor": constant(json!([1, 2])) }))
        .with_blocks(body, vec![edge("first", "second")]);

    runtime.execute(&schema, HashMap::new()).await.unwrap();

    assert_eq!(harness.log(), vec!["first", "second", "first", "second"]);
}

#[tokio::test]
async fn test_empty_array_is_a_no_op() {
    let (runtime, harness) = runtime();
    let schema = loop_schema(reference("start_0", "items"));

    let result = runtime.execute(&schema, items(json!([]))).await.unwrap();

    assert!(harness.items.lock().is_empty());
    assert_eq!(result.report.workflow_status.status, Status::Succeeded);
    assert_eq!(result.outputs["done"], json!(true));
}

#[tokio::test]
async fn test_non_array_batch_is_fatal() {
    let (runtime, harness) = runtime();
    let schema = loop_schema(constant(json!("not a list")));

    let err = runtime.execute(&schema, HashMap::new()).await.unwrap_err();

    match err {
        FlowError::Node { node_id, source } => {
            assert_eq!(node_id, "loop_0");
            assert_eq!(
                source,
                NodeError::InvalidInputType {
                    field: "batchFor".to_string(),
                    expected: "array".to_string(),
                    actual: "string".to_string(),
                }
            );
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(harness.items.lock().is_empty());
}

#[tokio::test]
async fn test_batch_without_item_type_is_fatal() {
    let (runtime, harness) = runtime();
    let schema = loop_schema(constant(json!([null, null])));

    let err = runtime.execute(&schema, HashMap::new()).await.unwrap_err();

    assert_eq!(
        err.node_error(),
        Some(&NodeError::InvalidInputType {
            field: "batchFor".to_string(),
            expected: "array with an item type".to_string(),
            actual: "array".to_string(),
        })
    );
    assert!(harness.items.lock().is_empty());
}

#[tokio::test]
async fn test_declared_item_type_wins() {
    let (runtime, harness) = runtime();
    let batch = json!({
        "type": "constant",
        "content": [null, null],
        "schema": { "type": "array", "items": { "type": "string" } }
    });
    let mut schema = loop_schema(batch.clone());
    schema.nodes[1] = node("loop_0", "loop", json!({ "batchFor": batch }))
        .with_blocks(vec![node("first", "record", json!({}))], vec![]);

    runtime.execute(&schema, HashMap::new()).await.unwrap();

    assert_eq!(harness.count("first"), 2);
}

#[tokio::test]
async fn test_unresolved_batch_is_fatal() {
    let (runtime, _) = runtime();
    let schema = loop_schema(reference("start_0", "missing"));

    let err = runtime.execute(&schema, HashMap::new()).await.unwrap_err();

    assert!(matches!(
        err.node_error(),
        Some(NodeError::InvalidInputType { field, .. }) if field == "batchFor"
    ));
}

#[tokio::test]
async fn test_failing_iteration_fails_the_loop() {
    let (runtime, _) = runtime();
    let mut schema = loop_schema(constant(json!([1])));
    schema.nodes[1] = node("loop_0", "loop", json!({ "batchFor": constant(json!([1])) }))
        .with_blocks(vec![node("fail_0", "fail", json!({}))], vec![]);

    let err = runtime.execute(&schema, HashMap::new()).await.unwrap_err();

    match err {
        FlowError::Node { node_id, source: NodeError::ExecutionFailed(message) } => {
            assert_eq!(node_id, "loop_0");
            assert!(message.contains("boom"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
