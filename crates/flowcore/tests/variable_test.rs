use flowcore::{JsonSchema, TypedValue, Variable, VariableStore, VariableType};
use serde_json::json;
use std::sync::Arc;

fn path(segments: &[&str]) -> Vec<String> {
    segments.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_set_and_get_variable() {
    let store = VariableStore::new();
    store.set_variable(Variable::new("llm_0", "result", TypedValue::from("hello")));

    let value = store.get_value("llm_0", "result", &[]).unwrap();
    assert_eq!(value.value, json!("hello"));
    assert_eq!(value.ty, VariableType::String);
    assert!(store.get_value("llm_0", "missing", &[]).is_none());
}

#[test]
fn test_nested_path_read_and_write() {
    let store = VariableStore::new();
    store.set_variable(Variable::new(
        "start_0",
        "user",
        TypedValue::infer(json!({ "name": "ada", "tags": ["a", "b"] })),
    ));

    let tag = store.get_value("start_0", "user", &path(&["tags", "1"])).unwrap();
    assert_eq!(tag.value, json!("b"));

    store.set_value("start_0", "user", &path(&["name"]), json!("grace"));
    let user = store.get_value("start_0", "user", &[]).unwrap();
    assert_eq!(user.value["name"], json!("grace"));
    assert_eq!(user.ty, VariableType::Object);
}

#[test]
fn test_array_item_type_is_kept() {
    let store = VariableStore::new();
    store.set_variable(Variable::new("start_0", "items", TypedValue::infer(json!([1, 2, 3]))));

    let items = store.get_value("start_0", "items", &[]).unwrap();
    assert_eq!(items.ty, VariableType::Array);
    assert_eq!(items.items_type, Some(VariableType::Integer));
}

#[test]
fn test_array_item_type_skips_nulls() {
    let sparse = TypedValue::infer(json!([null, "a"]));
    assert_eq!(sparse.items_type, Some(VariableType::String));

    let nulls = TypedValue::infer(json!([null, null]));
    assert_eq!(nulls.ty, VariableType::Array);
    assert_eq!(nulls.items_type, None);
}

#[test]
fn test_child_reads_through_to_parent() {
    let parent = Arc::new(VariableStore::new());
    parent.set_variable(Variable::new("start_0", "query", TypedValue::from("q")));

    let child = VariableStore::sub(&parent);
    assert_eq!(child.get_value("start_0", "query", &[]).unwrap().value, json!("q"));
    assert!(!child.has_local("start_0", "query"));
}

#[test]
fn test_child_writes_stay_local() {
    let parent = Arc::new(VariableStore::new());
    parent.set_variable(Variable::new("start_0", "config", TypedValue::infer(json!({ "n": 1 }))));

    let child = VariableStore::sub(&parent);
    child.set_variable(Variable::new("loop_0_locals", "item", TypedValue::from(1i64)));
    child.set_value("start_0", "config", &path(&["n"]), json!(2));

    assert!(parent.get_value("loop_0_locals", "item", &[]).is_none());
    assert_eq!(parent.get_value("start_0", "config", &path(&["n"])).unwrap().value, json!(1));
    assert_eq!(child.get_value("start_0", "config", &path(&["n"])).unwrap().value, json!(2));
}

#[test]
fn test_clear_drops_bindings() {
    let parent = Arc::new(VariableStore::new());
    parent.set_variable(Variable::new("start_0", "query", TypedValue::from("q")));
    let child = VariableStore::sub(&parent);
    child.set_variable(Variable::new("llm_0", "result", TypedValue::from("r")));

    child.clear();
    assert!(child.get_value("llm_0", "result", &[]).is_none());
    assert!(child.get_value("start_0", "query", &[]).is_none());
}

#[test]
fn test_nested_reads_use_declared_schema() {
    let schema: JsonSchema = serde_json::from_value(json!({
        "type": "object",
        "properties": {
            "created": { "type": "string", "format": "date-time" },
            "labels": { "type": "map" },
            "history": { "type": "array", "items": { "type": "date-time" } }
        }
    }))
    .unwrap();
    let value = json!({
        "created": "2024-01-01T00:00:00Z",
        "labels": { "env": "prod" },
        "history": ["2024-01-02T00:00:00Z"],
        "note": "free"
    });

    let store = VariableStore::new();
    store.set_variable(
        Variable::new("start_0", "record", schema.typed(value)).with_schema(Some(schema)),
    );

    let created = store.get_value("start_0", "record", &path(&["created"])).unwrap();
    assert_eq!(created.ty, VariableType::DateTime);
    let labels = store.get_value("start_0", "record", &path(&["labels"])).unwrap();
    assert_eq!(labels.ty, VariableType::Map);
    let first = store.get_value("start_0", "record", &path(&["history", "0"])).unwrap();
    assert_eq!(first.ty, VariableType::DateTime);
    // undeclared properties fall back to inference
    let note = store.get_value("start_0", "record", &path(&["note"])).unwrap();
    assert_eq!(note.ty, VariableType::String);
}

#[test]
fn test_path_write_keeps_declared_schema() {
    let schema: JsonSchema = serde_json::from_value(json!({
        "type": "object",
        "properties": { "due": { "type": "string", "format": "date-time" } }
    }))
    .unwrap();
    let parent = Arc::new(VariableStore::new());
    parent.set_variable(
        Variable::new("start_0", "task", schema.typed(json!({ "due": "2024-01-01T00:00:00Z" })))
            .with_schema(Some(schema)),
    );
    let child = VariableStore::sub(&parent);

    child.set_value("start_0", "task", &path(&["due"]), json!("2024-02-01T00:00:00Z"));

    let due = child.get_value("start_0", "task", &path(&["due"])).unwrap();
    assert_eq!(due.ty, VariableType::DateTime);
    assert_eq!(due.value, json!("2024-02-01T00:00:00Z"));
    let original = parent.get_value("start_0", "task", &path(&["due"])).unwrap();
    assert_eq!(original.value, json!("2024-01-01T00:00:00Z"));
}
