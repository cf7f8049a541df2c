mod common;

use common::*;
use std::sync::Arc;

use rpcshape_core::{
    ExecutionOutput, FieldFormatter, Pipeline, RpcAction, RpcSettings, StructValue, Value,
};
use serde_json::json;

async fn first_record(fields: serde_json::Value) -> serde_json::Value {
    let (response, _) = run_list(json!({"action": "list_todos", "fields": fields})).await;
    assert_eq!(response["success"], json!(true), "{response}");
    response["data"][0].clone()
}

#[tokio::test]
async fn keyword_attribute_becomes_an_object() {
    let record = first_record(json!(["id", "options"])).await;
    assert_eq!(
        record,
        json!({"id": TODO_ID, "options": {"notify": true, "reminderMinutes": 15}})
    );

    let record = first_record(json!([{"options": ["reminderMinutes"]}])).await;
    assert_eq!(record, json!({"options": {"reminderMinutes": 15}}));
}

#[tokio::test]
async fn empty_keyword_attribute_is_an_empty_object() {
    let unset = StructValue::new("todo").with("options", Value::List(vec![]));
    for fields in [json!(["options"]), json!([{"options": ["reminderMinutes"]}])] {
        let executor = StubExecutor::returning(ExecutionOutput::new(vec![unset.clone()]));
        let response = pipeline(executor)
            .run(json!({"action": "list_todos", "fields": fields}))
            .await;
        assert_eq!(response["data"], json!([{"options": {}}]), "{fields}");
    }
}

#[tokio::test]
async fn tuple_attribute_uses_declared_field_names() {
    let record = first_record(json!(["location"])).await;
    assert_eq!(record, json!({"location": {"lat": 40.5, "lng": -74.25}}));

    let record = first_record(json!([{"location": ["lng"]}])).await;
    assert_eq!(record, json!({"location": {"lng": -74.25}}));
}

#[tokio::test]
async fn empty_lists_are_preserved() {
    let record = first_record(json!(["tags"])).await;
    assert_eq!(record, json!({"tags": []}));
}

#[tokio::test]
async fn untyped_map_keys_are_untouched() {
    let record = first_record(json!(["customData"])).await;
    assert_eq!(
        record,
        json!({"customData": {"Some_Key": "kept", "nested_Key": {"inner_value": 1}}})
    );
}

#[tokio::test]
async fn typed_map_returns_only_requested_keys() {
    let record = first_record(json!([{"stats": ["viewCount"]}])).await;
    assert_eq!(record, json!({"stats": {"viewCount": 10}}));
}

#[tokio::test]
async fn scalars_are_rendered_as_json() {
    let record = first_record(json!(["description", "dueDate", "priority", "commentCount"])).await;
    assert_eq!(
        record,
        json!({
            "description": null,
            "dueDate": "2024-01-15",
            "priority": "high",
            "commentCount": 1,
        })
    );
}

#[tokio::test]
async fn nested_relationships_and_embedded_resources() {
    let record = first_record(json!([
        {"user": ["name"]},
        {"comments": ["body", {"author": ["email"]}]},
        {"metadata": ["displayCategory"]},
    ]))
    .await;
    assert_eq!(
        record,
        json!({
            "user": {"name": "Ada"},
            "comments": [{"body": "Looks good", "author": {"email": "ada@example.com"}}],
            "metadata": {"displayCategory": "Work"},
        })
    );
}

#[tokio::test]
async fn union_returns_only_the_active_member() {
    let record = first_record(json!([
        {"content": [{"text": ["text", "wordCount"]}, "note"]}
    ]))
    .await;
    assert_eq!(
        record,
        json!({"content": {"text": {"text": "three little words", "wordCount": 3}}})
    );

    // active member not requested
    let record = first_record(json!([{"content": ["note"]}])).await;
    assert_eq!(record, json!({"content": {}}));
}

#[tokio::test]
async fn union_primitive_and_map_members() {
    let note = StructValue::new("todo").with("content", Value::union("note", "remember the milk"));
    let checklist = StructValue::new("todo").with(
        "content",
        Value::union(
            "checklist",
            Value::map([("title", Value::from("Groceries")), ("items_done", Value::from(2))]),
        ),
    );
    let executor = StubExecutor::returning(ExecutionOutput::new(vec![note, checklist]));

    let response = pipeline(executor)
        .run(json!({
            "action": "list_todos",
            "fields": [{"content": ["note", {"checklist": ["itemsDone"]}]}],
        }))
        .await;
    assert_eq!(
        response["data"],
        json!([
            {"content": {"note": "remember the milk"}},
            {"content": {"checklist": {"itemsDone": 2}}},
        ])
    );
}

#[tokio::test]
async fn bare_primitive_union_value_matches_its_member() {
    let note = StructValue::new("todo").with("content", "remember the milk");
    let executor = StubExecutor::returning(ExecutionOutput::new(vec![note]));

    let response = pipeline(executor)
        .run(json!({"action": "list_todos", "fields": [{"content": ["note"]}]}))
        .await;
    assert_eq!(response["data"], json!([{"content": {"note": "remember the milk"}}]));
}

#[tokio::test]
async fn unloaded_fields_are_omitted() {
    let partial = StructValue::new("todo")
        .with("id", "1")
        .with("is_overdue", Value::NotLoaded);
    let executor = StubExecutor::returning(ExecutionOutput::new(vec![partial]));

    let response = pipeline(executor)
        .run(json!({"action": "list_todos", "fields": ["id", "isOverdue"]}))
        .await;
    assert_eq!(response["data"], json!([{"id": "1"}]));
}

#[tokio::test]
async fn snake_case_output() {
    let settings = RpcSettings::new(FieldFormatter::CamelCase, FieldFormatter::SnakeCase)
        .action(RpcAction::new("list_todos", "todo", "read"));
    let executor = StubExecutor::returning(ExecutionOutput::new(vec![sample_todo()]));
    let pipeline = Pipeline::new(Arc::new(registry()), executor, settings);

    let response = pipeline
        .run(json!({"action": "list_todos", "fields": ["isOverdue", "options"]}))
        .await;
    assert_eq!(
        response["data"],
        json!([{"is_overdue": true, "options": {"notify": true, "reminder_minutes": 15}}])
    );
}
