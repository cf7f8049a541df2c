mod common;

use common::*;
use rpcshape_core::{
    ActionType, Direction, ExecutionError, ExecutionOutput, FieldFormatter, FieldType, LoadEntry,
    PageInfo, PageKind, StructValue, TypedField, Value,
};
use serde_json::{json, Map};

#[tokio::test]
async fn allow_list_rejects_every_other_load() {
    let (response, executor) = run_list(json!({
        "action": "list_todos_with_owner",
        "fields": ["id", {"user": ["displayName"]}, "commentCount", {"comments": ["body"]}],
    }))
    .await;

    let error = single_error(&response);
    assert_eq!(error["type"], json!("load_not_allowed"));
    assert_eq!(
        error["fields"],
        json!(["user.displayName", "commentCount", "comments"])
    );
    assert!(executor.requests().is_empty());

    let (response, _) = run_list(json!({
        "action": "list_todos_with_owner",
        "fields": ["id", {"user": ["name"]}],
    }))
    .await;
    assert_eq!(response["success"], json!(true));
}

#[tokio::test]
async fn deny_list_covers_nested_loads() {
    let (response, _) = run_list(json!({
        "action": "list_todos_public",
        "fields": ["id", {"comments": [{"author": ["name"]}]}],
    }))
    .await;

    let error = single_error(&response);
    assert_eq!(error["type"], json!("load_denied"));
    assert_eq!(error["fields"], json!(["comments", "comments.author"]));
}

#[tokio::test]
async fn keyset_page_is_wrapped() {
    let executor = StubExecutor::returning(
        ExecutionOutput::new(vec![sample_todo()]).with_page(PageInfo {
            kind: PageKind::Keyset {
                after: Some("g3QAAAABZAAC".into()),
                before: None,
            },
            limit: Some(1),
            more: true,
            count: Some(7),
        }),
    );

    let response = pipeline(executor.clone())
        .run(json!({
            "action": "list_todos",
            "fields": ["title"],
            "page": {"limit": 1, "after": "g3QAAAABZAAC", "count": true},
            "sort": "-dueDate,title",
            "filter": {"dueDate": {"lessThan": "2024-02-01"}},
        }))
        .await;

    assert_eq!(
        response["data"],
        json!({
            "results": [{"title": "Ship the release"}],
            "hasMore": true,
            "limit": 1,
            "after": "g3QAAAABZAAC",
            "before": null,
            "count": 7,
        })
    );

    let request = executor.last_request();
    let page = request.page.expect("page forwarded");
    assert!(page.is_keyset());
    assert!(page.count);
    assert_eq!(request.sort.len(), 2);
    assert_eq!(request.sort[0].field, "due_date");
    assert_eq!(
        request.filter,
        Some(json!({"due_date": {"less_than": "2024-02-01"}}))
    );
}

#[tokio::test]
async fn invalid_pagination() {
    for (action, page) in [
        ("list_todos", json!({"limit": 500})),
        ("list_todos", json!({"offset": 10, "after": "abc"})),
        ("get_todo", json!({"limit": 5})),
    ] {
        let (response, _) = run_list(json!({
            "action": action,
            "fields": ["id"],
            "page": page,
            "identity": TODO_ID,
        }))
        .await;
        assert_eq!(
            single_error(&response)["type"],
            json!("invalid_pagination"),
            "{action} {page}"
        );
    }
}

#[tokio::test]
async fn get_action_returns_a_single_record() {
    let executor = StubExecutor::returning(ExecutionOutput::new(sample_todo()));
    let response = pipeline(executor.clone())
        .run(json!({"action": "get_todo", "fields": ["title"], "identity": TODO_ID}))
        .await;

    assert_eq!(response, json!({"success": true, "data": {"title": "Ship the release"}}));
    assert_eq!(
        executor.last_request().identity,
        Some(Map::from_iter([("id".to_string(), json!(TODO_ID))]))
    );
}

#[tokio::test]
async fn create_formats_typed_input() {
    let created = StructValue::new("todo").with("id", "new").with("title", "Plan sprint");
    let executor = StubExecutor::returning(ExecutionOutput::new(created));

    let response = pipeline(executor.clone())
        .run(json!({
            "action": "create_todo",
            "input": {
                "title": "Plan sprint",
                "dueDate": "2024-03-01",
                "options": {"notify": false, "reminderMinutes": 30},
            },
            "fields": ["id", "title"],
        }))
        .await;
    assert_eq!(
        response,
        json!({"success": true, "data": {"id": "new", "title": "Plan sprint"}})
    );

    let request = executor.last_request();
    assert_eq!(request.action_type, ActionType::Create);
    assert_eq!(
        serde_json::Value::Object(request.input),
        json!({
            "title": "Plan sprint",
            "due_date": "2024-03-01",
            "options": {"notify": false, "reminder_minutes": 30},
        })
    );
}

#[tokio::test]
async fn create_input_errors() {
    let (response, _) = run_list(json!({
        "action": "create_todo",
        "input": {"description": "no title"},
        "fields": ["id"],
    }))
    .await;
    let error = single_error(&response);
    assert_eq!(error["type"], json!("required"));
    assert_eq!(error["fields"], json!(["title"]));

    let (response, _) = run_list(json!({
        "action": "create_todo",
        "input": {"title": "x", "completed": true},
        "fields": ["id"],
    }))
    .await;
    assert_eq!(single_error(&response)["type"], json!("invalid_attribute"));

    let (response, _) = run_list(json!({"action": "create_todo", "input": {"title": "x"}})).await;
    let error = single_error(&response);
    assert_eq!(error["type"], json!("missing_required_parameter"));
    assert_eq!(error["vars"]["parameter"], json!("fields"));
}

#[tokio::test]
async fn update_and_destroy_need_an_identity() {
    for action in ["update_todo", "destroy_todo"] {
        let (response, _) = run_list(json!({"action": action, "fields": ["id"]})).await;
        assert_eq!(single_error(&response)["type"], json!("missing_identity"), "{action}");
    }

    let (response, _) = run_list(json!({
        "action": "update_todo",
        "identity": {"title": "Ship the release"},
        "input": {"completed": true},
        "fields": ["id"],
    }))
    .await;
    assert_eq!(single_error(&response)["type"], json!("invalid_identity"));

    let executor = StubExecutor::returning(ExecutionOutput::new(Value::Nil));
    let response = pipeline(executor)
        .run(json!({"action": "destroy_todo", "primaryKey": {"id": TODO_ID}}))
        .await;
    assert_eq!(response, json!({"success": true, "data": {}}));
}

#[tokio::test]
async fn generic_actions() {
    let summary = Value::map([("total", 12), ("completed_count", 5)]);
    let executor = StubExecutor::returning(ExecutionOutput::new(summary));
    let response = pipeline(executor)
        .run(json!({"action": "todo_summary", "fields": ["completedCount"]}))
        .await;
    assert_eq!(response, json!({"success": true, "data": {"completedCount": 5}}));

    let executor = StubExecutor::returning(ExecutionOutput::new(4));
    let response = pipeline(executor.clone())
        .run(json!({"action": "pending_count", "input": {"userId": USER_ID}}))
        .await;
    assert_eq!(response, json!({"success": true, "data": 4}));
    assert_eq!(executor.last_request().input.get("user_id"), Some(&json!(USER_ID)));

    let (response, _) = run_list(json!({"action": "pending_count", "fields": ["total"]})).await;
    assert_eq!(single_error(&response)["type"], json!("invalid_field_selection"));
}

#[tokio::test]
async fn engine_errors_pass_through() {
    let executor = StubExecutor::failing(ExecutionError::NotFound {
        resource: "todo".into(),
    });
    let response = pipeline(executor)
        .run(json!({"action": "get_todo", "fields": ["id"], "identity": TODO_ID}))
        .await;
    assert_eq!(single_error(&response)["type"], json!("not_found"));

    let executor = StubExecutor::failing(ExecutionError::Engine {
        message: "connection reset".into(),
    });
    let response = pipeline(executor).run(json!({"action": "list_todos", "fields": ["id"]})).await;
    let error = single_error(&response);
    assert_eq!(error["type"], json!("ash_error"));
    assert_eq!(error["vars"]["message"], json!("connection reset"));
}

#[tokio::test]
async fn unknown_action_and_missing_action() {
    let (response, _) = run_list(json!({"action": "list_secrets", "fields": ["id"]})).await;
    assert_eq!(single_error(&response)["type"], json!("action_not_found"));

    let (response, _) = run_list(json!({"fields": ["id"]})).await;
    assert_eq!(single_error(&response)["type"], json!("missing_required_parameter"));
}

#[tokio::test]
async fn calculation_arguments_reach_the_engine() {
    let (response, executor) = run_list(json!({
        "action": "list_todos",
        "fields": ["id", {"daysUntil": {"args": {"fromDate": "2024-01-11"}}}],
    }))
    .await;
    assert_eq!(response["data"][0]["daysUntil"], json!(4));

    match &executor.last_request().load[0] {
        LoadEntry::Calculation { name, args, .. } => {
            assert_eq!(name, "days_until");
            assert_eq!(args.get("from_date"), Some(&json!("2024-01-11")));
        }
        other => panic!("unexpected load entry {other:?}"),
    }
}

#[test]
fn payload_formatting_round_trips() {
    let registry = registry();
    let ty = FieldType::typed_map(vec![
        TypedField::new("due_date", FieldType::Date),
        TypedField::new("reminder_minutes", FieldType::Integer),
        TypedField::new("raw", FieldType::untyped_map()),
        TypedField::new("external_ref", FieldType::String).client_name("extRef"),
    ]);
    let client = json!({
        "dueDate": "2024-01-01",
        "reminderMinutes": 5,
        "raw": {"Keep_Me": {"as_is": true}},
        "extRef": "A-1",
    });

    for formatter in [FieldFormatter::CamelCase, FieldFormatter::PascalCase] {
        let client = formatter
            .format_payload(&client, Some(&ty), Direction::Input, &registry)
            .and_then(|internal| formatter.format_payload(&internal, Some(&ty), Direction::Output, &registry))
            .unwrap();
        let internal = formatter
            .format_payload(&client, Some(&ty), Direction::Input, &registry)
            .unwrap();
        assert_eq!(internal["raw"], json!({"Keep_Me": {"as_is": true}}));
        assert_eq!(internal["external_ref"], json!("A-1"));

        let back = formatter
            .format_payload(&internal, Some(&ty), Direction::Output, &registry)
            .unwrap();
        assert_eq!(back, client);
    }

    let untyped = json!({"Mixed_Case": {"innerKey": 1}});
    assert_eq!(
        FieldFormatter::SnakeCase
            .format_payload(&untyped, None, Direction::Input, &registry)
            .unwrap(),
        untyped
    );
}
