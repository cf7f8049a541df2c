//! Shared fixtures: a todo domain with users, comments and rich content.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use rpcshape_core::*;
use serde_json::Value as Json;
use uuid::Uuid;

pub const TODO_ID: &str = "6f1c3a52-9d1e-4b57-8a2e-0c6f5d4e3b21";
pub const USER_ID: &str = "2b7e1f40-5c3a-4d8e-9f61-7a0b2c4d6e8f";

pub fn registry() -> ResourceRegistry {
    ResourceRegistry::new()
        .with(todo())
        .with(
            Resource::new("user")
                .primary_key("id", FieldType::Uuid)
                .attribute(Attribute::new("name", FieldType::String))
                .attribute(Attribute::new("email", FieldType::String))
                .calculation(Calculation::new("display_name", FieldType::String))
                .identity(Identity::new("unique_email", &["email"])),
        )
        .with(
            Resource::new("comment")
                .primary_key("id", FieldType::Uuid)
                .attribute(Attribute::new("body", FieldType::String))
                .relationship(Relationship::belongs_to("author", "user")),
        )
        .with(
            Resource::embedded("text_content")
                .attribute(Attribute::new("text", FieldType::String))
                .attribute(Attribute::new("formatting", FieldType::Atom))
                .calculation(Calculation::new("word_count", FieldType::Integer)),
        )
        .with(
            Resource::embedded("todo_metadata")
                .attribute(Attribute::new("category", FieldType::String))
                .attribute(Attribute::new("priority_score", FieldType::Integer))
                .calculation(Calculation::new("display_category", FieldType::String)),
        )
}

fn todo() -> Resource {
    Resource::new("todo")
        .primary_key("id", FieldType::Uuid)
        .attribute(Attribute::new("title", FieldType::String).required())
        .attribute(Attribute::new("description", FieldType::String))
        .attribute(Attribute::new("completed", FieldType::Boolean).with_default())
        .attribute(Attribute::new("due_date", FieldType::Date))
        .attribute(Attribute::new("priority", FieldType::Atom))
        .attribute(Attribute::new("tags", FieldType::array(FieldType::String)))
        .attribute(Attribute::new(
            "options",
            FieldType::keyword(vec![
                TypedField::new("notify", FieldType::Boolean),
                TypedField::new("reminder_minutes", FieldType::Integer),
            ]),
        ))
        .attribute(Attribute::new(
            "location",
            FieldType::tuple(vec![
                TypedField::new("lat", FieldType::Float),
                TypedField::new("lng", FieldType::Float),
            ]),
        ))
        .attribute(Attribute::new(
            "stats",
            FieldType::typed_map(vec![
                TypedField::new("view_count", FieldType::Integer),
                TypedField::new("edit_count", FieldType::Integer),
            ]),
        ))
        .attribute(Attribute::new("custom_data", FieldType::untyped_map()))
        .attribute(Attribute::new("metadata", FieldType::embedded("todo_metadata")))
        .attribute(Attribute::new(
            "content",
            FieldType::union(
                UnionStorage::TypeAndValue,
                vec![
                    UnionMember::new("text", FieldType::embedded("text_content")),
                    UnionMember::new("note", FieldType::String),
                    UnionMember::new(
                        "checklist",
                        FieldType::typed_map(vec![
                            TypedField::new("title", FieldType::String),
                            TypedField::new("items_done", FieldType::Integer),
                        ]),
                    ),
                ],
            ),
        ))
        .calculation(Calculation::new("is_overdue", FieldType::Boolean))
        .calculation(
            Calculation::new("days_until", FieldType::Integer)
                .argument(Argument::new("from_date", FieldType::Date).required()),
        )
        .aggregate(Aggregate::new("comment_count", AggregateKind::Count, &["comments"]))
        .relationship(Relationship::belongs_to("user", "user"))
        .relationship(Relationship::has_many("comments", "comment"))
        .action(Action::read("read").paginate(Pagination {
            keyset: true,
            default_limit: Some(20),
            max_page_size: Some(100),
            ..Pagination::default()
        }))
        .action(Action::read("by_id").get())
        .action(Action::create("create").accept(&["title", "description", "due_date", "options"]))
        .action(Action::update("update").accept(&["title", "completed"]))
        .action(Action::destroy("destroy"))
        .action(Action::generic(
            "summary",
            Some(FieldType::typed_map(vec![
                TypedField::new("total", FieldType::Integer),
                TypedField::new("completed_count", FieldType::Integer),
            ])),
        ))
        .action(
            Action::generic("pending_count", Some(FieldType::Integer))
                .argument(Argument::new("user_id", FieldType::Uuid)),
        )
}

pub fn settings() -> RpcSettings {
    RpcSettings::default()
        .action(RpcAction::new("list_todos", "todo", "read"))
        .action(RpcAction::new("get_todo", "todo", "by_id"))
        .action(RpcAction::new("create_todo", "todo", "create"))
        .action(RpcAction::new("update_todo", "todo", "update"))
        .action(RpcAction::new("destroy_todo", "todo", "destroy"))
        .action(RpcAction::new("todo_summary", "todo", "summary"))
        .action(RpcAction::new("pending_count", "todo", "pending_count"))
        .action(RpcAction::new("list_todos_with_owner", "todo", "read").allow_only_loads(&["user"]))
        .action(RpcAction::new("list_todos_public", "todo", "read").deny_loads(&["comments"]))
}

/// Fully loaded todo record as the engine would hand it back.
pub fn sample_todo() -> Value {
    let user = StructValue::new("user")
        .with("id", Value::Uuid(Uuid::parse_str(USER_ID).unwrap()))
        .with("name", "Ada")
        .with("email", "ada@example.com");

    StructValue::new("todo")
        .with("id", Value::Uuid(Uuid::parse_str(TODO_ID).unwrap()))
        .with("title", "Ship the release")
        .with("description", Value::Nil)
        .with("completed", false)
        .with("due_date", NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        .with("priority", Value::atom("high"))
        .with("tags", Vec::<Value>::new())
        .with(
            "options",
            Value::keyword([("notify", Value::from(true)), ("reminder_minutes", Value::from(15))]),
        )
        .with("location", Value::Tuple(vec![Value::Float(40.5), Value::Float(-74.25)]))
        .with("stats", Value::map([("view_count", 10), ("edit_count", 2)]))
        .with(
            "custom_data",
            Value::map([
                ("Some_Key", Value::from("kept")),
                ("nested_Key", Value::map([("inner_value", 1)])),
            ]),
        )
        .with(
            "metadata",
            StructValue::new("todo_metadata")
                .with("category", "work")
                .with("priority_score", 5)
                .with("display_category", "Work"),
        )
        .with(
            "content",
            Value::union(
                "text",
                StructValue::new("text_content")
                    .with("text", "three little words")
                    .with("formatting", Value::atom("markdown"))
                    .with("word_count", 3),
            ),
        )
        .with("is_overdue", true)
        .with("days_until", 4)
        .with("comment_count", 1)
        .with("user", user.clone())
        .with(
            "comments",
            vec![StructValue::new("comment")
                .with("id", "c1")
                .with("body", "Looks good")
                .with("author", user)],
        )
        .into()
}

/// Returns a fixed output and records every request it receives.
pub struct StubExecutor {
    output: std::result::Result<ExecutionOutput, ExecutionError>,
    requests: Mutex<Vec<ExecutionRequest>>,
}

impl StubExecutor {
    pub fn returning(output: ExecutionOutput) -> Arc<Self> {
        Arc::new(Self {
            output: Ok(output),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(error: ExecutionError) -> Arc<Self> {
        Arc::new(Self {
            output: Err(error),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ExecutionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> ExecutionRequest {
        self.requests().pop().expect("executor was never called")
    }
}

#[async_trait]
impl ActionExecutor for StubExecutor {
    async fn execute(
        &self,
        request: ExecutionRequest,
    ) -> std::result::Result<ExecutionOutput, ExecutionError> {
        self.requests.lock().unwrap().push(request);
        self.output.clone()
    }
}

pub fn pipeline(executor: Arc<StubExecutor>) -> Pipeline {
    Pipeline::new(Arc::new(registry()), executor, settings())
}

/// Run `request` against a list read returning [`sample_todo`].
pub async fn run_list(request: Json) -> (Json, Arc<StubExecutor>) {
    let executor = StubExecutor::returning(ExecutionOutput::new(vec![sample_todo()]));
    let response = pipeline(executor.clone()).run(request).await;
    (response, executor)
}

/// Process `fields` against the todo resource with camelCase on both sides.
pub fn process_todo_fields(fields: Json) -> rpcshape_core::Result<ResolvedSelection> {
    let registry = registry();
    let formatter = FieldFormatter::CamelCase;
    let processor = FieldsProcessor::new(&registry, &formatter, &formatter);
    let todo = registry.resource("todo").expect("todo is registered");
    processor.process(SchemaContext::Resource(todo), &fields)
}

/// The single `errors` entry of a failed response.
pub fn single_error(response: &Json) -> &Json {
    assert_eq!(response["success"], Json::Bool(false), "expected failure: {response}");
    let errors = response["errors"].as_array().expect("errors list");
    assert_eq!(errors.len(), 1);
    &errors[0]
}
