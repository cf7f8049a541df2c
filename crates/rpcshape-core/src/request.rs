//! The RPC request as sent by clients.

use serde::Serialize;
use serde_json::{Map, Value as Json};
use tracing::debug;

use crate::error::{Result, RpcError};
use crate::formatter::FieldFormatter;
use crate::schema::{Pagination, Resource};

/// A request with top-level keys in internal form. Nested payloads are still
/// in client form; each is formatted against its own schema later.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RpcRequest {
    pub action: String,
    pub input: Map<String, Json>,
    pub fields: Option<Json>,
    pub identity: Option<Json>,
    pub filter: Option<Json>,
    pub sort: Option<String>,
    pub page: Option<Json>,
    pub metadata_fields: Option<Vec<String>>,
}

impl RpcRequest {
    pub fn parse(raw: &Json, formatter: &FieldFormatter) -> Result<Self> {
        let Json::Object(map) = raw else {
            return Err(RpcError::MissingRequiredParameter {
                parameter: "action".into(),
            });
        };

        let mut request = RpcRequest::default();
        let mut action = None;
        for (key, value) in map {
            match formatter.to_internal(key).as_str() {
                "action" => action = value.as_str().filter(|a| !a.is_empty()),
                "input" => {
                    request.input = match value {
                        Json::Object(input) => input.clone(),
                        Json::Null => Map::new(),
                        _ => return Err(invalid(key, "input must be an object")),
                    }
                }
                "fields" => request.fields = Some(value.clone()),
                "identity" | "primary_key" => {
                    request.identity = Some(value.clone()).filter(|v| !v.is_null())
                }
                "filter" => {
                    request.filter = match value {
                        Json::Object(_) => Some(value.clone()),
                        Json::Null => None,
                        _ => return Err(invalid(key, "filter must be an object")),
                    }
                }
                "sort" => {
                    request.sort = match value {
                        Json::String(sort) => Some(sort.clone()),
                        Json::Null => None,
                        _ => return Err(invalid(key, "sort must be a string")),
                    }
                }
                "page" => {
                    request.page = match value {
                        Json::Object(_) => Some(value.clone()),
                        Json::Null => None,
                        _ => {
                            return Err(RpcError::InvalidPagination {
                                reason: "page must be an object".into(),
                            })
                        }
                    }
                }
                "metadata_fields" => {
                    let names = value
                        .as_array()
                        .and_then(|names| {
                            names
                                .iter()
                                .map(|n| n.as_str().map(str::to_string))
                                .collect::<Option<Vec<_>>>()
                        })
                        .ok_or_else(|| invalid(key, "metadata fields must be a list of names"))?;
                    request.metadata_fields = Some(names);
                }
                other => debug!(key = other, "ignoring unknown request key"),
            }
        }

        request.action = action
            .ok_or_else(|| RpcError::MissingRequiredParameter {
                parameter: "action".into(),
            })?
            .to_string();
        Ok(request)
    }
}

fn invalid(field: &str, reason: &str) -> RpcError {
    RpcError::InvalidAttribute {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
    AscNilsFirst,
    DescNilsLast,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortTerm {
    pub field: String,
    pub order: SortOrder,
}

/// Parse `"title,-dueDate,++priority"` into internal sort terms.
pub fn parse_sort(sort: &str, resource: &Resource, formatter: &FieldFormatter) -> Result<Vec<SortTerm>> {
    sort.split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(|term| {
            let (order, name) = if let Some(name) = term.strip_prefix("++") {
                (SortOrder::AscNilsFirst, name)
            } else if let Some(name) = term.strip_prefix("--") {
                (SortOrder::DescNilsLast, name)
            } else if let Some(name) = term.strip_prefix('-') {
                (SortOrder::Desc, name)
            } else {
                (SortOrder::Asc, term.strip_prefix('+').unwrap_or(term))
            };
            let field = formatter.to_internal(name);
            let sortable = resource.attribute_named(&field).is_some()
                || resource.calculation_named(&field).is_some()
                || resource.aggregate_named(&field).is_some();
            if !sortable {
                return Err(invalid("sort", &format!("unknown sort field `{name}`")));
            }
            Ok(SortTerm { field, order })
        })
        .collect()
}

/// Filter with every key in internal form. Values are left alone.
pub fn format_filter(filter: &Json, formatter: &FieldFormatter) -> Json {
    match filter {
        Json::Object(map) => Json::Object(
            map.iter()
                .map(|(k, v)| (formatter.to_internal(k), format_filter(v, formatter)))
                .collect(),
        ),
        Json::Array(items) => Json::Array(items.iter().map(|i| format_filter(i, formatter)).collect()),
        other => other.clone(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub count: bool,
}

impl PageRequest {
    pub fn is_keyset(&self) -> bool {
        self.after.is_some() || self.before.is_some()
    }

    /// Parse a client `page` object against the action's pagination support.
    pub fn parse(page: &Json, pagination: &Pagination, formatter: &FieldFormatter) -> Result<Self> {
        let Json::Object(map) = page else {
            return Err(invalid_page("page must be an object"));
        };

        let mut request = PageRequest::default();
        for (key, value) in map {
            match formatter.to_internal(key).as_str() {
                "limit" => {
                    let limit = value
                        .as_u64()
                        .filter(|l| *l > 0)
                        .ok_or_else(|| invalid_page("limit must be a positive integer"))?;
                    request.limit = Some(limit);
                }
                "offset" => {
                    let offset = value
                        .as_u64()
                        .ok_or_else(|| invalid_page("offset must be a non-negative integer"))?;
                    request.offset = Some(offset);
                }
                "after" => request.after = Some(cursor(value, "after")?),
                "before" => request.before = Some(cursor(value, "before")?),
                "count" => {
                    request.count = value
                        .as_bool()
                        .ok_or_else(|| invalid_page("count must be a boolean"))?;
                }
                _ => return Err(invalid_page(&format!("unknown page option `{key}`"))),
            }
        }

        if request.offset.is_some() && request.is_keyset() {
            return Err(invalid_page("offset cannot be combined with after/before"));
        }
        if request.offset.is_some() && !pagination.offset {
            return Err(invalid_page("offset pagination is not supported"));
        }
        if request.is_keyset() && !pagination.keyset {
            return Err(invalid_page("keyset pagination is not supported"));
        }
        if let (Some(limit), Some(max)) = (request.limit, pagination.max_page_size) {
            if limit > max {
                return Err(invalid_page(&format!("limit exceeds the maximum page size of {max}")));
            }
        }
        if request.limit.is_none() {
            request.limit = pagination.default_limit;
        }
        Ok(request)
    }
}

fn cursor(value: &Json, name: &str) -> Result<String> {
    value
        .as_str()
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .ok_or_else(|| invalid_page(&format!("{name} must be a cursor string")))
}

fn invalid_page(reason: &str) -> RpcError {
    RpcError::InvalidPagination {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Aggregate, AggregateKind, Attribute, FieldType};
    use serde_json::json;

    #[test]
    fn test_parse_formats_top_level_keys() {
        let raw = json!({
            "action": "list_todos",
            "fields": ["id"],
            "primaryKey": "123",
            "metadataFields": ["totalCount"],
            "tenant": "ignored",
        });
        let request = RpcRequest::parse(&raw, &FieldFormatter::CamelCase).unwrap();
        assert_eq!(request.action, "list_todos");
        assert_eq!(request.identity, Some(json!("123")));
        assert_eq!(request.metadata_fields, Some(vec!["totalCount".to_string()]));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            RpcRequest::parse(&json!({"fields": []}), &FieldFormatter::CamelCase).unwrap_err(),
            RpcError::MissingRequiredParameter {
                parameter: "action".into()
            }
        );
        assert!(matches!(
            RpcRequest::parse(&json!({"action": "a", "input": [1]}), &FieldFormatter::CamelCase)
                .unwrap_err(),
            RpcError::InvalidAttribute { .. }
        ));
        assert!(matches!(
            RpcRequest::parse(&json!({"action": "a", "page": 3}), &FieldFormatter::CamelCase)
                .unwrap_err(),
            RpcError::InvalidPagination { .. }
        ));
    }

    #[test]
    fn test_sort_terms() {
        let resource = crate::schema::Resource::new("todo")
            .attribute(Attribute::new("title", FieldType::String))
            .attribute(Attribute::new("due_date", FieldType::Date))
            .aggregate(Aggregate::new("comment_count", AggregateKind::Count, &["comments"]));

        let terms = parse_sort("title, -dueDate,++commentCount", &resource, &FieldFormatter::CamelCase).unwrap();
        assert_eq!(
            terms,
            vec![
                SortTerm { field: "title".into(), order: SortOrder::Asc },
                SortTerm { field: "due_date".into(), order: SortOrder::Desc },
                SortTerm { field: "comment_count".into(), order: SortOrder::AscNilsFirst },
            ]
        );
        assert!(parse_sort("-secret", &resource, &FieldFormatter::CamelCase).is_err());
    }

    #[test]
    fn test_filter_keys_are_internal() {
        let filter = json!({"and": [{"dueDate": {"lessThan": "2024-01-01"}}, {"title": {"eq": "Some Title"}}]});
        assert_eq!(
            format_filter(&filter, &FieldFormatter::CamelCase),
            json!({"and": [{"due_date": {"less_than": "2024-01-01"}}, {"title": {"eq": "Some Title"}}]})
        );
    }

    #[test]
    fn test_page_parsing() {
        let pagination = Pagination {
            max_page_size: Some(50),
            default_limit: Some(20),
            ..Pagination::default()
        };
        let formatter = FieldFormatter::CamelCase;

        let page = PageRequest::parse(&json!({"offset": 10, "count": true}), &pagination, &formatter).unwrap();
        assert_eq!(page.limit, Some(20));
        assert_eq!(page.offset, Some(10));
        assert!(page.count);

        for bad in [
            json!({"limit": 0}),
            json!({"limit": 100}),
            json!({"offset": -1}),
            json!({"after": "abc"}),
            json!({"cursor": "abc"}),
        ] {
            assert!(
                matches!(
                    PageRequest::parse(&bad, &pagination, &formatter),
                    Err(RpcError::InvalidPagination { .. })
                ),
                "{bad} should be rejected"
            );
        }
    }
}
