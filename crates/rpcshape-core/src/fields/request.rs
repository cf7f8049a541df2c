use serde_json::Value as Json;

use super::path::FieldPath;
use crate::error::{Result, RpcError};
use crate::formatter::FieldFormatter;

/// One element of a requested-fields list, after shape checks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldNode<'r> {
    /// `"title"`
    Bare(&'r str),
    /// `{"user": ["id", "name"]}`
    Children(&'r str, &'r [Json]),
    /// `{"daysUntil": {"args": {...}, "fields": [...]}}`
    Call {
        name: &'r str,
        args: Option<&'r Json>,
        fields: Option<&'r Json>,
    },
}

impl<'r> FieldNode<'r> {
    pub fn name(&self) -> &'r str {
        match *self {
            FieldNode::Bare(name) | FieldNode::Children(name, _) => name,
            FieldNode::Call { name, .. } => name,
        }
    }

    /// Decode one element of the level at `path`.
    pub fn parse(element: &'r Json, path: &FieldPath, formatter: &FieldFormatter) -> Result<Self> {
        match element {
            Json::String(name) if !name.is_empty() => Ok(FieldNode::Bare(name)),
            Json::Object(map) if map.len() == 1 => {
                let Some((name, value)) = map.iter().next() else {
                    return Err(malformed(path, "field entries must have exactly one key"));
                };
                if name.is_empty() {
                    return Err(malformed(path, "field names must be non-empty strings"));
                }
                match value {
                    Json::Array(children) => Ok(FieldNode::Children(name, children)),
                    Json::Object(call) => {
                        let mut args = None;
                        let mut fields = None;
                        for (key, entry) in call {
                            match formatter.to_internal(key).as_str() {
                                "args" => args = Some(entry),
                                "fields" => fields = Some(entry),
                                _ => {
                                    return Err(malformed(
                                        &path.child(name.as_str()),
                                        &format!("unexpected key `{key}`, expected `args` or `fields`"),
                                    ))
                                }
                            }
                        }
                        Ok(FieldNode::Call { name, args, fields })
                    }
                    _ => Err(malformed(
                        &path.child(name.as_str()),
                        "nested selections must be a list or an object with `args`/`fields`",
                    )),
                }
            }
            Json::Object(_) => Err(malformed(path, "field entries must have exactly one key")),
            Json::String(_) => Err(malformed(path, "field names must be non-empty strings")),
            other => Err(malformed(
                path,
                &format!("unsupported field entry `{other}`"),
            )),
        }
    }
}

pub(crate) fn malformed(path: &FieldPath, reason: &str) -> RpcError {
    RpcError::FieldNormalization {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}
