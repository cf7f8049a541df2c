//! Field name formatting between the client convention and internal names.
//!
//! Internal names are always snake_case. Clients talk camelCase, PascalCase,
//! snake_case or whatever a custom function produces. Payload formatting is
//! schema-guided: keys of typed containers are translated, keys of untyped
//! maps belong to the client and are passed through untouched at every depth.

use std::fmt;
use std::sync::Arc;

use heck::{ToLowerCamelCase, ToSnakeCase, ToUpperCamelCase};
use rpcshape_shared::FieldCase;
use serde_json::{Map, Value as Json};

use crate::error::{Result, RpcError};
use crate::registry::ResourceRegistry;
use crate::schema::{FieldType, TypedField, UnionMember, UnionStorage};

type FormatFn = dyn Fn(&str, &[String]) -> String + Send + Sync;

/// User supplied naming function plus the fixed extra arguments it is called with.
#[derive(Clone)]
pub struct CustomFormatter {
    func: Arc<FormatFn>,
    args: Vec<String>,
}

impl CustomFormatter {
    pub fn new<F>(func: F, args: Vec<String>) -> Self
    where
        F: Fn(&str, &[String]) -> String + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
            args,
        }
    }

    pub fn apply(&self, name: &str) -> String {
        (self.func)(name, &self.args)
    }
}

impl fmt::Debug for CustomFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomFormatter")
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum FieldFormatter {
    CamelCase,
    PascalCase,
    SnakeCase,
    Custom(CustomFormatter),
}

impl From<FieldCase> for FieldFormatter {
    fn from(case: FieldCase) -> Self {
        match case {
            FieldCase::CamelCase => FieldFormatter::CamelCase,
            FieldCase::PascalCase => FieldFormatter::PascalCase,
            FieldCase::SnakeCase => FieldFormatter::SnakeCase,
        }
    }
}

/// Which way a payload is travelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client keys to internal names
    Input,
    /// Internal names to client keys
    Output,
}

impl FieldFormatter {
    /// Client-facing name to internal name.
    pub fn to_internal(&self, name: &str) -> String {
        match self {
            FieldFormatter::Custom(custom) => custom.apply(name),
            _ => name.to_snake_case(),
        }
    }

    /// Internal name to client-facing name.
    pub fn to_external(&self, name: &str) -> String {
        match self {
            FieldFormatter::CamelCase => name.to_lower_camel_case(),
            FieldFormatter::PascalCase => name.to_upper_camel_case(),
            FieldFormatter::SnakeCase => name.to_snake_case(),
            FieldFormatter::Custom(custom) => custom.apply(name),
        }
    }

    /// Format each segment of an internal dotted path.
    pub fn to_external_path(&self, path: &str) -> String {
        path.split('.')
            .map(|segment| self.to_external(segment))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Output key of a typed field: its client name when declared, else formatted.
    pub fn external_field_name(&self, field: &TypedField) -> String {
        field
            .client_name
            .clone()
            .unwrap_or_else(|| self.to_external(&field.name))
    }

    /// Resolve a client key against a typed field set.
    pub fn find_typed_field<'f>(&self, fields: &'f [TypedField], key: &str) -> Option<&'f TypedField> {
        if let Some(field) = fields
            .iter()
            .find(|f| f.client_name.as_deref() == Some(key))
        {
            return Some(field);
        }
        let internal = self.to_internal(key);
        fields
            .iter()
            .find(|f| f.client_name.is_none() && (f.name == internal || f.name == key))
    }

    /// Format every key of `value` that `ty` declares, recursively.
    ///
    /// `None` and untyped maps return `value` unchanged, nested content included.
    pub fn format_payload(
        &self,
        value: &Json,
        ty: Option<&FieldType>,
        direction: Direction,
        registry: &ResourceRegistry,
    ) -> Result<Json> {
        PayloadWalker {
            formatter: self,
            direction,
            registry,
        }
        .walk(value, ty, "")
    }
}

struct PayloadWalker<'a> {
    formatter: &'a FieldFormatter,
    direction: Direction,
    registry: &'a ResourceRegistry,
}

impl<'a> PayloadWalker<'a> {
    fn walk(&self, value: &Json, ty: Option<&FieldType>, path: &str) -> Result<Json> {
        let Some(ty) = ty else {
            return Ok(value.clone());
        };

        match (ty, value) {
            (FieldType::Array { item }, Json::Array(items)) => items
                .iter()
                .map(|item_value| self.walk(item_value, Some(item), path))
                .collect::<Result<Vec<_>>>()
                .map(Json::Array),
            (FieldType::Embedded { resource } | FieldType::Resource { resource }, Json::Object(map)) => {
                self.walk_resource(resource, map, path)
            }
            (FieldType::Union { union }, Json::Object(map)) => {
                if union.storage == UnionStorage::MapWithTag {
                    return match self.tagged_member(union.members.as_slice(), map) {
                        Some(member) => self.walk(value, Some(&member.ty), path),
                        None => Ok(value.clone()),
                    };
                }
                self.walk_union_envelope(union.members.as_slice(), map, path, value)
            }
            (typed, Json::Object(map)) => match typed.typed_fields() {
                Some(fields) => self.walk_typed(fields, map, path),
                None => Ok(value.clone()),
            },
            _ => Ok(value.clone()),
        }
    }

    fn walk_typed(&self, fields: &[TypedField], map: &Map<String, Json>, path: &str) -> Result<Json> {
        let mut out = Map::with_capacity(map.len());
        for (key, entry) in map {
            let key_path = self.check_key(key, path)?;
            let (new_key, field_ty) = match self.direction {
                Direction::Input => match self.formatter.find_typed_field(fields, key) {
                    Some(field) => (field.name.clone(), Some(&field.ty)),
                    None => (self.formatter.to_internal(key), None),
                },
                Direction::Output => match fields.iter().find(|f| &f.name == key) {
                    Some(field) => (self.formatter.external_field_name(field), Some(&field.ty)),
                    None => (self.formatter.to_external(key), None),
                },
            };
            out.insert(new_key, self.walk(entry, field_ty, &key_path)?);
        }
        Ok(Json::Object(out))
    }

    fn walk_resource(&self, resource: &str, map: &Map<String, Json>, path: &str) -> Result<Json> {
        let attributes = self
            .registry
            .resource(resource)
            .map(|r| r.attributes.as_slice())
            .unwrap_or_default();

        let mut out = Map::with_capacity(map.len());
        for (key, entry) in map {
            let key_path = self.check_key(key, path)?;
            let new_key = match self.direction {
                Direction::Input => self.formatter.to_internal(key),
                Direction::Output => self.formatter.to_external(key),
            };
            let internal = match self.direction {
                Direction::Input => new_key.as_str(),
                Direction::Output => key.as_str(),
            };
            let attr_ty = attributes.iter().find(|a| a.name == internal).map(|a| &a.ty);
            out.insert(new_key, self.walk(entry, attr_ty, &key_path)?);
        }
        Ok(Json::Object(out))
    }

    /// `{tag: payload}` with a single declared member tag
    fn walk_union_envelope(
        &self,
        members: &[UnionMember],
        map: &Map<String, Json>,
        path: &str,
        original: &Json,
    ) -> Result<Json> {
        if map.len() != 1 {
            return Ok(original.clone());
        }
        let Some((key, payload)) = map.iter().next() else {
            return Ok(original.clone());
        };
        let key_path = self.check_key(key, path)?;
        let internal = match self.direction {
            Direction::Input => self.formatter.to_internal(key),
            Direction::Output => key.clone(),
        };
        let Some(member) = members.iter().find(|m| m.name == internal) else {
            return Ok(original.clone());
        };
        let new_key = match self.direction {
            Direction::Input => member.name.clone(),
            Direction::Output => self.formatter.to_external(&member.name),
        };
        let mut out = Map::with_capacity(1);
        out.insert(new_key, self.walk(payload, Some(&member.ty), &key_path)?);
        Ok(Json::Object(out))
    }

    /// Member whose `(key, value)` tag appears in a map-with-tag payload.
    fn tagged_member<'m>(
        &self,
        members: &'m [UnionMember],
        map: &Map<String, Json>,
    ) -> Option<&'m UnionMember> {
        members.iter().find(|member| {
            let Some((tag_key, tag_value)) = &member.tag else {
                return false;
            };
            map.iter().any(|(key, value)| {
                let internal = match self.direction {
                    Direction::Input => self.formatter.to_internal(key),
                    Direction::Output => key.clone(),
                };
                (&internal == tag_key || key == tag_key) && value.as_str() == Some(tag_value.as_str())
            })
        })
    }

    fn check_key(&self, key: &str, path: &str) -> Result<String> {
        if key.trim().is_empty() {
            return Err(RpcError::FieldNormalization {
                path: if path.is_empty() { "<root>".into() } else { path.to_string() },
                reason: "field names must be non-empty strings".into(),
            });
        }
        Ok(if path.is_empty() {
            key.to_string()
        } else {
            format!("{path}.{key}")
        })
    }
}
