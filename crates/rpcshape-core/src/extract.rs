//! Reshaping of raw engine results into client JSON.
//!
//! The extraction template decides which keys appear and how nested values
//! are walked. Values without a template fall back to
//! [`ResultProcessor::normalize_value_for_json`], guided by the declared type.

use std::collections::BTreeMap;

use chrono::SecondsFormat;
use serde_json::{Map, Number, Value as Json};
use tracing::warn;

use crate::fields::{TemplateEntry, TemplateShape, UnionMemberTemplate};
use crate::formatter::FieldFormatter;
use crate::schema::{FieldType, TypedField, UnionStorage};
use crate::value::{StructValue, Value};

#[derive(Debug, Clone, Copy)]
pub struct ResultProcessor<'a> {
    output: &'a FieldFormatter,
}

/// Which requested member a stored union value corresponds to.
enum ActiveMember<'t, 'v> {
    Requested(&'t UnionMemberTemplate, &'v Value),
    Unrequested,
    Unrecognized,
}

impl<'a> ResultProcessor<'a> {
    pub fn new(output: &'a FieldFormatter) -> Self {
        Self { output }
    }

    /// Apply `template` to a record or list of records.
    pub fn process(&self, raw: &Value, template: &[TemplateEntry]) -> Json {
        self.extract_nested(raw, &TemplateShape::Record, template)
    }

    fn extract_nested(&self, raw: &Value, shape: &TemplateShape, template: &[TemplateEntry]) -> Json {
        match (raw, shape) {
            (Value::Nil | Value::NotLoaded, _) => Json::Null,
            (Value::List(items), TemplateShape::Keyword)
                if items.iter().all(|item| item.as_keyword_pair().is_some()) =>
            {
                self.extract_record(raw, template)
            }
            (Value::List(_), TemplateShape::Record) if raw.is_keyword_list() => {
                self.extract_record(raw, template)
            }
            (Value::List(items), _) => Json::Array(
                items
                    .iter()
                    .map(|item| self.extract_nested(item, shape, template))
                    .collect(),
            ),
            (Value::Tuple(items), TemplateShape::Tuple(names)) => {
                let record: BTreeMap<String, Value> =
                    names.iter().cloned().zip(items.iter().cloned()).collect();
                self.extract_record(&Value::Map(record), template)
            }
            _ => self.extract_record(raw, template),
        }
    }

    fn extract_record(&self, record: &Value, template: &[TemplateEntry]) -> Json {
        let mut out = Map::with_capacity(template.len());
        for entry in template {
            match entry {
                TemplateEntry::Field { name, key, ty } => {
                    if let Some(value) = loaded(record, name) {
                        out.insert(key.clone(), self.normalize_value_for_json(value, ty.as_ref()));
                    }
                }
                TemplateEntry::Nested {
                    name,
                    key,
                    shape,
                    template,
                }
                | TemplateEntry::CalcResult {
                    name,
                    key,
                    shape,
                    template,
                } => {
                    if let Some(value) = loaded(record, name) {
                        out.insert(key.clone(), self.extract_nested(value, shape, template));
                    }
                }
                TemplateEntry::Union {
                    name,
                    key,
                    storage,
                    members,
                } => {
                    if let Some(value) = loaded(record, name) {
                        out.insert(key.clone(), self.extract_union(name, value, *storage, members));
                    }
                }
            }
        }
        Json::Object(out)
    }

    fn extract_union(
        &self,
        field: &str,
        value: &Value,
        storage: UnionStorage,
        members: &[UnionMemberTemplate],
    ) -> Json {
        if let Value::List(items) = value {
            return Json::Array(
                items
                    .iter()
                    .map(|item| self.extract_union(field, item, storage, members))
                    .collect(),
            );
        }
        if value.is_nil() {
            return Json::Null;
        }

        match active_member(value, storage, members) {
            ActiveMember::Requested(member, payload) => {
                let extracted = match &member.template {
                    Some(template) => self.extract_nested(payload, &TemplateShape::Record, template),
                    None => self.normalize_value_for_json(payload, Some(&member.ty)),
                };
                let mut out = Map::with_capacity(1);
                out.insert(member.key.clone(), extracted);
                Json::Object(out)
            }
            ActiveMember::Unrequested => Json::Object(Map::new()),
            ActiveMember::Unrecognized => {
                warn!(field, kind = %value.kind(), "union value matches no member");
                Json::Null
            }
        }
    }

    /// JSON form of a value with no extraction template.
    ///
    /// Keyword lists become objects and tuples become arrays unless the
    /// declared type says otherwise; empty lists always stay arrays. Keys of
    /// untyped maps are never rewritten.
    pub fn normalize_value_for_json(&self, value: &Value, ty: Option<&FieldType>) -> Json {
        self.normalize(value, ty, false)
    }

    fn normalize(&self, value: &Value, ty: Option<&FieldType>, preserve_keys: bool) -> Json {
        match value {
            Value::Nil | Value::NotLoaded => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(n) => Json::from(*n),
            Value::Float(f) => Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
            Value::Decimal(s) | Value::String(s) | Value::Atom(s) => Json::String(s.clone()),
            Value::Date(d) => Json::String(d.to_string()),
            Value::DateTime(dt) => Json::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Uuid(u) => Json::String(u.to_string()),

            Value::List(items) => match ty {
                Some(FieldType::Keyword { fields }) => {
                    self.keyword_object(items, Some(fields), preserve_keys)
                }
                Some(FieldType::Array { item }) => Json::Array(
                    items
                        .iter()
                        .map(|i| self.normalize(i, Some(item), preserve_keys))
                        .collect(),
                ),
                _ if value.is_keyword_list() => self.keyword_object(items, None, preserve_keys),
                _ => Json::Array(
                    items
                        .iter()
                        .map(|i| self.normalize(i, None, preserve_keys))
                        .collect(),
                ),
            },

            Value::Tuple(items) => match ty {
                Some(FieldType::Tuple { fields }) => {
                    let mut out = Map::with_capacity(fields.len());
                    for (field, item) in fields.iter().zip(items) {
                        out.insert(
                            self.output.external_field_name(field),
                            self.normalize(item, Some(&field.ty), preserve_keys),
                        );
                    }
                    Json::Object(out)
                }
                _ => Json::Array(
                    items
                        .iter()
                        .map(|i| self.normalize(i, None, preserve_keys))
                        .collect(),
                ),
            },

            Value::Map(map) => self.normalize_entries(map, ty, preserve_keys || is_untyped(ty)),
            Value::Struct(StructValue { fields, .. }) => {
                self.normalize_entries(fields, ty, preserve_keys)
            }

            Value::Union(union) => {
                let member_ty = match ty {
                    Some(FieldType::Union { union: declared }) => {
                        declared.member(&union.tag).map(|m| &m.ty)
                    }
                    _ => None,
                };
                let mut out = Map::with_capacity(1);
                out.insert(
                    self.key_for(&union.tag, preserve_keys),
                    self.normalize(&union.value, member_ty, preserve_keys),
                );
                Json::Object(out)
            }
        }
    }

    fn normalize_entries(
        &self,
        entries: &BTreeMap<String, Value>,
        ty: Option<&FieldType>,
        preserve_keys: bool,
    ) -> Json {
        let declared = ty.and_then(FieldType::typed_fields);
        let mut out = Map::with_capacity(entries.len());
        for (key, value) in entries {
            match declared.and_then(|fields| fields.iter().find(|f| &f.name == key)) {
                Some(field) => out.insert(
                    self.output.external_field_name(field),
                    self.normalize(value, Some(&field.ty), false),
                ),
                None => out.insert(
                    self.key_for(key, preserve_keys),
                    self.normalize(value, None, preserve_keys),
                ),
            };
        }
        Json::Object(out)
    }

    fn keyword_object(
        &self,
        items: &[Value],
        fields: Option<&Vec<TypedField>>,
        preserve_keys: bool,
    ) -> Json {
        let mut out = Map::with_capacity(items.len());
        for item in items {
            let Some((key, value)) = item.as_keyword_pair() else {
                warn!(kind = %item.kind(), "skipping non keyword entry");
                continue;
            };
            match fields.and_then(|fields| fields.iter().find(|f| f.name == key)) {
                Some(field) => out.insert(
                    self.output.external_field_name(field),
                    self.normalize(value, Some(&field.ty), preserve_keys),
                ),
                None => out.insert(
                    self.key_for(key, preserve_keys),
                    self.normalize(value, None, preserve_keys),
                ),
            };
        }
        Json::Object(out)
    }

    fn key_for(&self, key: &str, preserve_keys: bool) -> String {
        if preserve_keys {
            key.to_string()
        } else {
            self.output.to_external(key)
        }
    }
}

/// The value stored under `name`, unless absent or not loaded.
fn loaded<'v>(record: &'v Value, name: &str) -> Option<&'v Value> {
    record.get(name).filter(|v| !matches!(v, Value::NotLoaded))
}

fn is_untyped(ty: Option<&FieldType>) -> bool {
    matches!(ty, None | Some(FieldType::Map { fields: None }))
}

fn active_member<'t, 'v>(
    value: &'v Value,
    storage: UnionStorage,
    members: &'t [UnionMemberTemplate],
) -> ActiveMember<'t, 'v> {
    match value {
        Value::Union(union) => match members.iter().find(|m| m.tag == union.tag) {
            Some(member) => ActiveMember::Requested(member, &union.value),
            None => ActiveMember::Unrequested,
        },
        Value::Map(_) | Value::Struct(_) => {
            if storage == UnionStorage::MapWithTag {
                let tagged = members.iter().find(|m| match &m.tag_field {
                    Some((key, expected)) => value
                        .get(key)
                        .and_then(Value::as_str)
                        .is_some_and(|actual| actual == expected),
                    None => false,
                });
                if let Some(member) = tagged {
                    return ActiveMember::Requested(member, value);
                }
            }
            if let Value::Struct(StructValue {
                type_name: Some(type_name),
                ..
            }) = value
            {
                if let Some(member) = members
                    .iter()
                    .find(|m| m.type_name.as_deref() == Some(type_name.as_str()))
                {
                    return ActiveMember::Requested(member, value);
                }
            }
            // `{"type": tag, "value": payload}` envelopes serialized as plain maps
            if let (Some(tag), Some(payload)) =
                (value.get("type").and_then(Value::as_str), value.get("value"))
            {
                return match members.iter().find(|m| m.tag == tag) {
                    Some(member) => ActiveMember::Requested(member, payload),
                    None => ActiveMember::Unrequested,
                };
            }
            ActiveMember::Unrequested
        }
        // untagged primitive payload
        _ => match members
            .iter()
            .find(|m| m.template.is_none() && holds_primitive(&m.ty, value))
        {
            Some(member) => ActiveMember::Requested(member, value),
            None => ActiveMember::Unrecognized,
        },
    }
}

fn holds_primitive(ty: &FieldType, value: &Value) -> bool {
    matches!(
        (ty, value),
        (FieldType::String, Value::String(_))
            | (FieldType::Integer, Value::Int(_))
            | (FieldType::Float, Value::Float(_) | Value::Int(_))
            | (FieldType::Boolean, Value::Bool(_))
            | (FieldType::Decimal, Value::Decimal(_))
            | (FieldType::Date, Value::Date(_))
            | (FieldType::DateTime, Value::DateTime(_))
            | (FieldType::Uuid, Value::Uuid(_))
            | (FieldType::Atom, Value::Atom(_))
    )
}
