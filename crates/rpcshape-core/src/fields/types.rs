use serde::Serialize;
use serde_json::{Map, Value as Json};

use crate::schema::{FieldType, UnionStorage};

/// Output of processing a requested-fields tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedSelection {
    /// Storage columns needed at this level
    pub select: Vec<String>,
    /// Relationships, calculations and aggregates the engine must compute
    pub load: Vec<LoadEntry>,
    /// How to pull the requested subset out of the fetched data
    pub template: Vec<TemplateEntry>,
}

/// One load instruction for the execution engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum LoadEntry {
    /// Simple calculation or primitive aggregate
    Field { name: String },
    /// Calculation invoked with arguments
    Calculation {
        name: String,
        args: Map<String, Json>,
        load: Vec<LoadEntry>,
    },
    /// Related records, with their own select and nested loads
    Relationship {
        name: String,
        select: Vec<String>,
        load: Vec<LoadEntry>,
    },
    /// Loads required inside an embedded resource attribute
    Nested { name: String, load: Vec<LoadEntry> },
    /// Loads required inside union members
    Union {
        name: String,
        members: Vec<UnionMemberLoad>,
    },
}

impl LoadEntry {
    pub fn field(name: impl Into<String>) -> Self {
        LoadEntry::Field { name: name.into() }
    }

    pub fn name(&self) -> &str {
        match self {
            LoadEntry::Field { name }
            | LoadEntry::Calculation { name, .. }
            | LoadEntry::Relationship { name, .. }
            | LoadEntry::Nested { name, .. }
            | LoadEntry::Union { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnionMemberLoad {
    pub tag: String,
    pub load: Vec<LoadEntry>,
}

/// How a nested raw value is addressed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateShape {
    /// Map, struct, record or keyword list looked up by name
    Record,
    /// Keyword list; always rendered as an object, even when empty
    Keyword,
    /// Positional tuple; the names are the declared field order
    Tuple(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TemplateEntry {
    /// Plain copy of `name` into `key`
    Field {
        name: String,
        key: String,
        ty: Option<FieldType>,
    },
    /// Relationship, embedded resource or typed container
    Nested {
        name: String,
        key: String,
        shape: TemplateShape,
        template: Vec<TemplateEntry>,
    },
    /// Sub-selected calculation result
    CalcResult {
        name: String,
        key: String,
        shape: TemplateShape,
        template: Vec<TemplateEntry>,
    },
    Union {
        name: String,
        key: String,
        storage: UnionStorage,
        members: Vec<UnionMemberTemplate>,
    },
}

impl TemplateEntry {
    pub fn key(&self) -> &str {
        match self {
            TemplateEntry::Field { key, .. }
            | TemplateEntry::Nested { key, .. }
            | TemplateEntry::CalcResult { key, .. }
            | TemplateEntry::Union { key, .. } => key,
        }
    }
}

/// A requested union member and how to recognise it in stored data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnionMemberTemplate {
    pub tag: String,
    pub key: String,
    pub ty: FieldType,
    /// `(key, value)` marking this member in map-with-tag storage
    pub tag_field: Option<(String, String)>,
    /// Resource name of struct-backed members
    pub type_name: Option<String>,
    /// `None` for primitive members, copied whole
    pub template: Option<Vec<TemplateEntry>>,
}
