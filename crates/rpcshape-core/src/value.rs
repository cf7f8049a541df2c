//! Engine-agnostic raw value representation.
//!
//! `Value` is what an execution engine hands back: records, typed structs,
//! plain maps, keyword lists (lists of `(atom, value)` tuples), tuples and
//! union envelopes. The result extractor walks it alongside an extraction
//! template to produce client-facing JSON.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Coarse classification of values.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
#[non_exhaustive]
pub enum ValueKind {
    Nil,
    Bool,
    Number,
    String,
    Atom,
    Temporal,
    Uuid,
    List,
    Tuple,
    Map,
    Struct,
    Union,
    NotLoaded,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            ValueKind::Nil => "nil",
            ValueKind::Bool => "bool",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Atom => "atom",
            ValueKind::Temporal => "temporal",
            ValueKind::Uuid => "uuid",
            ValueKind::List => "list",
            ValueKind::Tuple => "tuple",
            ValueKind::Map => "map",
            ValueKind::Struct => "struct",
            ValueKind::Union => "union",
            ValueKind::NotLoaded => "not loaded",
        })
    }
}

/// A record or typed-struct instance.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct StructValue {
    /// Resource or struct type name, when known
    pub type_name: Option<String>,
    pub fields: BTreeMap<String, Value>,
}

impl StructValue {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// A union value stored as a tag plus payload envelope.
#[derive(Clone, Debug, PartialEq)]
pub struct UnionValue {
    /// Name of the active member
    pub tag: String,
    pub value: Box<Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Arbitrary precision number kept in its textual form
    Decimal(String),
    String(String),
    Atom(String),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Uuid(Uuid),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Struct(StructValue),
    Union(UnionValue),
    /// A relationship, calculation or aggregate the engine did not load
    NotLoaded,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Nil => ValueKind::Nil,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) | Value::Float(_) | Value::Decimal(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Atom(_) => ValueKind::Atom,
            Value::Date(_) | Value::DateTime(_) => ValueKind::Temporal,
            Value::Uuid(_) => ValueKind::Uuid,
            Value::List(_) => ValueKind::List,
            Value::Tuple(_) => ValueKind::Tuple,
            Value::Map(_) => ValueKind::Map,
            Value::Struct(_) => ValueKind::Struct,
            Value::Union(_) => ValueKind::Union,
            Value::NotLoaded => ValueKind::NotLoaded,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn atom(name: impl Into<String>) -> Self {
        Value::Atom(name.into())
    }

    /// Build a keyword list from `(key, value)` pairs.
    pub fn keyword<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::List(
            pairs
                .into_iter()
                .map(|(k, v)| Value::Tuple(vec![Value::Atom(k.into()), v.into()]))
                .collect(),
        )
    }

    pub fn map<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Map(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn union(tag: impl Into<String>, value: impl Into<Value>) -> Self {
        Value::Union(UnionValue {
            tag: tag.into(),
            value: Box::new(value.into()),
        })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Atom(s) | Value::Decimal(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(f) => f.is_finite().then_some(*f as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// `(key, value)` view of a keyword pair.
    pub fn as_keyword_pair(&self) -> Option<(&str, &Value)> {
        match self {
            Value::Tuple(items) if items.len() == 2 => match &items[0] {
                Value::Atom(key) => Some((key.as_str(), &items[1])),
                _ => None,
            },
            _ => None,
        }
    }

    /// True for a non-empty list made only of `(atom, value)` pairs.
    pub fn is_keyword_list(&self) -> bool {
        match self {
            Value::List(items) => {
                !items.is_empty() && items.iter().all(|i| i.as_keyword_pair().is_some())
            }
            _ => false,
        }
    }

    /// Lookup by key on maps, structs and keyword lists. `None` when the
    /// value has no such key or is not keyed at all.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(key),
            Value::Struct(s) => s.fields.get(key),
            Value::List(items) => items
                .iter()
                .filter_map(Value::as_keyword_pair)
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Decimal(s) | Value::String(s) => f.write_str(s),
            Value::Atom(s) => write!(f, ":{s}"),
            Value::Date(d) => write!(f, "{d}"),
            Value::DateTime(dt) => f.write_str(&dt.to_rfc3339()),
            Value::Uuid(u) => write!(f, "{u}"),
            Value::List(items) | Value::Tuple(items) => {
                let (open, close) = if matches!(self, Value::List(_)) {
                    ("[", "]")
                } else {
                    ("{", "}")
                };
                f.write_str(open)?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(close)
            }
            Value::Map(map) => {
                f.write_str("%{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k:?} => {v}")?;
                }
                f.write_str("}")
            }
            Value::Struct(s) => {
                write!(f, "%{}{{", s.type_name.as_deref().unwrap_or("struct"))?;
                for (i, (k, v)) in s.fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Value::Union(u) => write!(f, "<{}: {}>", u.tag, u.value),
            Value::NotLoaded => f.write_str("#NotLoaded"),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Nil
    }
}
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}
impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}
impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}
impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt)
    }
}
impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Uuid(u)
    }
}
impl From<StructValue> for Value {
    fn from(s: StructValue) -> Self {
        Value::Struct(s)
    }
}
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Nil)
    }
}

/// Convert client JSON into a raw value. Object keys stay strings and
/// arrays become lists; no keyword lists are inferred.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n
                    .as_f64()
                    .map(Value::Float)
                    .unwrap_or_else(|| Value::Decimal(n.to_string())),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}
