//! Resource metadata consumed by the field processor.
//!
//! These types describe what a metadata provider exposes for a resource:
//! attributes and their types, calculations, aggregates, relationships,
//! identities and actions. They are built once at startup and shared
//! read-only across requests.

use std::fmt;

use serde::Serialize;

/// A named field inside a typed map, struct, keyword list or tuple.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypedField {
    pub name: String,
    pub ty: FieldType,
    pub allow_nil: bool,
    /// Client-facing name overriding the global formatter
    pub client_name: Option<String>,
}

impl TypedField {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            allow_nil: true,
            client_name: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.allow_nil = false;
        self
    }

    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }
}

/// How a union value is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnionStorage {
    /// A tag plus payload envelope; payloads may be typed or primitive.
    TypeAndValue,
    /// A plain map whose tag key names the active member.
    MapWithTag,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnionMember {
    pub name: String,
    pub ty: FieldType,
    /// `(key, value)` identifying this member inside map-with-tag storage
    pub tag: Option<(String, String)>,
}

impl UnionMember {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            tag: None,
        }
    }

    pub fn tagged(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tag = Some((key.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnionType {
    pub storage: UnionStorage,
    pub members: Vec<UnionMember>,
}

impl UnionType {
    pub fn new(storage: UnionStorage, members: Vec<UnionMember>) -> Self {
        Self { storage, members }
    }

    pub fn member(&self, name: &str) -> Option<&UnionMember> {
        self.members.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Decimal,
    Date,
    DateTime,
    Uuid,
    Atom,
    /// `None` means an untyped map whose keys belong to the client
    Map { fields: Option<Vec<TypedField>> },
    Struct { fields: Option<Vec<TypedField>> },
    Keyword { fields: Vec<TypedField> },
    Tuple { fields: Vec<TypedField> },
    /// Embedded resource, stored inline in its parent
    Embedded { resource: String },
    /// Instance of a resource returned by a calculation or generic action
    Resource { resource: String },
    Union { union: UnionType },
    Array { item: Box<FieldType> },
}

impl FieldType {
    pub fn untyped_map() -> Self {
        FieldType::Map { fields: None }
    }

    pub fn typed_map(fields: Vec<TypedField>) -> Self {
        FieldType::Map {
            fields: Some(fields),
        }
    }

    pub fn typed_struct(fields: Vec<TypedField>) -> Self {
        FieldType::Struct {
            fields: Some(fields),
        }
    }

    pub fn keyword(fields: Vec<TypedField>) -> Self {
        FieldType::Keyword { fields }
    }

    pub fn tuple(fields: Vec<TypedField>) -> Self {
        FieldType::Tuple { fields }
    }

    pub fn embedded(resource: impl Into<String>) -> Self {
        FieldType::Embedded {
            resource: resource.into(),
        }
    }

    pub fn resource(resource: impl Into<String>) -> Self {
        FieldType::Resource {
            resource: resource.into(),
        }
    }

    pub fn union(storage: UnionStorage, members: Vec<UnionMember>) -> Self {
        FieldType::Union {
            union: UnionType::new(storage, members),
        }
    }

    pub fn array(item: FieldType) -> Self {
        FieldType::Array {
            item: Box::new(item),
        }
    }

    /// Element type for arrays, the type itself otherwise.
    pub fn unwrap_array(&self) -> (&FieldType, bool) {
        match self {
            FieldType::Array { item } => (item.unwrap_array().0, true),
            other => (other, false),
        }
    }

    /// Declared sub-fields, when the type constrains them.
    pub fn typed_fields(&self) -> Option<&[TypedField]> {
        match self {
            FieldType::Map { fields: Some(f) } | FieldType::Struct { fields: Some(f) } => Some(f),
            FieldType::Keyword { fields } | FieldType::Tuple { fields } => Some(fields),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            FieldType::String
                | FieldType::Integer
                | FieldType::Float
                | FieldType::Boolean
                | FieldType::Decimal
                | FieldType::Date
                | FieldType::DateTime
                | FieldType::Uuid
                | FieldType::Atom
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::String => f.write_str("string"),
            FieldType::Integer => f.write_str("integer"),
            FieldType::Float => f.write_str("float"),
            FieldType::Boolean => f.write_str("boolean"),
            FieldType::Decimal => f.write_str("decimal"),
            FieldType::Date => f.write_str("date"),
            FieldType::DateTime => f.write_str("datetime"),
            FieldType::Uuid => f.write_str("uuid"),
            FieldType::Atom => f.write_str("atom"),
            FieldType::Map { fields: None } => f.write_str("map"),
            FieldType::Map { .. } => f.write_str("typed map"),
            FieldType::Struct { .. } => f.write_str("struct"),
            FieldType::Keyword { .. } => f.write_str("keyword"),
            FieldType::Tuple { .. } => f.write_str("tuple"),
            FieldType::Embedded { resource } => write!(f, "embedded {resource}"),
            FieldType::Resource { resource } => write!(f, "{resource}"),
            FieldType::Union { .. } => f.write_str("union"),
            FieldType::Array { item } => write!(f, "[{item}]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub ty: FieldType,
    pub allow_nil: bool,
    pub has_default: bool,
}

impl Attribute {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            allow_nil: true,
            has_default: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.allow_nil = false;
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.ty)?;
        if !self.allow_nil {
            f.write_str(" [required]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    pub ty: FieldType,
    pub allow_nil: bool,
    pub default: Option<serde_json::Value>,
}

impl Argument {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            allow_nil: true,
            default: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.allow_nil = false;
        self
    }

    pub fn default_value(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Must the caller supply this argument?
    pub fn is_required(&self) -> bool {
        !self.allow_nil && self.default.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Calculation {
    pub name: String,
    pub returns: FieldType,
    pub arguments: Vec<Argument>,
}

impl Calculation {
    pub fn new(name: impl Into<String>, returns: FieldType) -> Self {
        Self {
            name: name.into(),
            returns,
            arguments: Vec::new(),
        }
    }

    pub fn argument(mut self, argument: Argument) -> Self {
        self.arguments.push(argument);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    Count,
    Exists,
    Sum,
    Avg,
    Max,
    Min,
    First,
    List,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub name: String,
    pub kind: AggregateKind,
    pub relationship_path: Vec<String>,
    /// Type of the aggregated field, for `first`/`list`/`sum`/... kinds
    pub field_type: Option<FieldType>,
}

impl Aggregate {
    pub fn new(name: impl Into<String>, kind: AggregateKind, relationship_path: &[&str]) -> Self {
        Self {
            name: name.into(),
            kind,
            relationship_path: relationship_path.iter().map(|s| s.to_string()).collect(),
            field_type: None,
        }
    }

    pub fn of(mut self, field_type: FieldType) -> Self {
        self.field_type = Some(field_type);
        self
    }

    /// Scalar (or list of scalars) result.
    pub fn is_primitive(&self) -> bool {
        match self.kind {
            AggregateKind::Count | AggregateKind::Exists => true,
            AggregateKind::Sum
            | AggregateKind::Avg
            | AggregateKind::Max
            | AggregateKind::Min
            | AggregateKind::First
            | AggregateKind::List => self
                .field_type
                .as_ref()
                .map(|ty| ty.unwrap_array().0.is_primitive())
                .unwrap_or(true),
        }
    }

    /// Type of the aggregate's value.
    pub fn value_type(&self) -> FieldType {
        match self.kind {
            AggregateKind::Count => FieldType::Integer,
            AggregateKind::Exists => FieldType::Boolean,
            AggregateKind::Avg => FieldType::Float,
            AggregateKind::List => {
                FieldType::array(self.field_type.clone().unwrap_or(FieldType::String))
            }
            _ => self.field_type.clone().unwrap_or(FieldType::Integer),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub name: String,
    pub destination: String,
    pub cardinality: Cardinality,
}

impl Relationship {
    pub fn belongs_to(name: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            destination: destination.into(),
            cardinality: Cardinality::One,
        }
    }

    pub fn has_many(name: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            destination: destination.into(),
            cardinality: Cardinality::Many,
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arity = match self.cardinality {
            Cardinality::One => "one",
            Cardinality::Many => "many",
        };
        write!(f, "{} -> {} ({arity})", self.name, self.destination)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub name: String,
    pub keys: Vec<String>,
}

impl Identity {
    pub fn new(name: impl Into<String>, keys: &[&str]) -> Self {
        Self {
            name: name.into(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    Read,
    Create,
    Update,
    Destroy,
    Action,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Read => "read",
            ActionType::Create => "create",
            ActionType::Update => "update",
            ActionType::Destroy => "destroy",
            ActionType::Action => "action",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pagination {
    pub offset: bool,
    pub keyset: bool,
    pub default_limit: Option<u64>,
    pub max_page_size: Option<u64>,
    /// Paginate even when the client sends no `page`
    pub required: bool,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: true,
            keyset: false,
            default_limit: None,
            max_page_size: None,
            required: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub name: String,
    pub action_type: ActionType,
    pub arguments: Vec<Argument>,
    /// Attributes a create/update action accepts as input
    pub accept: Vec<String>,
    /// Read actions returning a single record
    pub get: bool,
    pub pagination: Option<Pagination>,
    /// Return type of generic actions
    pub returns: Option<FieldType>,
    pub metadata: Vec<TypedField>,
}

impl Action {
    pub fn new(name: impl Into<String>, action_type: ActionType) -> Self {
        Self {
            name: name.into(),
            action_type,
            arguments: Vec::new(),
            accept: Vec::new(),
            get: false,
            pagination: None,
            returns: None,
            metadata: Vec::new(),
        }
    }

    pub fn read(name: impl Into<String>) -> Self {
        Self::new(name, ActionType::Read)
    }

    pub fn create(name: impl Into<String>) -> Self {
        Self::new(name, ActionType::Create)
    }

    pub fn update(name: impl Into<String>) -> Self {
        Self::new(name, ActionType::Update)
    }

    pub fn destroy(name: impl Into<String>) -> Self {
        Self::new(name, ActionType::Destroy)
    }

    pub fn generic(name: impl Into<String>, returns: Option<FieldType>) -> Self {
        let mut action = Self::new(name, ActionType::Action);
        action.returns = returns;
        action
    }

    pub fn argument(mut self, argument: Argument) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn accept(mut self, attributes: &[&str]) -> Self {
        self.accept = attributes.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn get(mut self) -> Self {
        self.get = true;
        self
    }

    pub fn paginate(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn metadata(mut self, field: TypedField) -> Self {
        self.metadata.push(field);
        self
    }

    pub fn requires_identity(&self) -> bool {
        matches!(self.action_type, ActionType::Update | ActionType::Destroy)
    }
}

/// Resource metadata: the unit field requests are validated against.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub name: String,
    pub embedded: bool,
    pub primary_key: Vec<String>,
    pub attributes: Vec<Attribute>,
    pub calculations: Vec<Calculation>,
    pub aggregates: Vec<Aggregate>,
    pub relationships: Vec<Relationship>,
    pub identities: Vec<Identity>,
    pub actions: Vec<Action>,
}

impl Resource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            embedded: false,
            primary_key: Vec::new(),
            attributes: Vec::new(),
            calculations: Vec::new(),
            aggregates: Vec::new(),
            relationships: Vec::new(),
            identities: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn embedded(name: impl Into<String>) -> Self {
        let mut resource = Self::new(name);
        resource.embedded = true;
        resource
    }

    /// Add a required attribute and mark it as the primary key.
    pub fn primary_key(mut self, name: &str, ty: FieldType) -> Self {
        self.primary_key.push(name.to_string());
        self.attributes.push(Attribute::new(name, ty).required().with_default());
        self
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn calculation(mut self, calculation: Calculation) -> Self {
        self.calculations.push(calculation);
        self
    }

    pub fn aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregates.push(aggregate);
        self
    }

    pub fn relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn identity(mut self, identity: Identity) -> Self {
        self.identities.push(identity);
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn attribute_named(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn calculation_named(&self, name: &str) -> Option<&Calculation> {
        self.calculations.iter().find(|c| c.name == name)
    }

    pub fn aggregate_named(&self, name: &str) -> Option<&Aggregate> {
        self.aggregates.iter().find(|a| a.name == name)
    }

    pub fn relationship_named(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.name == name)
    }

    pub fn action_named(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name == name)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.embedded {
            f.write_str(" [embedded]")?;
        }
        Ok(())
    }
}
