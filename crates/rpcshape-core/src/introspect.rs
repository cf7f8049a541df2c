//! Classification of requested names against resource metadata.

use crate::registry::ResourceRegistry;
use crate::schema::{
    Aggregate, Calculation, FieldType, Relationship, Resource, TypedField, UnionMember, UnionType,
};

/// Kind of typed field container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Map,
    Struct,
    Keyword,
    Tuple,
}

impl ContainerKind {
    pub fn label(&self) -> &'static str {
        match self {
            ContainerKind::Map => "map",
            ContainerKind::Struct => "struct",
            ContainerKind::Keyword => "keyword",
            ContainerKind::Tuple => "tuple",
        }
    }

    /// Map and struct constraints must be sub-selected; keyword lists and
    /// tuples may be returned whole.
    pub fn requires_selection(&self) -> bool {
        matches!(self, ContainerKind::Map | ContainerKind::Struct)
    }
}

/// Where names are being resolved.
#[derive(Debug, Clone, Copy)]
pub enum SchemaContext<'a> {
    Resource(&'a Resource),
    Fields {
        kind: ContainerKind,
        fields: &'a [TypedField],
    },
}

impl<'a> SchemaContext<'a> {
    /// Name used in `unknown_field` errors.
    pub fn label(&self) -> &str {
        match self {
            SchemaContext::Resource(resource) => &resource.name,
            SchemaContext::Fields { kind, .. } => kind.label(),
        }
    }

    pub fn typed_fields(&self) -> Option<&'a [TypedField]> {
        match self {
            SchemaContext::Fields { fields, .. } => Some(fields),
            SchemaContext::Resource(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgRequirement {
    None,
    Optional,
    Required,
}

/// A nested context a field can be sub-selected through.
#[derive(Debug, Clone, Copy)]
pub struct SubSelection<'a> {
    pub context: SchemaContext<'a>,
    pub many: bool,
}

#[derive(Debug, Clone, Copy)]
pub enum FieldKind<'a> {
    Attribute {
        ty: &'a FieldType,
    },
    TypedContainer {
        ty: &'a FieldType,
        container: ContainerKind,
        fields: &'a [TypedField],
        many: bool,
    },
    Embedded {
        resource: &'a Resource,
        many: bool,
    },
    Union {
        union: &'a UnionType,
        many: bool,
    },
    Calculation {
        calc: &'a Calculation,
        args: ArgRequirement,
        returns: Option<SubSelection<'a>>,
    },
    Aggregate {
        aggregate: &'a Aggregate,
    },
    Relationship {
        relationship: &'a Relationship,
        destination: &'a Resource,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct FieldInfo<'a> {
    /// Internal name of the entry
    pub name: &'a str,
    pub kind: FieldKind<'a>,
}

#[derive(Debug, Clone, Copy)]
pub struct Introspector<'a> {
    registry: &'a ResourceRegistry,
}

impl<'a> Introspector<'a> {
    pub fn new(registry: &'a ResourceRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'a ResourceRegistry {
        self.registry
    }

    /// Classify `name` (internal) within `context`. `None` when nothing matches.
    pub fn classify(&self, context: &SchemaContext<'a>, name: &str) -> Option<FieldInfo<'a>> {
        match *context {
            SchemaContext::Resource(resource) => self.classify_in_resource(resource, name),
            SchemaContext::Fields { fields, .. } => fields
                .iter()
                .find(|f| f.name == name)
                .map(|f| FieldInfo {
                    name: &f.name,
                    kind: self.classify_type(&f.ty),
                }),
        }
    }

    fn classify_in_resource(&self, resource: &'a Resource, name: &str) -> Option<FieldInfo<'a>> {
        if let Some(attribute) = resource.attribute_named(name) {
            return Some(FieldInfo {
                name: &attribute.name,
                kind: self.classify_type(&attribute.ty),
            });
        }

        if let Some(calc) = resource.calculation_named(name) {
            let args = if calc.arguments.is_empty() {
                ArgRequirement::None
            } else if calc.arguments.iter().any(|a| a.is_required()) {
                ArgRequirement::Required
            } else {
                ArgRequirement::Optional
            };
            return Some(FieldInfo {
                name: &calc.name,
                kind: FieldKind::Calculation {
                    calc,
                    args,
                    returns: self.sub_selection(&calc.returns),
                },
            });
        }

        // Complex aggregates are not exposed; they resolve like any unknown name.
        if let Some(aggregate) = resource.aggregate_named(name).filter(|a| a.is_primitive()) {
            return Some(FieldInfo {
                name: &aggregate.name,
                kind: FieldKind::Aggregate { aggregate },
            });
        }

        let relationship = resource.relationship_named(name)?;
        let destination = self.registry.resource(&relationship.destination)?;
        Some(FieldInfo {
            name: &relationship.name,
            kind: FieldKind::Relationship {
                relationship,
                destination,
            },
        })
    }

    /// Classify a value of type `ty` held by an attribute or typed field.
    pub fn classify_type(&self, ty: &'a FieldType) -> FieldKind<'a> {
        let (inner, many) = ty.unwrap_array();
        match inner {
            FieldType::Embedded { resource } | FieldType::Resource { resource } => {
                match self.registry.resource(resource) {
                    Some(resource) => FieldKind::Embedded { resource, many },
                    None => FieldKind::Attribute { ty },
                }
            }
            FieldType::Union { union } => FieldKind::Union { union, many },
            _ => match container_of(inner) {
                Some((container, fields)) => FieldKind::TypedContainer {
                    ty,
                    container,
                    fields,
                    many,
                },
                None => FieldKind::Attribute { ty },
            },
        }
    }

    /// Context a value of `ty` can be sub-selected through, if any.
    pub fn sub_selection(&self, ty: &'a FieldType) -> Option<SubSelection<'a>> {
        let (inner, many) = ty.unwrap_array();
        let context = match inner {
            FieldType::Embedded { resource } | FieldType::Resource { resource } => {
                SchemaContext::Resource(self.registry.resource(resource)?)
            }
            FieldType::Map { fields: Some(fields) } => SchemaContext::Fields {
                kind: ContainerKind::Map,
                fields,
            },
            FieldType::Struct { fields: Some(fields) } => SchemaContext::Fields {
                kind: ContainerKind::Struct,
                fields,
            },
            _ => return None,
        };
        Some(SubSelection { context, many })
    }

    pub fn member<'u>(&self, union: &'u UnionType, tag: &str) -> Option<&'u UnionMember> {
        union.member(tag)
    }
}

fn container_of(ty: &FieldType) -> Option<(ContainerKind, &[TypedField])> {
    match ty {
        FieldType::Map { fields: Some(fields) } => Some((ContainerKind::Map, fields)),
        FieldType::Struct { fields: Some(fields) } => Some((ContainerKind::Struct, fields)),
        FieldType::Keyword { fields } => Some((ContainerKind::Keyword, fields)),
        FieldType::Tuple { fields } => Some((ContainerKind::Tuple, fields)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AggregateKind, Argument, Attribute, UnionStorage};

    fn registry() -> ResourceRegistry {
        ResourceRegistry::new()
            .with(
                Resource::new("todo")
                    .primary_key("id", FieldType::Uuid)
                    .attribute(Attribute::new("title", FieldType::String))
                    .attribute(Attribute::new(
                        "options",
                        FieldType::keyword(vec![TypedField::new("priority", FieldType::Integer)]),
                    ))
                    .attribute(Attribute::new("metadata", FieldType::embedded("todo_metadata")))
                    .attribute(Attribute::new(
                        "content",
                        FieldType::union(
                            UnionStorage::TypeAndValue,
                            vec![UnionMember::new("note", FieldType::String)],
                        ),
                    ))
                    .calculation(Calculation::new("is_overdue", FieldType::Boolean))
                    .calculation(
                        Calculation::new("days_until", FieldType::Integer)
                            .argument(Argument::new("from", FieldType::Date).required()),
                    )
                    .calculation(Calculation::new("self", FieldType::resource("todo")).argument(
                        Argument::new("prefix", FieldType::String),
                    ))
                    .aggregate(Aggregate::new("comment_count", AggregateKind::Count, &["comments"]))
                    .aggregate(
                        Aggregate::new("latest_comment", AggregateKind::First, &["comments"])
                            .of(FieldType::resource("comment")),
                    )
                    .relationship(Relationship::has_many("comments", "comment"))
                    .relationship(Relationship::belongs_to("owner", "missing")),
            )
            .with(Resource::embedded("todo_metadata"))
            .with(Resource::new("comment"))
    }

    fn classify<'a>(registry: &'a ResourceRegistry, name: &str) -> Option<FieldKind<'a>> {
        let introspector = Introspector::new(registry);
        let todo = registry.resource("todo").unwrap();
        introspector
            .classify(&SchemaContext::Resource(todo), name)
            .map(|info| info.kind)
    }

    #[test]
    fn test_attribute_kinds() {
        let registry = registry();
        assert!(matches!(classify(&registry, "title"), Some(FieldKind::Attribute { .. })));
        assert!(matches!(
            classify(&registry, "options"),
            Some(FieldKind::TypedContainer { container: ContainerKind::Keyword, .. })
        ));
        assert!(matches!(
            classify(&registry, "metadata"),
            Some(FieldKind::Embedded { many: false, .. })
        ));
        assert!(matches!(classify(&registry, "content"), Some(FieldKind::Union { .. })));
    }

    #[test]
    fn test_calculation_arguments_and_returns() {
        let registry = registry();
        match classify(&registry, "days_until") {
            Some(FieldKind::Calculation { args, returns, .. }) => {
                assert_eq!(args, ArgRequirement::Required);
                assert!(returns.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
        match classify(&registry, "self") {
            Some(FieldKind::Calculation { args, returns, .. }) => {
                assert_eq!(args, ArgRequirement::Optional);
                assert!(returns.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_complex_aggregate_is_not_found() {
        let registry = registry();
        assert!(matches!(classify(&registry, "comment_count"), Some(FieldKind::Aggregate { .. })));
        assert!(classify(&registry, "latest_comment").is_none());
    }

    #[test]
    fn test_relationship_needs_known_destination() {
        let registry = registry();
        assert!(matches!(classify(&registry, "comments"), Some(FieldKind::Relationship { .. })));
        assert!(classify(&registry, "owner").is_none());
        assert!(classify(&registry, "nope").is_none());
    }

    #[test]
    fn test_context_labels() {
        let registry = registry();
        let todo = registry.resource("todo").unwrap();
        assert_eq!(SchemaContext::Resource(todo).label(), "todo");
        assert_eq!(
            SchemaContext::Fields {
                kind: ContainerKind::Map,
                fields: &[]
            }
            .label(),
            "map"
        );
    }
}
