use std::collections::HashSet;

use serde_json::{Map, Value as Json};
use tracing::debug;

use super::path::FieldPath;
use super::request::{malformed, FieldNode};
use super::types::{LoadEntry, ResolvedSelection, TemplateEntry, TemplateShape};
use crate::error::{FieldCategory, Result, RpcError, SelectionCause};
use crate::formatter::{Direction, FieldFormatter};
use crate::introspect::{
    ArgRequirement, ContainerKind, FieldKind, Introspector, SchemaContext, SubSelection,
};
use crate::registry::ResourceRegistry;
use crate::schema::{Calculation, TypedField};

/// Walks a requested-fields tree against the schema, producing the
/// select list, load instructions and extraction template.
///
/// Processing stops at the first invalid node; errors carry the dotted
/// path of that node in client-facing names.
pub struct FieldsProcessor<'a> {
    pub(super) introspector: Introspector<'a>,
    pub(super) input: &'a FieldFormatter,
    pub(super) output: &'a FieldFormatter,
}

/// The field currently being dispatched.
pub(super) struct Target<'n> {
    pub name: &'n str,
    pub key: String,
    pub path: FieldPath,
    /// Attributes at this level are storage columns
    pub selectable: bool,
}

impl<'a> FieldsProcessor<'a> {
    pub fn new(
        registry: &'a ResourceRegistry,
        input: &'a FieldFormatter,
        output: &'a FieldFormatter,
    ) -> Self {
        Self {
            introspector: Introspector::new(registry),
            input,
            output,
        }
    }

    /// Process the top-level `fields` list of a request.
    pub fn process(&self, context: SchemaContext<'a>, fields: &Json) -> Result<ResolvedSelection> {
        let Json::Array(elements) = fields else {
            return Err(malformed(&FieldPath::root(), "fields must be a list"));
        };
        let selection = self.process_level(context, elements, &FieldPath::root())?;
        debug!(
            select = selection.select.len(),
            load = selection.load.len(),
            template = selection.template.len(),
            "processed requested fields"
        );
        Ok(selection)
    }

    pub(super) fn process_level(
        &self,
        context: SchemaContext<'a>,
        elements: &[Json],
        path: &FieldPath,
    ) -> Result<ResolvedSelection> {
        let mut selection = ResolvedSelection::default();
        let mut seen = HashSet::new();

        for element in elements {
            let node = FieldNode::parse(element, path, self.input)?;
            let (internal, key) = self.resolve_name(&context, node.name());
            let field_path = path.child(key.clone());

            if !seen.insert(internal.clone()) {
                return Err(RpcError::DuplicateField {
                    field: key,
                    path: field_path.to_string(),
                });
            }

            let Some(info) = self.introspector.classify(&context, &internal) else {
                return Err(RpcError::UnknownField {
                    field: key,
                    context: context.label().to_string(),
                    path: field_path.to_string(),
                });
            };

            let target = Target {
                name: info.name,
                key,
                path: field_path,
                selectable: matches!(context, SchemaContext::Resource(_)),
            };
            self.dispatch(info.kind, node, target, &mut selection)?;
        }

        Ok(selection)
    }

    /// Internal name and client-facing path segment of a requested name.
    fn resolve_name(&self, context: &SchemaContext<'a>, requested: &str) -> (String, String) {
        if let Some(field) = context
            .typed_fields()
            .and_then(|fields| self.input.find_typed_field(fields, requested))
        {
            return (field.name.clone(), self.output.external_field_name(field));
        }
        let internal = self.input.to_internal(requested);
        let key = self.output.to_external(&internal);
        (internal, key)
    }

    fn dispatch(
        &self,
        kind: FieldKind<'a>,
        node: FieldNode<'_>,
        target: Target<'_>,
        selection: &mut ResolvedSelection,
    ) -> Result<()> {
        match kind {
            FieldKind::Attribute { ty } => {
                expect_scalar(&node, FieldCategory::Attribute, &target)?;
                push_select(selection, &target);
                selection.template.push(TemplateEntry::Field {
                    name: target.name.to_string(),
                    key: target.key,
                    ty: Some(ty.clone()),
                });
            }

            FieldKind::TypedContainer {
                ty,
                container,
                fields,
                ..
            } => {
                let whole = !container.requires_selection()
                    && matches!(node, FieldNode::Bare(_) | FieldNode::Children(_, []));
                push_select(selection, &target);
                if whole {
                    selection.template.push(TemplateEntry::Field {
                        name: target.name.to_string(),
                        key: target.key,
                        ty: Some(ty.clone()),
                    });
                } else {
                    let children = container_children(&node, FieldCategory::ComplexType, &target)?;
                    let nested = self.process_level(
                        SchemaContext::Fields {
                            kind: container,
                            fields,
                        },
                        children,
                        &target.path,
                    )?;
                    selection.template.push(TemplateEntry::Nested {
                        name: target.name.to_string(),
                        key: target.key,
                        shape: shape_of(container, fields),
                        template: nested.template,
                    });
                }
            }

            FieldKind::Embedded { resource, .. } => {
                let children = container_children(&node, FieldCategory::Embedded, &target)?;
                let nested =
                    self.process_level(SchemaContext::Resource(resource), children, &target.path)?;
                push_select(selection, &target);
                if !nested.load.is_empty() {
                    selection.load.push(LoadEntry::Nested {
                        name: target.name.to_string(),
                        load: nested.load,
                    });
                }
                selection.template.push(TemplateEntry::Nested {
                    name: target.name.to_string(),
                    key: target.key,
                    shape: TemplateShape::Record,
                    template: nested.template,
                });
            }

            FieldKind::Union { union, .. } => {
                let children = container_children(&node, FieldCategory::Union, &target)?;
                let (loads, members) = self.process_union(union, children, &target.path)?;
                push_select(selection, &target);
                if !loads.is_empty() {
                    selection.load.push(LoadEntry::Union {
                        name: target.name.to_string(),
                        members: loads,
                    });
                }
                selection.template.push(TemplateEntry::Union {
                    name: target.name.to_string(),
                    key: target.key,
                    storage: union.storage,
                    members,
                });
            }

            FieldKind::Relationship { destination, .. } => {
                let children = container_children(&node, FieldCategory::Relationship, &target)?;
                let nested = self.process_level(
                    SchemaContext::Resource(destination),
                    children,
                    &target.path,
                )?;
                selection.load.push(LoadEntry::Relationship {
                    name: target.name.to_string(),
                    select: nested.select,
                    load: nested.load,
                });
                selection.template.push(TemplateEntry::Nested {
                    name: target.name.to_string(),
                    key: target.key,
                    shape: TemplateShape::Record,
                    template: nested.template,
                });
            }

            FieldKind::Aggregate { aggregate } => {
                expect_scalar(&node, FieldCategory::Aggregate, &target)?;
                selection.load.push(LoadEntry::field(target.name));
                selection.template.push(TemplateEntry::Field {
                    name: target.name.to_string(),
                    key: target.key,
                    ty: Some(aggregate.value_type()),
                });
            }

            FieldKind::Calculation {
                calc,
                args,
                returns,
            } => self.process_calculation(calc, args, returns, node, target, selection)?,
        }
        Ok(())
    }

    fn process_calculation(
        &self,
        calc: &'a Calculation,
        requirement: ArgRequirement,
        returns: Option<SubSelection<'a>>,
        node: FieldNode<'_>,
        target: Target<'_>,
        selection: &mut ResolvedSelection,
    ) -> Result<()> {
        match node {
            FieldNode::Bare(_) | FieldNode::Children(_, []) => {
                if requirement == ArgRequirement::Required {
                    return Err(requires_args(&target));
                }
                if returns.is_some() {
                    let cause = match node {
                        FieldNode::Bare(_) => SelectionCause::Bare,
                        _ => SelectionCause::EmptyList,
                    };
                    return Err(requires_selection(FieldCategory::Calculation, &target, cause));
                }
                selection.load.push(LoadEntry::field(target.name));
                selection.template.push(TemplateEntry::Field {
                    name: target.name.to_string(),
                    key: target.key,
                    ty: Some(calc.returns.clone()),
                });
            }

            FieldNode::Children(_, children) => {
                let Some(returns) = returns else {
                    return Err(invalid_selection(FieldCategory::Calculation, &target));
                };
                if requirement == ArgRequirement::Required {
                    return Err(requires_args(&target));
                }
                self.push_calc_result(Map::new(), returns, children, target, selection)?;
            }

            FieldNode::Call { args, fields, .. } => {
                let args = self.calculation_args(calc, args, &target)?;
                let children = match fields {
                    None => None,
                    Some(Json::Array(children)) => Some(children.as_slice()),
                    Some(_) => {
                        return Err(malformed(
                            &target.path,
                            "calculation `fields` must be a list",
                        ))
                    }
                };
                match (returns, children) {
                    (Some(returns), Some(children)) if !children.is_empty() => {
                        self.push_calc_result(args, returns, children, target, selection)?;
                    }
                    (Some(_), children) => {
                        let cause = match children {
                            None => SelectionCause::Bare,
                            Some(_) => SelectionCause::EmptyList,
                        };
                        return Err(requires_selection(FieldCategory::Calculation, &target, cause));
                    }
                    (None, Some(children)) if !children.is_empty() => {
                        return Err(invalid_selection(FieldCategory::Calculation, &target));
                    }
                    (None, _) => {
                        selection.load.push(LoadEntry::Calculation {
                            name: target.name.to_string(),
                            args,
                            load: Vec::new(),
                        });
                        selection.template.push(TemplateEntry::Field {
                            name: target.name.to_string(),
                            key: target.key,
                            ty: Some(calc.returns.clone()),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn push_calc_result(
        &self,
        args: Map<String, Json>,
        returns: SubSelection<'a>,
        children: &[Json],
        target: Target<'_>,
        selection: &mut ResolvedSelection,
    ) -> Result<()> {
        let nested = self.process_level(returns.context, children, &target.path)?;
        let shape = match returns.context {
            SchemaContext::Fields { kind, fields } => shape_of(kind, fields),
            SchemaContext::Resource(_) => TemplateShape::Record,
        };
        selection.load.push(LoadEntry::Calculation {
            name: target.name.to_string(),
            args,
            load: nested.load,
        });
        selection.template.push(TemplateEntry::CalcResult {
            name: target.name.to_string(),
            key: target.key,
            shape,
            template: nested.template,
        });
        Ok(())
    }

    /// Validate and format the `args` object of a calculation call.
    fn calculation_args(
        &self,
        calc: &Calculation,
        raw: Option<&Json>,
        target: &Target<'_>,
    ) -> Result<Map<String, Json>> {
        let empty = Map::new();
        let provided = match raw {
            None => &empty,
            Some(Json::Object(provided)) => provided,
            Some(_) => return Err(invalid_args(target, "arguments must be an object".into())),
        };
        if calc.arguments.is_empty() && !provided.is_empty() {
            return Err(invalid_args(
                target,
                "calculation does not accept arguments".into(),
            ));
        }

        let mut args = Map::with_capacity(provided.len());
        for (key, value) in provided {
            let internal = self.input.to_internal(key);
            let Some(argument) = calc
                .arguments
                .iter()
                .find(|a| a.name == internal || &a.name == key)
            else {
                return Err(invalid_args(target, format!("unknown argument `{key}`")));
            };
            let value = self.input.format_payload(
                value,
                Some(&argument.ty),
                Direction::Input,
                self.introspector.registry(),
            )?;
            args.insert(argument.name.clone(), value);
        }

        let missing = calc
            .arguments
            .iter()
            .any(|a| a.is_required() && args.get(&a.name).map_or(true, Json::is_null));
        if missing {
            return Err(requires_args(target));
        }
        Ok(args)
    }
}

fn push_select(selection: &mut ResolvedSelection, target: &Target<'_>) {
    if target.selectable {
        selection.select.push(target.name.to_string());
    }
}

fn shape_of(container: ContainerKind, fields: &[TypedField]) -> TemplateShape {
    match container {
        ContainerKind::Tuple => TemplateShape::Tuple(fields.iter().map(|f| f.name.clone()).collect()),
        ContainerKind::Keyword => TemplateShape::Keyword,
        ContainerKind::Map | ContainerKind::Struct => TemplateShape::Record,
    }
}

/// Scalars accept a bare name or an empty list.
fn expect_scalar(node: &FieldNode<'_>, category: FieldCategory, target: &Target<'_>) -> Result<()> {
    match node {
        FieldNode::Bare(_) | FieldNode::Children(_, []) => Ok(()),
        FieldNode::Children(..) => Err(invalid_selection(category, target)),
        FieldNode::Call { .. } => Err(malformed(
            &target.path,
            "only calculations accept `args` and `fields`",
        )),
    }
}

/// Containers need a non-empty list of children.
pub(super) fn container_children<'r>(
    node: &FieldNode<'r>,
    category: FieldCategory,
    target: &Target<'_>,
) -> Result<&'r [Json]> {
    match *node {
        FieldNode::Bare(_) => Err(requires_selection(category, target, SelectionCause::Bare)),
        FieldNode::Children(_, []) => Err(requires_selection(
            category,
            target,
            SelectionCause::EmptyList,
        )),
        FieldNode::Children(_, children) => Ok(children),
        FieldNode::Call { .. } => Err(malformed(
            &target.path,
            "only calculations accept `args` and `fields`",
        )),
    }
}

pub(super) fn requires_selection(
    category: FieldCategory,
    target: &Target<'_>,
    cause: SelectionCause,
) -> RpcError {
    RpcError::RequiresFieldSelection {
        category,
        field: target.key.clone(),
        path: target.path.to_string(),
        cause,
    }
}

pub(super) fn invalid_selection(category: FieldCategory, target: &Target<'_>) -> RpcError {
    RpcError::InvalidFieldSelection {
        category,
        field: target.key.clone(),
        path: target.path.to_string(),
    }
}

fn requires_args(target: &Target<'_>) -> RpcError {
    RpcError::CalculationRequiresArgs {
        field: target.key.clone(),
        path: target.path.to_string(),
    }
}

fn invalid_args(target: &Target<'_>, reason: String) -> RpcError {
    RpcError::InvalidCalculationArgs {
        field: target.key.clone(),
        path: target.path.to_string(),
        reason,
    }
}
