use std::collections::HashSet;

use serde_json::Value as Json;

use super::path::FieldPath;
use super::processor::{invalid_selection, requires_selection, FieldsProcessor, Target};
use super::request::{malformed, FieldNode};
use super::types::{UnionMemberLoad, UnionMemberTemplate};
use crate::error::{FieldCategory, Result, RpcError, SelectionCause};
use crate::schema::{FieldType, UnionType};

const UNION_CONTEXT: &str = "union_attribute";

impl<'a> FieldsProcessor<'a> {
    /// Validate the member list of a union attribute.
    ///
    /// Only members with loadable sub-fields produce a load entry; every
    /// requested member gets a template entry.
    pub(super) fn process_union(
        &self,
        union: &'a UnionType,
        children: &[Json],
        path: &FieldPath,
    ) -> Result<(Vec<UnionMemberLoad>, Vec<UnionMemberTemplate>)> {
        let mut loads = Vec::new();
        let mut members = Vec::with_capacity(children.len());
        let mut seen = HashSet::new();

        for element in children {
            let node = FieldNode::parse(element, path, self.input)?;
            let tag = self.input.to_internal(node.name());
            let key = self.output.to_external(&tag);
            let target = Target {
                name: node.name(),
                key: key.clone(),
                path: path.child(key.clone()),
                selectable: false,
            };

            if !seen.insert(tag.clone()) {
                return Err(RpcError::DuplicateField {
                    field: key,
                    path: target.path.to_string(),
                });
            }

            let Some(member) = self.introspector.member(union, &tag) else {
                return Err(RpcError::UnknownField {
                    field: key,
                    context: UNION_CONTEXT.to_string(),
                    path: target.path.to_string(),
                });
            };

            let sub = self.introspector.sub_selection(&member.ty);
            let template = match (node, sub) {
                (FieldNode::Call { .. }, _) => {
                    return Err(malformed(
                        &target.path,
                        "union members do not accept `args` or `fields`",
                    ))
                }
                (FieldNode::Bare(_), Some(_)) => {
                    return Err(requires_selection(
                        FieldCategory::ComplexType,
                        &target,
                        SelectionCause::Bare,
                    ))
                }
                (FieldNode::Children(_, []), Some(_)) => {
                    return Err(requires_selection(
                        FieldCategory::ComplexType,
                        &target,
                        SelectionCause::EmptyList,
                    ))
                }
                (FieldNode::Children(_, children), Some(sub)) => {
                    let nested = self.process_level(sub.context, children, &target.path)?;
                    if !nested.load.is_empty() {
                        loads.push(UnionMemberLoad {
                            tag: member.name.clone(),
                            load: nested.load,
                        });
                    }
                    Some(nested.template)
                }
                (FieldNode::Bare(_) | FieldNode::Children(_, []), None) => None,
                (FieldNode::Children(..), None) => {
                    return Err(invalid_selection(FieldCategory::UnionMember, &target))
                }
            };

            members.push(UnionMemberTemplate {
                tag: member.name.clone(),
                key,
                ty: member.ty.clone(),
                tag_field: member.tag.clone(),
                type_name: struct_name(&member.ty),
                template,
            });
        }

        Ok((loads, members))
    }
}

fn struct_name(ty: &FieldType) -> Option<String> {
    match ty.unwrap_array().0 {
        FieldType::Embedded { resource } | FieldType::Resource { resource } => Some(resource.clone()),
        _ => None,
    }
}
