//! End-to-end request handling: parse, validate, execute, shape the result.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use rpcshape_shared::{PerfTimer, RequestMetrics, RpcShapeConfig};
use serde_json::{Map, Value as Json};
use tracing::{debug, info, instrument, warn, Span};
use uuid::Uuid;

use crate::error::{ExecutionError, Result, RpcError};
use crate::executor::{ActionExecutor, ExecutionOutput, ExecutionRequest, PageInfo, PageKind};
use crate::extract::ResultProcessor;
use crate::fields::{FieldsProcessor, ResolvedSelection};
use crate::formatter::{Direction, FieldFormatter};
use crate::introspect::{Introspector, SchemaContext};
use crate::registry::ResourceRegistry;
use crate::request::{format_filter, parse_sort, PageRequest, RpcRequest};
use crate::response::{error_envelope, success_envelope};
use crate::restrict::LoadRestriction;
use crate::schema::{Action, ActionType, FieldType, Resource, TypedField};

/// A client-callable action bound to a resource action.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcAction {
    pub name: String,
    pub resource: String,
    pub action: String,
    pub restriction: Option<LoadRestriction>,
}

impl RpcAction {
    pub fn new(
        name: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            resource: resource.into(),
            action: action.into(),
            restriction: None,
        }
    }

    pub fn allow_only_loads(mut self, paths: &[&str]) -> Self {
        self.restriction = Some(LoadRestriction::AllowOnly(
            paths.iter().map(|p| p.to_string()).collect(),
        ));
        self
    }

    pub fn deny_loads(mut self, paths: &[&str]) -> Self {
        self.restriction = Some(LoadRestriction::Deny(
            paths.iter().map(|p| p.to_string()).collect(),
        ));
        self
    }
}

/// Formatting conventions and the exposed actions.
#[derive(Debug, Clone)]
pub struct RpcSettings {
    pub input_formatter: FieldFormatter,
    pub output_formatter: FieldFormatter,
    actions: BTreeMap<String, RpcAction>,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self::new(FieldFormatter::CamelCase, FieldFormatter::CamelCase)
    }
}

impl RpcSettings {
    pub fn new(input_formatter: FieldFormatter, output_formatter: FieldFormatter) -> Self {
        Self {
            input_formatter,
            output_formatter,
            actions: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &RpcShapeConfig) -> Self {
        let mut settings = Self::new(
            config.formatting.input_field_formatter.into(),
            config.formatting.output_field_formatter.into(),
        );
        for action in &config.actions {
            settings = settings.action(RpcAction {
                name: action.name.clone(),
                resource: action.resource.clone(),
                action: action.action.clone(),
                restriction: LoadRestriction::from_config(action),
            });
        }
        settings
    }

    pub fn action(mut self, action: RpcAction) -> Self {
        self.actions.insert(action.name.clone(), action);
        self
    }

    pub fn rpc_action(&self, name: &str) -> Option<&RpcAction> {
        self.actions.get(name)
    }
}

/// How the engine's result is turned into `data`.
enum ResultShape<'a> {
    Records(ResolvedSelection),
    Value(&'a FieldType),
    Empty,
}

pub struct Pipeline {
    registry: Arc<ResourceRegistry>,
    executor: Arc<dyn ActionExecutor>,
    settings: RpcSettings,
}

impl Pipeline {
    pub fn new(
        registry: Arc<ResourceRegistry>,
        executor: Arc<dyn ActionExecutor>,
        settings: RpcSettings,
    ) -> Self {
        Self {
            registry,
            executor,
            settings,
        }
    }

    pub fn settings(&self) -> &RpcSettings {
        &self.settings
    }

    /// Handle one request. Always answers with an envelope; failures become
    /// `{success: false, errors}`.
    #[instrument(skip_all, fields(request_id = %Uuid::new_v4(), action = tracing::field::Empty))]
    pub async fn run(&self, request: Json) -> Json {
        let started = Instant::now();
        let parsed = RpcRequest::parse(&request, &self.settings.input_formatter);
        let action_name = parsed
            .as_ref()
            .map(|r| r.action.clone())
            .unwrap_or_else(|_| "unknown".to_string());
        Span::current().record("action", action_name.as_str());

        let result = match parsed {
            Ok(parsed) => self.execute(parsed).await,
            Err(err) => Err(err),
        };
        RequestMetrics::request_duration(started.elapsed(), &action_name);

        match result {
            Ok(response) => {
                RequestMetrics::request_succeeded(&action_name);
                info!(
                    duration_ms = started.elapsed().as_millis() as u64,
                    "RPC request succeeded"
                );
                response
            }
            Err(err) => {
                RequestMetrics::request_failed(&action_name, err.error_type());
                info!(error_type = err.error_type(), error = %err, "RPC request failed");
                error_envelope(&[err], &self.settings.output_formatter)
            }
        }
    }

    async fn execute(&self, request: RpcRequest) -> Result<Json> {
        let output = &self.settings.output_formatter;
        let input = &self.settings.input_formatter;

        let rpc_action = self
            .settings
            .rpc_action(&request.action)
            .ok_or_else(|| RpcError::ActionNotFound {
                action: request.action.clone(),
            })?;
        let (resource, action) = self
            .registry
            .get_action(&rpc_action.resource, &rpc_action.action)?;
        debug!(
            resource = %resource.name,
            action = %action.name,
            action_type = action.action_type.as_str(),
            "resolved RPC action"
        );

        let shape = {
            let _timer = PerfTimer::new("rpcshape_field_processing_seconds")
                .with_label("action", rpc_action.name.as_str());
            self.result_shape(rpc_action, resource, action, request.fields.as_ref())?
        };

        if let (Some(restriction), ResultShape::Records(selection)) = (&rpc_action.restriction, &shape) {
            if let Err(err) = restriction.check(&selection.load, output) {
                if let RpcError::LoadNotAllowed { paths } | RpcError::LoadDenied { paths } = &err {
                    RequestMetrics::load_violations(err.error_type(), paths.len());
                }
                return Err(err);
            }
        }

        let formatted_input = self.format_input(resource, action, &request.input)?;
        let identity = self.resolve_identity(rpc_action, resource, action, request.identity.as_ref())?;
        let page = self.resolve_page(rpc_action, action, request.page.as_ref())?;
        let sort = match &request.sort {
            Some(sort) => parse_sort(sort, resource, input)?,
            None => Vec::new(),
        };
        let filter = request.filter.as_ref().map(|f| format_filter(f, input));
        let metadata_fields = resolve_metadata_fields(action, request.metadata_fields.as_deref(), input)?;

        let (select, load) = match &shape {
            ResultShape::Records(selection) => (selection.select.clone(), selection.load.clone()),
            _ => (Vec::new(), Vec::new()),
        };
        let execution = ExecutionRequest {
            resource: resource.name.clone(),
            action: action.name.clone(),
            action_type: action.action_type,
            input: formatted_input,
            identity,
            select,
            load,
            filter,
            sort,
            page: page.clone(),
        };

        let result = self
            .executor
            .execute(execution)
            .await
            .map_err(|err| self.engine_error(err))?;

        let data = self.shape_data(&shape, &result, page.is_some());
        let metadata = request.metadata_fields.as_ref().map(|_| {
            let processor = ResultProcessor::new(output);
            metadata_fields
                .iter()
                .map(|field| {
                    let value = result
                        .metadata
                        .get(&field.name)
                        .map(|v| processor.normalize_value_for_json(v, Some(&field.ty)))
                        .unwrap_or(Json::Null);
                    (output.external_field_name(field), value)
                })
                .collect::<Map<_, _>>()
        });

        Ok(success_envelope(data, metadata, output))
    }

    /// Resolve the request's `fields` against whatever the action returns.
    fn result_shape<'r>(
        &self,
        rpc_action: &RpcAction,
        resource: &'r Resource,
        action: &'r Action,
        fields: Option<&Json>,
    ) -> Result<ResultShape<'r>> {
        let processor = FieldsProcessor::new(
            &self.registry,
            &self.settings.input_formatter,
            &self.settings.output_formatter,
        );
        let required = || {
            fields.ok_or_else(|| RpcError::MissingRequiredParameter {
                parameter: "fields".into(),
            })
        };

        match action.action_type {
            ActionType::Read | ActionType::Create | ActionType::Update => Ok(ResultShape::Records(
                processor.process(SchemaContext::Resource(resource), required()?)?,
            )),
            ActionType::Destroy => Ok(ResultShape::Empty),
            ActionType::Action => {
                let Some(returns) = &action.returns else {
                    return Ok(ResultShape::Empty);
                };
                match Introspector::new(&self.registry).sub_selection(returns) {
                    Some(sub) => Ok(ResultShape::Records(processor.process(sub.context, required()?)?)),
                    None => {
                        let requested = fields
                            .and_then(Json::as_array)
                            .is_some_and(|f| !f.is_empty());
                        if requested || fields.is_some_and(|f| !f.is_array() && !f.is_null()) {
                            return Err(RpcError::FieldsNotSelectable {
                                action: rpc_action.name.clone(),
                            });
                        }
                        Ok(ResultShape::Value(returns))
                    }
                }
            }
        }
    }

    /// Input keys to internal names, values formatted by declared type.
    fn format_input(
        &self,
        resource: &Resource,
        action: &Action,
        input: &Map<String, Json>,
    ) -> Result<Map<String, Json>> {
        let formatter = &self.settings.input_formatter;
        let mut accepted: Vec<TypedField> = action
            .arguments
            .iter()
            .map(|arg| TypedField {
                name: arg.name.clone(),
                ty: arg.ty.clone(),
                allow_nil: !arg.is_required(),
                client_name: None,
            })
            .collect();
        if matches!(action.action_type, ActionType::Create | ActionType::Update) {
            accepted.extend(
                action
                    .accept
                    .iter()
                    .filter_map(|name| resource.attribute_named(name))
                    .map(|attr| TypedField::new(attr.name.clone(), attr.ty.clone())),
            );
        }

        let mut formatted = Map::new();
        for (key, value) in input {
            let field = formatter.find_typed_field(&accepted, key).ok_or_else(|| {
                RpcError::InvalidAttribute {
                    field: key.clone(),
                    reason: "is not accepted by this action".into(),
                }
            })?;
            let value = formatter.format_payload(value, Some(&field.ty), Direction::Input, &self.registry)?;
            formatted.insert(field.name.clone(), value);
        }

        let missing = |name: &str| formatted.get(name).map_or(true, Json::is_null);
        let output = &self.settings.output_formatter;
        for arg in &action.arguments {
            if arg.is_required() && missing(&arg.name) {
                return Err(RpcError::Required {
                    field: output.to_external(&arg.name),
                });
            }
        }
        if action.action_type == ActionType::Create {
            for attr in action.accept.iter().filter_map(|name| resource.attribute_named(name)) {
                if !attr.allow_nil && !attr.has_default && missing(&attr.name) {
                    return Err(RpcError::Required {
                        field: output.to_external(&attr.name),
                    });
                }
            }
        }

        for arg in &action.arguments {
            if let Some(default) = &arg.default {
                formatted.entry(arg.name.clone()).or_insert_with(|| default.clone());
            }
        }
        Ok(formatted)
    }

    fn resolve_identity(
        &self,
        rpc_action: &RpcAction,
        resource: &Resource,
        action: &Action,
        identity: Option<&Json>,
    ) -> Result<Option<Map<String, Json>>> {
        let Some(identity) = identity else {
            if action.requires_identity() {
                return Err(RpcError::MissingIdentity {
                    action: rpc_action.name.clone(),
                });
            }
            return Ok(None);
        };

        let invalid = |reason: &str| RpcError::InvalidIdentity {
            resource: resource.name.clone(),
            reason: reason.to_string(),
        };
        match identity {
            Json::Object(map) => {
                let keys: Map<String, Json> = map
                    .iter()
                    .map(|(k, v)| (self.settings.input_formatter.to_internal(k), v.clone()))
                    .collect();
                let covers = |wanted: &[String]| {
                    !wanted.is_empty()
                        && wanted.len() == keys.len()
                        && wanted.iter().all(|k| keys.contains_key(k))
                };
                if covers(&resource.primary_key) || resource.identities.iter().any(|i| covers(&i.keys)) {
                    Ok(Some(keys))
                } else {
                    Err(invalid("keys do not match the primary key or any identity"))
                }
            }
            Json::String(_) | Json::Number(_) => match resource.primary_key.as_slice() {
                [key] => Ok(Some(Map::from_iter([(key.clone(), identity.clone())]))),
                _ => Err(invalid("a composite primary key must be given as an object")),
            },
            _ => Err(invalid("identity must be a scalar or an object")),
        }
    }

    fn resolve_page(
        &self,
        rpc_action: &RpcAction,
        action: &Action,
        page: Option<&Json>,
    ) -> Result<Option<PageRequest>> {
        let pagination = action
            .pagination
            .as_ref()
            .filter(|_| action.action_type == ActionType::Read && !action.get);
        match (page, pagination) {
            (Some(page), Some(pagination)) => {
                PageRequest::parse(page, pagination, &self.settings.input_formatter).map(Some)
            }
            (Some(_), None) => Err(RpcError::InvalidPagination {
                reason: format!("action {} does not support pagination", rpc_action.name),
            }),
            (None, Some(pagination)) if pagination.required => Ok(Some(PageRequest {
                limit: pagination.default_limit,
                ..PageRequest::default()
            })),
            (None, _) => Ok(None),
        }
    }

    fn shape_data(&self, shape: &ResultShape<'_>, result: &ExecutionOutput, paginated: bool) -> Json {
        let processor = ResultProcessor::new(&self.settings.output_formatter);
        match shape {
            ResultShape::Empty => Json::Object(Map::new()),
            ResultShape::Value(ty) => processor.normalize_value_for_json(&result.data, Some(*ty)),
            ResultShape::Records(selection) => {
                let records = processor.process(&result.data, &selection.template);
                match &result.page {
                    Some(info) if paginated => self.page_object(records, info),
                    _ => records,
                }
            }
        }
    }

    fn page_object(&self, results: Json, info: &PageInfo) -> Json {
        let output = &self.settings.output_formatter;
        let mut page = Map::new();
        page.insert(output.to_external("results"), results);
        page.insert(output.to_external("has_more"), Json::Bool(info.more));
        page.insert(output.to_external("limit"), info.limit.map(Json::from).unwrap_or(Json::Null));
        match &info.kind {
            PageKind::Offset { offset } => {
                page.insert(output.to_external("offset"), Json::from(*offset));
            }
            PageKind::Keyset { after, before } => {
                page.insert(output.to_external("after"), after.clone().map(Json::from).unwrap_or(Json::Null));
                page.insert(output.to_external("before"), before.clone().map(Json::from).unwrap_or(Json::Null));
            }
        }
        if let Some(count) = info.count {
            page.insert(output.to_external("count"), Json::from(count));
        }
        Json::Object(page)
    }

    /// Engine errors keep their type; field references move to client names.
    fn engine_error(&self, error: ExecutionError) -> RpcError {
        warn!(error = %error, "action execution failed");
        let output = &self.settings.output_formatter;
        match error {
            ExecutionError::NotFound { resource } => RpcError::NotFound { resource },
            ExecutionError::Validation {
                message,
                fields,
                vars,
            } => RpcError::Validation {
                message,
                fields: fields.iter().map(|f| output.to_external_path(f)).collect(),
                vars: vars
                    .into_iter()
                    .map(|(name, value)| {
                        let value = match value {
                            Json::String(field) if name == "field" => {
                                Json::String(output.to_external_path(&field))
                            }
                            other => other,
                        };
                        (name, value)
                    })
                    .collect(),
            },
            ExecutionError::Engine { message } => RpcError::Engine { message },
        }
    }
}

fn resolve_metadata_fields<'r>(
    action: &'r Action,
    names: Option<&[String]>,
    formatter: &FieldFormatter,
) -> Result<Vec<&'r TypedField>> {
    names
        .unwrap_or_default()
        .iter()
        .map(|name| {
            formatter
                .find_typed_field(&action.metadata, name)
                .ok_or_else(|| RpcError::UnknownField {
                    field: name.clone(),
                    context: "metadata".into(),
                    path: name.clone(),
                })
        })
        .collect()
}
