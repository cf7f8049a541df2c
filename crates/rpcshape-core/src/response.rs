//! Response envelopes and the client error shape.

use serde_json::{json, Map, Value as Json};

use crate::error::{RpcError, SelectionCause};
use crate::formatter::FieldFormatter;

/// One entry of the `errors` list.
///
/// `message` is a template with `%{var}` placeholders filled from `vars`.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub error_type: &'static str,
    pub message: String,
    pub short_message: String,
    pub fields: Vec<String>,
    pub path: Option<String>,
    pub vars: Map<String, Json>,
    pub details: Option<Json>,
}

impl ErrorResponse {
    fn new(error: &RpcError, message: &str, short_message: &str) -> Self {
        Self {
            error_type: error.error_type(),
            message: message.to_string(),
            short_message: short_message.to_string(),
            fields: Vec::new(),
            path: None,
            vars: Map::new(),
            details: None,
        }
    }

    fn var(mut self, name: &str, value: impl Into<Json>) -> Self {
        self.vars.insert(name.to_string(), value.into());
        self
    }

    fn at(mut self, path: &str) -> Self {
        self.fields = vec![path.to_string()];
        self.path = Some(path.to_string());
        self
    }

    fn details(mut self, details: Json) -> Self {
        self.details = Some(details);
        self
    }

    pub fn from_error(error: &RpcError) -> Self {
        match error {
            RpcError::UnknownField { context, path, .. } => {
                Self::new(error, "Unknown field %{field} for %{resource}", "Unknown field")
                    .var("field", path.as_str())
                    .var("resource", context.as_str())
                    .at(path)
            }
            RpcError::RequiresFieldSelection {
                category,
                path,
                cause,
                ..
            } => Self::new(
                error,
                "%{field_type} %{field} requires field selection",
                "Field selection required",
            )
            .var("field_type", category.as_str())
            .var("field", path.as_str())
            .at(path)
            .details(json!({ "cause": cause_name(*cause) })),
            RpcError::DuplicateField { path, .. } => Self::new(
                error,
                "Field %{field} was requested multiple times",
                "Duplicate field",
            )
            .var("field", path.as_str())
            .at(path),
            RpcError::CalculationRequiresArgs { path, .. } => Self::new(
                error,
                "Calculation %{field} requires arguments",
                "Arguments required",
            )
            .var("field", path.as_str())
            .at(path),
            RpcError::InvalidCalculationArgs { path, reason, .. } => Self::new(
                error,
                "Invalid arguments for calculation %{field}: %{reason}",
                "Invalid calculation arguments",
            )
            .var("field", path.as_str())
            .var("reason", reason.as_str())
            .at(path),
            RpcError::InvalidFieldSelection { category, path, .. } => Self::new(
                error,
                "Cannot select fields from %{field_type} %{field}",
                "Invalid field selection",
            )
            .var("field_type", category.as_str())
            .var("field", path.as_str())
            .at(path),
            RpcError::FieldsNotSelectable { action } => Self::new(
                error,
                "Action %{action} returns a value without selectable fields",
                "Invalid field selection",
            )
            .var("action", action.as_str()),
            RpcError::FieldNormalization { path, reason } => Self::new(
                error,
                "Invalid field request at %{path}: %{reason}",
                "Invalid field format",
            )
            .var("path", path.as_str())
            .var("reason", reason.as_str())
            .at(path),
            RpcError::LoadNotAllowed { paths } | RpcError::LoadDenied { paths } => {
                let (message, short) = match error {
                    RpcError::LoadNotAllowed { .. } => {
                        ("Loading %{fields} is not allowed", "Load not allowed")
                    }
                    _ => ("Loading %{fields} is denied", "Load denied"),
                };
                let mut response = Self::new(error, message, short).var("fields", paths.join(", "));
                response.fields = paths.clone();
                response
            }
            RpcError::ActionNotFound { action } => {
                Self::new(error, "RPC action %{action} not found", "Action not found")
                    .var("action", action.as_str())
            }
            RpcError::MissingRequiredParameter { parameter } => Self::new(
                error,
                "Missing required parameter %{parameter}",
                "Missing parameter",
            )
            .var("parameter", parameter.as_str()),
            RpcError::InvalidPagination { reason } => {
                Self::new(error, "Invalid pagination: %{reason}", "Invalid pagination")
                    .var("reason", reason.as_str())
            }
            RpcError::NotFound { resource } => {
                Self::new(error, "%{resource} not found", "Not found")
                    .var("resource", resource.as_str())
            }
            RpcError::InvalidAttribute { field, reason } => Self::new(
                error,
                "Invalid value for %{field}: %{reason}",
                "Invalid attribute",
            )
            .var("field", field.as_str())
            .var("reason", reason.as_str())
            .at(field),
            RpcError::Required { field } => Self::new(error, "%{field} is required", "Required")
                .var("field", field.as_str())
                .at(field),
            RpcError::InvalidIdentity { resource, reason } => Self::new(
                error,
                "Invalid identity for %{resource}: %{reason}",
                "Invalid identity",
            )
            .var("resource", resource.as_str())
            .var("reason", reason.as_str()),
            RpcError::MissingIdentity { action } => Self::new(
                error,
                "Action %{action} requires an identity",
                "Identity required",
            )
            .var("action", action.as_str()),
            RpcError::Validation {
                message,
                fields,
                vars,
            } => {
                let mut response = Self::new(error, message, "Validation failed");
                response.vars = vars.clone();
                response.fields = fields.clone();
                response.path = fields.first().cloned();
                response
            }
            RpcError::Engine { message } => {
                Self::new(error, "%{message}", "Execution failed").var("message", message.as_str())
            }
        }
    }

    /// Render with envelope keys in the client convention. `vars` keys match
    /// the message placeholders and are left alone.
    pub fn to_json(&self, output: &FieldFormatter) -> Json {
        let mut out = Map::new();
        out.insert(output.to_external("type"), Json::from(self.error_type));
        out.insert(output.to_external("message"), Json::from(self.message.as_str()));
        out.insert(
            output.to_external("short_message"),
            Json::from(self.short_message.as_str()),
        );
        if !self.fields.is_empty() {
            out.insert(output.to_external("fields"), json!(self.fields));
        }
        if let Some(path) = &self.path {
            out.insert(output.to_external("path"), Json::from(path.as_str()));
        }
        out.insert(output.to_external("vars"), Json::Object(self.vars.clone()));
        if let Some(details) = &self.details {
            out.insert(output.to_external("details"), details.clone());
        }
        Json::Object(out)
    }

    /// Message with every `%{var}` substituted.
    pub fn rendered_message(&self) -> String {
        self.vars.iter().fold(self.message.clone(), |message, (name, value)| {
            let text = match value {
                Json::String(s) => s.clone(),
                other => other.to_string(),
            };
            message.replace(&format!("%{{{name}}}"), &text)
        })
    }
}

fn cause_name(cause: SelectionCause) -> &'static str {
    match cause {
        SelectionCause::Bare => "bare_field",
        SelectionCause::EmptyList => "empty_selection",
    }
}

/// `{success: true, data, metadata?}`
pub fn success_envelope(
    data: Json,
    metadata: Option<Map<String, Json>>,
    output: &FieldFormatter,
) -> Json {
    let mut out = Map::new();
    out.insert(output.to_external("success"), Json::Bool(true));
    out.insert(output.to_external("data"), data);
    if let Some(metadata) = metadata {
        out.insert(output.to_external("metadata"), Json::Object(metadata));
    }
    Json::Object(out)
}

/// `{success: false, errors: [...]}`
pub fn error_envelope(errors: &[RpcError], output: &FieldFormatter) -> Json {
    let mut out = Map::new();
    out.insert(output.to_external("success"), Json::Bool(false));
    out.insert(
        output.to_external("errors"),
        Json::Array(
            errors
                .iter()
                .map(|e| ErrorResponse::from_error(e).to_json(output))
                .collect(),
        ),
    );
    Json::Object(out)
}
