//! Error types for rpcshape core

use std::fmt;

use thiserror::Error;

/// What kind of schema entry an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCategory {
    Attribute,
    Calculation,
    Aggregate,
    Relationship,
    Embedded,
    Union,
    ComplexType,
    UnionMember,
}

impl FieldCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldCategory::Attribute => "attribute",
            FieldCategory::Calculation => "calculation",
            FieldCategory::Aggregate => "aggregate",
            FieldCategory::Relationship => "relationship",
            FieldCategory::Embedded => "embedded_resource",
            FieldCategory::Union => "union",
            FieldCategory::ComplexType => "complex_type",
            FieldCategory::UnionMember => "union_member",
        }
    }
}

impl fmt::Display for FieldCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a container field ended up without a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionCause {
    /// Requested as a bare name.
    Bare,
    /// Requested with an explicit empty list.
    EmptyList,
}

/// Failure reported by the execution engine, in internal field names.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("{message}")]
    Validation {
        message: String,
        fields: Vec<String>,
        vars: serde_json::Map<String, serde_json::Value>,
    },

    #[error("{message}")]
    Engine { message: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RpcError {
    #[error("Unknown field `{path}` on {context}")]
    UnknownField {
        field: String,
        context: String,
        path: String,
    },

    #[error("{category} `{path}` requires a field selection")]
    RequiresFieldSelection {
        category: FieldCategory,
        field: String,
        path: String,
        cause: SelectionCause,
    },

    #[error("Field `{path}` is requested more than once")]
    DuplicateField { field: String, path: String },

    #[error("Calculation `{path}` requires arguments")]
    CalculationRequiresArgs { field: String, path: String },

    #[error("Invalid arguments for calculation `{path}`: {reason}")]
    InvalidCalculationArgs {
        field: String,
        path: String,
        reason: String,
    },

    #[error("Cannot select fields from {category} `{path}`")]
    InvalidFieldSelection {
        category: FieldCategory,
        field: String,
        path: String,
    },

    #[error("Action `{action}` returns a value without selectable fields")]
    FieldsNotSelectable { action: String },

    #[error("Invalid field request at `{path}`: {reason}")]
    FieldNormalization { path: String, reason: String },

    #[error("Loading {} is not allowed", .paths.join(", "))]
    LoadNotAllowed { paths: Vec<String> },

    #[error("Loading {} is denied", .paths.join(", "))]
    LoadDenied { paths: Vec<String> },

    #[error("RPC action `{action}` not found")]
    ActionNotFound { action: String },

    #[error("Missing required parameter `{parameter}`")]
    MissingRequiredParameter { parameter: String },

    #[error("Invalid pagination: {reason}")]
    InvalidPagination { reason: String },

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("Invalid input `{field}`: {reason}")]
    InvalidAttribute { field: String, reason: String },

    #[error("Input `{field}` is required")]
    Required { field: String },

    #[error("Invalid identity for {resource}: {reason}")]
    InvalidIdentity { resource: String, reason: String },

    #[error("Action `{action}` requires an identity")]
    MissingIdentity { action: String },

    #[error("{message}")]
    Validation {
        message: String,
        fields: Vec<String>,
        vars: serde_json::Map<String, serde_json::Value>,
    },

    #[error("{message}")]
    Engine { message: String },
}

impl RpcError {
    /// Stable machine-readable code clients switch on.
    pub fn error_type(&self) -> &'static str {
        match self {
            RpcError::UnknownField { .. } => "unknown_field",
            RpcError::RequiresFieldSelection { .. } => "requires_field_selection",
            RpcError::DuplicateField { .. } => "duplicate_field",
            RpcError::CalculationRequiresArgs { .. } => "calculation_requires_args",
            RpcError::InvalidCalculationArgs { .. } => "invalid_calculation_args",
            RpcError::InvalidFieldSelection { .. } | RpcError::FieldsNotSelectable { .. } => {
                "invalid_field_selection"
            }
            RpcError::FieldNormalization { .. } => "field_normalization_error",
            RpcError::LoadNotAllowed { .. } => "load_not_allowed",
            RpcError::LoadDenied { .. } => "load_denied",
            RpcError::ActionNotFound { .. } => "action_not_found",
            RpcError::MissingRequiredParameter { .. } => "missing_required_parameter",
            RpcError::InvalidPagination { .. } => "invalid_pagination",
            RpcError::NotFound { .. } => "not_found",
            RpcError::InvalidAttribute { .. } => "invalid_attribute",
            RpcError::Required { .. } => "required",
            RpcError::InvalidIdentity { .. } => "invalid_identity",
            RpcError::MissingIdentity { .. } => "missing_identity",
            RpcError::Validation { .. } => "validation_error",
            RpcError::Engine { .. } => "ash_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
