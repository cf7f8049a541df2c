//! Boundary to the engine that actually runs actions.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value as Json};

use crate::error::ExecutionError;
use crate::fields::LoadEntry;
use crate::request::{PageRequest, SortTerm};
use crate::schema::ActionType;
use crate::value::Value;

/// Everything the engine needs to run one action, in internal names.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRequest {
    pub resource: String,
    pub action: String,
    pub action_type: ActionType,
    pub input: Map<String, Json>,
    /// Primary key or identity values, keyed by attribute
    pub identity: Option<Map<String, Json>>,
    pub select: Vec<String>,
    pub load: Vec<LoadEntry>,
    pub filter: Option<Json>,
    pub sort: Vec<SortTerm>,
    pub page: Option<PageRequest>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageKind {
    Offset { offset: u64 },
    Keyset {
        after: Option<String>,
        before: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageInfo {
    pub kind: PageKind,
    pub limit: Option<u64>,
    pub more: bool,
    pub count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutput {
    /// A record, a list of records or a generic action's return value
    pub data: Value,
    /// Present when the engine paginated the result
    pub page: Option<PageInfo>,
    /// Action metadata by internal name
    pub metadata: BTreeMap<String, Value>,
}

impl ExecutionOutput {
    pub fn new(data: impl Into<Value>) -> Self {
        Self {
            data: data.into(),
            page: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_page(mut self, page: PageInfo) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_metadata(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(name.into(), value.into());
        self
    }
}

/// Runs a resolved action. Implemented by the host application.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionOutput, ExecutionError>;
}
