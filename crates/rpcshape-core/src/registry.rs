use std::collections::BTreeMap;

use crate::error::{Result, RpcError};
use crate::schema::{Action, Resource};

/// Resources known to the RPC layer, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    resources: BTreeMap<String, Resource>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource, replacing any previous one with the same name.
    pub fn register(&mut self, resource: Resource) -> &mut Self {
        self.resources.insert(resource.name.clone(), resource);
        self
    }

    pub fn with(mut self, resource: Resource) -> Self {
        self.register(resource);
        self
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.get(name)
    }

    pub fn all_resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    pub fn get_resource_by_name(&self, name: &str) -> Result<&Resource> {
        self.resource(name).ok_or_else(|| RpcError::Engine {
            message: format!("Resource with name `{}` not found", name),
        })
    }

    /// Look up `action` on `resource`; unknown names surface as `action_not_found`.
    pub fn get_action(&self, resource: &str, action: &str) -> Result<(&Resource, &Action)> {
        let not_found = || RpcError::ActionNotFound {
            action: format!("{resource}.{action}"),
        };
        let res = self.resource(resource).ok_or_else(not_found)?;
        let act = res.action_named(action).ok_or_else(not_found)?;
        Ok((res, act))
    }
}
