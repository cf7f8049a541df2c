//! Per-action allow/deny lists over the resolved load tree.

use rpcshape_shared::RpcActionConfig;
use tracing::debug;

use crate::error::{Result, RpcError};
use crate::fields::LoadEntry;
use crate::formatter::FieldFormatter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadRestriction {
    /// Only these dotted paths (and their ancestors) may be loaded
    AllowOnly(Vec<String>),
    /// These dotted paths and everything beneath them are refused
    Deny(Vec<String>),
}

impl LoadRestriction {
    /// Restriction declared by an action, if any. Configuration validation
    /// guarantees at most one list is set.
    pub fn from_config(config: &RpcActionConfig) -> Option<Self> {
        match (&config.allow_only_loads, &config.deny_loads) {
            (Some(allow), _) => Some(LoadRestriction::AllowOnly(allow.clone())),
            (None, Some(deny)) => Some(LoadRestriction::Deny(deny.clone())),
            (None, None) => None,
        }
    }

    /// Check every requested load path, reporting all violations at once.
    ///
    /// Paths are internal dotted names; the error lists them in client form.
    pub fn check(&self, load: &[LoadEntry], formatter: &FieldFormatter) -> Result<()> {
        let mut paths = Vec::new();
        collect_paths(load, "", &mut paths);

        let violations: Vec<String> = paths
            .iter()
            .filter(|path| !self.permits(path))
            .map(|path| formatter.to_external_path(path))
            .collect();

        debug!(
            checked = paths.len(),
            violations = violations.len(),
            "checked load restrictions"
        );

        if violations.is_empty() {
            return Ok(());
        }
        Err(match self {
            LoadRestriction::AllowOnly(_) => RpcError::LoadNotAllowed { paths: violations },
            LoadRestriction::Deny(_) => RpcError::LoadDenied { paths: violations },
        })
    }

    fn permits(&self, path: &str) -> bool {
        match self {
            LoadRestriction::AllowOnly(allowed) => allowed
                .iter()
                .any(|entry| entry == path || is_beneath(entry, path)),
            LoadRestriction::Deny(denied) => !denied
                .iter()
                .any(|entry| entry == path || is_beneath(path, entry)),
        }
    }
}

/// `path` lies strictly under `ancestor`.
fn is_beneath(path: &str, ancestor: &str) -> bool {
    path.strip_prefix(ancestor)
        .is_some_and(|rest| rest.starts_with('.'))
}

/// Dotted paths of everything actually loaded: relationships, calculations
/// and aggregates. Embedded and union entries only contribute a prefix.
fn collect_paths(load: &[LoadEntry], prefix: &str, out: &mut Vec<String>) {
    for entry in load {
        let path = if prefix.is_empty() {
            entry.name().to_string()
        } else {
            format!("{prefix}.{}", entry.name())
        };
        match entry {
            LoadEntry::Field { .. } => out.push(path),
            LoadEntry::Calculation { load, .. } | LoadEntry::Relationship { load, .. } => {
                out.push(path.clone());
                collect_paths(load, &path, out);
            }
            LoadEntry::Nested { load, .. } => collect_paths(load, &path, out),
            LoadEntry::Union { members, .. } => {
                for member in members {
                    collect_paths(&member.load, &format!("{path}.{}", member.tag), out);
                }
            }
        }
    }
}
