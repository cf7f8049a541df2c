//! Configuration management for rpcshape components

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Main configuration structure for rpcshape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcShapeConfig {
    /// Client-facing field name conventions
    pub formatting: FormattingConfig,

    /// RPC actions exposed to clients
    #[serde(default)]
    pub actions: Vec<RpcActionConfig>,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

/// Casing convention for client-facing field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldCase {
    CamelCase,
    PascalCase,
    SnakeCase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormattingConfig {
    /// Convention clients use for request keys
    pub input_field_formatter: FieldCase,

    /// Convention used for response keys and error paths
    pub output_field_formatter: FieldCase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcActionConfig {
    /// Name clients call
    pub name: String,

    /// Resource the action belongs to
    pub resource: String,

    /// Action name on the resource
    pub action: String,

    /// Dotted load paths clients may request; everything else is rejected
    #[serde(default)]
    pub allow_only_loads: Option<Vec<String>>,

    /// Dotted load paths clients may never request
    #[serde(default)]
    pub deny_loads: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json or pretty)
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics collection
    pub enabled: bool,

    /// Prometheus metrics bind address
    pub bind_address: String,
}

impl Default for RpcShapeConfig {
    fn default() -> Self {
        Self {
            formatting: FormattingConfig {
                input_field_formatter: FieldCase::CamelCase,
                output_field_formatter: FieldCase::CamelCase,
            },
            actions: Vec::new(),
            observability: ObservabilityConfig {
                logging: LoggingConfig {
                    level: "info".to_string(),
                    format: "json".to_string(),
                },
                metrics: MetricsConfig {
                    enabled: false,
                    bind_address: "0.0.0.0:9090".to_string(),
                },
            },
        }
    }
}

impl RpcShapeConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("rpcshape.toml")
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut builder =
            Config::builder().add_source(Config::try_from(&RpcShapeConfig::default())?);

        if path.as_ref().exists() {
            builder = builder.add_source(File::from(path.as_ref()));
        }

        // Environment wins over the file
        let config: Self = builder
            .add_source(Environment::with_prefix("RPCSHAPE").separator("__"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(&RpcShapeConfig::default())?)
            .add_source(Environment::with_prefix("RPCSHAPE").separator("__"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject action declarations that cannot be served.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for action in &self.actions {
            if !names.insert(action.name.as_str()) {
                return Err(ConfigError::Message(format!(
                    "rpc action `{}` is declared more than once",
                    action.name
                )));
            }
            if action.allow_only_loads.is_some() && action.deny_loads.is_some() {
                return Err(ConfigError::Message(format!(
                    "rpc action `{}` declares both allow_only_loads and deny_loads",
                    action.name
                )));
            }
        }
        Ok(())
    }
}
