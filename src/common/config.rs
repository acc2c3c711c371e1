//! Configuration file handling

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::paths::{config_env_path, default_config_path};
use super::{Error, Result};
use crate::client::{ClientConfig, ClientDefinition, ClientKind, ClientRegistry};

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Settings merged into every client definition that does not set them
    #[serde(default)]
    pub defaults: Defaults,

    /// Client definitions by name
    #[serde(default)]
    pub clients: HashMap<String, ClientDefinition>,
}

/// Defaults shared across clients
#[derive(Debug, Deserialize, Default)]
pub struct Defaults {
    /// Applied to every AWS-backed client (region, endpoint_url, profile)
    #[serde(default)]
    pub aws: ClientConfig,

    /// Applied to every client regardless of kind
    #[serde(flatten)]
    pub common: ClientConfig,
}

fn is_aws(kind: ClientKind) -> bool {
    matches!(
        kind,
        ClientKind::S3
            | ClientKind::Sqs
            | ClientKind::Kinesis
            | ClientKind::Cloudwatch
            | ClientKind::Ssm
    )
}

impl Config {
    /// Load configuration from `$SMOKE_HARNESS_CONFIG` or the default location
    ///
    /// A file named by the environment variable must exist. A missing
    /// platform default yields an empty configuration.
    pub fn load() -> Result<Self> {
        Self::load_resolved(config_env_path(), default_config_path())
    }

    fn load_resolved(explicit: Option<PathBuf>, default: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(&path);
        }
        match default {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path, which must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse TOML text and apply defaults to every client
    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Self =
            toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))?;
        config.apply_defaults();
        Ok(config)
    }

    fn apply_defaults(&mut self) {
        for definition in self.clients.values_mut() {
            if is_aws(definition.kind) {
                definition.config.merge_defaults(&self.defaults.aws);
            }
            definition.config.merge_defaults(&self.defaults.common);
        }
    }

    /// Get a client definition by name
    pub fn get_client(&self, name: &str) -> Option<&ClientDefinition> {
        self.clients.get(name)
    }

    /// Client names, sorted
    pub fn client_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.clients.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build a registry holding every configured client definition
    pub fn registry(&self) -> ClientRegistry {
        ClientRegistry::with_definitions(self.clients.clone())
    }
}
