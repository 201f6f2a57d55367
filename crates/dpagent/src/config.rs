//! Agent configuration loaded from YAML.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dpagent_engine::AclEngine;
use dpagent_idxmap::{DependencyCache, InterfaceIndex};
use serde::Deserialize;
use thiserror::Error;

use crate::acl::{AclConfigurator, AclConfiguratorConfig};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Top-level agent configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Capacity of each registry subscriber channel
    pub watch_channel_capacity: usize,
    /// Skip pending attachments identical to one already cached
    pub dedup_pending_attachments: bool,
    /// ACL configurator settings
    pub acl: AclConfiguratorConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            watch_channel_capacity: 32,
            dedup_pending_attachments: true,
            acl: AclConfiguratorConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Parses a configuration document. Missing keys keep their defaults.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Builds an ACL configurator with these settings.
    pub fn acl_configurator(
        &self,
        engine: AclEngine,
        interfaces: Arc<dyn InterfaceIndex>,
    ) -> AclConfigurator {
        AclConfigurator::new(
            self.acl.clone(),
            engine,
            interfaces,
            DependencyCache::new(self.dedup_pending_attachments),
        )
    }
}
