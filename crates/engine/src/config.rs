//! Engine configuration file.
//!
//! Selects the collaborator implementations at startup. Every section is
//! optional; an empty file yields the built-in table, HTTP entity access and
//! HTTP callouts with no definitions.
//!
//! # Example
//!
//! ```toml
//! change_state_timeout_secs = 60
//!
//! [config_loader]
//! kind = "directory"
//! path = "state-machines"      # {path}/{entity_type}.json
//!
//! [entity]
//! auth_token = "..."           # falls back to LIFECYCLE_ENTITY_AUTH_TOKEN
//! timeout_secs = 30
//!
//! [callouts]
//! kind = "http"                # or "disabled"
//! timeout_secs = 10
//! definitions = "callouts.json"
//! ```
//!
//! Relative paths are resolved against the directory of the config file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use lifecycle_storage::{InMemoryCalloutDefinitionStore, StateChangeLockStore, StorageError};
use serde::Deserialize;

use crate::callout::http::HttpCalloutExecutor;
use crate::callout::{CalloutExecutor, DisabledCalloutExecutor};
use crate::config_loader::{DefaultConfigLoader, DirectoryConfigLoader, StateMachineConfigLoader};
use crate::entity::http::HttpEntityController;
use crate::manager::{Collaborators, LifeCycleManagerFactory};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{}'", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse engine configuration")]
    Parse(#[from] toml::de::Error),

    #[error("invalid callout definitions '{}'", path.display())]
    Definitions {
        path: PathBuf,
        #[source]
        source: StorageError,
    },

    #[error("invalid engine configuration: {0}")]
    Invalid(String),
}

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub config_loader: ConfigLoaderSettings,
    pub entity: EntitySettings,
    pub callouts: CalloutSettings,
    /// Upper bound on one `change_state` attempt. Unbounded when unset.
    pub change_state_timeout_secs: Option<u64>,
}

/// `[config_loader]`: where transition tables come from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ConfigLoaderSettings {
    /// Every entity type uses the built-in table.
    #[default]
    #[serde(rename = "default")]
    Builtin,
    /// One `{entity_type}.json` file per entity type.
    Directory { path: PathBuf },
}

/// `[entity]`: the HTTP entity controller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntitySettings {
    pub auth_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EntitySettings {
    fn default() -> Self {
        EntitySettings {
            auth_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalloutKind {
    #[default]
    Http,
    Disabled,
}

/// `[callouts]`: the callout executor and its definitions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalloutSettings {
    pub kind: CalloutKind,
    pub timeout_secs: u64,
    /// JSON array of callout definitions. No callouts fire when unset.
    pub definitions: Option<PathBuf>,
}

impl Default for CalloutSettings {
    fn default() -> Self {
        CalloutSettings {
            kind: CalloutKind::Http,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            definitions: None,
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl EngineConfig {
    /// Parse a configuration document. Relative paths are kept as written.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration file, resolving relative paths against its
    /// directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        if let ConfigLoaderSettings::Directory { path } = &mut config.config_loader {
            *path = resolve(base, path);
        }
        if let Some(definitions) = &mut config.callouts.definitions {
            *definitions = resolve(base, definitions);
        }
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.entity.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "entity.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.callouts.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "callouts.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.change_state_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "change_state_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn change_state_timeout(&self) -> Option<Duration> {
        self.change_state_timeout_secs.map(Duration::from_secs)
    }

    /// The configured transition table source.
    pub fn build_config_loader(&self) -> Arc<dyn StateMachineConfigLoader> {
        match &self.config_loader {
            ConfigLoaderSettings::Builtin => Arc::new(DefaultConfigLoader),
            ConfigLoaderSettings::Directory { path } => {
                Arc::new(DirectoryConfigLoader::new(path.clone()))
            }
        }
    }

    /// Wire the configured collaborators around `locks` into a factory.
    pub fn build_factory(
        &self,
        locks: Arc<dyn StateChangeLockStore>,
    ) -> Result<LifeCycleManagerFactory, ConfigError> {
        let entities = Arc::new(HttpEntityController::new(
            self.entity.auth_token.clone(),
            Duration::from_secs(self.entity.timeout_secs),
        ));

        let callouts: Arc<dyn CalloutExecutor> = match self.callouts.kind {
            CalloutKind::Http => Arc::new(HttpCalloutExecutor::new(Duration::from_secs(
                self.callouts.timeout_secs,
            ))),
            CalloutKind::Disabled => Arc::new(DisabledCalloutExecutor),
        };

        let definitions = match &self.callouts.definitions {
            Some(path) => load_definitions(path)?,
            None => InMemoryCalloutDefinitionStore::new(),
        };
        tracing::debug!(
            definitions = definitions.len(),
            callouts = ?self.callouts.kind,
            "engine collaborators configured"
        );

        let collaborators = Collaborators {
            entities,
            callouts,
            definitions: Arc::new(definitions),
            locks,
        };
        Ok(
            LifeCycleManagerFactory::new(self.build_config_loader(), collaborators)
                .with_timeout(self.change_state_timeout()),
        )
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn load_definitions(path: &Path) -> Result<InMemoryCalloutDefinitionStore, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    InMemoryCalloutDefinitionStore::from_json(&content).map_err(|source| {
        ConfigError::Definitions {
            path: path.to_path_buf(),
            source,
        }
    })
}
