//! Sources of per-entity-type transition tables.
//!
//! A loader returns the flat JSON table for an entity type, or `None` when no
//! custom table exists, in which case the built-in table stays in effect.
//! "Not found" is never an error.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// Errors a loader can raise for reasons other than "not found".
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoaderError {
    /// The entity type cannot be mapped to a configuration location.
    #[error("entity type '{entity_type}' cannot name a configuration file")]
    InvalidEntityType { entity_type: String },

    #[error("failed to read state machine configuration '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Supplies the transition table for an entity type.
#[async_trait]
pub trait StateMachineConfigLoader: Send + Sync {
    async fn load_configuration(&self, entity_type: &str)
        -> Result<Option<String>, ConfigLoaderError>;
}

// ──────────────────────────────────────────────
// DefaultConfigLoader
// ──────────────────────────────────────────────

/// Never supplies a table: every entity type uses the built-in one.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConfigLoader;

#[async_trait]
impl StateMachineConfigLoader for DefaultConfigLoader {
    async fn load_configuration(
        &self,
        _entity_type: &str,
    ) -> Result<Option<String>, ConfigLoaderError> {
        Ok(None)
    }
}

// ──────────────────────────────────────────────
// StaticConfigLoader
// ──────────────────────────────────────────────

/// Tables held in memory, keyed by entity type.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigLoader {
    configurations: HashMap<String, String>,
}

impl StaticConfigLoader {
    pub fn new(configurations: HashMap<String, String>) -> Self {
        Self { configurations }
    }

    pub fn with(mut self, entity_type: &str, json: &str) -> Self {
        self.configurations
            .insert(entity_type.to_string(), json.to_string());
        self
    }
}

#[async_trait]
impl StateMachineConfigLoader for StaticConfigLoader {
    async fn load_configuration(
        &self,
        entity_type: &str,
    ) -> Result<Option<String>, ConfigLoaderError> {
        Ok(self.configurations.get(entity_type).cloned())
    }
}

// ──────────────────────────────────────────────
// DirectoryConfigLoader
// ──────────────────────────────────────────────

/// Reads `{dir}/{entity_type}.json`. A missing file means "no custom table".
#[derive(Debug, Clone)]
pub struct DirectoryConfigLoader {
    dir: PathBuf,
}

impl DirectoryConfigLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, entity_type: &str) -> Result<PathBuf, ConfigLoaderError> {
        let valid = !entity_type.is_empty()
            && entity_type != "."
            && entity_type != ".."
            && !entity_type.contains(['/', '\\']);
        if !valid {
            return Err(ConfigLoaderError::InvalidEntityType {
                entity_type: entity_type.to_string(),
            });
        }
        Ok(self.dir.join(format!("{entity_type}.json")))
    }
}

#[async_trait]
impl StateMachineConfigLoader for DirectoryConfigLoader {
    async fn load_configuration(
        &self,
        entity_type: &str,
    ) -> Result<Option<String>, ConfigLoaderError> {
        let path = self.path_for(entity_type)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(json) => {
                tracing::debug!(entity_type, path = %path.display(), "loaded state machine configuration");
                Ok(Some(json))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigLoaderError::Io { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_loader_supplies_nothing() {
        assert_eq!(
            DefaultConfigLoader.load_configuration("Job").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn static_loader_looks_up_by_entity_type() {
        let loader = StaticConfigLoader::default().with("Job", "{}");
        assert_eq!(
            loader.load_configuration("Job").await.unwrap().as_deref(),
            Some("{}")
        );
        assert_eq!(loader.load_configuration("Order").await.unwrap(), None);
    }

    #[tokio::test]
    async fn directory_loader_reads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Job.json"), r#"{"A-Go":"B"}"#).unwrap();
        let loader = DirectoryConfigLoader::new(dir.path());

        assert_eq!(
            loader.load_configuration("Job").await.unwrap().as_deref(),
            Some(r#"{"A-Go":"B"}"#)
        );
        assert_eq!(loader.load_configuration("Order").await.unwrap(), None);
    }

    #[tokio::test]
    async fn directory_loader_rejects_path_like_entity_types() {
        let loader = DirectoryConfigLoader::new("/tmp");
        for entity_type in ["", "..", "../etc/passwd", "a\\b"] {
            let err = loader.load_configuration(entity_type).await.unwrap_err();
            assert!(matches!(err, ConfigLoaderError::InvalidEntityType { .. }));
        }
    }
}
