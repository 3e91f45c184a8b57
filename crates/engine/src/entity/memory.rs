//! Entity controller over an in-process map of URI to JSON text.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::{require_uri, EntityController, EntityError};

/// Holds entity representations in memory.
///
/// Useful when embedding the engine next to the entity store, and in tests.
/// Updating a URI that was never inserted fails with `NotFound`, like an
/// update against a missing remote resource.
#[derive(Debug, Default)]
pub struct InMemoryEntityController {
    entities: RwLock<HashMap<String, String>>,
}

impl InMemoryEntityController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, uri: &str, body: &str) {
        self.entities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(uri.to_string(), body.to_string());
    }

    pub fn get(&self, uri: &str) -> Option<String> {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(uri)
            .cloned()
    }
}

fn poisoned(uri: &str) -> EntityError {
    EntityError::Transport {
        uri: uri.to_string(),
        message: "in-memory entity map poisoned".to_string(),
    }
}

#[async_trait]
impl EntityController for InMemoryEntityController {
    async fn load_entity(&self, uri: &str) -> Result<String, EntityError> {
        let uri = require_uri(uri)?;
        let entities = self.entities.read().map_err(|_| poisoned(uri))?;
        entities
            .get(uri)
            .cloned()
            .ok_or_else(|| EntityError::NotFound {
                uri: uri.to_string(),
            })
    }

    async fn update_entity(&self, uri: &str, body: &str) -> Result<(), EntityError> {
        let uri = require_uri(uri)?;
        let mut entities = self.entities.write().map_err(|_| poisoned(uri))?;
        match entities.get_mut(uri) {
            Some(current) => {
                *current = body.to_string();
                Ok(())
            }
            None => Err(EntityError::NotFound {
                uri: uri.to_string(),
            }),
        }
    }
}
