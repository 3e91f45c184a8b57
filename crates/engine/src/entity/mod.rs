//! Fetching and updating entity representations.
//!
//! The engine never talks to an entity endpoint directly: it goes through an
//! [`EntityController`], which moves the representation as JSON text.

pub mod http;
pub mod memory;

use async_trait::async_trait;

/// Errors raised while loading or updating an entity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntityError {
    /// No URI was given.
    #[error("entity uri must not be empty")]
    MissingUri,

    #[error("no entity at '{uri}'")]
    NotFound { uri: String },

    /// The endpoint answered with a non-success status.
    #[error("request to '{uri}' failed with status {status}")]
    Status { uri: String, status: u16 },

    /// The request could not be completed (connection, timeout, body read).
    #[error("request to '{uri}' failed: {message}")]
    Transport { uri: String, message: String },
}

/// Reads and writes the JSON representation of an entity at a URI.
#[async_trait]
pub trait EntityController: Send + Sync {
    async fn load_entity(&self, uri: &str) -> Result<String, EntityError>;

    /// Replace the representation at `uri` with `body`.
    async fn update_entity(&self, uri: &str, body: &str) -> Result<(), EntityError>;
}

pub(crate) fn require_uri(uri: &str) -> Result<&str, EntityError> {
    let uri = uri.trim();
    if uri.is_empty() {
        Err(EntityError::MissingUri)
    } else {
        Ok(uri)
    }
}
