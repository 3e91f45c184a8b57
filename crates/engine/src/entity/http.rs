//! HTTP entity controller: GET to load, PUT to update.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` to avoid
//! blocking the async runtime.

use std::time::Duration;

use async_trait::async_trait;

use super::{require_uri, EntityController, EntityError};

/// Env var consulted when no auth token is configured.
pub const AUTH_TOKEN_ENV: &str = "LIFECYCLE_ENTITY_AUTH_TOKEN";

/// Entity controller speaking plain JSON over HTTP.
///
/// - `auth_token` is sent as `Authorization: Bearer <token>` when set
/// - a 404 on load is reported as [`EntityError::NotFound`]
pub struct HttpEntityController {
    agent: ureq::Agent,
    auth_token: Option<String>,
}

impl HttpEntityController {
    /// Create a controller whose requests time out after `timeout`.
    ///
    /// `auth_token` falls back to the `LIFECYCLE_ENTITY_AUTH_TOKEN` env var.
    pub fn new(auth_token: Option<String>, timeout: Duration) -> Self {
        let auth_token = auth_token.or_else(|| std::env::var(AUTH_TOKEN_ENV).ok());
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        HttpEntityController { agent, auth_token }
    }

    fn authorization(&self) -> Option<String> {
        self.auth_token
            .as_ref()
            .map(|token| format!("Bearer {}", token))
    }
}

fn map_ureq_error(uri: &str, error: ureq::Error, not_found_is_missing: bool) -> EntityError {
    match error {
        ureq::Error::StatusCode(404) if not_found_is_missing => EntityError::NotFound {
            uri: uri.to_string(),
        },
        ureq::Error::StatusCode(status) => EntityError::Status {
            uri: uri.to_string(),
            status,
        },
        other => EntityError::Transport {
            uri: uri.to_string(),
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl EntityController for HttpEntityController {
    async fn load_entity(&self, uri: &str) -> Result<String, EntityError> {
        let uri = require_uri(uri)?.to_string();
        let agent = self.agent.clone();
        let authorization = self.authorization();
        let target = uri.clone();

        tracing::debug!(uri = %uri, "loading entity");
        tokio::task::spawn_blocking(move || {
            let mut request = agent.get(&target).header("Accept", "application/json");
            if let Some(ref value) = authorization {
                request = request.header("Authorization", value);
            }
            let response = request
                .call()
                .map_err(|e| map_ureq_error(&target, e, true))?;
            response
                .into_body()
                .read_to_string()
                .map_err(|e| map_ureq_error(&target, e, false))
        })
        .await
        .map_err(|e| EntityError::Transport {
            uri,
            message: format!("task join error: {}", e),
        })?
    }

    async fn update_entity(&self, uri: &str, body: &str) -> Result<(), EntityError> {
        let uri = require_uri(uri)?.to_string();
        let agent = self.agent.clone();
        let authorization = self.authorization();
        let target = uri.clone();
        let body = body.to_string();

        tracing::debug!(uri = %uri, "updating entity");
        tokio::task::spawn_blocking(move || {
            let mut request = agent
                .put(&target)
                .header("Content-Type", "application/json");
            if let Some(ref value) = authorization {
                request = request.header("Authorization", value);
            }
            request
                .send(body.as_str())
                .map(|_| ())
                .map_err(|e| map_ureq_error(&target, e, false))
        })
        .await
        .map_err(|e| EntityError::Transport {
            uri,
            message: format!("task join error: {}", e),
        })?
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_uri_is_rejected_before_any_request() {
        let controller = HttpEntityController::new(None, Duration::from_secs(1));
        assert_eq!(
            controller.load_entity("").await.unwrap_err(),
            EntityError::MissingUri
        );
        assert_eq!(
            controller.update_entity("  ", "{}").await.unwrap_err(),
            EntityError::MissingUri
        );
    }

    #[test]
    fn configured_token_becomes_bearer_header() {
        let controller =
            HttpEntityController::new(Some("secret".to_string()), Duration::from_secs(1));
        assert_eq!(controller.authorization().as_deref(), Some("Bearer secret"));
    }

    #[test]
    fn status_404_maps_to_not_found_only_on_load() {
        assert_eq!(
            map_ureq_error("http://h/Jobs(1)", ureq::Error::StatusCode(404), true),
            EntityError::NotFound {
                uri: "http://h/Jobs(1)".to_string()
            }
        );
        assert_eq!(
            map_ureq_error("http://h/Jobs(1)", ureq::Error::StatusCode(404), false),
            EntityError::Status {
                uri: "http://h/Jobs(1)".to_string(),
                status: 404
            }
        );
    }
}
