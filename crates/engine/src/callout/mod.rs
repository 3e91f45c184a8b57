//! Callout execution: one outbound notification per configured definition.
//!
//! A definition's `parameters` blob is interpreted by the executor. For the
//! HTTP executor it must be a JSON object carrying an absolute `callout-url`:
//!
//! ```json
//! { "callout-url": "https://hooks.example.com/jobs" }
//! ```

pub mod http;

use async_trait::async_trait;
use lifecycle_core::CalloutData;

/// Key of the target URL inside a definition's parameters.
pub const CALLOUT_URL_KEY: &str = "callout-url";

/// Errors raised while executing a callout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalloutError {
    /// The parameters do not name an absolute http(s) URL. Raised before any
    /// network call.
    #[error("invalid callout url: {message}")]
    InvalidUrl { message: String },

    /// No payload was supplied.
    #[error("callout data must be provided")]
    MissingData,

    /// The endpoint answered with a non-success status.
    #[error("callout to '{url}' failed with status {status}")]
    Status { url: String, status: u16 },

    /// The request could not be completed.
    #[error("callout to '{url}' failed: {message}")]
    Transport { url: String, message: String },
}

impl CalloutError {
    /// Whether the failure happened on the wire rather than in validation.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            CalloutError::Status { .. } | CalloutError::Transport { .. }
        )
    }
}

/// Performs one outbound callout. Implementations do not retry.
#[async_trait]
pub trait CalloutExecutor: Send + Sync {
    /// Execute the callout described by `parameters` with `data` as payload.
    ///
    /// `parameters` is validated before `data`.
    async fn execute_callout(
        &self,
        parameters: &str,
        data: Option<&CalloutData>,
    ) -> Result<(), CalloutError>;
}

/// Extract and validate the `callout-url` of a parameters blob.
pub fn parse_callout_url(parameters: &str) -> Result<String, CalloutError> {
    let value: serde_json::Value =
        serde_json::from_str(parameters).map_err(|e| CalloutError::InvalidUrl {
            message: format!("callout parameters are not valid JSON: {}", e),
        })?;
    let url = value
        .get(CALLOUT_URL_KEY)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| CalloutError::InvalidUrl {
            message: format!("callout parameters have no string '{}'", CALLOUT_URL_KEY),
        })?;
    let uri: ureq::http::Uri = url.parse().map_err(|e| CalloutError::InvalidUrl {
        message: format!("'{}': {}", url, e),
    })?;
    match uri.scheme_str() {
        Some("http") | Some("https") if uri.authority().is_some() => Ok(url.to_string()),
        _ => Err(CalloutError::InvalidUrl {
            message: format!("'{}' is not an absolute http(s) url", url),
        }),
    }
}

// ──────────────────────────────────────────────
// DisabledCalloutExecutor
// ──────────────────────────────────────────────

/// Accepts every callout without doing anything. Selected when callouts are
/// switched off in the engine configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledCalloutExecutor;

#[async_trait]
impl CalloutExecutor for DisabledCalloutExecutor {
    async fn execute_callout(
        &self,
        _parameters: &str,
        _data: Option<&CalloutData>,
    ) -> Result<(), CalloutError> {
        tracing::debug!("callouts disabled, skipping");
        Ok(())
    }
}
