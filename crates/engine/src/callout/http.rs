//! HTTP callout executor: POSTs the callout payload as JSON.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` to avoid
//! blocking the async runtime. No authentication headers are sent.

use std::time::Duration;

use async_trait::async_trait;
use lifecycle_core::CalloutData;

use super::{parse_callout_url, CalloutError, CalloutExecutor};

/// Executor issuing exactly one POST per callout, without retries.
pub struct HttpCalloutExecutor {
    agent: ureq::Agent,
}

impl HttpCalloutExecutor {
    pub fn new(timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        HttpCalloutExecutor { agent }
    }
}

#[async_trait]
impl CalloutExecutor for HttpCalloutExecutor {
    async fn execute_callout(
        &self,
        parameters: &str,
        data: Option<&CalloutData>,
    ) -> Result<(), CalloutError> {
        let url = parse_callout_url(parameters)?;
        let payload = data.ok_or(CalloutError::MissingData)?.clone();

        let agent = self.agent.clone();
        let target = url.clone();

        tracing::debug!(url = %url, phase = %payload.phase, "executing callout");
        let result = tokio::task::spawn_blocking(move || {
            agent
                .post(&target)
                .send_json(&payload)
                .map(|_| ())
                .map_err(|e| match e {
                    ureq::Error::StatusCode(status) => CalloutError::Status {
                        url: target.clone(),
                        status,
                    },
                    other => CalloutError::Transport {
                        url: target.clone(),
                        message: other.to_string(),
                    },
                })
        })
        .await
        .map_err(|e| CalloutError::Transport {
            url: url.clone(),
            message: format!("task join error: {}", e),
        })?;

        result
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
