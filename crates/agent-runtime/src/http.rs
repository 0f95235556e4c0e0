//! Shared HTTP plumbing for the provider adapters

use std::time::Duration;

use agent_core::error::{AgentError, Result};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

/// Client with the adapter's request timeout
pub(crate) fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {}", e)))
}

/// Send one request and return the parsed JSON body.
///
/// No retries: a non-success status is returned as `AgentError::Provider`
/// with the provider's status and body.
pub(crate) async fn send_json(request: RequestBuilder) -> Result<(u16, Value)> {
    let response = request
        .send()
        .await
        .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?;

    if !status.is_success() {
        tracing::warn!(status = status.as_u16(), "Provider rejected request");
        return Err(AgentError::Provider {
            status: status.as_u16(),
            body,
        });
    }

    let value = serde_json::from_str(&body).map_err(|_| AgentError::Provider {
        status: status.as_u16(),
        body,
    })?;

    Ok((status.as_u16(), value))
}
