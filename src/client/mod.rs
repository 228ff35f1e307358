pub mod external;
pub mod internal;
pub mod retry;
pub mod router;

pub use external::{day_range, ExternalClient};
pub use internal::{InternalClient, LoginOutcome};
pub use retry::RetryPolicy;
pub use router::Router;

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::asset::AssetCategory;
use crate::config::RunConfig;
use crate::error::{DecomError, Result};

/// Which API surface serves a given operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    Internal,
    External,
}

impl Surface {
    /// Where a category's inventory is listed.
    pub fn listing(category: AssetCategory) -> Surface {
        match category {
            AssetCategory::Camera | AssetCategory::GuestSite | AssetCategory::User => {
                Surface::External
            }
            _ => Surface::Internal,
        }
    }

    /// Where a category's assets are deleted. `None` means no remote delete
    /// exists and the asset must be removed by hand.
    pub fn deletion(category: AssetCategory) -> Option<Surface> {
        match category {
            AssetCategory::User => Some(Surface::External),
            AssetCategory::UnassignedDevice => None,
            _ => Some(Surface::Internal),
        }
    }
}

/// Build the HTTP client shared by one surface.
pub(crate) fn build_http(config: &RunConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| DecomError::InvalidConfig {
            reason: format!("http client: {e}"),
        })
}

/// A fully-read HTTP response.
#[derive(Debug)]
pub(crate) struct ApiResponse {
    pub(crate) endpoint: String,
    pub(crate) status: u16,
    pub(crate) headers: HeaderMap,
    pub(crate) body: String,
}

impl ApiResponse {
    pub(crate) fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The server's `message` field when the body is JSON, else the raw body.
    pub(crate) fn message(&self) -> String {
        serde_json::from_str::<serde_json::Value>(&self.body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or_else(|| self.body.trim().to_string())
    }

    pub(crate) fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| DecomError::Decode {
            endpoint: self.endpoint.clone(),
            reason: e.to_string(),
        })
    }

    /// Retryable statuses become `TransientFailure`; everything else passes
    /// through for the caller to inspect.
    pub(crate) fn retry_gate(self, policy: &RetryPolicy) -> Result<Self> {
        if policy.is_retryable_status(self.status) {
            return Err(DecomError::TransientFailure {
                status: Some(self.status),
                detail: format!("{}: {}", self.endpoint, self.message()),
            });
        }
        Ok(self)
    }

    /// Success passes through; retryable statuses become `TransientFailure`;
    /// anything else becomes `Api`.
    pub(crate) fn into_result(self, policy: &RetryPolicy) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let response = self.retry_gate(policy)?;
        Err(DecomError::Api {
            status: response.status,
            body: response.message(),
        })
    }
}

/// Send a request and read the whole body. Network failures are transient.
pub(crate) async fn send(request: reqwest::RequestBuilder, endpoint: &str) -> Result<ApiResponse> {
    let response = request.send().await.map_err(|e| {
        if e.is_builder() {
            DecomError::InvalidConfig {
                reason: format!("{endpoint}: {e}"),
            }
        } else {
            DecomError::TransientFailure {
                status: None,
                detail: format!("{endpoint}: {e}"),
            }
        }
    })?;
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let body = response
        .text()
        .await
        .map_err(|e| DecomError::TransientFailure {
            status: Some(status),
            detail: format!("{endpoint}: reading body: {e}"),
        })?;
    Ok(ApiResponse {
        endpoint: endpoint.to_string(),
        status,
        headers,
        body,
    })
}

/// Turn a failed per-asset delete into the error the report should carry.
pub(crate) fn delete_error(
    error: DecomError,
    category: AssetCategory,
    id: &str,
    policy: &RetryPolicy,
) -> DecomError {
    match error {
        DecomError::Api { status, body } => DecomError::ClientRejected {
            category,
            id: id.to_string(),
            detail: format!("{status}: {body}"),
        },
        DecomError::TransientFailure { detail, .. } => DecomError::DeleteFailed {
            attempts: policy.max_attempts,
            detail,
        },
        other => other,
    }
}
