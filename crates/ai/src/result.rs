use std::time::Duration;

use serde_json::Value as JsonValue;
use thiserror::Error;

/// Result payload returned by a provider.
///
/// This is *not* the job output yet: remote assets still have to be pulled into
/// object storage by the orchestrator before the job can complete.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderPayload {
    /// Structured result usable as-is (analysis, hotspots, generated text).
    Structured(JsonValue),

    /// A generated asset hosted by the provider, to be fetched and re-uploaded.
    RemoteAsset {
        url: String,
        /// Free-form provider metadata (model, prediction id, etc).
        metadata: JsonValue,
    },
}

/// Failure reported by, or while talking to, an external AI backend.
///
/// Always recorded on the job (`status=failed`) rather than propagated; the
/// caller may retry the job.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("provider request failed: {0}")]
    Transport(String),

    /// The backend answered with a non-2xx status code.
    #[error("provider API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The response body was not what the adapter expected.
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    /// A submit-and-poll backend reported a terminal failure state.
    #[error("provider reported failure: {0}")]
    Failed(String),

    /// Polling exceeded the configured ceiling.
    #[error("provider timed out after {}s", .waited.as_secs())]
    Timeout { waited: Duration },

    /// The request cannot be served by this adapter (e.g. missing source image).
    #[error("unsupported provider input: {0}")]
    UnsupportedInput(String),
}

impl ProviderError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Timeout { .. })
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::MalformedResponse(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}
