use std::time::Duration;

use crate::poll::PollPolicy;

/// Explicit configuration for one provider adapter.
///
/// Built once at process start (see the API crate's config) and injected into
/// the adapter constructor. Adapters never look at environment variables.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of the backend, without trailing slash (e.g. `https://api.openai.com/v1`).
    pub endpoint: String,
    /// Bearer credential.
    pub api_key: String,
    /// Model name (chat backends) or model version (prediction backends).
    pub model: String,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Poll spacing and ceiling (submit-and-poll backends only).
    pub poll: PollPolicy,
}

impl ProviderConfig {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            request_timeout: Duration::from_secs(60),
            poll: PollPolicy::default(),
        }
    }

    pub fn with_poll(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub(crate) fn http_client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_trailing_slash_is_trimmed() {
        let cfg = ProviderConfig::new("http://localhost:9000/", "k", "m");
        assert_eq!(cfg.endpoint, "http://localhost:9000");
    }
}
