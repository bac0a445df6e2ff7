use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::time::Instant;
use tracing::debug;

use vista_core::{JobId, JobType};

use crate::input::JobInput;
use crate::poll::{PollPolicy, poll_until_terminal};
use crate::result::{ProviderError, ProviderPayload};

/// Everything an adapter needs to serve one execution attempt.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub job_id: JobId,
    pub input: JobInput,
    /// Fetchable URL of the source image, resolved from object storage by the caller.
    pub image_url: Option<String>,
}

impl ProviderRequest {
    pub fn job_type(&self) -> JobType {
        self.input.job_type()
    }

    pub(crate) fn require_image_url(&self) -> Result<&str, ProviderError> {
        self.image_url.as_deref().ok_or_else(|| {
            ProviderError::UnsupportedInput(format!("{} requires a source image", self.job_type()))
        })
    }
}

/// Provider-side identifier of a submitted long-running request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionHandle(String);

impl SubmissionHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for SubmissionHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// State reported by one status check of a submit-and-poll backend.
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus {
    Running,
    /// Raw provider result; normalized by [`PollingProvider::normalize`].
    Succeeded(JsonValue),
    /// Terminal failure with the provider's message.
    Failed(String),
}

/// Request/response backend: one round trip produces the result.
#[async_trait]
pub trait SyncProvider: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderPayload, ProviderError>;
}

/// Long-running backend: submit once, then poll until terminal.
#[async_trait]
pub trait PollingProvider: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn poll_policy(&self) -> PollPolicy;

    async fn submit(&self, request: &ProviderRequest) -> Result<SubmissionHandle, ProviderError>;

    async fn poll_status(&self, handle: &SubmissionHandle) -> Result<PollStatus, ProviderError>;

    /// Turn a provider-specific success result into a payload.
    fn normalize(&self, result: JsonValue) -> Result<ProviderPayload, ProviderError>;
}

/// Outcome of one adapter run plus the wall-clock time it took.
#[derive(Debug)]
pub struct ProviderRun {
    pub result: Result<ProviderPayload, ProviderError>,
    pub elapsed: Duration,
}

/// Uniform handle over both provider shapes.
///
/// The orchestrator only ever calls [`ProviderAdapter::run`]; whether that is a
/// single call or a submit + bounded poll loop is decided here.
#[derive(Clone)]
pub enum ProviderAdapter {
    Sync(Arc<dyn SyncProvider>),
    Polling(Arc<dyn PollingProvider>),
}

impl ProviderAdapter {
    pub fn sync<P: SyncProvider>(provider: P) -> Self {
        Self::Sync(Arc::new(provider))
    }

    pub fn polling<P: PollingProvider>(provider: P) -> Self {
        Self::Polling(Arc::new(provider))
    }

    pub fn name(&self) -> &str {
        match self {
            ProviderAdapter::Sync(p) => p.name(),
            ProviderAdapter::Polling(p) => p.name(),
        }
    }

    pub async fn run(&self, request: &ProviderRequest) -> ProviderRun {
        let started = Instant::now();
        let result = match self {
            ProviderAdapter::Sync(p) => p.invoke(request).await,
            ProviderAdapter::Polling(p) => run_polling(p.as_ref(), request).await,
        };
        ProviderRun {
            result,
            elapsed: started.elapsed(),
        }
    }
}

impl core::fmt::Debug for ProviderAdapter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ProviderAdapter::Sync(p) => f.debug_tuple("Sync").field(&p.name()).finish(),
            ProviderAdapter::Polling(p) => f.debug_tuple("Polling").field(&p.name()).finish(),
        }
    }
}

async fn run_polling(
    provider: &dyn PollingProvider,
    request: &ProviderRequest,
) -> Result<ProviderPayload, ProviderError> {
    let handle = provider.submit(request).await?;
    debug!(provider = provider.name(), job_id = %request.job_id, handle = %handle, "submitted");

    let raw = poll_until_terminal(provider, &handle, &provider.poll_policy()).await?;
    provider.normalize(raw)
}
