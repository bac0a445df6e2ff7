//! Bounded submit-and-poll driver.

use std::time::Duration;

use serde_json::Value as JsonValue;
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::provider::{PollStatus, PollingProvider, SubmissionHandle};
use crate::result::ProviderError;

/// Poll spacing and overall ceiling for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between two status checks.
    pub interval: Duration,
    /// Total time a job may wait on the provider before failing with a timeout.
    pub max_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(300),
        }
    }
}

impl PollPolicy {
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        Self { interval, max_wait }
    }
}

/// Poll `handle` until the provider reports a terminal state or `policy.max_wait` elapses.
///
/// Returns the raw provider result on success. A `failed` poll maps to
/// [`ProviderError::Failed`] carrying the provider's message; exceeding the
/// ceiling maps to [`ProviderError::Timeout`].
pub async fn poll_until_terminal(
    provider: &dyn PollingProvider,
    handle: &SubmissionHandle,
    policy: &PollPolicy,
) -> Result<JsonValue, ProviderError> {
    let started = Instant::now();
    let mut polls: u32 = 0;

    loop {
        polls += 1;
        match provider.poll_status(handle).await? {
            PollStatus::Succeeded(result) => {
                debug!(provider = provider.name(), handle = %handle, polls, "provider succeeded");
                return Ok(result);
            }
            PollStatus::Failed(message) => {
                debug!(provider = provider.name(), handle = %handle, polls, "provider failed");
                return Err(ProviderError::Failed(message));
            }
            PollStatus::Running => {}
        }

        let waited = started.elapsed();
        if waited >= policy.max_wait {
            return Err(ProviderError::Timeout { waited });
        }

        sleep(policy.interval.min(policy.max_wait - waited)).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::provider::ProviderRequest;
    use crate::result::ProviderPayload;

    /// Reports `running` for `running_polls` polls, then the scripted terminal state.
    struct Scripted {
        running_polls: u32,
        terminal: Mutex<Option<PollStatus>>,
        polls: AtomicU32,
    }

    impl Scripted {
        fn new(running_polls: u32, terminal: Option<PollStatus>) -> Self {
            Self {
                running_polls,
                terminal: Mutex::new(terminal),
                polls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl PollingProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn poll_policy(&self) -> PollPolicy {
            PollPolicy::default()
        }

        async fn submit(&self, _request: &ProviderRequest) -> Result<SubmissionHandle, ProviderError> {
            Ok(SubmissionHandle::new("h-1"))
        }

        async fn poll_status(&self, _handle: &SubmissionHandle) -> Result<PollStatus, ProviderError> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            if n < self.running_polls {
                return Ok(PollStatus::Running);
            }
            Ok(self
                .terminal
                .lock()
                .unwrap()
                .clone()
                .unwrap_or(PollStatus::Running))
        }

        fn normalize(&self, result: JsonValue) -> Result<ProviderPayload, ProviderError> {
            Ok(ProviderPayload::Structured(result))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_running_polls_and_waits_between_them() {
        let provider = Scripted::new(3, Some(PollStatus::Succeeded(serde_json::json!({"ok": true}))));
        let policy = PollPolicy::new(Duration::from_secs(2), Duration::from_secs(60));
        let started = Instant::now();

        let result = poll_until_terminal(&provider, &SubmissionHandle::new("h-1"), &policy)
            .await
            .unwrap();

        assert_eq!(result, serde_json::json!({"ok": true}));
        assert_eq!(provider.polls.load(Ordering::SeqCst), 4);
        assert!(started.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_state_carries_provider_message() {
        let provider = Scripted::new(0, Some(PollStatus::Failed("NSFW content detected".into())));
        let err = poll_until_terminal(&provider, &SubmissionHandle::new("h-1"), &PollPolicy::default())
            .await
            .unwrap_err();

        assert_eq!(err, ProviderError::Failed("NSFW content detected".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn never_finishing_provider_times_out_at_ceiling() {
        let provider = Scripted::new(u32::MAX, None);
        let policy = PollPolicy::new(Duration::from_secs(2), Duration::from_secs(10));
        let started = Instant::now();

        let err = poll_until_terminal(&provider, &SubmissionHandle::new("h-1"), &policy)
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(10));
        assert!(waited < Duration::from_secs(13));
    }
}
