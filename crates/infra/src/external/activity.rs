//! Activity/notification feed.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use vista_core::OwnerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    JobCompleted,
    JobFailed,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::JobCompleted => "job_completed",
            ActivityKind::JobFailed => "job_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityEvent {
    pub owner_id: OwnerId,
    pub kind: ActivityKind,
    pub message: String,
}

/// Best-effort event sink; failures are logged by the caller and never fail a job.
#[async_trait]
pub trait ActivitySink: Send + Sync + 'static {
    async fn record(&self, owner_id: OwnerId, kind: ActivityKind, message: String) -> Result<(), ActivityError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("activity sink error: {0}")]
pub struct ActivityError(pub String);

/// Emits activity events as structured log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingActivitySink;

#[async_trait]
impl ActivitySink for TracingActivitySink {
    async fn record(&self, owner_id: OwnerId, kind: ActivityKind, message: String) -> Result<(), ActivityError> {
        info!(owner_id = %owner_id, kind = kind.as_str(), message = %message, "activity");
        Ok(())
    }
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct InMemoryActivitySink {
    events: Mutex<Vec<ActivityEvent>>,
}

impl InMemoryActivitySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ActivityEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ActivitySink for InMemoryActivitySink {
    async fn record(&self, owner_id: OwnerId, kind: ActivityKind, message: String) -> Result<(), ActivityError> {
        self.events
            .lock()
            .map_err(|_| ActivityError("activity lock poisoned".to_string()))?
            .push(ActivityEvent {
                owner_id,
                kind,
                message,
            });
        Ok(())
    }
}
