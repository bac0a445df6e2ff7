//! Drives one job from claim to terminal state.
//!
//! ## Completed path (strictly ordered)
//!
//! 1. persist output + duration on the job
//! 2. write type-specific fields onto the target resource
//! 3. charge the ledger (exactly once)
//! 4. emit an activity event
//!
//! Steps 2-4 never roll the job back; their failures are logged and swallowed.
//!
//! Terminal writes (complete/fail) are retried with backoff on storage errors.
//! A job whose failure still cannot be persisted stays `processing` until the
//! startup sweep ([`crate::jobs::JobStore::recover_interrupted`]) fails it.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value as JsonValue, json};
use tracing::{debug, error, info, warn};

use vista_ai::{AssetFetcher, JobInput, ProviderPayload, ProviderRegistry, ProviderRequest};
use vista_core::{JobId, JobType};

use crate::external::{ActivityKind, ActivitySink, ObjectStorage, TargetResourceStore};
use crate::jobs::{Job, JobStore, JobStoreError};
use crate::ledger::CreditLedger;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Store(#[from] JobStoreError),
}

/// Terminal state reached by one execution attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Completed(Job),
    Failed(Job),
}

impl ExecutionOutcome {
    pub fn job(&self) -> &Job {
        match self {
            ExecutionOutcome::Completed(job) | ExecutionOutcome::Failed(job) => job,
        }
    }
}

const TERMINAL_WRITE_ATTEMPTS: u32 = 3;
const TERMINAL_WRITE_BACKOFF: Duration = Duration::from_millis(50);

/// Result of the provider phase of an attempt.
struct Attempt {
    result: Result<JsonValue, String>,
    elapsed: Duration,
}

enum TerminalWrite {
    Complete(JsonValue),
    Fail(String),
}

pub struct Orchestrator {
    jobs: Arc<dyn JobStore>,
    ledger: Arc<dyn CreditLedger>,
    providers: Arc<ProviderRegistry>,
    storage: Arc<dyn ObjectStorage>,
    fetcher: Arc<dyn AssetFetcher>,
    targets: Arc<dyn TargetResourceStore>,
    activity: Arc<dyn ActivitySink>,
}

impl Orchestrator {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        ledger: Arc<dyn CreditLedger>,
        providers: Arc<ProviderRegistry>,
        storage: Arc<dyn ObjectStorage>,
        fetcher: Arc<dyn AssetFetcher>,
        targets: Arc<dyn TargetResourceStore>,
        activity: Arc<dyn ActivitySink>,
    ) -> Self {
        Self {
            jobs,
            ledger,
            providers,
            storage,
            fetcher,
            targets,
            activity,
        }
    }

    /// Execute one attempt of `job_id`.
    ///
    /// Provider and normalization failures end in a `failed` job and are not
    /// errors here. `Err` means the job could not be claimed or its terminal
    /// state could not be persisted.
    pub async fn execute(&self, job_id: JobId) -> Result<ExecutionOutcome, OrchestratorError> {
        let job = self.jobs.claim(job_id).await?;
        info!(
            job_id = %job.id,
            job_type = %job.job_type,
            provider = %job.provider,
            owner_id = %job.owner_id,
            "job processing"
        );

        let attempt = self.attempt(&job).await;
        let duration_ms = attempt.elapsed.as_millis() as u64;

        match attempt.result {
            Ok(output) => self.complete(job, output, duration_ms).await,
            Err(message) => self.fail(job, message, duration_ms).await,
        }
    }

    async fn attempt(&self, job: &Job) -> Attempt {
        let Some(adapter) = self.providers.get(job.job_type) else {
            return Attempt {
                result: Err(format!("no provider registered for {}", job.job_type)),
                elapsed: Duration::ZERO,
            };
        };

        let request = match self.build_request(job).await {
            Ok(request) => request,
            Err(message) => {
                return Attempt {
                    result: Err(message),
                    elapsed: Duration::ZERO,
                };
            }
        };

        let run = adapter.run(&request).await;
        debug!(
            job_id = %job.id,
            provider = adapter.name(),
            elapsed_ms = run.elapsed.as_millis() as u64,
            ok = run.result.is_ok(),
            "provider finished"
        );

        let result = match run.result {
            Ok(payload) => self.normalize(job, payload).await,
            Err(e) => Err(e.to_string()),
        };
        Attempt {
            result,
            elapsed: run.elapsed,
        }
    }

    async fn build_request(&self, job: &Job) -> Result<ProviderRequest, String> {
        let input = JobInput::parse(job.job_type, &job.input).map_err(|e| e.to_string())?;
        let image_url = match input.image_asset_id() {
            Some(asset_id) => Some(
                self.storage
                    .url_for(asset_id)
                    .await
                    .map_err(|e| format!("failed to resolve source image: {e}"))?,
            ),
            None => None,
        };

        Ok(ProviderRequest {
            job_id: job.id,
            input,
            image_url,
        })
    }

    /// Turn a provider payload into the job output, pulling remote assets into storage.
    async fn normalize(&self, job: &Job, payload: ProviderPayload) -> Result<JsonValue, String> {
        match payload {
            ProviderPayload::Structured(value) => Ok(value),
            ProviderPayload::RemoteAsset { url, metadata } => {
                let asset = self
                    .fetcher
                    .fetch(&url)
                    .await
                    .map_err(|e| format!("failed to download generated asset: {e}"))?;
                let content_type = asset.content_type.clone();
                let asset_id = self
                    .storage
                    .upload(asset.bytes, &content_type)
                    .await
                    .map_err(|e| format!("failed to store generated asset: {e}"))?;
                let stored_url = self
                    .storage
                    .url_for(asset_id)
                    .await
                    .map_err(|e| format!("failed to resolve stored asset: {e}"))?;

                debug!(job_id = %job.id, asset_id = %asset_id, "generated asset stored");
                Ok(json!({
                    "asset_id": asset_id,
                    "url": stored_url,
                    "content_type": content_type,
                    "source": url,
                    "metadata": metadata,
                }))
            }
        }
    }

    async fn complete(
        &self,
        job: Job,
        output: JsonValue,
        duration_ms: u64,
    ) -> Result<ExecutionOutcome, OrchestratorError> {
        let orphan = output.get("asset_id").cloned();
        let job = match self
            .persist_terminal(job.id, TerminalWrite::Complete(output), duration_ms)
            .await
        {
            Ok(job) => job,
            Err(e) => {
                if let Some(asset_id) = orphan {
                    warn!(job_id = %job.id, asset_id = %asset_id, "stored asset orphaned by failed completion");
                }
                error!(job_id = %job.id, error = %e, "failed to persist job output");
                return self
                    .fail(job, format!("failed to persist job output: {e}"), duration_ms)
                    .await;
            }
        };

        info!(
            job_id = %job.id,
            job_type = %job.job_type,
            duration_ms,
            "job completed"
        );

        if let Some(target) = job.target_id {
            if let Some(output) = &job.output {
                let fields = write_back_fields(job.job_type, output);
                if let Err(e) = self.targets.write_fields(target, job.sub_target_id, fields).await {
                    warn!(job_id = %job.id, target_id = %target, error = %e, "target write-back failed");
                }
            }
        }

        if let Err(e) = self.ledger.charge(job.owner_id, job.credits_charged).await {
            error!(
                job_id = %job.id,
                owner_id = %job.owner_id,
                credits = job.credits_charged,
                error = %e,
                "failed to charge credits for completed job"
            );
        }

        let message = format!("{} job {} completed", job.job_type, job.id);
        if let Err(e) = self
            .activity
            .record(job.owner_id, ActivityKind::JobCompleted, message)
            .await
        {
            warn!(job_id = %job.id, error = %e, "activity event dropped");
        }

        Ok(ExecutionOutcome::Completed(job))
    }

    async fn fail(
        &self,
        job: Job,
        message: String,
        duration_ms: u64,
    ) -> Result<ExecutionOutcome, OrchestratorError> {
        let job = match self
            .persist_terminal(job.id, TerminalWrite::Fail(message), duration_ms)
            .await
        {
            Ok(job) => job,
            Err(e) => {
                error!(job_id = %job.id, error = %e, "failed to persist job failure");
                return Err(e.into());
            }
        };
        warn!(
            job_id = %job.id,
            job_type = %job.job_type,
            error = job.error.as_deref().unwrap_or_default(),
            duration_ms,
            "job failed"
        );

        let message = format!(
            "{} job {} failed: {}",
            job.job_type,
            job.id,
            job.error.as_deref().unwrap_or_default()
        );
        if let Err(e) = self.activity.record(job.owner_id, ActivityKind::JobFailed, message).await {
            warn!(job_id = %job.id, error = %e, "activity event dropped");
        }

        Ok(ExecutionOutcome::Failed(job))
    }

    /// Write a terminal state, retrying storage errors with exponential backoff.
    async fn persist_terminal(
        &self,
        job_id: JobId,
        write: TerminalWrite,
        duration_ms: u64,
    ) -> Result<Job, JobStoreError> {
        let mut attempt = 1;
        loop {
            let result = match &write {
                TerminalWrite::Complete(output) => {
                    self.jobs.complete(job_id, output.clone(), duration_ms).await
                }
                TerminalWrite::Fail(message) => {
                    self.jobs.fail(job_id, message.clone(), duration_ms).await
                }
            };

            match result {
                Err(JobStoreError::Storage(e)) if attempt < TERMINAL_WRITE_ATTEMPTS => {
                    let backoff = TERMINAL_WRITE_BACKOFF * 2u32.pow(attempt - 1);
                    warn!(
                        job_id = %job_id,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "terminal write failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

/// Fields written onto the target resource for a completed job.
pub fn write_back_fields(job_type: JobType, output: &JsonValue) -> Map<String, JsonValue> {
    let (key, value) = match job_type {
        JobType::SceneAnalysis => ("analysis", output.clone()),
        JobType::FloorPlan => ("floor_plan", output.clone()),
        JobType::AutoHotspots => (
            "hotspots",
            output.get("hotspots").cloned().unwrap_or_else(|| output.clone()),
        ),
        JobType::Description => (
            "description",
            output.get("text").cloned().unwrap_or_else(|| output.clone()),
        ),
        JobType::Staging => (
            "staged_asset_id",
            output.get("asset_id").cloned().unwrap_or(JsonValue::Null),
        ),
        JobType::Enhancement => (
            "enhanced_asset_id",
            output.get("asset_id").cloned().unwrap_or(JsonValue::Null),
        ),
    };

    let mut fields = Map::new();
    fields.insert(key.to_string(), value);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_back_picks_type_specific_field() {
        let staged = write_back_fields(JobType::Staging, &json!({"asset_id": "a1", "url": "u"}));
        assert_eq!(JsonValue::Object(staged), json!({"staged_asset_id": "a1"}));

        let text = write_back_fields(JobType::Description, &json!({"text": "Sunny loft", "tone": "warm"}));
        assert_eq!(JsonValue::Object(text), json!({"description": "Sunny loft"}));

        let hotspots = write_back_fields(JobType::AutoHotspots, &json!({"hotspots": [{"label": "fireplace"}]}));
        assert_eq!(JsonValue::Object(hotspots), json!({"hotspots": [{"label": "fireplace"}]}));

        let analysis = write_back_fields(JobType::SceneAnalysis, &json!({"room_type": "kitchen"}));
        assert_eq!(JsonValue::Object(analysis), json!({"analysis": {"room_type": "kitchen"}}));
    }
}
