//! Client for a hosted prediction API (`/v1/predictions`).

use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tracing::{debug, instrument};

use crate::config::ProviderConfig;
use crate::provider::{PollStatus, SubmissionHandle};
use crate::result::{ProviderError, ProviderPayload};

use super::parse_response;

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<JsonValue>,
    #[serde(default)]
    error: Option<JsonValue>,
}

#[derive(Debug, Clone)]
pub(crate) struct PredictionsClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    version: String,
}

impl PredictionsClient {
    pub(crate) fn new(config: &ProviderConfig) -> Self {
        Self {
            client: config.http_client(),
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            version: config.model.clone(),
        }
    }

    pub(crate) fn version(&self) -> &str {
        &self.version
    }

    /// `POST /v1/predictions`
    #[instrument(skip(self, input), fields(version = %self.version))]
    pub(crate) async fn create(&self, input: JsonValue) -> Result<SubmissionHandle, ProviderError> {
        let body = json!({ "version": self.version, "input": input });
        let response = self
            .client
            .post(format!("{}/v1/predictions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let prediction: Prediction = parse_response(response).await?;
        if prediction.id.trim().is_empty() {
            return Err(ProviderError::malformed("prediction id is empty"));
        }
        debug!(prediction_id = %prediction.id, status = %prediction.status, "prediction created");
        Ok(SubmissionHandle::new(prediction.id))
    }

    /// `GET /v1/predictions/{id}`
    pub(crate) async fn get(&self, handle: &SubmissionHandle) -> Result<PollStatus, ProviderError> {
        let response = self
            .client
            .get(format!("{}/v1/predictions/{}", self.endpoint, handle.as_str()))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let prediction: Prediction = parse_response(response).await?;
        poll_status(prediction)
    }
}

fn poll_status(prediction: Prediction) -> Result<PollStatus, ProviderError> {
    match prediction.status.as_str() {
        "starting" | "processing" | "queued" => Ok(PollStatus::Running),
        "succeeded" => Ok(PollStatus::Succeeded(prediction.output.unwrap_or(JsonValue::Null))),
        "failed" => Ok(PollStatus::Failed(
            prediction
                .error
                .map(|e| match e {
                    JsonValue::String(s) => s,
                    other => other.to_string(),
                })
                .unwrap_or_else(|| "prediction failed".to_string()),
        )),
        "canceled" => Ok(PollStatus::Failed("prediction canceled".to_string())),
        other => Err(ProviderError::malformed(format!(
            "unknown prediction status '{other}'"
        ))),
    }
}

/// Turn a prediction `output` (URL string or array of URLs) into a remote asset payload.
pub(crate) fn output_asset(output: JsonValue, version: &str) -> Result<ProviderPayload, ProviderError> {
    let url = match &output {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Array(items) => items.iter().find_map(|v| v.as_str().map(str::to_string)),
        _ => None,
    }
    .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
    .ok_or_else(|| ProviderError::malformed("prediction output has no asset URL"))?;

    Ok(ProviderPayload::RemoteAsset {
        url,
        metadata: json!({ "model_version": version }),
    })
}
