use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};

use crate::config::ProviderConfig;
use crate::input::JobInput;
use crate::poll::PollPolicy;
use crate::provider::{PollStatus, PollingProvider, ProviderRequest, SubmissionHandle};
use crate::result::{ProviderError, ProviderPayload};

use super::predictions::{PredictionsClient, output_asset};

/// Photo enhancement/upscaling through the prediction API.
#[derive(Debug, Clone)]
pub struct EnhancementProvider {
    predictions: PredictionsClient,
    poll: PollPolicy,
}

impl EnhancementProvider {
    pub const NAME: &'static str = "predictions-enhancement";

    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            predictions: PredictionsClient::new(config),
            poll: config.poll,
        }
    }
}

#[async_trait]
impl PollingProvider for EnhancementProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    async fn submit(&self, request: &ProviderRequest) -> Result<SubmissionHandle, ProviderError> {
        let input = enhancement_input(request)?;
        self.predictions.create(input).await
    }

    async fn poll_status(&self, handle: &SubmissionHandle) -> Result<PollStatus, ProviderError> {
        self.predictions.get(handle).await
    }

    fn normalize(&self, result: JsonValue) -> Result<ProviderPayload, ProviderError> {
        output_asset(result, self.predictions.version())
    }
}

fn enhancement_input(request: &ProviderRequest) -> Result<JsonValue, ProviderError> {
    let JobInput::Enhancement(input) = &request.input else {
        return Err(ProviderError::UnsupportedInput(format!(
            "{} does not serve {}",
            EnhancementProvider::NAME,
            request.job_type()
        )));
    };
    let image = request.require_image_url()?;

    let mut body = json!({ "image": image, "scale": input.scale });
    if let (Some(body), JsonValue::Object(params)) = (body.as_object_mut(), input.preset.parameters()) {
        body.extend(params);
    }
    Ok(body)
}
