use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};

use crate::config::ProviderConfig;
use crate::input::JobInput;
use crate::poll::PollPolicy;
use crate::provider::{PollStatus, PollingProvider, ProviderRequest, SubmissionHandle};
use crate::result::{ProviderError, ProviderPayload};

use super::predictions::{PredictionsClient, output_asset};

const NEGATIVE_PROMPT: &str =
    "blurry, distorted, deformed furniture, people, text, watermark, low quality, cartoon";

/// Virtual staging through the prediction API.
#[derive(Debug, Clone)]
pub struct StagingProvider {
    predictions: PredictionsClient,
    poll: PollPolicy,
}

impl StagingProvider {
    pub const NAME: &'static str = "predictions-staging";

    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            predictions: PredictionsClient::new(config),
            poll: config.poll,
        }
    }
}

#[async_trait]
impl PollingProvider for StagingProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    async fn submit(&self, request: &ProviderRequest) -> Result<SubmissionHandle, ProviderError> {
        let input = staging_input(request)?;
        self.predictions.create(input).await
    }

    async fn poll_status(&self, handle: &SubmissionHandle) -> Result<PollStatus, ProviderError> {
        self.predictions.get(handle).await
    }

    fn normalize(&self, result: JsonValue) -> Result<ProviderPayload, ProviderError> {
        output_asset(result, self.predictions.version())
    }
}

fn staging_input(request: &ProviderRequest) -> Result<JsonValue, ProviderError> {
    let JobInput::Staging(input) = &request.input else {
        return Err(ProviderError::UnsupportedInput(format!(
            "{} does not serve {}",
            StagingProvider::NAME,
            request.job_type()
        )));
    };
    let image = request.require_image_url()?;

    Ok(json!({
        "image": image,
        "prompt": input.style.prompt(input.room_type.as_deref()),
        "negative_prompt": NEGATIVE_PROMPT,
    }))
}

#[cfg(test)]
mod tests {
    use vista_core::{AssetId, JobId};

    use super::*;
    use crate::input::StagingInput;
    use crate::templates::StagingStyle;

    #[test]
    fn builds_prompt_from_style_and_room() {
        let request = ProviderRequest {
            job_id: JobId::new(),
            input: JobInput::Staging(StagingInput {
                image_asset_id: AssetId::new(),
                style: StagingStyle::Scandinavian,
                room_type: Some("living room".into()),
            }),
            image_url: Some("https://cdn/empty.jpg".into()),
        };

        let input = staging_input(&request).unwrap();
        assert_eq!(input["image"], "https://cdn/empty.jpg");
        let prompt = input["prompt"].as_str().unwrap();
        assert!(prompt.contains("living room"));
        assert!(prompt.contains("light oak wood"));
    }
}
