use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};
use tracing::debug;

use vista_core::JobType;

use crate::config::ProviderConfig;
use crate::input::JobInput;
use crate::provider::{ProviderRequest, SyncProvider};
use crate::result::{ProviderError, ProviderPayload};

use super::chat::ChatClient;

const SCENE_ANALYSIS_PROMPT: &str = "Analyze this real estate photo. Respond with a JSON object with keys \
\"room_type\" (string), \"features\" (array of strings), \"condition\" (string), \
\"lighting\" (string) and \"suggestions\" (array of strings).";

const FLOOR_PLAN_PROMPT: &str = "This image is a floor plan. Respond with a JSON object with keys \
\"rooms\" (array of objects with \"name\", \"type\" and \"approx_area_sqm\"), \
\"total_area_sqm\" (number or null) and \"notes\" (string).";

const HOTSPOTS_PROMPT: &str = "Identify notable features in this 360 or wide-angle photo that deserve an \
interactive hotspot. Respond with a JSON object with key \"hotspots\": an array of objects with \
\"label\" (string), \"description\" (string), \"x\" and \"y\" (numbers between 0 and 1, relative \
to the image width and height).";

/// Image understanding over an OpenAI-compatible chat endpoint with image input.
///
/// Serves scene-analysis, floor-plan and auto-hotspots.
#[derive(Debug, Clone)]
pub struct VisionProvider {
    chat: ChatClient,
}

impl VisionProvider {
    pub const NAME: &'static str = "openai-vision";

    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            chat: ChatClient::new(config),
        }
    }
}

#[async_trait]
impl SyncProvider for VisionProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderPayload, ProviderError> {
        let (prompt, notes) = match &request.input {
            JobInput::SceneAnalysis(i) => (SCENE_ANALYSIS_PROMPT, i.notes.as_deref()),
            JobInput::FloorPlan(i) => (FLOOR_PLAN_PROMPT, i.notes.as_deref()),
            JobInput::AutoHotspots(i) => (HOTSPOTS_PROMPT, i.notes.as_deref()),
            other => {
                return Err(ProviderError::UnsupportedInput(format!(
                    "{} does not serve {}",
                    Self::NAME,
                    other.job_type()
                )));
            }
        };
        let image_url = request.require_image_url()?;

        let messages = vision_messages(prompt, notes, image_url);
        debug!(job_id = %request.job_id, model = self.chat.model(), "requesting vision completion");
        let value = self.chat.complete_json(messages).await?;

        validate_shape(request.job_type(), &value)?;
        Ok(ProviderPayload::Structured(value))
    }
}

fn vision_messages(prompt: &str, notes: Option<&str>, image_url: &str) -> JsonValue {
    let text = match notes.map(str::trim).filter(|n| !n.is_empty()) {
        Some(notes) => format!("{prompt}\nAdditional context: {notes}"),
        None => prompt.to_string(),
    };
    json!([
        {
            "role": "system",
            "content": "You are a real estate imaging assistant. Always answer with a single JSON object.",
        },
        {
            "role": "user",
            "content": [
                { "type": "text", "text": text },
                { "type": "image_url", "image_url": { "url": image_url } },
            ],
        },
    ])
}

fn validate_shape(job_type: JobType, value: &JsonValue) -> Result<(), ProviderError> {
    let ok = match job_type {
        JobType::AutoHotspots => value.get("hotspots").is_some_and(JsonValue::is_array),
        JobType::FloorPlan => value.get("rooms").is_some_and(JsonValue::is_array),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(ProviderError::malformed(format!(
            "{job_type} result is missing its required fields"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_image_and_notes() {
        let messages = vision_messages(SCENE_ANALYSIS_PROMPT, Some("south facing"), "https://cdn/x.jpg");
        let parts = &messages[1]["content"];
        assert!(parts[0]["text"].as_str().unwrap().contains("south facing"));
        assert_eq!(parts[1]["image_url"]["url"], "https://cdn/x.jpg");
    }

    #[test]
    fn hotspots_require_array() {
        assert!(validate_shape(JobType::AutoHotspots, &json!({"hotspots": []})).is_ok());
        assert!(validate_shape(JobType::AutoHotspots, &json!({"spots": []})).is_err());
        assert!(validate_shape(JobType::SceneAnalysis, &json!({"room_type": "kitchen"})).is_ok());
    }
}
