use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};

use crate::config::ProviderConfig;
use crate::input::{DescriptionInput, JobInput};
use crate::provider::{ProviderRequest, SyncProvider};
use crate::result::{ProviderError, ProviderPayload};

use super::chat::ChatClient;

/// Listing/scene description writer over an OpenAI-compatible chat endpoint.
#[derive(Debug, Clone)]
pub struct TextProvider {
    chat: ChatClient,
}

impl TextProvider {
    pub const NAME: &'static str = "openai-text";

    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            chat: ChatClient::new(config),
        }
    }
}

#[async_trait]
impl SyncProvider for TextProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderPayload, ProviderError> {
        let JobInput::Description(input) = &request.input else {
            return Err(ProviderError::UnsupportedInput(format!(
                "{} does not serve {}",
                Self::NAME,
                request.job_type()
            )));
        };

        let messages = description_messages(input, request.image_url.as_deref());
        let value = self.chat.complete_json(messages).await?;
        let text = value
            .get("text")
            .and_then(JsonValue::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProviderError::malformed("description result has no text"))?;

        Ok(ProviderPayload::Structured(json!({
            "text": text,
            "tone": input.tone.as_str(),
            "word_count": text.split_whitespace().count(),
        })))
    }
}

fn description_messages(input: &DescriptionInput, image_url: Option<&str>) -> JsonValue {
    let facts = if input.facts.is_empty() {
        "No structured facts were provided.".to_string()
    } else {
        format!("Facts: {}", JsonValue::Object(input.facts.clone()))
    };
    let instruction = format!(
        "Write a property description of at most {} words. {facts} \
         Respond with a JSON object with a single key \"text\".",
        input.max_words
    );

    let user_content = match image_url {
        Some(url) => json!([
            { "type": "text", "text": instruction },
            { "type": "image_url", "image_url": { "url": url } },
        ]),
        None => JsonValue::String(instruction),
    };

    json!([
        { "role": "system", "content": input.tone.template() },
        { "role": "user", "content": user_content },
    ])
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use super::*;
    use crate::templates::DescriptionTone;

    #[test]
    fn prompt_uses_tone_and_word_limit() {
        let mut facts = Map::new();
        facts.insert("bedrooms".into(), json!(3));
        let input = DescriptionInput {
            tone: DescriptionTone::Luxury,
            facts,
            max_words: 80,
            ..DescriptionInput::default()
        };

        let messages = description_messages(&input, None);
        assert_eq!(messages[0]["content"], DescriptionTone::Luxury.template());
        let user = messages[1]["content"].as_str().unwrap();
        assert!(user.contains("at most 80 words"));
        assert!(user.contains("\"bedrooms\":3"));
    }

    #[test]
    fn image_is_attached_when_present() {
        let messages = description_messages(&DescriptionInput::default(), Some("https://cdn/a.png"));
        assert_eq!(messages[1]["content"][1]["image_url"]["url"], "https://cdn/a.png");
    }
}
