//! Minimal OpenAI-compatible chat completions client.

use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tracing::instrument;

use crate::config::ProviderConfig;
use crate::result::ProviderError;

use super::parse_response;

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct ChatClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ChatClient {
    pub(crate) fn new(config: &ProviderConfig) -> Self {
        Self {
            client: config.http_client(),
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    pub(crate) fn model(&self) -> &str {
        &self.model
    }

    /// Send one completion request asking for a JSON object, return the parsed object.
    #[instrument(skip(self, messages), fields(model = %self.model))]
    pub(crate) async fn complete_json(&self, messages: JsonValue) -> Result<JsonValue, ProviderError> {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "response_format": { "type": "json_object" },
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let completion: CompletionResponse = parse_response(response).await?;
        let content = first_content(completion)?;
        parse_json_content(&content)
    }
}

fn first_content(completion: CompletionResponse) -> Result<String, ProviderError> {
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ProviderError::malformed("completion has no message content"))
}

/// Parse model output as a JSON object, tolerating a surrounding markdown fence.
pub(crate) fn parse_json_content(content: &str) -> Result<JsonValue, ProviderError> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let value: JsonValue = serde_json::from_str(unfenced)
        .map_err(|e| ProviderError::malformed(format!("model output is not JSON: {e}")))?;
    if !value.is_object() {
        return Err(ProviderError::malformed("model output is not a JSON object"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_fenced_objects() {
        assert_eq!(parse_json_content(r#"{"a": 1}"#).unwrap(), json!({"a": 1}));
        assert_eq!(
            parse_json_content("```json\n{\"rooms\": []}\n```").unwrap(),
            json!({"rooms": []})
        );
    }

    #[test]
    fn rejects_prose_and_non_objects() {
        assert!(matches!(
            parse_json_content("Sure! Here is the analysis."),
            Err(ProviderError::MalformedResponse(_))
        ));
        assert!(parse_json_content("[1, 2]").is_err());
    }

    #[test]
    fn empty_choices_are_malformed() {
        let completion: CompletionResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(first_content(completion), Err(ProviderError::MalformedResponse(_))));
    }
}
