//! Concrete adapters for the HTTP backends used in production.
//!
//! - [`VisionProvider`] / [`TextProvider`]: OpenAI-compatible chat completions (request/response).
//! - [`StagingProvider`] / [`EnhancementProvider`]: prediction API (submit-and-poll).

mod chat;
mod enhancement;
mod predictions;
mod staging;
mod text;
mod vision;

pub use enhancement::EnhancementProvider;
pub use staging::StagingProvider;
pub use text::TextProvider;
pub use vision::VisionProvider;

use crate::result::ProviderError;

/// Map a non-2xx response to [`ProviderError::Api`], keeping the body for debugging.
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(ProviderError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let response = ensure_success(response).await?;
    Ok(response.json::<T>().await?)
}
