//! Mistral chat-completions vision provider.

use crate::config::AppConfig;
use crate::error::AppError;
use crate::provider::DescriptionProvider;
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;

const FALLBACK_MIME: &str = "image/jpeg";
const MAX_ERROR_LEN: usize = 500;

pub struct MistralVisionProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    api_url: String,
    prompt: String,
}

impl MistralVisionProvider {
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        let api_key = config.api_key()?.to_string();
        log::debug!(
            "Initializing Mistral provider with model {} at {}",
            config.mistral_model,
            config.mistral_api_url
        );
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: config.mistral_model.clone(),
            api_url: config.mistral_api_url.clone(),
            prompt: config.mistral_prompt.clone(),
        })
    }

    fn build_request(&self, image_url: String) -> ChatRequest<'_> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text { text: &self.prompt },
                    ContentPart::ImageUrl { image_url },
                ],
            }],
        }
    }

    fn parse_error(status: u16, text: &str) -> AppError {
        let message = truncate(text.trim(), MAX_ERROR_LEN);
        match status {
            401 | 403 => AppError::Auth(message),
            _ => AppError::Provider { status, message },
        }
    }
}

/// Encodes image bytes as a `data:` URI, mime type guessed from the extension.
pub fn data_uri(path: &Path, bytes: &[u8]) -> String {
    let mime = mime_guess::from_path(path)
        .first_raw()
        .filter(|mime| mime.starts_with("image/"))
        .unwrap_or(FALLBACK_MIME);
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{};base64,{}", mime, encoded)
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

#[async_trait]
impl DescriptionProvider for MistralVisionProvider {
    async fn describe(&self, path: &Path) -> Result<String, AppError> {
        let bytes = tokio::fs::read(path).await?;
        let body = self.build_request(data_uri(path, &bytes));

        log::trace!("Sending {} bytes of {:?} to {}", bytes.len(), path, self.api_url);
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status.as_u16(), &text));
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::UnexpectedResponse("No choices in Mistral response".into()))?;
        Ok(content.trim().to_string())
    }

    fn name(&self) -> &str {
        "Mistral Vision"
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: String },
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}
