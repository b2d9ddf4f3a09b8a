//! OpenAI-compatible chat completion generator (JSON mode).

use super::{GeneratedScript, ScriptGenerator};
use crate::error::ApiError;
use crate::header::{ensure_header, header_tags};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const SYSTEM_PROMPT: &str = r#"You are a Python script generator. Given a prompt, produce a complete, working Python script with clear inline comments that follows PEP 8.
Start the script with PEP 723 inline metadata:
# /// script
# description = "Brief description"
# authors = ["Script-Magic AI Generator"]
# date = "YYYY-MM-DD"
# requires-python = ">=3.9"
# dependencies = []
# tags = ["tag1", "tag2"]
# ///
Parameters written as {{name}} in the prompt become command line arguments parsed with argparse.
Reply with a JSON object: {"code": string, "description": string, "tags": [string]}."#;

pub struct OpenAiGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl OpenAiGenerator {
    pub fn new(endpoint: &str, model: &str, api_key: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::ProviderError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn chat_json(&self, user_message: &str) -> Result<String, ApiError> {
        let url = format!("{}/chat/completions", self.endpoint);
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_message },
            ],
            "response_format": { "type": "json_object" },
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::ProviderError(format!("provider request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::ProviderError(format!("provider response read failed: {}", e)))?;
        if !status.is_success() {
            return Err(ApiError::ProviderError(format!(
                "provider request failed ({}): {}",
                status, text
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| ApiError::ProviderError(format!("provider response parse failed: {}", e)))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::ProviderError("provider response missing assistant content".to_string()))
    }
}

#[async_trait]
impl ScriptGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<GeneratedScript, ApiError> {
        debug!("Generating script with model {}", self.model);
        let content = self.chat_json(prompt).await?;
        finish_generated(&content, prompt)
    }
}

/// Decode the assistant JSON and make sure the code carries a header.
pub(crate) fn finish_generated(content: &str, prompt: &str) -> Result<GeneratedScript, ApiError> {
    let mut script: GeneratedScript = serde_json::from_str(content)
        .map_err(|e| ApiError::ProviderError(format!("generated payload is not valid JSON: {}", e)))?;
    if script.code.trim().is_empty() {
        return Err(ApiError::ProviderError("generated script is empty".to_string()));
    }
    script.code = ensure_header(&script.code, prompt, &script.description, &script.tags);
    if script.tags.is_empty() {
        script.tags = header_tags(&script.code);
    }
    if script.description.trim().is_empty() {
        script.description = crate::header::parse_header(&script.code)
            .ok()
            .flatten()
            .and_then(|h| h.description)
            .unwrap_or_default();
    }
    Ok(script)
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}
