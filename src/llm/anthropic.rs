// Anthropic messages adapter
// API Reference: https://docs.anthropic.com/en/api/messages

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::llm::provider::LlmAdapter;
use crate::llm::sse;
use crate::types::{AppError, AppResult, ChunkStream, LlmRequest, LlmResponse, TokenUsage};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

// The messages API requires max_tokens; applied when the caller leaves it unset.
const DEFAULT_MAX_TOKENS: u32 = 1024;

pub struct AnthropicAdapter {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct AnthropicChatRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicChatResponse {
    content: Vec<AnthropicContentBlock>,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Deserialize)]
struct AnthropicStreamEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    delta: Option<AnthropicStreamDelta>,
}

#[derive(Deserialize)]
struct AnthropicStreamDelta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicErrorResponse {
    error: AnthropicError,
}

#[derive(Deserialize)]
struct AnthropicError {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

impl AnthropicAdapter {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: ANTHROPIC_API_BASE.to_string(),
        }
    }

    /// Convert the provider-neutral request. System-role content moves to the
    /// top-level `system` parameter; the messages list carries the rest.
    fn convert_request(request: &LlmRequest, stream: bool) -> AnthropicChatRequest {
        let mut system_parts = Vec::new();
        if let Some(system) = &request.system_instruction {
            system_parts.push(system.clone());
        }

        let mut messages = Vec::with_capacity(request.messages.len());
        for message in &request.messages {
            if message.role == "system" {
                system_parts.push(message.content.clone());
            } else {
                messages.push(AnthropicMessage {
                    role: message.role.clone(),
                    content: message.content.clone(),
                });
            }
        }

        AnthropicChatRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            messages,
            system: if system_parts.is_empty() {
                None
            } else {
                Some(system_parts.join("\n\n"))
            },
            temperature: request.temperature,
            stream: stream.then_some(true),
        }
    }

    async fn send(&self, body: &AnthropicChatRequest) -> AppResult<reqwest::Response> {
        let url = format!("{}/messages", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::LlmApi(format!("Anthropic request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if let Ok(error_response) = serde_json::from_str::<AnthropicErrorResponse>(&error_text)
            {
                return Err(AppError::LlmApi(format!(
                    "Anthropic API error ({}): {} (type: {:?})",
                    status, error_response.error.message, error_response.error.error_type
                )));
            }
            return Err(AppError::LlmApi(format!(
                "Anthropic API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response)
    }

    /// Pull the text fragment out of one streamed event payload. Pings,
    /// block boundaries, and the stop event carry no text and are skipped.
    fn extract_delta(payload: &str) -> Option<AppResult<String>> {
        match serde_json::from_str::<AnthropicStreamEvent>(payload) {
            Ok(event) => {
                if event.event_type != "content_block_delta" {
                    return None;
                }
                let text = event.delta.and_then(|d| d.text)?;
                if text.is_empty() {
                    None
                } else {
                    Some(Ok(text))
                }
            }
            Err(e) => Some(Err(AppError::LlmApi(format!(
                "Failed to parse Anthropic stream event: {}",
                e
            )))),
        }
    }
}

#[async_trait]
impl LlmAdapter for AnthropicAdapter {
    async fn create_chat_completion(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let body = Self::convert_request(request, false);
        let response = self.send(&body).await?;

        let anthropic_response: AnthropicChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::LlmApi(format!("Failed to parse Anthropic response: {}", e)))?;

        let content: String = anthropic_response
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        Ok(LlmResponse {
            content,
            finish_reason: anthropic_response
                .stop_reason
                .unwrap_or_else(|| "end_turn".to_string()),
            usage: TokenUsage {
                prompt_tokens: anthropic_response.usage.input_tokens,
                completion_tokens: anthropic_response.usage.output_tokens,
                total_tokens: anthropic_response.usage.input_tokens
                    + anthropic_response.usage.output_tokens,
            },
        })
    }

    async fn create_chat_completion_stream(&self, request: &LlmRequest) -> AppResult<ChunkStream> {
        let body = Self::convert_request(request, true);
        let response = self.send(&body).await?;
        Ok(sse::delta_stream(response, Self::extract_delta))
    }
}
