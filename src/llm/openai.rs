// OpenAI chat-completions adapter
// API Reference: https://platform.openai.com/docs/api-reference/chat

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::llm::provider::LlmAdapter;
use crate::llm::sse;
use crate::types::{AppError, AppResult, ChunkStream, LlmRequest, LlmResponse, TokenUsage};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

pub struct OpenAiAdapter {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiDelta,
}

#[derive(Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Deserialize)]
struct OpenAiError {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

impl OpenAiAdapter {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: OPENAI_API_BASE.to_string(),
        }
    }

    /// Convert the provider-neutral request, folding the system instruction
    /// into a leading system message.
    fn convert_request(request: &LlmRequest, stream: bool) -> OpenAiChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system_instruction {
            messages.push(OpenAiMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.extend(request.messages.iter().map(|m| OpenAiMessage {
            role: m.role.clone(),
            content: m.content.clone(),
        }));

        OpenAiChatRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: stream.then_some(true),
        }
    }

    async fn send(&self, body: &OpenAiChatRequest) -> AppResult<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::LlmApi(format!("OpenAI request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if let Ok(error_response) = serde_json::from_str::<OpenAiErrorResponse>(&error_text) {
                return Err(AppError::LlmApi(format!(
                    "OpenAI API error ({}): {} (code: {:?})",
                    status, error_response.error.message, error_response.error.code
                )));
            }
            return Err(AppError::LlmApi(format!(
                "OpenAI API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response)
    }

    /// Pull the text fragment out of one streamed event payload.
    fn extract_delta(payload: &str) -> Option<AppResult<String>> {
        if payload == "[DONE]" {
            return None;
        }
        match serde_json::from_str::<OpenAiStreamChunk>(payload) {
            Ok(chunk) => {
                let text = chunk.choices.first().and_then(|c| c.delta.content.clone())?;
                if text.is_empty() {
                    None
                } else {
                    Some(Ok(text))
                }
            }
            Err(e) => Some(Err(AppError::LlmApi(format!(
                "Failed to parse OpenAI stream chunk: {}",
                e
            )))),
        }
    }
}

#[async_trait]
impl LlmAdapter for OpenAiAdapter {
    async fn create_chat_completion(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let body = Self::convert_request(request, false);
        let response = self.send(&body).await?;

        let openai_response: OpenAiChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::LlmApi(format!("Failed to parse OpenAI response: {}", e)))?;

        let choice = openai_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::LlmApi("OpenAI returned no choices".to_string()))?;

        let usage = openai_response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(LlmResponse {
            content: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            usage,
        })
    }

    async fn create_chat_completion_stream(&self, request: &LlmRequest) -> AppResult<ChunkStream> {
        let body = Self::convert_request(request, true);
        let response = self.send(&body).await?;
        Ok(sse::delta_stream(response, Self::extract_delta))
    }
}
