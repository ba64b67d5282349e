// GLM (Zhipu AI) adapter
// Documentation: https://docs.z.ai/guides/overview/quick-start
// API Reference: https://docs.z.ai/api-reference/llm/chat-completion
//
// The chat-completion surface is OpenAI-shaped: bearer auth, a messages
// array, and `data:` framed increments terminated by a [DONE] sentinel.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::llm::provider::LlmAdapter;
use crate::llm::sse;
use crate::types::{AppError, AppResult, ChunkStream, LlmRequest, LlmResponse, TokenUsage};

const GLM_API_BASE: &str = "https://api.z.ai/api/paas/v4";

pub struct GlmAdapter {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct GlmChatRequest {
    model: String,
    messages: Vec<GlmMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Serialize)]
struct GlmMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct GlmChatResponse {
    choices: Vec<GlmChoice>,
    usage: GlmUsage,
}

#[derive(Deserialize)]
struct GlmChoice {
    message: GlmResponseMessage,
    finish_reason: String,
}

#[derive(Deserialize)]
struct GlmResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct GlmUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Deserialize)]
struct GlmStreamChunk {
    choices: Vec<GlmStreamChoice>,
}

#[derive(Deserialize)]
struct GlmStreamChoice {
    delta: GlmDelta,
}

#[derive(Deserialize)]
struct GlmDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct GlmErrorResponse {
    error: GlmError,
}

#[derive(Deserialize)]
struct GlmError {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

impl GlmAdapter {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, GLM_API_BASE)
    }

    /// Point the adapter at a different endpoint (used by tests).
    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn convert_request(request: &LlmRequest, stream: bool) -> GlmChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system_instruction {
            messages.push(GlmMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.extend(request.messages.iter().map(|m| GlmMessage {
            role: m.role.clone(),
            content: m.content.clone(),
        }));

        GlmChatRequest {
            model: request.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: stream.then_some(true),
        }
    }

    async fn send(&self, body: &GlmChatRequest) -> AppResult<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::LlmApi(format!("GLM request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if let Ok(error_response) = serde_json::from_str::<GlmErrorResponse>(&error_text) {
                return Err(AppError::LlmApi(format!(
                    "GLM API error ({}): {} (code: {:?})",
                    status, error_response.error.message, error_response.error.code
                )));
            }
            return Err(AppError::LlmApi(format!(
                "GLM API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response)
    }

    fn extract_delta(payload: &str) -> Option<AppResult<String>> {
        if payload == "[DONE]" {
            return None;
        }
        match serde_json::from_str::<GlmStreamChunk>(payload) {
            Ok(chunk) => {
                let text = chunk.choices.first().and_then(|c| c.delta.content.clone())?;
                if text.is_empty() {
                    None
                } else {
                    Some(Ok(text))
                }
            }
            Err(e) => Some(Err(AppError::LlmApi(format!(
                "Failed to parse GLM stream chunk: {}",
                e
            )))),
        }
    }
}

#[async_trait]
impl LlmAdapter for GlmAdapter {
    async fn create_chat_completion(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let body = Self::convert_request(request, false);
        let response = self.send(&body).await?;

        let glm_response: GlmChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::LlmApi(format!("Failed to parse GLM response: {}", e)))?;

        let choice = glm_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::LlmApi("GLM returned no choices".to_string()))?;

        Ok(LlmResponse {
            content: choice.message.content,
            finish_reason: choice.finish_reason,
            usage: TokenUsage {
                prompt_tokens: glm_response.usage.prompt_tokens,
                completion_tokens: glm_response.usage.completion_tokens,
                total_tokens: glm_response.usage.total_tokens,
            },
        })
    }

    async fn create_chat_completion_stream(&self, request: &LlmRequest) -> AppResult<ChunkStream> {
        let body = Self::convert_request(request, true);
        let response = self.send(&body).await?;
        Ok(sse::delta_stream(response, Self::extract_delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LlmMessage;
    use futures::StreamExt;

    fn request() -> LlmRequest {
        LlmRequest {
            model: "glm-4.7".to_string(),
            messages: vec![LlmMessage::user("질문")],
            max_tokens: Some(128),
            temperature: Some(0.3),
            system_instruction: None,
        }
    }

    #[tokio::test]
    async fn test_create_chat_completion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "choices": [
                        {"message": {"role": "assistant", "content": "응답"}, "finish_reason": "stop"}
                    ],
                    "usage": {"prompt_tokens": 10, "completion_tokens": 4, "total_tokens": 14}
                }"#,
            )
            .create_async()
            .await;

        let adapter = GlmAdapter::with_base_url("test-key", &server.url());
        let response = adapter
            .create_chat_completion(&request())
            .await
            .expect("completion should succeed");

        assert_eq!(response.content, "응답");
        assert_eq!(response.finish_reason, "stop");
        assert_eq!(response.usage.total_tokens, 14);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_chat_completion_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error": {"message": "invalid api key", "code": "1002"}}"#)
            .create_async()
            .await;

        let adapter = GlmAdapter::with_base_url("bad-key", &server.url());
        let err = adapter.create_chat_completion(&request()).await.unwrap_err();
        assert!(matches!(err, AppError::LlmApi(_)));
        assert!(err.to_string().contains("invalid api key"));
    }

    #[tokio::test]
    async fn test_create_chat_completion_stream() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(concat!(
                "data: {\"choices\":[{\"delta\":{\"content\":\"지난달 \"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"PE 생산량\"}}]}\n\n",
                "data: [DONE]\n\n",
            ))
            .create_async()
            .await;

        let adapter = GlmAdapter::with_base_url("test-key", &server.url());
        let stream = adapter
            .create_chat_completion_stream(&request())
            .await
            .expect("stream should open");

        let fragments: Vec<String> = stream
            .map(|f| f.expect("fragment should parse"))
            .collect()
            .await;
        assert_eq!(fragments.concat(), "지난달 PE 생산량");
    }

    #[test]
    fn test_convert_request_prepends_system_message() {
        let mut req = request();
        req.system_instruction = Some("규칙".to_string());
        let converted = GlmAdapter::convert_request(&req, true);
        assert_eq!(converted.messages[0].role, "system");
        assert_eq!(converted.stream, Some(true));
    }
}
