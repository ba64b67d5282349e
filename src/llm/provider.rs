use async_trait::async_trait;

use crate::config::LlmConfig;
use crate::types::{AppError, AppResult, ChunkStream, LlmRequest, LlmResponse};

/// Boundary to an external generation service. Adapters translate the
/// provider-neutral request into the provider's wire format, for both
/// buffered and incremental completion.
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LlmRequest) -> AppResult<LlmResponse>;

    async fn create_chat_completion_stream(&self, request: &LlmRequest) -> AppResult<ChunkStream>;
}

pub struct Llm {
    adapter: Box<dyn LlmAdapter>,
    provider_name: String,
}

impl std::fmt::Debug for Llm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Llm")
            .field("provider_name", &self.provider_name)
            .finish_non_exhaustive()
    }
}

impl Llm {
    /// Build the client for the configured provider. Fails when the provider
    /// is unknown or has no API key set.
    pub fn from_config(config: &LlmConfig) -> AppResult<Self> {
        let api_key = config.active_api_key().ok_or_else(|| {
            AppError::Config(format!(
                "no API key configured for provider {}",
                config.provider
            ))
        })?;

        let adapter: Box<dyn LlmAdapter> = match config.provider.as_str() {
            "openai" => Box::new(crate::llm::openai::OpenAiAdapter::new(&api_key)),
            "anthropic" => Box::new(crate::llm::anthropic::AnthropicAdapter::new(&api_key)),
            "glm" => Box::new(crate::llm::glm::GlmAdapter::new(&api_key)),
            other => {
                return Err(AppError::Config(format!("unsupported provider: {}", other)));
            }
        };

        Ok(Self {
            adapter,
            provider_name: config.provider.clone(),
        })
    }

    /// Wrap an existing adapter. Used to inject test doubles.
    pub fn with_adapter(provider_name: impl Into<String>, adapter: Box<dyn LlmAdapter>) -> Self {
        Self {
            adapter,
            provider_name: provider_name.into(),
        }
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub async fn create_chat_completion(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.adapter.create_chat_completion(request).await
    }

    pub async fn create_chat_completion_stream(
        &self,
        request: &LlmRequest,
    ) -> AppResult<ChunkStream> {
        self.adapter.create_chat_completion_stream(request).await
    }
}
