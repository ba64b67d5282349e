//! Draft-answer flow
//!
//! Final generation stage: drafts an answer strictly from the supplied
//! search-results text. The target language is product configuration, not
//! inferred from the query. Two entry points share one request shape: a
//! buffered call and a streaming variant whose concatenated fragments equal
//! the buffered content for the same inputs.

use tracing::info;

use crate::config::Config;
use crate::llm::Llm;
use crate::models::{DraftAnswer, SearchResult};
use crate::types::{AppError, AppResult, ChunkStream, LlmMessage, LlmRequest};

pub struct AnswerFlow;

impl AnswerFlow {
    /// Concatenate search results into the text blob the generator reads.
    pub fn format_results(results: &[SearchResult]) -> String {
        results
            .iter()
            .map(|r| {
                format!(
                    "Source: {}\nTitle: {}\nSnippet: {}",
                    r.source, r.title, r.snippet
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Generate a draft answer from the query and formatted search results.
    pub async fn generate(
        llm: &Llm,
        config: &Config,
        query: &str,
        search_results: &str,
    ) -> AppResult<DraftAnswer> {
        info!(
            query_len = query.len(),
            results_len = search_results.len(),
            "Generating draft answer"
        );

        let request = Self::build_request(config, query, search_results);
        let response = llm.create_chat_completion(&request).await?;

        if response.content.is_empty() {
            return Err(AppError::LlmApi(
                "Draft answer generation returned an empty response".to_string(),
            ));
        }

        info!(answer_len = response.content.len(), "Draft answer complete");
        Ok(DraftAnswer {
            answer: response.content,
        })
    }

    /// Streaming variant of [`AnswerFlow::generate`]: same contract, but the
    /// answer arrives as a lazy, single-pass sequence of text fragments.
    pub async fn generate_stream(
        llm: &Llm,
        config: &Config,
        query: &str,
        search_results: &str,
    ) -> AppResult<ChunkStream> {
        info!(
            query_len = query.len(),
            results_len = search_results.len(),
            "Generating draft answer (streaming)"
        );

        let request = Self::build_request(config, query, search_results);
        llm.create_chat_completion_stream(&request).await
    }

    // Both entry points must issue the identical request
    fn build_request(config: &Config, query: &str, search_results: &str) -> LlmRequest {
        LlmRequest {
            model: config.llm.model.clone(),
            messages: vec![LlmMessage::user(Self::create_prompt(
                query,
                search_results,
                &config.answer.language,
            ))],
            max_tokens: Some(1024),
            temperature: Some(0.7),
            system_instruction: Some(
                "You are an AI assistant that drafts answers for an enterprise knowledge \
                 search system."
                    .to_string(),
            ),
        }
    }

    fn create_prompt(query: &str, search_results: &str, language: &str) -> String {
        format!(
            r#"You are an AI assistant that generates a draft answer based on the search results for a given query.

Query: {query}
Search Results: {search_results}

Generate a concise and informative answer based on the search results. The answer must be written in {language}, no matter which language the query uses.
Do not include any source information or links in the answer.
Do not include any introductory or concluding sentences.
Focus on answering the question directly.
If the search results are irrelevant, state that you cannot answer the question with the provided information."#,
            query = query,
            search_results = search_results,
            language = language,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::provider::LlmAdapter;
    use crate::types::{LlmResponse, TokenUsage};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use futures::StreamExt;

    /// Adapter double whose buffered content is the concatenation of its
    /// streamed fragments, like a well-behaved provider.
    struct FixedAdapter {
        chunks: Vec<String>,
    }

    #[async_trait]
    impl LlmAdapter for FixedAdapter {
        async fn create_chat_completion(&self, _request: &LlmRequest) -> AppResult<LlmResponse> {
            Ok(LlmResponse {
                content: self.chunks.concat(),
                finish_reason: "stop".to_string(),
                usage: TokenUsage::default(),
            })
        }

        async fn create_chat_completion_stream(
            &self,
            _request: &LlmRequest,
        ) -> AppResult<ChunkStream> {
            let fragments: Vec<AppResult<String>> =
                self.chunks.iter().cloned().map(Ok).collect();
            Ok(Box::pin(futures::stream::iter(fragments)))
        }
    }

    fn test_config() -> Config {
        Config {
            server: crate::config::ServerConfig {
                port: 3000,
                host: "127.0.0.1".to_string(),
                cors_allowed_origins: vec![],
            },
            llm: crate::config::LlmConfig {
                provider: "test".to_string(),
                model: "test-model".to_string(),
                openai_api_key: String::new(),
                anthropic_api_key: String::new(),
                glm_api_key: String::new(),
            },
            answer: crate::config::AnswerConfig {
                language: "Korean".to_string(),
            },
        }
    }

    fn llm_with_chunks(chunks: &[&str]) -> Llm {
        Llm::with_adapter(
            "test",
            Box::new(FixedAdapter {
                chunks: chunks.iter().map(|c| c.to_string()).collect(),
            }),
        )
    }

    #[test]
    fn test_format_results() {
        let results = vec![SearchResult {
            source: "Knowledge Base".to_string(),
            title: "AiU 의료비 자동화 보안 검토 절차".to_string(),
            snippet: "절차는 가이드라인을 따릅니다.".to_string(),
            updated: NaiveDate::from_ymd_opt(2024, 3, 15).expect("static date"),
            link: "#".to_string(),
        }];

        let formatted = AnswerFlow::format_results(&results);
        assert_eq!(
            formatted,
            "Source: Knowledge Base\nTitle: AiU 의료비 자동화 보안 검토 절차\nSnippet: 절차는 가이드라인을 따릅니다."
        );
    }

    #[test]
    fn test_create_prompt_constraints() {
        let prompt = AnswerFlow::create_prompt("질문", "결과", "Korean");
        assert!(prompt.contains("written in Korean"));
        assert!(prompt.contains("cannot answer the question"));
        assert!(prompt.contains("Do not include any source information"));
    }

    #[tokio::test]
    async fn test_generate_returns_draft() {
        let llm = llm_with_chunks(&["답변입니다."]);
        let draft = AnswerFlow::generate(&llm, &test_config(), "질문", "결과")
            .await
            .expect("generation should succeed");
        assert_eq!(draft.answer, "답변입니다.");
    }

    #[tokio::test]
    async fn test_generate_empty_response_fails() {
        let llm = llm_with_chunks(&[]);
        let err = AnswerFlow::generate(&llm, &test_config(), "질문", "결과")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::LlmApi(_)));
    }

    #[tokio::test]
    async fn test_stream_concatenation_matches_buffered() {
        let llm = llm_with_chunks(&["지난달 PE 총 생산량", "은 120,000톤", "입니다."]);
        let config = test_config();

        let buffered = AnswerFlow::generate(&llm, &config, "PE 생산량", "결과")
            .await
            .expect("buffered generation should succeed");

        let stream = AnswerFlow::generate_stream(&llm, &config, "PE 생산량", "결과")
            .await
            .expect("stream should open");
        let fragments: Vec<String> = stream
            .map(|f| f.expect("fragment should parse"))
            .collect()
            .await;

        assert_eq!(fragments.concat(), buffered.answer);
    }
}
