//! Intent analysis flow
//!
//! First stage of the search workflow: asks the LLM what the user is after
//! and which data sources are worth searching. The response is parsed
//! strictly; a malformed response fails the run rather than guessing.

use serde::Deserialize;
use tracing::info;

use crate::config::Config;
use crate::llm::Llm;
use crate::models::SearchIntent;
use crate::types::{AppError, AppResult, LlmMessage, LlmRequest};

/// Data sources the search stage can be routed to.
pub const KNOWN_DATA_SOURCES: [&str; 4] = ["Knowledge Base", "Database", "API", "File System"];

/// Raw JSON response from the LLM for intent analysis
#[derive(Debug, Deserialize)]
struct IntentLlmResponse {
    intent: String,
    #[serde(rename = "dataSources")]
    data_sources: Vec<String>,
}

pub struct IntentFlow;

impl IntentFlow {
    /// Analyze a query into a `SearchIntent`.
    pub async fn analyze(llm: &Llm, config: &Config, query: &str) -> AppResult<SearchIntent> {
        info!(query_len = query.len(), "Analyzing search intent");

        let prompt = Self::create_prompt(query);
        let request = LlmRequest {
            model: config.llm.model.clone(),
            messages: vec![LlmMessage::user(prompt)],
            max_tokens: Some(512),
            temperature: Some(0.2),
            system_instruction: Some(
                "You are the routing stage of an enterprise knowledge search system. \
                 You classify queries and select the data sources to search."
                    .to_string(),
            ),
        };

        let response = llm.create_chat_completion(&request).await?;
        let intent = Self::parse_response(&response.content)?;

        info!(
            intent = %intent.intent,
            source_count = intent.data_sources.len(),
            "Intent analysis complete"
        );
        Ok(intent)
    }

    fn create_prompt(query: &str) -> String {
        let sources = KNOWN_DATA_SOURCES
            .iter()
            .map(|s| format!("- {}", s))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"You are analyzing a user's knowledge-search query to decide how to route it.

QUERY: {query}

TASK:
Describe the user's intent in one sentence and select every data source worth searching for this query.

AVAILABLE DATA SOURCES:
{sources}

OUTPUT FORMAT (respond with ONLY valid JSON):
{{
  "intent": "One-sentence description of what the user wants to know",
  "dataSources": ["Knowledge Base", "Database"]
}}

IMPORTANT:
- Choose only from the available data sources
- List at least one data source
- Respond with ONLY the JSON object"#,
            query = query,
            sources = sources,
        )
    }

    /// Parse the LLM response into a `SearchIntent`.
    fn parse_response(response: &str) -> AppResult<SearchIntent> {
        // Models sometimes wrap the JSON in a markdown fence
        let json_str = if response.contains("```json") {
            response
                .split("```json")
                .nth(1)
                .and_then(|s| s.split("```").next())
                .unwrap_or(response)
                .trim()
        } else if response.contains("```") {
            response.split("```").nth(1).unwrap_or(response).trim()
        } else {
            response.trim()
        };

        let parsed: IntentLlmResponse = serde_json::from_str(json_str)
            .map_err(|e| AppError::LlmApi(format!("Failed to parse intent response: {}", e)))?;

        if parsed.data_sources.is_empty() {
            return Err(AppError::LlmApi(
                "Intent analysis selected no data sources".to_string(),
            ));
        }

        Ok(SearchIntent {
            intent: parsed.intent,
            data_sources: parsed.data_sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_plain_json() {
        let intent = IntentFlow::parse_response(
            r#"{"intent": "PE 생산량 조회", "dataSources": ["Database", "API"]}"#,
        )
        .expect("plain JSON should parse");
        assert_eq!(intent.intent, "PE 생산량 조회");
        assert_eq!(intent.data_sources, vec!["Database", "API"]);
    }

    #[test]
    fn test_parse_response_fenced_json() {
        let response = "```json\n{\"intent\": \"status lookup\", \"dataSources\": [\"Knowledge Base\"]}\n```";
        let intent = IntentFlow::parse_response(response).expect("fenced JSON should parse");
        assert_eq!(intent.data_sources, vec!["Knowledge Base"]);
    }

    #[test]
    fn test_parse_response_malformed() {
        let err = IntentFlow::parse_response("I think you want to search everywhere").unwrap_err();
        assert!(matches!(err, AppError::LlmApi(_)));
    }

    #[test]
    fn test_parse_response_empty_sources() {
        let err =
            IntentFlow::parse_response(r#"{"intent": "unclear", "dataSources": []}"#).unwrap_err();
        assert!(matches!(err, AppError::LlmApi(_)));
    }

    #[test]
    fn test_create_prompt_lists_sources() {
        let prompt = IntentFlow::create_prompt("aiu 의료비 절차");
        assert!(prompt.contains("aiu 의료비 절차"));
        for source in KNOWN_DATA_SOURCES {
            assert!(prompt.contains(source));
        }
    }
}
