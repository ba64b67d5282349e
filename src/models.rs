use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::config::Config;
use crate::workflow::engine::{WorkflowEngine, WorkflowHandle};

/// Active runs, keyed by run id so feedback can be routed to the right
/// workflow. An entry lives as long as its progress stream is being consumed.
pub type RunRegistry = Arc<RwLock<HashMap<uuid::Uuid, WorkflowHandle>>>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Arc<WorkflowEngine>,
    pub runs: RunRegistry,
}

// Core domain models based on the search workflow

/// Outcome of intent analysis: what the user is asking for and which data
/// sources the search stage should be routed to. Produced once per query,
/// immutable after creation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchIntent {
    pub intent: String,
    #[serde(rename = "dataSources")]
    pub data_sources: Vec<String>,
}

/// A single search hit. Records have no identity beyond their position in
/// the result set and are never persisted.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchResult {
    /// Data source the record came from (e.g. "Knowledge Base")
    pub source: String,
    /// Title of the matched document
    pub title: String,
    /// Short snippet quoted from the document
    pub snippet: String,
    /// Last-updated date of the document
    pub updated: chrono::NaiveDate,
    /// Link to the document
    pub link: String,
}

/// The generated draft answer for a query.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DraftAnswer {
    pub answer: String,
}

// API Request/Response types

#[derive(Debug, serde::Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
pub struct FeedbackRequest {
    pub feedback: crate::workflow::state::Feedback,
}

#[derive(Debug, serde::Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}
