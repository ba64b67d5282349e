//! Search stage
//!
//! Multi-source retrieval sits behind the `SearchBackend` seam so the
//! shipped deterministic mock can be swapped for real connectors
//! (knowledge base, databases, internal APIs, file shares) without touching
//! the workflow engine.

pub mod mock;

pub use mock::MockSearchBackend;

use async_trait::async_trait;

use crate::models::{SearchIntent, SearchResult};
use crate::types::AppResult;

#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Retrieve records for a query from the data sources the intent stage
    /// selected.
    async fn search(&self, query: &str, intent: &SearchIntent) -> AppResult<Vec<SearchResult>>;
}
