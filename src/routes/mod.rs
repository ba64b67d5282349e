//! API Routes
//!
//! - `/api/search` - start a workflow run for `?q=` and stream its progress
//! - `/api/search/{id}/feedback` - user verdict on a draft answer
//! - `/api/health` - liveness

pub mod health;
pub mod search;

use axum::Router;
use tracing::info;

use crate::models::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    Router::new()
        .merge(search::router(state))
        .merge(health::router())
}
