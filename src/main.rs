use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aiu_link::config::Config;
use aiu_link::llm::Llm;
use aiu_link::models::AppState;
use aiu_link::search::MockSearchBackend;
use aiu_link::workflow::WorkflowEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aiu_link=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config.server);

    let llm = Llm::from_config(&config.llm)?;
    info!(provider = %llm.provider_name(), "LLM provider ready");

    // Search connectors are mocked in this build
    let backend = Arc::new(MockSearchBackend::new());

    let config = Arc::new(config);
    let engine = Arc::new(WorkflowEngine::new(Arc::new(llm), backend, config.clone()));

    let state = AppState {
        config: config.clone(),
        engine,
        runs: Arc::new(RwLock::new(HashMap::new())),
    };

    let app = aiu_link::create_router(state)
        .layer(aiu_link::middleware::cors_layer(
            &config.server.cors_allowed_origins,
        ))
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
