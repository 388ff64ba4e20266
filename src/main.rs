//! StockAgent entrypoint
//!
//! Wires configuration, the completion gateway, the market-data tool
//! registries, the quiz machinery and the session store into one query
//! router and serves it over HTTP.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stockagent_agents::{QueryRouter, QuizEngine};
use stockagent_api::ApiServer;
use stockagent_core::llm::{Completion, HttpCompletionGateway};
use stockagent_core::{AgentConfig, SessionStore};
use stockagent_tools::quiz::{QuizCatalog, QuizHistoryStore, SqliteQuizHistory};
use stockagent_tools::{
    conditional, fetch, signal, HttpNewsClient, InMemoryMarketData, MarketDataProvider,
    NewsProvider,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AgentConfig::from_env().context("invalid configuration")?;
    info!(
        host = config.host,
        port = config.port,
        api_key_present = config.completion_api_key.is_some(),
        "configuration loaded"
    );

    let gateway: Arc<dyn Completion> = Arc::new(HttpCompletionGateway::new(
        config.completion_endpoint.clone(),
        config.completion_api_key.clone(),
        Duration::from_secs(config.completion_timeout_secs),
    ));

    let provider: Arc<dyn MarketDataProvider> = Arc::new(InMemoryMarketData::sample());

    let catalog = QuizCatalog::load(&config.quiz_catalog_path)
        .with_context(|| format!("failed to load quiz catalog {}", config.quiz_catalog_path))?;
    info!(questions = catalog.len(), "quiz catalog loaded");

    let history: Arc<dyn QuizHistoryStore> = Arc::new(
        SqliteQuizHistory::open(&config.quiz_history_db)
            .with_context(|| format!("failed to open quiz history {}", config.quiz_history_db))?,
    );

    let news: Option<Arc<dyn NewsProvider>> = match &config.news_endpoint {
        Some(endpoint) => Some(Arc::new(HttpNewsClient::new(endpoint.clone()))),
        None => {
            warn!("no news endpoint configured, quiz hints run without headlines");
            None
        }
    };

    let quiz = QuizEngine::new(
        catalog,
        gateway.clone(),
        provider.clone(),
        history,
        news,
        config.reward_budget_won,
        config.reward_daily_limit,
        config.idle_timeout(),
    );

    let router = Arc::new(QueryRouter::new(
        gateway,
        provider.clone(),
        fetch::registry(provider.clone()),
        conditional::registry(provider.clone()),
        signal::registry(provider),
        quiz,
    ));

    let store = Arc::new(SessionStore::new(
        config.idle_timeout(),
        config.session_capacity,
    ));

    ApiServer::new(&config, store, router).start().await
}
