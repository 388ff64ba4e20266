//! API Server Module
//!
//! Server setup for the HTTP surface of the agent.

use anyhow::Result;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use stockagent_agents::QueryRouter;
use stockagent_core::{AgentConfig, SessionStore};

use crate::handlers::{agent_query, health_check, list_sessions, ApiState};

/// Main API server
pub struct ApiServer {
    host: String,
    port: u16,
    state: Arc<ApiState>,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(config: &AgentConfig, store: Arc<SessionStore>, router: Arc<QueryRouter>) -> Self {
        ApiServer {
            host: config.host.clone(),
            port: config.port,
            state: Arc::new(ApiState { store, router }),
        }
    }

    /// Router over the shared state, exposed for in-process tests.
    pub fn app(&self) -> Router {
        Router::new()
            .route("/agent", get(agent_query))
            .route("/sessions", get(list_sessions))
            .route("/health", get(health_check))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Start the API server
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.host, self.port).parse()?;
        info!("StockAgent API server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.app())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start API server: {}", e))?;

        Ok(())
    }
}
