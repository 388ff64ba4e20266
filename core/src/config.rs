//! Configuration Management
//!
//! Runtime configuration with sensible defaults and environment-variable
//! overrides. Values are validated once at startup.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Main configuration structure for the agent process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Host to bind the HTTP server to.
    pub host: String,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Full URL of the chat-completion endpoint.
    pub completion_endpoint: String,
    /// Default API key when the caller supplies no credential.
    pub completion_api_key: Option<String>,
    /// Timeout for one completion call, in seconds.
    pub completion_timeout_secs: u64,
    /// Idle timeout for sessions and quiz sessions, in seconds.
    pub session_idle_timeout_secs: i64,
    /// Maximum number of live sessions.
    pub session_capacity: usize,
    /// Path to the quiz catalog text file.
    pub quiz_catalog_path: String,
    /// Path to the sqlite file holding quiz history.
    pub quiz_history_db: String,
    /// News search endpoint used for quiz hints, if configured.
    pub news_endpoint: Option<String>,
    /// Reward budget per correct answer, in won.
    pub reward_budget_won: f64,
    /// Maximum rewards one user may earn per day.
    pub reward_daily_limit: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            host: "0.0.0.0".to_string(),
            port: 8000,
            completion_endpoint:
                "https://clovastudio.stream.ntruss.com/v3/chat-completions/HCX-005".to_string(),
            completion_api_key: None,
            completion_timeout_secs: 30,
            session_idle_timeout_secs: 600,
            session_capacity: 5,
            quiz_catalog_path: "quiz_data/Quiz.txt".to_string(),
            quiz_history_db: "quiz_history.db".to_string(),
            news_endpoint: None,
            reward_budget_won: 10_000.0,
            reward_daily_limit: 3,
        }
    }
}

impl AgentConfig {
    /// Build a configuration from defaults plus `STOCKAGENT_*` environment
    /// overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = AgentConfig::default();

        if let Ok(host) = env::var("STOCKAGENT_HOST") {
            config.host = host;
        }
        if let Ok(port) = env::var("STOCKAGENT_PORT") {
            config.port = port
                .parse()
                .map_err(|_| anyhow!("invalid STOCKAGENT_PORT: {port}"))?;
        }
        if let Ok(endpoint) = env::var("STOCKAGENT_COMPLETION_ENDPOINT") {
            config.completion_endpoint = endpoint;
        }
        if let Ok(key) = env::var("STOCKAGENT_COMPLETION_API_KEY") {
            if !key.is_empty() {
                config.completion_api_key = Some(key);
            }
        }
        if let Ok(timeout) = env::var("STOCKAGENT_COMPLETION_TIMEOUT_SECS") {
            config.completion_timeout_secs = timeout
                .parse()
                .map_err(|_| anyhow!("invalid STOCKAGENT_COMPLETION_TIMEOUT_SECS: {timeout}"))?;
        }
        if let Ok(path) = env::var("STOCKAGENT_QUIZ_CATALOG") {
            config.quiz_catalog_path = path;
        }
        if let Ok(path) = env::var("STOCKAGENT_QUIZ_HISTORY_DB") {
            config.quiz_history_db = path;
        }
        if let Ok(endpoint) = env::var("STOCKAGENT_NEWS_ENDPOINT") {
            if !endpoint.is_empty() {
                config.news_endpoint = Some(endpoint);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot work at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.completion_endpoint.is_empty() {
            return Err(anyhow!("completion endpoint must not be empty"));
        }
        if self.completion_timeout_secs == 0 {
            return Err(anyhow!("completion timeout must be positive"));
        }
        if self.session_idle_timeout_secs <= 0 {
            return Err(anyhow!("session idle timeout must be positive"));
        }
        if self.session_capacity == 0 {
            return Err(anyhow!("session capacity must be positive"));
        }
        Ok(())
    }

    /// Idle timeout as a chrono duration, shared by the session store and
    /// the quiz sub-state-machine.
    pub fn idle_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session_idle_timeout_secs)
    }
}
