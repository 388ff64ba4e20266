//! API Models
//!
//! Request and response shapes for the HTTP surface.

use serde::{Deserialize, Serialize};

use stockagent_core::SessionInfo;

/// Query-string parameters of the agent endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentQuery {
    /// The user's question. Required; its absence is a client error.
    pub question: Option<String>,
}

/// Body of a successful agent turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub answer: String,
}

/// Body of the session debug endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SessionsResponse {
    pub total_sessions: usize,
    pub sessions: Vec<SessionInfo>,
}

/// Uniform error body for 4xx/5xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        ErrorResponse {
            error: message.into(),
        }
    }
}
