//! Common Error Types
//!
//! Typed errors shared across the agent crates. Everything below the HTTP
//! boundary is expected to recover into a well-formed answer payload; these
//! variants exist so each layer can decide how to degrade.

use thiserror::Error;

use crate::llm::GatewayError;

/// Errors produced by the orchestration core.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The completion service call failed (timeout, transport, bad shape).
    #[error("completion gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// A tool round failed as a whole (protocol-level failure).
    #[error("tool protocol error: {0}")]
    ToolProtocol(String),

    /// Anything else that should surface as an internal error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
