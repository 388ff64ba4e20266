//! StockAgent API Module
//!
//! HTTP surface of the agent: one conversational endpoint and a session
//! debug endpoint, both served by axum over shared router and store
//! state.

pub mod handlers;
pub mod models;
pub mod server;

pub use handlers::ApiState;
pub use models::{AgentQuery, AnswerResponse, ErrorResponse, SessionsResponse};
pub use server::ApiServer;
