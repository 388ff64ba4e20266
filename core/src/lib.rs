//! StockAgent Core Module
//!
//! The core crate holds the shared building blocks of the stock agent:
//! conversation state, the bounded session store, the completion gateway
//! used to reach the external chat-completion service, configuration and
//! the common error type.

pub mod config;
pub mod error;
pub mod llm;
pub mod quiz_state;
pub mod session_store;
pub mod state;

pub use config::AgentConfig;
pub use error::AgentError;
pub use llm::{
    AssistantMessage, ChatMessage, Completion, CompletionRequest, GatewayError,
    HttpCompletionGateway, ToolCall, ToolDeclaration,
};
pub use quiz_state::{QuizPhase, QuizQuestion, QuizSessionState};
pub use session_store::{SessionInfo, SessionStore};
pub use state::{
    ClarificationInfo, ConversationState, DataSource, QueryCategory, QuizOutcome, RetrievalData,
    RetrievalPayload,
};
