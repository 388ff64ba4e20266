//! Conversation State Models
//!
//! The conversation state is the unit of work for one router pass and the
//! unit of persistence in the session store. Everything the router touches
//! lives here as an explicit field rather than a dynamically keyed bag.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::quiz_state::QuizSessionState;

/// Query categories the classifier can resolve to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QueryCategory {
    /// Single-date lookups, index values, multi-stock comparisons.
    FetchStockData,
    /// Condition search over price, volume and change rate.
    ConditionalStockData,
    /// Technical-indicator search (RSI, Bollinger, crosses, averages).
    SignalStockData,
    /// Quiz mode (active session or explicit trigger phrase).
    QuizStockData,
    /// Underspecified query that needs clarification first.
    AmbiguousQuery,
}

impl QueryCategory {
    /// The wire token the classifier prompt asks the model to answer with.
    pub fn token(&self) -> &'static str {
        match self {
            QueryCategory::FetchStockData => "fetch_stock_data",
            QueryCategory::ConditionalStockData => "conditional_stock_data",
            QueryCategory::SignalStockData => "signal_stock_data",
            QueryCategory::QuizStockData => "quiz_stock_data",
            QueryCategory::AmbiguousQuery => "ambiguous_query",
        }
    }

    /// Categories the model is allowed to answer with on the first pass.
    pub fn classifiable() -> &'static [QueryCategory] {
        &[
            QueryCategory::FetchStockData,
            QueryCategory::ConditionalStockData,
            QueryCategory::SignalStockData,
            QueryCategory::AmbiguousQuery,
        ]
    }

    /// Categories allowed after a self-clarification pass. The ambiguous
    /// category is excluded so a rewritten query cannot re-ambiguate.
    pub fn classifiable_clarified() -> &'static [QueryCategory] {
        &[
            QueryCategory::FetchStockData,
            QueryCategory::ConditionalStockData,
            QueryCategory::SignalStockData,
        ]
    }
}

/// Where a retrieval payload came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Fetch,
    Conditional,
    Signal,
    Quiz,
}

/// Result of one quiz turn, consumed by the quiz response formatter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuizOutcome {
    /// A new question was presented.
    Started { message: String },
    /// The answer was correct; the session is complete.
    AnswerCorrect { message: String },
    /// The answer was wrong; the question stays open.
    AnswerWrong { message: String, hint: String },
    /// A hint was requested and served.
    HintProvided { message: String },
    /// A finished session was torn down.
    SessionCompleted { message: String },
    /// The quiz flow failed; the session was torn down.
    Error { message: String, suggestion: String },
}

/// Payload of one retrieval pass, tagged by shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RetrievalPayload {
    /// Market-data rows from a fetch/conditional/signal tool round.
    Market {
        results: Vec<Value>,
        total_count: u64,
        returned_count: u64,
    },
    /// The outcome of a quiz turn.
    Quiz(QuizOutcome),
}

impl RetrievalPayload {
    /// An empty market payload, used when a tool round fails.
    pub fn empty_market() -> Self {
        RetrievalPayload::Market {
            results: Vec::new(),
            total_count: 0,
            returned_count: 0,
        }
    }
}

/// The last retrieval result stored on the conversation state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalData {
    /// Which branch of the router produced this payload.
    pub source: DataSource,
    /// The payload itself.
    pub payload: RetrievalPayload,
    /// Human-readable one-line summary.
    pub summary: String,
    /// Fine-grained kind tag ("stock_data_fetch", "quiz_start", ...).
    pub query_type: String,
    /// Echo of the parameters the retrieval ran with.
    pub parameters: Value,
}

/// Clarification record written by the self-clarify path.
///
/// Present only when the router rewrote the query itself; `clarified_query`
/// is never empty when this record exists.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClarificationInfo {
    pub original_query: String,
    pub clarified_query: String,
    pub start_date: String,
    pub end_date: String,
    pub market_scope: String,
    pub primary_criteria: String,
    pub secondary_criteria: String,
}

/// The full mutable record for one conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    /// Raw user query for the current turn.
    pub query: String,
    /// Category resolved by the classifier, if any.
    pub category: Option<QueryCategory>,
    /// Background knowledge collected by preprocessing.
    pub context: HashMap<String, Value>,
    /// Last retrieval result.
    pub data: Option<RetrievalData>,
    /// Last generated answer text.
    pub response: String,
    /// Clarification record from the self-clarify path.
    pub clarification: Option<ClarificationInfo>,
    /// Caller-supplied credential, forwarded opaquely. Never logged.
    #[serde(skip_serializing, default)]
    pub credential: Option<String>,
    /// External conversation identifier.
    pub session_id: String,
    /// Embedded quiz session.
    pub quiz: QuizSessionState,
}

impl ConversationState {
    /// Fresh default state for a new session.
    pub fn new(session_id: &str) -> Self {
        ConversationState {
            session_id: session_id.to_string(),
            ..Default::default()
        }
    }

    /// Reset per-turn fields for a new query. The quiz session survives
    /// across turns; everything else is derived within one router pass.
    pub fn begin_turn(&mut self, query: impl Into<String>, credential: Option<String>) {
        self.query = query.into();
        self.credential = credential;
        self.category = None;
        self.context.clear();
        self.data = None;
        self.response.clear();
        self.clarification = None;
    }
}
