//! StockAgent Routing Layer
//!
//! The agents crate holds the query router (the main state machine), the
//! single-round tool-calling protocol and the quiz flow that runs as a
//! nested state machine inside the same conversation state.

pub mod prompts;
pub mod protocol;
pub mod router;

pub use protocol::{run_tool_round, ToolCallResult, ToolRound};
pub use router::quiz_flow::QuizEngine;
pub use router::QueryRouter;
