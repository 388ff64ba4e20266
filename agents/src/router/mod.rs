//! Query Router
//!
//! The per-turn state machine: preprocess once, then classify, and
//! dispatch to the quiz flow, the clarification loop or one of the three
//! retrieval branches. Self-clarification loops back to classification;
//! the loop is capped, and hitting the cap forces the default retrieval
//! category instead of asking the user again.

use std::sync::Arc;
use tracing::{info, warn};

use stockagent_core::llm::Completion;
use stockagent_core::{AgentError, ConversationState, QueryCategory};
use stockagent_tools::{MarketDataProvider, ToolRegistry};

pub mod classify;
pub mod clarify;
pub mod preprocess;
pub mod quiz_flow;
pub mod respond;
pub mod retrieve;

use clarify::ClarifyAction;
use quiz_flow::QuizEngine;

use crate::prompts;

/// Self-clarification passes allowed before the category is forced.
const MAX_CLARIFY_PASSES: u32 = 2;

/// One router instance serves every session; per-turn state travels in
/// the `ConversationState` passed to `run_turn`.
pub struct QueryRouter {
    gateway: Arc<dyn Completion>,
    provider: Arc<dyn MarketDataProvider>,
    fetch_tools: ToolRegistry,
    conditional_tools: ToolRegistry,
    signal_tools: ToolRegistry,
    quiz: QuizEngine,
}

impl QueryRouter {
    pub fn new(
        gateway: Arc<dyn Completion>,
        provider: Arc<dyn MarketDataProvider>,
        fetch_tools: ToolRegistry,
        conditional_tools: ToolRegistry,
        signal_tools: ToolRegistry,
        quiz: QuizEngine,
    ) -> Self {
        QueryRouter {
            gateway,
            provider,
            fetch_tools,
            conditional_tools,
            signal_tools,
            quiz,
        }
    }

    /// Drive one conversation turn to a final response. Always leaves a
    /// non-empty `state.response`.
    pub async fn run_turn(&self, state: &mut ConversationState) -> Result<(), AgentError> {
        preprocess::preprocess(&self.gateway, &self.provider, state).await;

        let mut clarify_passes = 0u32;
        let mut forced: Option<QueryCategory> = None;

        loop {
            match forced.take() {
                Some(category) => state.category = Some(category),
                None => classify::classify(&self.gateway, state).await,
            }

            let category = state
                .category
                .ok_or_else(|| AgentError::Other(anyhow::anyhow!("classification left no category")))?;

            match category {
                QueryCategory::QuizStockData => {
                    self.quiz.run(state).await;
                    return Ok(());
                }
                QueryCategory::AmbiguousQuery => {
                    match clarify::clarify(&self.gateway, state).await {
                        ClarifyAction::AskUser => return Ok(()),
                        ClarifyAction::SelfClarify => {
                            clarify_passes += 1;
                            if clarify_passes >= MAX_CLARIFY_PASSES {
                                // Looping further would burn turns without
                                // converging; fall through to retrieval.
                                warn!(
                                    clarify_passes,
                                    "clarification cap reached, forcing fetch"
                                );
                                forced = Some(QueryCategory::FetchStockData);
                            }
                            continue;
                        }
                    }
                }
                QueryCategory::FetchStockData => {
                    retrieve::retrieve(
                        &self.gateway,
                        &self.fetch_tools,
                        category,
                        prompts::FETCH_TOOLS_SYSTEM,
                        state,
                    )
                    .await;
                }
                QueryCategory::ConditionalStockData => {
                    retrieve::retrieve(
                        &self.gateway,
                        &self.conditional_tools,
                        category,
                        prompts::CONDITIONAL_TOOLS_SYSTEM,
                        state,
                    )
                    .await;
                }
                QueryCategory::SignalStockData => {
                    retrieve::retrieve(
                        &self.gateway,
                        &self.signal_tools,
                        category,
                        prompts::SIGNAL_TOOLS_SYSTEM,
                        state,
                    )
                    .await;
                }
            }

            respond::generate_response(&self.gateway, state).await;
            info!(
                category = category.token(),
                session = state.session_id,
                "turn complete"
            );
            return Ok(());
        }
    }
}
