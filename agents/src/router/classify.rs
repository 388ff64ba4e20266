//! Classification
//!
//! Two hard overrides run before any model call: an active quiz session
//! always routes to quiz, and the fixed trigger phrase starts one. The
//! model's free-text reply is reduced to a category token by exact token
//! equality, then per-line word match, then whole-response containment; an
//! unparseable reply falls back to `ambiguous` on the first pass and to
//! `fetch` after a self-clarification, which also narrows the allowed set
//! so a rewritten query cannot re-ambiguate.

use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use stockagent_core::llm::{ChatMessage, Completion, CompletionRequest};
use stockagent_core::{ConversationState, QueryCategory};

use crate::prompts;

/// Resolve the category for the current turn and record it on the state.
pub async fn classify(gateway: &Arc<dyn Completion>, state: &mut ConversationState) {
    if state.quiz.is_active() {
        debug!("active quiz session, routing to quiz");
        state.category = Some(QueryCategory::QuizStockData);
        return;
    }
    if state.query.contains(prompts::QUIZ_TRIGGER) {
        info!("quiz trigger phrase detected");
        state.category = Some(QueryCategory::QuizStockData);
        return;
    }

    let clarified = state.clarification.is_some();
    let (system, allowed, fallback) = if clarified {
        (
            prompts::CLASSIFY_CLARIFIED_SYSTEM,
            QueryCategory::classifiable_clarified(),
            QueryCategory::FetchStockData,
        )
    } else {
        (
            prompts::CLASSIFY_SYSTEM,
            QueryCategory::classifiable(),
            QueryCategory::AmbiguousQuery,
        )
    };

    let request = CompletionRequest {
        messages: vec![
            ChatMessage::system(system),
            ChatMessage::user(format!(
                "질문: {}\n배경지식: {}",
                state.query,
                serde_json::to_string(&state.context).unwrap_or_default()
            )),
        ],
        tools: Vec::new(),
        credential: state.credential.clone(),
        session_id: Some(state.session_id.clone()),
    };

    let category = match gateway.complete(request).await {
        Ok(message) => match extract_category(&message.content, allowed) {
            Some(category) => category,
            None => {
                warn!(
                    fallback = fallback.token(),
                    "no category token in classifier reply, using fallback"
                );
                fallback
            }
        },
        Err(e) => {
            warn!("classification call failed, using fallback: {e}");
            fallback
        }
    };

    info!(category = category.token(), "query classified");
    state.category = Some(category);
}

/// Three-tier token extraction: the whole reply is exactly a token, then
/// the first line carrying a token as a word, then bare containment over
/// the whole reply.
pub fn extract_category(
    response: &str,
    allowed: &[QueryCategory],
) -> Option<QueryCategory> {
    let lower = response.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }

    if let Some(category) = token_to_category(&lower, allowed) {
        return Some(category);
    }

    let pattern = allowed
        .iter()
        .map(|c| regex::escape(c.token()))
        .collect::<Vec<_>>()
        .join("|");
    let word = Regex::new(&format!(r"\b({pattern})\b")).ok()?;
    for line in lower.lines() {
        if let Some(m) = word.find(line) {
            return token_to_category(m.as_str(), allowed);
        }
    }

    allowed
        .iter()
        .find(|c| lower.contains(c.token()))
        .copied()
}

fn token_to_category(token: &str, allowed: &[QueryCategory]) -> Option<QueryCategory> {
    allowed.iter().find(|c| c.token() == token).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_token_reply() {
        assert_eq!(
            extract_category("fetch_stock_data", QueryCategory::classifiable()),
            Some(QueryCategory::FetchStockData)
        );
    }

    #[test]
    fn test_token_inside_explanation() {
        let reply = "분석 결과입니다.\n카테고리: signal_stock_data 입니다.";
        assert_eq!(
            extract_category(reply, QueryCategory::classifiable()),
            Some(QueryCategory::SignalStockData)
        );
    }

    #[test]
    fn test_case_insensitive_match() {
        assert_eq!(
            extract_category("Conditional_Stock_Data", QueryCategory::classifiable()),
            Some(QueryCategory::ConditionalStockData)
        );
    }

    #[test]
    fn test_embedded_token_found_by_containment() {
        // No word boundary between the token and the trailing Hangul, so
        // only the containment tier can see it.
        assert_eq!(
            extract_category("분류:fetch_stock_data입니다", QueryCategory::classifiable()),
            Some(QueryCategory::FetchStockData)
        );
    }

    #[test]
    fn test_unparseable_reply_yields_none() {
        assert_eq!(
            extract_category("잘 모르겠습니다", QueryCategory::classifiable()),
            None
        );
        assert_eq!(extract_category("", QueryCategory::classifiable()), None);
    }

    #[test]
    fn test_clarified_set_never_matches_ambiguous() {
        assert_eq!(
            extract_category(
                "ambiguous_query",
                QueryCategory::classifiable_clarified()
            ),
            None
        );
    }
}
