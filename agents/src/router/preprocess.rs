//! Preprocessing
//!
//! Best-effort extraction of an explicit date and of zero or more company
//! names from the raw query into the background-knowledge map. Dates and
//! known listing names go through pattern matching; a model-assisted
//! extraction call runs only when no listing name matched. Every failure
//! here degrades to an absent key, never to a failed turn.

use regex::Regex;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use stockagent_core::llm::{ChatMessage, Completion, CompletionRequest};
use stockagent_core::ConversationState;
use stockagent_tools::MarketDataProvider;

use crate::prompts;

/// Populate `state.context` from the raw query.
pub async fn preprocess(
    gateway: &Arc<dyn Completion>,
    provider: &Arc<dyn MarketDataProvider>,
    state: &mut ConversationState,
) {
    if let Some(date) = extract_date(&state.query) {
        state.context.insert("date".to_string(), Value::String(date));
    }
    if let Some(token) = relative_time_token(&state.query) {
        state
            .context
            .insert("relative_time".to_string(), Value::String(token));
    }

    let mut names = match_listing_names(provider.as_ref(), &state.query);
    if names.is_empty() {
        names = extract_stock_names(gateway, state).await;
    }
    if let Some(first) = names.first() {
        state
            .context
            .insert("stock_name".to_string(), Value::String(first.clone()));
    }
    if names.len() > 1 {
        state.context.insert("stock_names".to_string(), json!(names));
    }
    debug!(keys = state.context.len(), "preprocessing complete");
}

/// Explicit date in `YYYY-MM-DD` or `YYYYMMDD` form, normalized to the
/// dashed spelling.
pub fn extract_date(query: &str) -> Option<String> {
    let dashed = Regex::new(r"\d{4}-\d{2}-\d{2}").ok()?;
    if let Some(m) = dashed.find(query) {
        return Some(m.as_str().to_string());
    }
    let compact = Regex::new(r"\b(\d{8})\b").ok()?;
    compact.find(query).map(|m| {
        let raw = m.as_str();
        format!("{}-{}-{}", &raw[..4], &raw[4..6], &raw[6..8])
    })
}

/// First relative-time expression found in the query.
pub fn relative_time_token(query: &str) -> Option<String> {
    prompts::RELATIVE_TIME_TOKENS
        .iter()
        .find(|token| query.contains(**token))
        .map(|token| token.to_string())
}

/// Known listing names found in the query, in order of appearance.
pub fn match_listing_names(provider: &dyn MarketDataProvider, query: &str) -> Vec<String> {
    let mut hits: Vec<(usize, String)> = provider
        .listings()
        .into_iter()
        .filter_map(|listing| query.find(&listing.name).map(|pos| (pos, listing.name)))
        .collect();
    hits.sort();
    hits.into_iter().map(|(_, name)| name).collect()
}

/// Model-assisted extraction fallback. Returns an empty list on any
/// failure or when the model answers the no-name sentinel.
async fn extract_stock_names(
    gateway: &Arc<dyn Completion>,
    state: &ConversationState,
) -> Vec<String> {
    let request = CompletionRequest {
        messages: vec![
            ChatMessage::system(prompts::STOCK_NAME_EXTRACTION_SYSTEM),
            ChatMessage::user(state.query.clone()),
        ],
        tools: Vec::new(),
        credential: state.credential.clone(),
        session_id: Some(state.session_id.clone()),
    };
    let reply = match gateway.complete(request).await {
        Ok(message) => message.content.trim().to_string(),
        Err(e) => {
            debug!("stock name extraction failed, continuing without: {e}");
            return Vec::new();
        }
    };
    if reply.is_empty() || ["없음", "None", "null"].contains(&reply.as_str()) {
        return Vec::new();
    }
    reply
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
