//! Clarification
//!
//! Handles the ambiguous branch. A completeness analysis classifies the
//! query as COMPLETE, PARTIAL or AMBIGUOUS with a missing-information
//! type; the decision rule then either asks the user a targeted follow-up
//! (terminal for the turn) or rewrites the query in place and loops back
//! to classification. A COMPLETE verdict reaching this branch is a
//! routing anomaly and self-clarifies. The rewritten query is recorded in
//! the clarification record, which is never stored with an empty
//! rewritten query.

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use stockagent_core::llm::{ChatMessage, Completion, CompletionRequest};
use stockagent_core::{ClarificationInfo, ConversationState};

use crate::prompts;
use crate::router::preprocess;

/// What the ambiguous branch decided to do with this turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClarifyAction {
    /// Terminal: `response` holds the follow-up question for the user.
    AskUser,
    /// The query was rewritten in place; classify again.
    SelfClarify,
}

/// Completeness verdict for one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletenessAnalysis {
    pub completeness: Completeness,
    pub missing_type: MissingInfo,
    pub has_relative_time: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completeness {
    Complete,
    Partial,
    Ambiguous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingInfo {
    StockName,
    SpecificDate,
    TimePeriod,
    None,
}

impl MissingInfo {
    fn parse(token: &str) -> Self {
        match token {
            "STOCK_NAME" => MissingInfo::StockName,
            "SPECIFIC_DATE" => MissingInfo::SpecificDate,
            "TIME_PERIOD" => MissingInfo::TimePeriod,
            _ => MissingInfo::None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            MissingInfo::StockName => "종목명",
            MissingInfo::SpecificDate => "조회 날짜",
            MissingInfo::TimePeriod => "조회 기간",
            MissingInfo::None => "추가 정보",
        }
    }
}

/// Run the ambiguous branch once. On `AskUser` the follow-up question is
/// already written into `state.response`.
pub async fn clarify(
    gateway: &Arc<dyn Completion>,
    state: &mut ConversationState,
) -> ClarifyAction {
    let analysis = analyze(gateway, state).await;
    let action = decide(&analysis);
    info!(
        completeness = ?analysis.completeness,
        missing = ?analysis.missing_type,
        action = ?action,
        "ambiguity analysis complete"
    );

    match action {
        ClarifyAction::AskUser => {
            state.response = ask_user_question(gateway, state, &analysis).await;
            ClarifyAction::AskUser
        }
        ClarifyAction::SelfClarify => {
            self_clarify(gateway, state).await;
            ClarifyAction::SelfClarify
        }
    }
}

/// Decision rule over the analysis verdict.
pub fn decide(analysis: &CompletenessAnalysis) -> ClarifyAction {
    match analysis.completeness {
        // A complete query reaching the ambiguous branch is an anomaly.
        Completeness::Complete => {
            warn!("complete query reached the ambiguous branch");
            ClarifyAction::SelfClarify
        }
        Completeness::Partial => {
            if analysis.missing_type == MissingInfo::SpecificDate && analysis.has_relative_time {
                // The relative date is resolvable without the user.
                ClarifyAction::SelfClarify
            } else if matches!(
                analysis.missing_type,
                MissingInfo::StockName | MissingInfo::SpecificDate | MissingInfo::TimePeriod
            ) {
                ClarifyAction::AskUser
            } else {
                ClarifyAction::SelfClarify
            }
        }
        Completeness::Ambiguous => ClarifyAction::SelfClarify,
    }
}

/// Model-assisted completeness analysis with a heuristic fallback built
/// from the background-knowledge map.
async fn analyze(
    gateway: &Arc<dyn Completion>,
    state: &ConversationState,
) -> CompletenessAnalysis {
    let request = CompletionRequest {
        messages: vec![
            ChatMessage::system(prompts::ANALYSIS_SYSTEM),
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

    match gateway.complete(request).await {
        Ok(message) => parse_analysis(&message.content)
            .unwrap_or_else(|| heuristic_analysis(state)),
        Err(e) => {
            warn!("completeness analysis call failed, using heuristics: {e}");
            heuristic_analysis(state)
        }
    }
}

/// Parse the analysis JSON, tolerating surrounding prose.
pub fn parse_analysis(text: &str) -> Option<CompletenessAnalysis> {
    let json = extract_json_object(text)?;
    let completeness = match json.get("information_completeness")?.as_str()? {
        "COMPLETE" => Completeness::Complete,
        "PARTIAL" => Completeness::Partial,
        "AMBIGUOUS" => Completeness::Ambiguous,
        _ => return None,
    };
    Some(CompletenessAnalysis {
        completeness,
        missing_type: MissingInfo::parse(
            json.get("missing_information_type")
                .and_then(Value::as_str)
                .unwrap_or("NONE"),
        ),
        has_relative_time: json
            .get("has_relative_time")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    })
}

/// Local verdict from the background-knowledge map alone.
fn heuristic_analysis(state: &ConversationState) -> CompletenessAnalysis {
    let has_date = state.context.contains_key("date");
    let has_name = state.context.contains_key("stock_name");
    let has_relative_time = state.context.contains_key("relative_time")
        || preprocess::relative_time_token(&state.query).is_some();

    let (completeness, missing_type) = match (has_name, has_date) {
        (true, true) => (Completeness::Complete, MissingInfo::None),
        (true, false) => (Completeness::Partial, MissingInfo::SpecificDate),
        (false, true) => (Completeness::Partial, MissingInfo::StockName),
        (false, false) => (Completeness::Ambiguous, MissingInfo::None),
    };
    CompletenessAnalysis {
        completeness,
        missing_type,
        has_relative_time,
    }
}

/// Generate the targeted follow-up question for the user.
async fn ask_user_question(
    gateway: &Arc<dyn Completion>,
    state: &ConversationState,
    analysis: &CompletenessAnalysis,
) -> String {
    let request = CompletionRequest {
        messages: vec![
            ChatMessage::system(prompts::ASK_USER_SYSTEM),
            ChatMessage::user(format!(
                "원래 질문: {}\n부족한 정보: {}",
                state.query,
                analysis.missing_type.label()
            )),
        ],
        tools: Vec::new(),
        credential: state.credential.clone(),
        session_id: Some(state.session_id.clone()),
    };
    match gateway.complete(request).await {
        Ok(message) if !message.content.trim().is_empty() => message.content.trim().to_string(),
        _ => prompts::FALLBACK_CLARIFICATION.to_string(),
    }
}

/// Rewrite the query into an explicit, dated, scoped form and record the
/// clarification fields. Degrades to reusing the original query text so
/// the record's rewritten query is never empty.
async fn self_clarify(gateway: &Arc<dyn Completion>, state: &mut ConversationState) {
    let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
    let request = CompletionRequest {
        messages: vec![
            ChatMessage::system(prompts::CLARIFY_REWRITE_SYSTEM),
            ChatMessage::user(format!("오늘 날짜: {today}\n질문: {}", state.query)),
        ],
        tools: Vec::new(),
        credential: state.credential.clone(),
        session_id: Some(state.session_id.clone()),
    };

    let parsed = match gateway.complete(request).await {
        Ok(message) => extract_json_object(&message.content),
        Err(e) => {
            warn!("self-clarify rewrite call failed: {e}");
            None
        }
    };

    let field = |json: &Value, key: &str| {
        json.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let original = state.query.clone();
    let info = match parsed {
        Some(json) => {
            let mut rewritten = field(&json, "specific_question");
            if rewritten.trim().is_empty() {
                rewritten = original.clone();
            }
            ClarificationInfo {
                original_query: original,
                clarified_query: rewritten,
                start_date: field(&json, "start_date"),
                end_date: field(&json, "end_date"),
                market_scope: field(&json, "market_scope"),
                primary_criteria: field(&json, "primary_criteria"),
                secondary_criteria: field(&json, "secondary_criteria"),
            }
        }
        None => ClarificationInfo {
            original_query: original.clone(),
            clarified_query: original,
            ..Default::default()
        },
    };

    info!(
        clarified = info.clarified_query,
        "query rewritten by self-clarification"
    );
    state.query = info.clarified_query.clone();
    state.clarification = Some(info);
}

/// First top-level JSON object embedded in `text`.
fn extract_json_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(
        completeness: Completeness,
        missing_type: MissingInfo,
        has_relative_time: bool,
    ) -> CompletenessAnalysis {
        CompletenessAnalysis {
            completeness,
            missing_type,
            has_relative_time,
        }
    }

    #[test]
    fn test_complete_anomaly_self_clarifies() {
        assert_eq!(
            decide(&analysis(Completeness::Complete, MissingInfo::None, false)),
            ClarifyAction::SelfClarify
        );
    }

    #[test]
    fn test_partial_missing_date_with_relative_time_self_clarifies() {
        assert_eq!(
            decide(&analysis(
                Completeness::Partial,
                MissingInfo::SpecificDate,
                true
            )),
            ClarifyAction::SelfClarify
        );
    }

    #[test]
    fn test_partial_missing_info_asks_user() {
        for missing in [
            MissingInfo::StockName,
            MissingInfo::SpecificDate,
            MissingInfo::TimePeriod,
        ] {
            assert_eq!(
                decide(&analysis(Completeness::Partial, missing, false)),
                ClarifyAction::AskUser
            );
        }
    }

    #[test]
    fn test_ambiguous_always_self_clarifies() {
        assert_eq!(
            decide(&analysis(Completeness::Ambiguous, MissingInfo::None, false)),
            ClarifyAction::SelfClarify
        );
    }

    #[test]
    fn test_parse_analysis_tolerates_prose() {
        let reply = "분석 결과:\n{\"information_completeness\": \"PARTIAL\", \
                     \"missing_information_type\": \"SPECIFIC_DATE\", \
                     \"has_relative_time\": true}\n이상입니다.";
        let parsed = parse_analysis(reply).unwrap();
        assert_eq!(parsed.completeness, Completeness::Partial);
        assert_eq!(parsed.missing_type, MissingInfo::SpecificDate);
        assert!(parsed.has_relative_time);
    }

    #[test]
    fn test_parse_analysis_rejects_garbage() {
        assert!(parse_analysis("모르겠습니다").is_none());
        assert!(parse_analysis("{\"information_completeness\": \"MAYBE\"}").is_none());
    }
}
