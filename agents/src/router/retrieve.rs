//! Data Retrieval
//!
//! Runs one tool round for the fetch, conditional and signal branches and
//! folds the outcome into the retrieval payload on the conversation
//! state. A category, once chosen, is terminal for retrieval: protocol or
//! tool failure degrades to an empty payload with a fixed summary, never
//! to a retry in another category.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use stockagent_core::llm::{ChatMessage, Completion};
use stockagent_core::{
    ConversationState, DataSource, QueryCategory, RetrievalData, RetrievalPayload,
};
use stockagent_tools::ToolRegistry;

use crate::protocol::{run_tool_round, ToolRound};

const FAILURE_SUMMARY: &str = "데이터 조회에 실패했습니다.";

/// Run retrieval for one of the three data categories.
pub async fn retrieve(
    gateway: &Arc<dyn Completion>,
    registry: &ToolRegistry,
    category: QueryCategory,
    system_prompt: &str,
    state: &mut ConversationState,
) {
    let source = match category {
        QueryCategory::FetchStockData => DataSource::Fetch,
        QueryCategory::ConditionalStockData => DataSource::Conditional,
        _ => DataSource::Signal,
    };
    let query_type = match source {
        DataSource::Fetch => "stock_data_fetch",
        DataSource::Conditional => "stock_data_conditional",
        _ => "stock_data_signal",
    };

    let transcript = vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user(format!(
            "질문: {}\n배경지식: {}",
            state.query,
            serde_json::to_string(&state.context).unwrap_or_default()
        )),
    ];

    let round = match run_tool_round(
        gateway,
        registry,
        transcript,
        state.credential.clone(),
        Some(state.session_id.clone()),
    )
    .await
    {
        Ok(round) => round,
        Err(e) => {
            warn!(query_type, "retrieval round failed at the gateway: {e}");
            state.data = Some(failed_retrieval(source, query_type));
            return;
        }
    };

    if !round.success {
        warn!(query_type, "retrieval round had failing tools");
        state.data = Some(failed_retrieval(source, query_type));
        return;
    }

    let data = match source {
        // Fetch merges every successful tool's rows so a comparison over
        // several stocks survives as one payload.
        DataSource::Fetch => merged_payload(&round, source, query_type),
        // Condition and signal scans keep the last envelope only.
        _ => last_payload(&round, source, query_type),
    };
    info!(query_type, summary = data.summary, "retrieval complete");
    state.data = Some(data);
}

fn failed_retrieval(source: DataSource, query_type: &str) -> RetrievalData {
    RetrievalData {
        source,
        payload: RetrievalPayload::empty_market(),
        summary: FAILURE_SUMMARY.to_string(),
        query_type: query_type.to_string(),
        parameters: Value::Null,
    }
}

fn merged_payload(round: &ToolRound, source: DataSource, query_type: &str) -> RetrievalData {
    let mut rows = Vec::new();
    let mut total = 0u64;
    for result in round.successful() {
        if let Some((mut envelope_rows, envelope_total)) = parse_envelope(&result.result) {
            // Tag rows with the producing tool so merged results stay
            // distinguishable across a comparison.
            for row in &mut envelope_rows {
                if let Value::Object(map) = row {
                    map.insert("tool".to_string(), json!(result.name));
                }
            }
            total += envelope_total;
            rows.append(&mut envelope_rows);
        }
    }

    let returned = rows.len() as u64;
    RetrievalData {
        source,
        payload: RetrievalPayload::Market {
            results: rows,
            total_count: total,
            returned_count: returned,
        },
        summary: if returned == 0 {
            round_direct_summary(round)
        } else {
            format!("{returned}건의 시세 데이터를 조회했습니다.")
        },
        query_type: query_type.to_string(),
        parameters: echoed_parameters(round),
    }
}

fn last_payload(round: &ToolRound, source: DataSource, query_type: &str) -> RetrievalData {
    let last = round
        .successful()
        .last()
        .and_then(|result| parse_envelope(&result.result));

    match last {
        Some((rows, total)) => {
            let returned = rows.len() as u64;
            RetrievalData {
                source,
                payload: RetrievalPayload::Market {
                    results: rows,
                    total_count: total,
                    returned_count: returned,
                },
                summary: format!("조건에 맞는 종목 {total}건을 찾았습니다."),
                query_type: query_type.to_string(),
                parameters: echoed_parameters(round),
            }
        }
        None => RetrievalData {
            source,
            payload: RetrievalPayload::empty_market(),
            summary: round_direct_summary(round),
            query_type: query_type.to_string(),
            parameters: echoed_parameters(round),
        },
    }
}

/// Summary for a round where the model answered without usable tool data.
fn round_direct_summary(round: &ToolRound) -> String {
    if round.content.trim().is_empty() {
        "조회된 데이터가 없습니다.".to_string()
    } else {
        round.content.trim().to_string()
    }
}

/// Echo of the arguments each executed call ran with.
fn echoed_parameters(round: &ToolRound) -> Value {
    Value::Array(
        round
            .results
            .iter()
            .map(|r| json!({"tool": r.name, "arguments": r.arguments}))
            .collect(),
    )
}

/// Read a `{results, total_count, returned_count}` envelope out of a tool
/// result, tolerating a doubly JSON-encoded string and bare payloads.
fn parse_envelope(raw: &str) -> Option<(Vec<Value>, u64)> {
    let mut value: Value = serde_json::from_str(raw).ok()?;
    if let Value::String(inner) = &value {
        value = serde_json::from_str(inner).ok()?;
    }
    match value.get("results").and_then(Value::as_array) {
        Some(rows) => {
            let total = value
                .get("total_count")
                .and_then(Value::as_u64)
                .unwrap_or(rows.len() as u64);
            Some((rows.clone(), total))
        }
        None => Some((vec![value], 1)),
    }
}
