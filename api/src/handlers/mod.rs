//! API Handlers
//!
//! Request handlers for the agent endpoint and the session debug
//! endpoint. The agent handler holds the per-session turn lock across
//! the whole load → route → save sequence so concurrent requests for
//! the same conversation run one at a time.

use axum::{
    debug_handler,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

use stockagent_agents::QueryRouter;
use stockagent_core::llm::CORRELATION_HEADER;
use stockagent_core::SessionStore;

use crate::models::{AgentQuery, AnswerResponse, ErrorResponse, SessionsResponse};

/// Shared state behind every handler.
pub struct ApiState {
    pub store: Arc<SessionStore>,
    pub router: Arc<QueryRouter>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message)))
}

/// Health check endpoint
#[debug_handler]
pub async fn health_check() -> Json<HashMap<String, String>> {
    let mut response = HashMap::new();
    response.insert("status".to_string(), "healthy".to_string());
    response.insert("service".to_string(), "stockagent-api".to_string());
    Json(response)
}

/// Run one agent turn for the conversation named by the correlation
/// header. The bearer credential is forwarded opaquely; only its
/// presence is ever logged.
#[debug_handler]
pub async fn agent_query(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<AgentQuery>,
    headers: HeaderMap,
) -> Result<Json<AnswerResponse>, ApiError> {
    let question = match params.question {
        Some(q) if !q.trim().is_empty() => q,
        _ => return Err(bad_request("question 파라미터가 필요합니다.")),
    };

    let session_id = headers
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    if session_id.is_empty() {
        return Err(bad_request("X-Conversation-Id 헤더가 필요합니다."));
    }

    let credential = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    debug!(
        session_id,
        credential_present = credential.is_some(),
        "agent turn accepted"
    );

    // Serialize turns for the same conversation identifier.
    let lock = state.store.turn_lock(&session_id);
    let _guard = lock.lock().await;

    let mut convo = state.store.get_or_create(&session_id);
    convo.begin_turn(question, credential);

    if let Err(e) = state.router.run_turn(&mut convo).await {
        error!(session_id, "agent turn failed: {e}");
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("요청을 처리하지 못했습니다.")),
        ));
    }

    let answer = convo.response.clone();
    state.store.save(&session_id, convo);
    info!(session_id, "agent turn complete");

    Ok(Json(AnswerResponse { answer }))
}

/// Snapshot of every live session.
#[debug_handler]
pub async fn list_sessions(
    State(state): State<Arc<ApiState>>,
) -> Json<SessionsResponse> {
    state.store.sweep();
    let sessions = state.store.snapshot();
    Json(SessionsResponse {
        total_sessions: sessions.len(),
        sessions,
    })
}
