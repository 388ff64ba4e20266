//! HTTP surface tests over an in-process axum router.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use stockagent_agents::{QueryRouter, QuizEngine};
use stockagent_api::ApiServer;
use stockagent_core::llm::{
    AssistantMessage, Completion, CompletionRequest, GatewayError, CORRELATION_HEADER,
};
use stockagent_core::{AgentConfig, SessionStore};
use stockagent_tools::quiz::{InMemoryQuizHistory, QuizCatalog};
use stockagent_tools::{conditional, fetch, signal, InMemoryMarketData, MarketDataProvider};

struct ScriptedGateway {
    replies: Mutex<VecDeque<AssistantMessage>>,
}

#[async_trait]
impl Completion for ScriptedGateway {
    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Result<AssistantMessage, GatewayError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| GatewayError::Transport("script exhausted".to_string()))
    }
}

const QUIZ_TEXT: &str = "\
1. Q. 다음 중 국내 시가총액 1위의 메모리 반도체 기업은 어디일까요?
① 삼성전자
② SK하이닉스
③ NAVER
④ 카카오
정답: ① 삼성전자
1992년부터 D램 시장 세계 1위를 지키고 있는 기업입니다.
";

fn app(replies: Vec<AssistantMessage>) -> axum::Router {
    let gateway: Arc<dyn Completion> = Arc::new(ScriptedGateway {
        replies: Mutex::new(replies.into()),
    });
    let provider: Arc<dyn MarketDataProvider> = Arc::new(InMemoryMarketData::sample());
    let quiz = QuizEngine::new(
        QuizCatalog::parse(QUIZ_TEXT).unwrap(),
        gateway.clone(),
        provider.clone(),
        Arc::new(InMemoryQuizHistory::new()),
        None,
        10_000.0,
        3,
        chrono::Duration::minutes(10),
    );
    let router = Arc::new(QueryRouter::new(
        gateway,
        provider.clone(),
        fetch::registry(provider.clone()),
        conditional::registry(provider.clone()),
        signal::registry(provider),
        quiz,
    ));
    let config = AgentConfig::default();
    let store = Arc::new(SessionStore::new(config.idle_timeout(), config.session_capacity));
    ApiServer::new(&config, store, router).app()
}

fn reply(content: &str) -> AssistantMessage {
    AssistantMessage {
        content: content.to_string(),
        tool_calls: Vec::new(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_missing_question_is_bad_request() {
    let response = app(Vec::new())
        .oneshot(
            Request::get("/agent")
                .header(CORRELATION_HEADER, "conv-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"]
        .as_str()
        .unwrap()
        .contains("question"));
}

#[tokio::test]
async fn test_missing_conversation_header_is_bad_request() {
    let response = app(Vec::new())
        .oneshot(
            Request::get("/agent?question=hello")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_quiz_turn_round_trip() {
    // One turn: stock-name preprocessing, then the trigger override.
    let response = app(vec![reply("없음")])
        .oneshot(
            Request::get("/agent?question=%ED%80%B4%EC%A6%88%EB%8F%84%EC%A0%84")
                .header(CORRELATION_HEADER, "conv-1")
                .header(header::AUTHORIZATION, "Bearer test-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["answer"].as_str().unwrap().contains("주식 퀴즈"));
}

#[tokio::test]
async fn test_sessions_snapshot_counts_live_sessions() {
    let app = app(vec![reply("없음")]);

    let turn = app
        .clone()
        .oneshot(
            Request::get("/agent?question=%ED%80%B4%EC%A6%88%EB%8F%84%EC%A0%84")
                .header(CORRELATION_HEADER, "conv-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(turn.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::get("/sessions").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total_sessions"], 1);
    assert_eq!(body["sessions"][0]["session_id"], "conv-1");
    assert_eq!(body["sessions"][0]["quiz_phase"], "asking");
}

#[tokio::test]
async fn test_health_check() {
    let response = app(Vec::new())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
