//! End-to-end router passes over a scripted completion gateway.
//!
//! Each test drives `QueryRouter::run_turn` with a fixed sequence of
//! model replies and asserts on the conversation state left behind.

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use stockagent_agents::{QueryRouter, QuizEngine};
use stockagent_core::llm::{
    AssistantMessage, Completion, CompletionRequest, FunctionCall, GatewayError, ToolCall,
};
use stockagent_core::{
    ConversationState, DataSource, QueryCategory, QuizPhase, RetrievalPayload,
};
use stockagent_tools::quiz::{InMemoryQuizHistory, QuizCatalog};
use stockagent_tools::{conditional, fetch, signal, InMemoryMarketData, MarketDataProvider};

/// Gateway that serves a scripted sequence of assistant replies.
struct ScriptedGateway {
    replies: Mutex<VecDeque<AssistantMessage>>,
}

impl ScriptedGateway {
    fn new(replies: Vec<AssistantMessage>) -> Arc<dyn Completion> {
        Arc::new(ScriptedGateway {
            replies: Mutex::new(replies.into()),
        })
    }
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

fn text(content: &str) -> AssistantMessage {
    AssistantMessage {
        content: content.to_string(),
        tool_calls: Vec::new(),
    }
}

fn tool_call(name: &str, arguments: serde_json::Value) -> AssistantMessage {
    AssistantMessage {
        content: String::new(),
        tool_calls: vec![ToolCall {
            id: "call-1".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments,
            },
        }],
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

struct Harness {
    router: QueryRouter,
    history: Arc<InMemoryQuizHistory>,
}

fn harness(replies: Vec<AssistantMessage>) -> Harness {
    let gateway = ScriptedGateway::new(replies);
    let provider: Arc<dyn MarketDataProvider> = Arc::new(InMemoryMarketData::sample());
    let history = Arc::new(InMemoryQuizHistory::new());
    let catalog = QuizCatalog::parse(QUIZ_TEXT).unwrap();

    let quiz = QuizEngine::new(
        catalog,
        gateway.clone(),
        provider.clone(),
        history.clone(),
        None,
        10_000.0,
        3,
        chrono::Duration::minutes(10),
    );
    let router = QueryRouter::new(
        gateway,
        provider.clone(),
        fetch::registry(provider.clone()),
        conditional::registry(provider.clone()),
        signal::registry(provider),
        quiz,
    );
    Harness { router, history }
}

#[tokio::test]
async fn test_dated_named_query_routes_to_fetch() {
    // The listing name and the date both pattern-match, so no extraction
    // call is scripted.
    let h = harness(vec![
        text("fetch_stock_data"),
        tool_call(
            "get_historical_data",
            json!({"stock_name": "삼성전자", "date": "2024-07-15"}),
        ),
        text("2024-07-15 삼성전자의 종가를 안내해드립니다."),
    ]);

    let mut state = ConversationState::new("S1");
    state.begin_turn("2024-07-15 삼성전자 종가는?", None);
    h.router.run_turn(&mut state).await.unwrap();

    assert_eq!(state.category, Some(QueryCategory::FetchStockData));
    let data = state.data.unwrap();
    assert_eq!(data.source, DataSource::Fetch);
    match data.payload {
        RetrievalPayload::Market { returned_count, .. } => assert_eq!(returned_count, 1),
        RetrievalPayload::Quiz(_) => panic!("expected market payload"),
    }
    assert_eq!(state.response, "2024-07-15 삼성전자의 종가를 안내해드립니다.");
}

#[tokio::test]
async fn test_vague_query_asks_user_and_ends_the_turn() {
    let h = harness(vec![
        text("없음"),
        text("ambiguous_query"),
        text(
            "{\"information_completeness\": \"PARTIAL\", \
             \"missing_information_type\": \"STOCK_NAME\", \
             \"has_relative_time\": true}",
        ),
        text("어떤 종목이 궁금하신가요?"),
    ]);

    let mut state = ConversationState::new("S1");
    state.begin_turn("요즘 분위기 좋은 주식있어?", None);
    h.router.run_turn(&mut state).await.unwrap();

    assert_eq!(state.category, Some(QueryCategory::AmbiguousQuery));
    assert_eq!(state.response, "어떤 종목이 궁금하신가요?");
    assert!(state.data.is_none());
}

#[tokio::test]
async fn test_self_clarification_reclassifies_and_answers() {
    let h = harness(vec![
        text("없음"),
        text("ambiguous_query"),
        text(
            "{\"information_completeness\": \"AMBIGUOUS\", \
             \"missing_information_type\": \"NONE\", \
             \"has_relative_time\": true}",
        ),
        text(
            "{\"specific_question\": \"2024-07-15 KOSPI 지수를 알려줘\", \
             \"start_date\": \"2024-07-15\", \"end_date\": \"2024-07-15\", \
             \"market_scope\": \"KOSPI\", \"primary_criteria\": \"지수\", \
             \"secondary_criteria\": \"\"}",
        ),
        text("fetch_stock_data"),
        tool_call("get_market_index", json!({"market": "KOSPI", "date": "2024-07-15"})),
        text("해당 날짜의 KOSPI 지수를 안내해드립니다."),
    ]);

    let mut state = ConversationState::new("S1");
    state.begin_turn("요즘 시장 어때?", None);
    h.router.run_turn(&mut state).await.unwrap();

    let info = state.clarification.as_ref().unwrap();
    assert_eq!(info.original_query, "요즘 시장 어때?");
    assert_eq!(info.clarified_query, "2024-07-15 KOSPI 지수를 알려줘");
    assert_eq!(state.query, info.clarified_query);
    assert_eq!(state.category, Some(QueryCategory::FetchStockData));
    assert_eq!(state.response, "해당 날짜의 KOSPI 지수를 안내해드립니다.");
}

#[tokio::test]
async fn test_quiz_trigger_starts_a_session() {
    let h = harness(vec![text("없음")]);

    let mut state = ConversationState::new("S1");
    state.begin_turn("퀴즈도전", None);
    h.router.run_turn(&mut state).await.unwrap();

    assert_eq!(state.category, Some(QueryCategory::QuizStockData));
    assert_eq!(state.quiz.phase, QuizPhase::Asking);
    assert!(state.response.contains("Q. 다음 중"));
    assert!(state.response.contains("1. 삼성전자"));
    let data = state.data.unwrap();
    assert_eq!(data.query_type, "quiz_start");
}

#[tokio::test]
async fn test_wrong_then_correct_answer_saves_one_record() {
    // Turn 1: start. Turn 2: wrong answer (grade + hint). Turn 3: correct
    // ("1번 삼성전자" pattern-matches a listing, so no extraction call).
    let h = harness(vec![
        text("없음"),
        text("없음"),
        text("정답여부: 오답\n신뢰도: 90\n이유: 다른 기업입니다."),
        text("메모리 반도체 세계 1위와 관련이 있습니다."),
        text("정답여부: 정답\n신뢰도: 95\n이유: 정확합니다."),
    ]);

    let mut state = ConversationState::new("S1");
    state.begin_turn("퀴즈도전", None);
    h.router.run_turn(&mut state).await.unwrap();
    let question_id = state.quiz.question.as_ref().unwrap().id;

    state.begin_turn("3번", None);
    h.router.run_turn(&mut state).await.unwrap();
    // The question stays open after a wrong answer.
    assert_eq!(state.quiz.phase, QuizPhase::Asking);
    assert_eq!(state.quiz.question.as_ref().unwrap().id, question_id);
    assert!(state.response.contains("오답입니다"));
    assert!(h.history.records().is_empty());

    state.begin_turn("1번 삼성전자", None);
    h.router.run_turn(&mut state).await.unwrap();
    assert_eq!(state.quiz.phase, QuizPhase::Inactive);
    assert!(state.response.contains("정답입니다"));

    let records = h.history.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].is_correct);
    assert_eq!(records[0].quiz_id, question_id);
    assert_eq!(records[0].reward_stock, "삼성전자");
    assert!(records[0].reward_amount > 0.0);
}

#[tokio::test]
async fn test_hint_request_keeps_question_open() {
    let h = harness(vec![
        text("없음"),
        text("없음"),
        text("키워드: D램, 세계 1위"),
    ]);

    let mut state = ConversationState::new("S1");
    state.begin_turn("퀴즈도전", None);
    h.router.run_turn(&mut state).await.unwrap();

    state.begin_turn("힌트", None);
    h.router.run_turn(&mut state).await.unwrap();

    assert_eq!(state.quiz.phase, QuizPhase::Asking);
    assert!(state.quiz.hint_used);
    assert!(state.response.contains("키워드"));
    assert_eq!(state.data.unwrap().query_type, "quiz_hint");
}

#[tokio::test]
async fn test_gateway_outage_degrades_without_failing_the_turn() {
    // Every model call fails; classification falls back to ambiguous,
    // analysis falls back to heuristics, and the turn still produces text.
    let h = harness(Vec::new());

    let mut state = ConversationState::new("S1");
    state.begin_turn("주식 어때?", None);
    h.router.run_turn(&mut state).await.unwrap();

    assert!(!state.response.is_empty());
}
