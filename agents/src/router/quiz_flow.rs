//! Quiz Flow
//!
//! The nested quiz state machine dispatched to by the router. Phase
//! handling follows the session's current phase: inactive starts a new
//! question, asking grades an answer or serves a hint, processing is a
//! transient phase that force-completes on re-entry, completed tears the
//! session down. Expiry teardown runs before any phase handling, and
//! every failure path degrades to a torn-down session plus a generic
//! error outcome rather than a failed turn.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use stockagent_core::llm::Completion;
use stockagent_core::{
    ConversationState, DataSource, QuizOutcome, QuizPhase, QuizQuestion, RetrievalData,
    RetrievalPayload,
};
use stockagent_tools::quiz::{
    catalog::QuizCatalog,
    checker::AnswerChecker,
    history::{QuizHistoryStore, QuizResultRecord},
    rewards::{RewardCalculator, RewardLimiter},
    session,
};
use stockagent_tools::{MarketDataProvider, NewsProvider};

use crate::prompts;

const RETRY_SUGGESTION: &str = "다시 '퀴즈도전'으로 시도해보세요.";
const COMPLETION_MESSAGE: &str =
    "퀴즈가 완료되었습니다. '퀴즈도전'으로 새로운 퀴즈를 시작할 수 있습니다!";

/// All collaborators of the quiz flow, wired once at startup.
pub struct QuizEngine {
    catalog: QuizCatalog,
    checker: AnswerChecker,
    history: Arc<dyn QuizHistoryStore>,
    rewards: RewardCalculator,
    limiter: RewardLimiter,
    news: Option<Arc<dyn NewsProvider>>,
    idle_timeout: Duration,
}

impl QuizEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: QuizCatalog,
        gateway: Arc<dyn Completion>,
        provider: Arc<dyn MarketDataProvider>,
        history: Arc<dyn QuizHistoryStore>,
        news: Option<Arc<dyn NewsProvider>>,
        reward_budget_won: f64,
        reward_daily_limit: u32,
        idle_timeout: Duration,
    ) -> Self {
        QuizEngine {
            catalog,
            checker: AnswerChecker::new(gateway),
            rewards: RewardCalculator::new(provider, reward_budget_won),
            limiter: RewardLimiter::new(history.clone(), reward_daily_limit),
            history,
            news,
            idle_timeout,
        }
    }

    /// Run one quiz turn, writing the retrieval payload and the final
    /// response text onto the conversation state.
    pub async fn run(&self, state: &mut ConversationState) {
        self.run_at(state, Utc::now()).await;
    }

    pub async fn run_at(&self, state: &mut ConversationState, now: DateTime<Utc>) {
        // Idle sessions are torn down before any phase handling so a
        // stale question can never be answered.
        if state.quiz.is_expired(now, self.idle_timeout) {
            info!(
                quiz_session = state.quiz.session_id,
                "quiz session expired, tearing down"
            );
            session::teardown_session(&mut state.quiz);
        }

        let outcome = match state.quiz.phase {
            QuizPhase::Inactive => self.start(state, now).await,
            QuizPhase::Asking => self.handle_input(state).await,
            QuizPhase::Processing => {
                // Transient phase observed across turns: force-complete.
                warn!("re-entered quiz processing phase, forcing completion");
                state.quiz.set_phase(QuizPhase::Completed);
                self.complete(state)
            }
            QuizPhase::Completed => self.complete(state),
        };

        state.data = Some(quiz_retrieval(&outcome));
        state.response = format_outcome(&outcome);
    }

    /// `inactive --start--> asking`
    async fn start(&self, state: &mut ConversationState, now: DateTime<Utc>) -> QuizOutcome {
        let attempted = match self.history.attempted_quiz_ids(&state.session_id) {
            Ok(ids) => ids,
            Err(e) => {
                warn!("attempt history lookup failed, selecting randomly: {e}");
                Vec::new()
            }
        };
        let Some(question) = self.catalog.unplayed(&attempted) else {
            error!("no quiz question available");
            return self.fail(state, "퀴즈를 불러올 수 없습니다.");
        };

        let message = format_question(&question);
        if !session::start_session_at(&mut state.quiz, question, now) {
            return self.fail(state, "퀴즈 세션을 시작할 수 없습니다.");
        }
        info!(
            quiz_session = state.quiz.session_id,
            "new quiz session started"
        );
        QuizOutcome::Started { message }
    }

    /// `asking --hint--> asking` or `asking --answer--> processing`
    async fn handle_input(&self, state: &mut ConversationState) -> QuizOutcome {
        let Some(question) = state.quiz.question.clone() else {
            error!("asking phase without an active question");
            return self.fail(state, "활성화된 퀴즈가 없습니다.");
        };

        let input = state.query.trim().to_string();
        if is_hint_request(&input) {
            return self.serve_hint(state, &question).await;
        }

        state.quiz.set_phase(QuizPhase::Processing);
        let verdict = self
            .checker
            .check(
                &question,
                &input,
                state.credential.clone(),
                Some(state.session_id.clone()),
            )
            .await;
        info!(
            quiz_id = question.id,
            is_correct = verdict.is_correct,
            confidence = verdict.confidence,
            method = verdict.method,
            "answer graded"
        );

        if verdict.is_correct {
            self.correct_answer(state, &question, &input).await
        } else {
            self.wrong_answer(state, &question).await
        }
    }

    async fn serve_hint(&self, state: &mut ConversationState, question: &QuizQuestion) -> QuizOutcome {
        state.quiz.hint_used = true;
        let base = self
            .checker
            .hint(
                question,
                state.credential.clone(),
                Some(state.session_id.clone()),
            )
            .await;
        let message = match self.news_hint(question).await {
            Some(news) => format!("{base}\n{news}\n---\n퀴즈는 계속 진행 중입니다. 답변을 입력해주세요!"),
            None => format!("{base}\n---\n퀴즈는 계속 진행 중입니다. 답변을 입력해주세요!"),
        };
        QuizOutcome::HintProvided { message }
    }

    /// Headline hint with the answer company masked out. Best effort.
    async fn news_hint(&self, question: &QuizQuestion) -> Option<String> {
        let news = self.news.as_ref()?;
        let headlines = match news.headlines(&question.answer_company, 3).await {
            Ok(headlines) if !headlines.is_empty() => headlines,
            Ok(_) => return None,
            Err(e) => {
                warn!("news hint lookup failed: {e}");
                return None;
            }
        };
        let masked = headlines
            .iter()
            .map(|h| format!("- {}", h.title.replace(question.answer_company.as_str(), "○○○")))
            .collect::<Vec<_>>()
            .join("\n");
        Some(format!("📰 관련 뉴스 헤드라인:\n{masked}"))
    }

    /// `processing --(correct)--> completed`, exactly one history record.
    async fn correct_answer(
        &self,
        state: &mut ConversationState,
        question: &QuizQuestion,
        user_answer: &str,
    ) -> QuizOutcome {
        let hint_used = state.quiz.hint_used;
        session::finish_session(&mut state.quiz);

        let now = Utc::now();
        let grant = if self.limiter.eligible(&state.session_id, now) {
            match self.rewards.calculate(&question.answer_company) {
                Ok(grant) => Some(grant),
                Err(e) => {
                    warn!("reward calculation failed, completing without reward: {e}");
                    None
                }
            }
        } else {
            info!("daily reward limit reached, completing without reward");
            None
        };

        let record = QuizResultRecord {
            user_id: state.session_id.clone(),
            quiz_id: question.id,
            question: question.question.clone(),
            correct_answer: question.answer_company.clone(),
            user_answer: user_answer.to_string(),
            is_correct: true,
            hint_used,
            reward_stock: grant.as_ref().map(|g| g.company.clone()).unwrap_or_default(),
            reward_amount: grant.as_ref().map(|g| g.shares).unwrap_or(0.0),
            completed_at: now,
        };
        if let Err(e) = self.history.save_result(&record) {
            error!("failed to save quiz history record: {e}");
        }

        let mut parts = vec![format!(
            "🎉 정답입니다! 정답은 {}번 {}이었습니다.",
            question.answer_number, question.answer_company
        )];
        match &grant {
            Some(grant) => {
                parts.push(format!(
                    "🎁 보상으로 {} {}주를 지급해드립니다. (전일 종가 {:.0}원 기준)",
                    grant.company, grant.shares, grant.closing_price
                ));
            }
            None => parts.push(
                "⏰ 오늘 받을 수 있는 보상 한도에 도달해 이번에는 보상 없이 완료되었습니다."
                    .to_string(),
            ),
        }
        parts.push("---".to_string());
        parts.push("🎯 새로운 퀴즈를 원하시면 '퀴즈도전'을 입력해주세요!".to_string());

        session::teardown_session(&mut state.quiz);
        QuizOutcome::AnswerCorrect {
            message: parts.join("\n"),
        }
    }

    /// Wrong answers reopen the question. This revert is the one move
    /// outside the forward allow-list, so it is a direct assignment.
    async fn wrong_answer(
        &self,
        state: &mut ConversationState,
        question: &QuizQuestion,
    ) -> QuizOutcome {
        state.quiz.phase = QuizPhase::Asking;
        let hint = self
            .checker
            .hint(
                question,
                state.credential.clone(),
                Some(state.session_id.clone()),
            )
            .await;
        QuizOutcome::AnswerWrong {
            message: "**오답입니다!** 정답은 다른 선택지입니다.\n다시 답변해보세요!"
                .to_string(),
            hint,
        }
    }

    /// `completed --teardown--> inactive`
    fn complete(&self, state: &mut ConversationState) -> QuizOutcome {
        session::teardown_session(&mut state.quiz);
        QuizOutcome::SessionCompleted {
            message: COMPLETION_MESSAGE.to_string(),
        }
    }

    /// Tear the session down and produce a generic error outcome.
    fn fail(&self, state: &mut ConversationState, message: &str) -> QuizOutcome {
        session::teardown_session(&mut state.quiz);
        QuizOutcome::Error {
            message: message.to_string(),
            suggestion: RETRY_SUGGESTION.to_string(),
        }
    }
}

/// Whether the input is one of the fixed help-seeking phrases.
pub fn is_hint_request(input: &str) -> bool {
    let normalized = input.trim().to_lowercase();
    prompts::HINT_PHRASES
        .iter()
        .any(|phrase| normalized == *phrase)
}

/// Presentation text for one question.
fn format_question(question: &QuizQuestion) -> String {
    let mut lines = vec![
        "📈 주식 퀴즈입니다!".to_string(),
        String::new(),
        format!("Q. {}", question.question),
    ];
    for (number, text) in &question.options {
        lines.push(format!("{number}. {text}"));
    }
    lines.push(String::new());
    lines.push("번호나 회사 이름으로 답해주세요. 막히면 '힌트'라고 입력하세요!".to_string());
    lines.join("\n")
}

/// Retrieval payload wrapping one quiz outcome.
fn quiz_retrieval(outcome: &QuizOutcome) -> RetrievalData {
    let (query_type, summary) = match outcome {
        QuizOutcome::Started { .. } => ("quiz_start", "퀴즈 시작"),
        QuizOutcome::AnswerCorrect { .. } => ("quiz_answer", "퀴즈 정답"),
        QuizOutcome::AnswerWrong { .. } => ("quiz_wrong_answer", "퀴즈 오답 + 힌트 제공"),
        QuizOutcome::HintProvided { .. } => ("quiz_hint", "퀴즈 힌트 제공"),
        QuizOutcome::SessionCompleted { .. } => ("quiz_completion", "퀴즈 세션 완료"),
        QuizOutcome::Error { .. } => ("quiz_error", "퀴즈 오류 발생"),
    };
    RetrievalData {
        source: DataSource::Quiz,
        payload: RetrievalPayload::Quiz(outcome.clone()),
        summary: summary.to_string(),
        query_type: query_type.to_string(),
        parameters: json!({}),
    }
}

/// User-facing text for one quiz outcome.
pub fn format_outcome(outcome: &QuizOutcome) -> String {
    match outcome {
        QuizOutcome::Started { message }
        | QuizOutcome::AnswerCorrect { message }
        | QuizOutcome::HintProvided { message }
        | QuizOutcome::SessionCompleted { message } => message.clone(),
        QuizOutcome::AnswerWrong { message, hint } => format!("{message}\n\n{hint}"),
        QuizOutcome::Error {
            message,
            suggestion,
        } => format!("{message} {suggestion}"),
    }
}
