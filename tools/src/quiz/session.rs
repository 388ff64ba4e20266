//! Quiz Session Lifecycle
//!
//! Helpers that move the embedded quiz session through its phases. All
//! phase changes go through the allow-list; an illegal request leaves the
//! session untouched.

use chrono::{DateTime, Utc};
use tracing::info;

use stockagent_core::{QuizPhase, QuizQuestion, QuizSessionState};

/// Short independent token for one quiz run.
pub fn new_session_token() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}

/// Activate a fresh quiz session around `question`. Returns false and
/// leaves the state alone when the current phase cannot start a quiz.
pub fn start_session(quiz: &mut QuizSessionState, question: QuizQuestion) -> bool {
    start_session_at(quiz, question, Utc::now())
}

pub fn start_session_at(
    quiz: &mut QuizSessionState,
    question: QuizQuestion,
    now: DateTime<Utc>,
) -> bool {
    if !quiz.phase.can_transition_to(QuizPhase::Asking) {
        return false;
    }
    let token = new_session_token();
    info!(quiz_session = token, quiz_id = question.id, "starting quiz session");
    quiz.phase = QuizPhase::Asking;
    quiz.session_id = token;
    quiz.started_at = Some(now);
    quiz.question = Some(question);
    quiz.hint_used = false;
    true
}

/// Mark the current quiz finished. Legal from asking and processing.
pub fn finish_session(quiz: &mut QuizSessionState) -> bool {
    quiz.set_phase(QuizPhase::Completed)
}

/// Tear a completed (or abandoned) session back down to the inactive
/// defaults so the next turn routes normally.
pub fn teardown_session(quiz: &mut QuizSessionState) {
    if quiz.is_active() {
        info!(quiz_session = quiz.session_id, "tearing down quiz session");
    }
    quiz.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn question() -> QuizQuestion {
        let mut options = BTreeMap::new();
        for (k, v) in [("1", "삼성전자"), ("2", "카카오"), ("3", "NAVER"), ("4", "SK하이닉스")] {
            options.insert(k.to_string(), v.to_string());
        }
        QuizQuestion {
            id: 1,
            question: "국내 시가총액 1위 기업은 어디일까요?".to_string(),
            options,
            answer_number: "1".to_string(),
            answer_company: "삼성전자".to_string(),
            background: "반도체 대장주입니다.".to_string(),
        }
    }

    #[test]
    fn test_start_and_teardown_roundtrip() {
        let mut quiz = QuizSessionState::default();
        assert!(start_session(&mut quiz, question()));
        assert_eq!(quiz.phase, QuizPhase::Asking);
        assert_eq!(quiz.session_id.len(), 8);
        assert!(quiz.started_at.is_some());
        assert!(quiz.question.is_some());

        assert!(finish_session(&mut quiz));
        assert_eq!(quiz.phase, QuizPhase::Completed);

        teardown_session(&mut quiz);
        assert_eq!(quiz.phase, QuizPhase::Inactive);
        assert!(quiz.question.is_none());
    }

    #[test]
    fn test_cannot_start_over_running_session() {
        let mut quiz = QuizSessionState::default();
        assert!(start_session(&mut quiz, question()));
        let first_token = quiz.session_id.clone();
        assert!(!start_session(&mut quiz, question()));
        assert_eq!(quiz.session_id, first_token);
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(new_session_token(), new_session_token());
    }
}
