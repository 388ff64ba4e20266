//! Quiz Session State
//!
//! The quiz sub-state-machine is keyed off these fields inside the
//! conversation state. Phase values are a closed enum; transition legality
//! is checked against an explicit allow-list.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Phase of a nested quiz interaction.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QuizPhase {
    #[default]
    Inactive,
    Asking,
    Processing,
    Completed,
}

impl QuizPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizPhase::Inactive => "inactive",
            QuizPhase::Asking => "asking",
            QuizPhase::Processing => "processing",
            QuizPhase::Completed => "completed",
        }
    }

    /// Transition allow-list: `inactive→asking`, `asking→{processing,
    /// completed}`, `processing→completed`, `completed→inactive`.
    pub fn can_transition_to(&self, target: QuizPhase) -> bool {
        matches!(
            (self, target),
            (QuizPhase::Inactive, QuizPhase::Asking)
                | (QuizPhase::Asking, QuizPhase::Processing)
                | (QuizPhase::Asking, QuizPhase::Completed)
                | (QuizPhase::Processing, QuizPhase::Completed)
                | (QuizPhase::Completed, QuizPhase::Inactive)
        )
    }
}

/// One multiple-choice question from the quiz catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuizQuestion {
    /// Catalog number of the question.
    pub id: u32,
    /// Prompt text.
    pub question: String,
    /// Exactly four options keyed "1" through "4".
    pub options: BTreeMap<String, String>,
    /// Number of the correct option ("1".."4").
    pub answer_number: String,
    /// Company name of the correct option.
    pub answer_company: String,
    /// Background text used to derive hints.
    pub background: String,
}

/// Embedded quiz session, present on every conversation state.
///
/// Invariant: `phase != Inactive` iff `question` is `Some`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuizSessionState {
    pub phase: QuizPhase,
    /// Short independent session token, empty while inactive.
    pub session_id: String,
    pub started_at: Option<DateTime<Utc>>,
    pub question: Option<QuizQuestion>,
    pub hint_used: bool,
}

impl QuizSessionState {
    pub fn is_active(&self) -> bool {
        self.phase != QuizPhase::Inactive
    }

    /// Whether an active session has outlived the idle timeout.
    ///
    /// An active session without a start timestamp counts as expired.
    pub fn is_expired(&self, now: DateTime<Utc>, idle_timeout: Duration) -> bool {
        if !self.is_active() {
            return false;
        }
        match self.started_at {
            Some(started) => now - started > idle_timeout,
            None => true,
        }
    }

    /// Move to `target` if the allow-list permits it. Illegal transitions
    /// are logged and ignored.
    pub fn set_phase(&mut self, target: QuizPhase) -> bool {
        if !self.phase.can_transition_to(target) {
            warn!(
                from = self.phase.as_str(),
                to = target.as_str(),
                "rejected invalid quiz phase transition"
            );
            return false;
        }
        self.phase = target;
        true
    }

    /// Reset every quiz field back to the inactive defaults.
    pub fn clear(&mut self) {
        *self = QuizSessionState::default();
    }
}
