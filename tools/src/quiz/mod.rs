//! Quiz Machinery
//!
//! Catalog loading and parsing, answer checking, durable attempt history,
//! reward calculation and the quiz session lifecycle helpers used by the
//! routing layer.

pub mod catalog;
pub mod checker;
pub mod history;
pub mod rewards;
pub mod session;

pub use catalog::QuizCatalog;
pub use checker::{AnswerChecker, AnswerVerdict};
pub use history::{InMemoryQuizHistory, QuizHistoryStore, QuizResultRecord, SqliteQuizHistory};
pub use rewards::{RewardCalculator, RewardGrant, RewardLimiter};
