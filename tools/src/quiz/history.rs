//! Quiz Attempt History
//!
//! Durable record of quiz attempts and rewards, keyed by the caller's
//! user identifier. Backed by sqlite in production; an in-memory store
//! with the same trait serves the tests.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// One finished quiz attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizResultRecord {
    pub user_id: String,
    pub quiz_id: u32,
    pub question: String,
    pub correct_answer: String,
    pub user_answer: String,
    pub is_correct: bool,
    pub hint_used: bool,
    /// Name of the rewarded stock, empty when no reward was granted.
    pub reward_stock: String,
    /// Rewarded share amount, zero when no reward was granted.
    pub reward_amount: f64,
    pub completed_at: DateTime<Utc>,
}

/// Storage seam for quiz history.
pub trait QuizHistoryStore: Send + Sync {
    /// Append one attempt.
    fn save_result(&self, record: &QuizResultRecord) -> Result<()>;
    /// Distinct quiz ids this user has attempted, ascending.
    fn attempted_quiz_ids(&self, user_id: &str) -> Result<Vec<u32>>;
    /// Number of rewards granted to this user since `cutoff`.
    fn rewards_since(&self, user_id: &str, cutoff: DateTime<Utc>) -> Result<u32>;
}

/// Sqlite-backed history.
pub struct SqliteQuizHistory {
    conn: Mutex<Connection>,
}

impl SqliteQuizHistory {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("cannot open quiz history db {}", path.display()))?;
        let store = SqliteQuizHistory {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!(path = %path.display(), "opened quiz history database");
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let store = SqliteQuizHistory {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS quiz_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                request_id TEXT NOT NULL,
                quiz_id INTEGER NOT NULL,
                quiz_question TEXT NOT NULL,
                correct_answer TEXT NOT NULL,
                user_answer TEXT NOT NULL,
                is_correct INTEGER NOT NULL,
                hint_used INTEGER NOT NULL,
                reward_stock TEXT NOT NULL DEFAULT '',
                reward_amount REAL NOT NULL DEFAULT 0,
                completed_at TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_quiz_history_request
             ON quiz_history (request_id)",
            [],
        )?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl QuizHistoryStore for SqliteQuizHistory {
    fn save_result(&self, record: &QuizResultRecord) -> Result<()> {
        let completed = record.completed_at.to_rfc3339();
        self.lock().execute(
            "INSERT INTO quiz_history (
                request_id, quiz_id, quiz_question, correct_answer, user_answer,
                is_correct, hint_used, reward_stock, reward_amount,
                completed_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            params![
                record.user_id,
                record.quiz_id,
                record.question,
                record.correct_answer,
                record.user_answer,
                record.is_correct,
                record.hint_used,
                record.reward_stock,
                record.reward_amount,
                completed,
            ],
        )?;
        debug!(
            quiz_id = record.quiz_id,
            is_correct = record.is_correct,
            "saved quiz attempt"
        );
        Ok(())
    }

    fn attempted_quiz_ids(&self, user_id: &str) -> Result<Vec<u32>> {
        if user_id.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT quiz_id FROM quiz_history
             WHERE request_id = ?1 ORDER BY quiz_id",
        )?;
        let ids = stmt
            .query_map(params![user_id], |row| row.get::<_, u32>(0))?
            .collect::<std::result::Result<Vec<u32>, _>>()?;
        Ok(ids)
    }

    fn rewards_since(&self, user_id: &str, cutoff: DateTime<Utc>) -> Result<u32> {
        if user_id.is_empty() {
            return Ok(0);
        }
        let count: u32 = self.lock().query_row(
            "SELECT COUNT(*) FROM quiz_history
             WHERE request_id = ?1
               AND is_correct = 1
               AND reward_amount > 0
               AND completed_at > ?2",
            params![user_id, cutoff.to_rfc3339()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// Test double with the same behavior as the sqlite store.
#[derive(Default)]
pub struct InMemoryQuizHistory {
    records: Mutex<Vec<QuizResultRecord>>,
}

impl InMemoryQuizHistory {
    pub fn new() -> Self {
        InMemoryQuizHistory::default()
    }

    pub fn records(&self) -> Vec<QuizResultRecord> {
        self.records
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl QuizHistoryStore for InMemoryQuizHistory {
    fn save_result(&self, record: &QuizResultRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(record.clone());
        Ok(())
    }

    fn attempted_quiz_ids(&self, user_id: &str) -> Result<Vec<u32>> {
        if user_id.is_empty() {
            return Ok(Vec::new());
        }
        let mut ids: Vec<u32> = self
            .records
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.quiz_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    fn rewards_since(&self, user_id: &str, cutoff: DateTime<Utc>) -> Result<u32> {
        if user_id.is_empty() {
            return Ok(0);
        }
        Ok(self
            .records
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|r| {
                r.user_id == user_id
                    && r.is_correct
                    && r.reward_amount > 0.0
                    && r.completed_at > cutoff
            })
            .count() as u32)
    }
}
