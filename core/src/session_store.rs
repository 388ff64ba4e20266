//! Session Store
//!
//! One mutable conversation-state record per external session identifier,
//! with a per-session idle timeout and oldest-first eviction above a
//! capacity limit. The inner map is guarded by a plain mutex; a separate
//! per-session async lock serializes whole turns (get → route → save) for
//! the same identifier while different sessions interleave freely.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::state::ConversationState;

/// A stored conversation plus its last-activity timestamp.
#[derive(Debug, Clone)]
struct SessionRecord {
    state: ConversationState,
    last_activity: DateTime<Utc>,
}

/// Snapshot of one live session for the debug endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub quiz_active: bool,
    pub quiz_phase: String,
    pub elapsed_minutes: f64,
    pub last_activity: String,
}

/// Bounded in-memory session store.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionRecord>>,
    turn_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    idle_timeout: Duration,
    capacity: usize,
}

impl SessionStore {
    /// Create a store with the given idle timeout and capacity limit.
    pub fn new(idle_timeout: Duration, capacity: usize) -> Self {
        SessionStore {
            sessions: Mutex::new(HashMap::new()),
            turn_locks: Mutex::new(HashMap::new()),
            idle_timeout,
            capacity,
        }
    }

    /// Lock guarding the full turn for one session identifier.
    ///
    /// Callers hold this across get_or_create → router pass → save so
    /// concurrent requests for the same session cannot interleave.
    pub fn turn_lock(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .turn_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Fetch the existing record for `session_id` or create a fresh one.
    ///
    /// Runs the expiry sweep first. An empty identifier yields an ephemeral
    /// record that is never inserted.
    pub fn get_or_create(&self, session_id: &str) -> ConversationState {
        self.get_or_create_at(session_id, Utc::now())
    }

    pub(crate) fn get_or_create_at(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> ConversationState {
        self.sweep_at(now);

        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if !session_id.is_empty() {
            if let Some(record) = sessions.get_mut(session_id) {
                record.last_activity = now;
                info!(session_id, "restored existing session");
                return record.state.clone();
            }
        }

        let state = ConversationState::new(session_id);
        if !session_id.is_empty() {
            sessions.insert(
                session_id.to_string(),
                SessionRecord {
                    state: state.clone(),
                    last_activity: now,
                },
            );
            info!(session_id, "created new session");
            drop(sessions);
            self.enforce_capacity(now);
        }
        state
    }

    /// Upsert the record for `session_id` and refresh its timestamp.
    /// Empty identifiers are silently ignored (ephemeral session).
    pub fn save(&self, session_id: &str, state: ConversationState) {
        self.save_at(session_id, state, Utc::now());
    }

    pub(crate) fn save_at(
        &self,
        session_id: &str,
        state: ConversationState,
        now: DateTime<Utc>,
    ) {
        if session_id.is_empty() {
            return;
        }
        if state.quiz.is_active() {
            debug!(
                session_id,
                phase = state.quiz.phase.as_str(),
                "saving session with active quiz"
            );
        }
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions.insert(
            session_id.to_string(),
            SessionRecord {
                state,
                last_activity: now,
            },
        );
        drop(sessions);
        self.enforce_capacity(now);
    }

    /// Remove idle sessions, sessions with an expired embedded quiz, and
    /// then the least-recently-active sessions above the capacity limit.
    pub fn sweep(&self) {
        self.sweep_at(Utc::now());
    }

    pub(crate) fn sweep_at(&self, now: DateTime<Utc>) {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, record)| {
                now - record.last_activity > self.idle_timeout
                    || record.state.quiz.is_expired(now, self.idle_timeout)
            })
            .map(|(id, _)| id.clone())
            .collect();

        for session_id in expired {
            sessions.remove(&session_id);
            info!(session_id, "removed expired session");
        }
        drop(sessions);

        self.enforce_capacity(now);
    }

    fn enforce_capacity(&self, _now: DateTime<Utc>) {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        while sessions.len() > self.capacity {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, record)| record.last_activity)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(session_id) => {
                    sessions.remove(&session_id);
                    warn!(session_id, "evicted session to protect memory");
                }
                None => break,
            }
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a session with this identifier is currently stored.
    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(session_id)
    }

    /// Per-session snapshot for the debug endpoint.
    pub fn snapshot(&self) -> Vec<SessionInfo> {
        self.snapshot_at(Utc::now())
    }

    pub(crate) fn snapshot_at(&self, now: DateTime<Utc>) -> Vec<SessionInfo> {
        let sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut infos: Vec<SessionInfo> = sessions
            .iter()
            .map(|(id, record)| {
                let elapsed = (now - record.last_activity).num_seconds() as f64 / 60.0;
                SessionInfo {
                    session_id: id.clone(),
                    quiz_active: record.state.quiz.is_active(),
                    quiz_phase: record.state.quiz.phase.as_str().to_string(),
                    elapsed_minutes: (elapsed * 10.0).round() / 10.0,
                    last_activity: record.last_activity.to_rfc3339(),
                }
            })
            .collect();
        infos.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        infos
    }
}
