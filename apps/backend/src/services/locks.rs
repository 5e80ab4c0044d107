//! Per-session and per-participant locks.
//!
//! Host transitions hold the session lock for writing; participant commands
//! and debounced leaderboard flushes hold it for reading, and additionally
//! serialize on their (session, participant) mutex. Nothing is global.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock};

use crate::domain::session::{SessionId, UserId};

#[derive(Default)]
pub struct SessionLocks {
    sessions: DashMap<SessionId, Arc<RwLock<()>>>,
    participants: DashMap<(SessionId, UserId), Arc<Mutex<()>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self, session_id: SessionId) -> Arc<RwLock<()>> {
        self.sessions
            .entry(session_id)
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    pub fn participant(&self, session_id: SessionId, participant_id: UserId) -> Arc<Mutex<()>> {
        self.participants
            .entry((session_id, participant_id))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop a finished session's locks. Only valid once the session is
    /// done: every later command is rejected on status alone, so a fresh
    /// lock created afterwards guards nothing that matters.
    pub fn release_session(&self, session_id: SessionId) {
        self.sessions.remove(&session_id);
        self.participants.retain(|(sid, _), _| *sid != session_id);
    }

    pub fn tracked_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn tracked_participants(&self) -> usize {
        self.participants.len()
    }
}
