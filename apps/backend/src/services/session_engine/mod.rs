//! Session engine: the single entry point for host commands, participant
//! actions and sweeper commands.

mod host_commands;
mod mutation;
mod participant_actions;
mod sync;

use std::sync::Arc;

use serde::Serialize;

use crate::config::engine::EngineConfig;
use crate::domain::session::{QuestionId, Session, SessionId};
use crate::domain::transition::SessionTransition;
use crate::domain::view::SessionSnapshot;
use crate::errors::domain::{DomainError, NotFoundKind};
use crate::repos::store::SessionStore;
use crate::services::leaderboard::LeaderboardAggregator;
use crate::services::locks::SessionLocks;
use crate::services::notify::SessionNotifier;

pub use sync::SyncPayload;

pub struct SessionEngine {
    store: Arc<dyn SessionStore>,
    notifier: Arc<dyn SessionNotifier>,
    leaderboard: Arc<LeaderboardAggregator>,
    locks: Arc<SessionLocks>,
    max_attempts: u32,
}

#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub session: Session,
    pub transitions: Vec<SessionTransition>,
}

impl TransitionOutcome {
    /// False for the idempotent force-close of a finished session.
    pub fn changed(&self) -> bool {
        !self.transitions.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum JoinOutcome {
    /// Owner or admin: placed in the host room, no participant record.
    Host { snapshot: SessionSnapshot },
    Participant {
        snapshot: SessionSnapshot,
        rejoined: bool,
    },
}

impl JoinOutcome {
    pub fn snapshot(&self) -> &SessionSnapshot {
        match self {
            JoinOutcome::Host { snapshot } | JoinOutcome::Participant { snapshot, .. } => snapshot,
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self, JoinOutcome::Host { .. })
    }
}

/// Reply to the submitting participant. Feedback fields are withheld when
/// the session hides feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerReceipt {
    pub question_id: QuestionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_earned: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_score: Option<i64>,
}

impl SessionEngine {
    pub fn new(
        store: Arc<dyn SessionStore>,
        notifier: Arc<dyn SessionNotifier>,
        config: &EngineConfig,
    ) -> Self {
        let locks = Arc::new(SessionLocks::new());
        let leaderboard = Arc::new(LeaderboardAggregator::new(
            Arc::clone(&store),
            Arc::clone(&notifier),
            Arc::clone(&locks),
            config.leaderboard_debounce,
        ));
        Self {
            store,
            notifier,
            leaderboard,
            locks,
            max_attempts: config.max_transition_attempts.max(1),
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn leaderboard(&self) -> &Arc<LeaderboardAggregator> {
        &self.leaderboard
    }

    pub fn locks(&self) -> &SessionLocks {
        &self.locks
    }

    async fn load_session(&self, session_id: SessionId) -> Result<Session, DomainError> {
        self.store.find_session(session_id).await?.ok_or_else(|| {
            DomainError::not_found(NotFoundKind::Session, format!("Session {session_id} not found"))
        })
    }
}
