//! Events the engine publishes, and who receives them.

use time::OffsetDateTime;

use crate::domain::leaderboard::LeaderboardEntry;
use crate::domain::session::{QuestionId, SessionId, SessionStatus, UserId};
use crate::domain::transition::CloseReason;
use crate::domain::view::QuestionView;

/// Recipient set for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Every connection that joined the session, hosts included.
    Session,
    /// Host/admin connections of the session only.
    Hosts,
    /// Every connection of one user.
    User(UserId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged {
        session_id: SessionId,
        status: SessionStatus,
        current_question_index: Option<usize>,
        expires_at: Option<OffsetDateTime>,
        question: Option<QuestionView>,
    },
    Leaderboard {
        session_id: SessionId,
        entries: Vec<LeaderboardEntry>,
    },
    SessionEnded {
        session_id: SessionId,
        reason: CloseReason,
        entries: Vec<LeaderboardEntry>,
    },
    ParticipantJoined {
        session_id: SessionId,
        participant_id: UserId,
        display_name: String,
    },
    AnswerReceived {
        session_id: SessionId,
        participant_id: UserId,
        question_id: QuestionId,
        is_correct: bool,
        points_earned: u32,
        total_score: i64,
    },
    TabSwitchAlert {
        session_id: SessionId,
        participant_id: UserId,
        count: u32,
        terminated: bool,
    },
    ParticipantCompleted {
        session_id: SessionId,
        participant_id: UserId,
        total_score: i64,
    },
    ParticipantTerminated {
        session_id: SessionId,
        participant_id: UserId,
    },
}

impl SessionEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            SessionEvent::StateChanged { session_id, .. }
            | SessionEvent::Leaderboard { session_id, .. }
            | SessionEvent::SessionEnded { session_id, .. }
            | SessionEvent::ParticipantJoined { session_id, .. }
            | SessionEvent::AnswerReceived { session_id, .. }
            | SessionEvent::TabSwitchAlert { session_id, .. }
            | SessionEvent::ParticipantCompleted { session_id, .. }
            | SessionEvent::ParticipantTerminated { session_id, .. } => *session_id,
        }
    }

    /// Each event type decides its audience here and nowhere else.
    pub fn audiences(&self) -> Vec<Audience> {
        match self {
            SessionEvent::StateChanged { .. }
            | SessionEvent::Leaderboard { .. }
            | SessionEvent::SessionEnded { .. } => vec![Audience::Session],
            SessionEvent::ParticipantJoined { .. }
            | SessionEvent::AnswerReceived { .. }
            | SessionEvent::TabSwitchAlert { .. }
            | SessionEvent::ParticipantCompleted { .. } => vec![Audience::Hosts],
            SessionEvent::ParticipantTerminated { participant_id, .. } => {
                vec![Audience::Hosts, Audience::User(*participant_id)]
            }
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            SessionEvent::StateChanged { .. } => "state_changed",
            SessionEvent::Leaderboard { .. } => "leaderboard",
            SessionEvent::SessionEnded { .. } => "session_ended",
            SessionEvent::ParticipantJoined { .. } => "participant_joined",
            SessionEvent::AnswerReceived { .. } => "answer_received",
            SessionEvent::TabSwitchAlert { .. } => "tab_switch_alert",
            SessionEvent::ParticipantCompleted { .. } => "participant_completed",
            SessionEvent::ParticipantTerminated { .. } => "participant_terminated",
        }
    }
}

/// Fan-out sink. Delivery is fire-and-forget; a slow or closed connection
/// never blocks the engine.
pub trait SessionNotifier: Send + Sync {
    fn publish(&self, event: SessionEvent);

    /// Forget every subscription of a finished session.
    fn close_session(&self, _session_id: SessionId) {}
}

/// Notifier that drops everything; for tools that run the engine headless.
pub struct NullNotifier;

impl SessionNotifier for NullNotifier {
    fn publish(&self, _event: SessionEvent) {}
}
