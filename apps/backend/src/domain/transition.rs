//! Session state machine: plan a command against the current session, then
//! apply the plan. Planning is pure and re-run on every retry, so a stale
//! read can never be blindly re-applied.

use time::OffsetDateTime;

use crate::domain::session::{Session, SessionStatus};
use crate::errors::domain::{DomainError, ValidationKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Host start.
    Start,
    /// Host next.
    Advance,
    /// Host end.
    End,
    /// Sweeper: scheduled start time elapsed.
    SweepStart,
    /// Sweeper: `expires_at` elapsed.
    SweepExpire,
}

impl SessionCommand {
    pub fn is_sweep(&self) -> bool {
        matches!(self, Self::SweepStart | Self::SweepExpire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    HostEnded,
    Expired,
    Finished,
}

impl CloseReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::HostEnded => "host_ended",
            Self::Expired => "expired",
            Self::Finished => "finished",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPlan {
    /// live -> question_active(0); open records start.
    Begin {
        started_at: OffsetDateTime,
        expires_at: Option<OffsetDateTime>,
    },
    /// question_active -> leaderboard; only the quiz deadline survives.
    ShowLeaderboard { expires_at: Option<OffsetDateTime> },
    /// leaderboard -> question_active(index).
    NextQuestion {
        index: usize,
        expires_at: Option<OffsetDateTime>,
    },
    /// Any running status -> done.
    ForceClose { reason: CloseReason },
    /// Force-close on a done session; nothing to do.
    AlreadyClosed,
}

fn reject(session: &Session, command: SessionCommand) -> DomainError {
    DomainError::invalid_transition(format!(
        "{command:?} not allowed while session {} is {}",
        session.id,
        session.status.as_str()
    ))
}

/// Decide what `command` does to `session` at `now`.
pub fn plan_transition(
    session: &Session,
    command: SessionCommand,
    now: OffsetDateTime,
) -> Result<TransitionPlan, DomainError> {
    use SessionStatus as S;

    match (command, session.status) {
        (SessionCommand::Start, status) if status.is_pre_start() => begin(session, now),
        (SessionCommand::SweepStart, S::Scheduled) if session.is_due_for_auto_start(now) => {
            begin(session, now)
        }

        (SessionCommand::Advance, S::QuestionActive) => Ok(TransitionPlan::ShowLeaderboard {
            expires_at: session.quiz_deadline(),
        }),
        (SessionCommand::Advance, S::Leaderboard) => {
            let next = session.current_question_index.map_or(0, |i| i + 1);
            if next < session.questions.len() {
                Ok(TransitionPlan::NextQuestion {
                    index: next,
                    expires_at: session.question_expiry(next, now),
                })
            } else {
                Ok(TransitionPlan::ForceClose {
                    reason: CloseReason::Finished,
                })
            }
        }

        (SessionCommand::End, status) if status.is_running() => Ok(TransitionPlan::ForceClose {
            reason: CloseReason::HostEnded,
        }),
        (SessionCommand::SweepExpire, status) if !status.is_terminal() && session.is_expired(now) => {
            Ok(TransitionPlan::ForceClose {
                reason: CloseReason::Expired,
            })
        }
        (SessionCommand::End | SessionCommand::SweepExpire, S::Done) => {
            Ok(TransitionPlan::AlreadyClosed)
        }

        _ => Err(reject(session, command)),
    }
}

fn begin(session: &Session, now: OffsetDateTime) -> Result<TransitionPlan, DomainError> {
    if session.questions.is_empty() {
        return Err(DomainError::validation(
            ValidationKind::EmptySession,
            format!("session {} has no questions", session.id),
        ));
    }
    // Expiry is computed against the start being applied.
    let mut started = session.clone();
    started.started_at = Some(now);
    Ok(TransitionPlan::Begin {
        started_at: now,
        expires_at: started.question_expiry(0, now),
    })
}

/// Apply a plan to the session fields. Participant-side effects of a plan
/// are carried out by the engine.
pub fn apply_plan(session: &Session, plan: TransitionPlan, now: OffsetDateTime) -> Session {
    let mut next = session.clone();
    match plan {
        TransitionPlan::Begin {
            started_at,
            expires_at,
        } => {
            next.status = SessionStatus::QuestionActive;
            next.current_question_index = Some(0);
            next.started_at = Some(started_at);
            next.expires_at = expires_at;
        }
        TransitionPlan::ShowLeaderboard { expires_at } => {
            next.status = SessionStatus::Leaderboard;
            next.expires_at = expires_at;
        }
        TransitionPlan::NextQuestion { index, expires_at } => {
            next.status = SessionStatus::QuestionActive;
            next.current_question_index = Some(index);
            next.expires_at = expires_at;
        }
        TransitionPlan::ForceClose { .. } => {
            next.status = SessionStatus::Done;
            next.ended_at = Some(now);
            next.expires_at = None;
        }
        TransitionPlan::AlreadyClosed => return next,
    }
    next.updated_at = now;
    next
}

/// The slice of a session that transitions are derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLifecycleView {
    pub status: SessionStatus,
    pub current_question_index: Option<usize>,
}

impl From<&Session> for SessionLifecycleView {
    fn from(s: &Session) -> Self {
        Self {
            status: s.status,
            current_question_index: s.current_question_index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTransition {
    /// Edge-triggered: pre-start -> running.
    Started,
    /// Edge-triggered: a question became active.
    QuestionOpened { index: usize },
    /// Edge-triggered: question_active -> leaderboard.
    LeaderboardShown,
    /// Edge-triggered: !done -> done.
    Ended,
}

/// Derive transitions from before/after lifecycle state.
pub fn derive_session_transitions(
    before: &SessionLifecycleView,
    after: &SessionLifecycleView,
) -> Vec<SessionTransition> {
    let mut transitions = Vec::new();

    if before.status.is_pre_start() && after.status.is_running() {
        transitions.push(SessionTransition::Started);
    }

    if after.status == SessionStatus::QuestionActive
        && (before.status != SessionStatus::QuestionActive
            || before.current_question_index != after.current_question_index)
    {
        if let Some(index) = after.current_question_index {
            transitions.push(SessionTransition::QuestionOpened { index });
        }
    }

    if before.status != SessionStatus::Leaderboard && after.status == SessionStatus::Leaderboard {
        transitions.push(SessionTransition::LeaderboardShown);
    }

    if !before.status.is_terminal() && after.status.is_terminal() {
        transitions.push(SessionTransition::Ended);
    }

    transitions
}
