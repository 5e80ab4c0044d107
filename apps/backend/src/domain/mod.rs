//! Domain layer: pure session, scoring and ranking logic.

pub mod anti_cheat;
pub mod identity;
pub mod leaderboard;
pub mod participant;
pub mod scoring;
pub mod session;
pub mod transition;
pub mod view;

// Re-exports for ergonomics
pub use identity::{Actor, Role, UserIdentity};
pub use leaderboard::{compute_leaderboard, LeaderboardEntry};
pub use participant::{apply_answer, AnswerSlot, GradedAnswer, ParticipantRecord, ParticipantStatus};
pub use scoring::{grade, Grade};
pub use session::{
    AnswerValue, NewSession, Question, QuestionId, QuestionKind, Session, SessionId,
    SessionSettings, SessionStatus, TabSwitchPolicy, UserId,
};
pub use transition::{plan_transition, SessionCommand, TransitionPlan};
