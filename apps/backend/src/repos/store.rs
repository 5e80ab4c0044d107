//! Store traits the engine runs against.
//!
//! Implementations: `repos::sea::SeaStore` (Postgres) and
//! `repos::memory::InMemoryStore` (process-local).

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::domain::identity::UserIdentity;
use crate::domain::participant::{ParticipantRecord, ParticipantStatus};
use crate::domain::session::{NewSession, Session, SessionId, UserId};
use crate::errors::domain::DomainError;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn find_session(&self, session_id: SessionId) -> Result<Option<Session>, DomainError>;

    async fn create_session(
        &self,
        new: NewSession,
        now: OffsetDateTime,
    ) -> Result<Session, DomainError>;

    /// Optimistic save: succeeds only while the stored version equals
    /// `session.version`, then returns the session with the version bumped.
    /// A mismatch is `Conflict(OptimisticLock)`.
    async fn save_session(&self, session: &Session) -> Result<Session, DomainError>;

    async fn find_participant_record(
        &self,
        session_id: SessionId,
        participant_id: UserId,
    ) -> Result<Option<ParticipantRecord>, DomainError>;

    /// Insert or update on the (session, participant) pair. `rank` is only
    /// written on insert; afterwards it belongs to `set_ranks`.
    async fn upsert_participant_record(
        &self,
        record: &ParticipantRecord,
    ) -> Result<(), DomainError>;

    /// Records of a session whose status is in `statuses`; empty means all.
    /// Ordered by join time.
    async fn list_participant_records(
        &self,
        session_id: SessionId,
        statuses: &[ParticipantStatus],
    ) -> Result<Vec<ParticipantRecord>, DomainError>;

    /// Write derived ranks without touching any other column.
    async fn set_ranks(
        &self,
        session_id: SessionId,
        ranks: &[(UserId, Option<u32>)],
    ) -> Result<(), DomainError>;

    /// Scheduled, auto-starting sessions whose start time has passed.
    async fn list_due_scheduled_sessions(
        &self,
        now: OffsetDateTime,
    ) -> Result<Vec<SessionId>, DomainError>;

    /// Non-terminal sessions whose `expires_at` has passed.
    async fn list_expired_sessions(
        &self,
        now: OffsetDateTime,
    ) -> Result<Vec<SessionId>, DomainError>;

    /// Cheap reachability check for health reporting.
    async fn ping(&self) -> Result<(), DomainError>;
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_user(&self, user_id: UserId) -> Result<Option<UserIdentity>, DomainError>;
}
