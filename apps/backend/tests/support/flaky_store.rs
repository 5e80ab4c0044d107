//! Store wrapper that fails a configurable number of session saves, either
//! before or after the write reaches the inner store.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use quizroom::domain::participant::{ParticipantRecord, ParticipantStatus};
use quizroom::domain::session::{NewSession, Session, SessionId, UserId};
use quizroom::errors::domain::DomainError;
use quizroom::repos::memory::InMemoryStore;
use quizroom::repos::store::SessionStore;
use time::OffsetDateTime;

#[derive(Default)]
pub struct FlakyStore {
    pub inner: InMemoryStore,
    failing_saves: AtomicU32,
    failure: Mutex<Option<DomainError>>,
    commit_before_failing: AtomicBool,
    save_attempts: AtomicU32,
}

impl FlakyStore {
    /// The next `times` calls to `save_session` fail with `err`.
    pub fn fail_saves(&self, times: u32, err: DomainError) {
        *self.failure.lock() = Some(err);
        self.commit_before_failing.store(false, Ordering::SeqCst);
        self.failing_saves.store(times, Ordering::SeqCst);
    }

    /// The next `times` saves are written, then reported as failed with
    /// `err`, like a commit whose acknowledgement was lost.
    pub fn fail_after_commit(&self, times: u32, err: DomainError) {
        *self.failure.lock() = Some(err);
        self.commit_before_failing.store(true, Ordering::SeqCst);
        self.failing_saves.store(times, Ordering::SeqCst);
    }

    pub fn save_attempts(&self) -> u32 {
        self.save_attempts.load(Ordering::SeqCst)
    }

    fn injected(&self) -> Option<DomainError> {
        let remaining = self.failing_saves.load(Ordering::SeqCst);
        if remaining == 0 {
            return None;
        }
        self.failing_saves.store(remaining - 1, Ordering::SeqCst);
        self.failure.lock().clone()
    }
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn find_session(&self, session_id: SessionId) -> Result<Option<Session>, DomainError> {
        self.inner.find_session(session_id).await
    }

    async fn create_session(
        &self,
        new: NewSession,
        now: OffsetDateTime,
    ) -> Result<Session, DomainError> {
        self.inner.create_session(new, now).await
    }

    async fn save_session(&self, session: &Session) -> Result<Session, DomainError> {
        self.save_attempts.fetch_add(1, Ordering::SeqCst);
        let Some(err) = self.injected() else {
            return self.inner.save_session(session).await;
        };
        if self.commit_before_failing.load(Ordering::SeqCst) {
            self.inner.save_session(session).await?;
        }
        Err(err)
    }

    async fn find_participant_record(
        &self,
        session_id: SessionId,
        participant_id: UserId,
    ) -> Result<Option<ParticipantRecord>, DomainError> {
        self.inner
            .find_participant_record(session_id, participant_id)
            .await
    }

    async fn upsert_participant_record(
        &self,
        record: &ParticipantRecord,
    ) -> Result<(), DomainError> {
        self.inner.upsert_participant_record(record).await
    }

    async fn list_participant_records(
        &self,
        session_id: SessionId,
        statuses: &[ParticipantStatus],
    ) -> Result<Vec<ParticipantRecord>, DomainError> {
        self.inner.list_participant_records(session_id, statuses).await
    }

    async fn set_ranks(
        &self,
        session_id: SessionId,
        ranks: &[(UserId, Option<u32>)],
    ) -> Result<(), DomainError> {
        self.inner.set_ranks(session_id, ranks).await
    }

    async fn list_due_scheduled_sessions(
        &self,
        now: OffsetDateTime,
    ) -> Result<Vec<SessionId>, DomainError> {
        self.inner.list_due_scheduled_sessions(now).await
    }

    async fn list_expired_sessions(
        &self,
        now: OffsetDateTime,
    ) -> Result<Vec<SessionId>, DomainError> {
        self.inner.list_expired_sessions(now).await
    }

    async fn ping(&self) -> Result<(), DomainError> {
        self.inner.ping().await
    }
}
