//! Process-local store with the same optimistic-version contract as the
//! Postgres adapter. Used for `STORE_KIND=memory` and in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use time::OffsetDateTime;

use crate::domain::identity::UserIdentity;
use crate::domain::participant::{ParticipantRecord, ParticipantStatus};
use crate::domain::session::{NewSession, Session, SessionId, UserId};
use crate::errors::domain::{ConflictKind, DomainError, NotFoundKind};
use crate::repos::store::{IdentityStore, SessionStore};

#[derive(Default)]
struct Inner {
    next_session_id: SessionId,
    sessions: HashMap<SessionId, Session>,
    records: HashMap<(SessionId, UserId), ParticipantRecord>,
    users: HashMap<UserId, UserIdentity>,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: UserIdentity) {
        self.inner.write().users.insert(user.id, user);
    }

    pub fn session_count(&self) -> usize {
        self.inner.read().sessions.len()
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn find_session(&self, session_id: SessionId) -> Result<Option<Session>, DomainError> {
        Ok(self.inner.read().sessions.get(&session_id).cloned())
    }

    async fn create_session(
        &self,
        new: NewSession,
        now: OffsetDateTime,
    ) -> Result<Session, DomainError> {
        let mut inner = self.inner.write();
        inner.next_session_id += 1;
        let session = Session {
            id: inner.next_session_id,
            host_id: new.host_id,
            status: new.initial_status(),
            title: new.title,
            questions: new.questions,
            settings: new.settings,
            current_question_index: None,
            scheduled_at: new.scheduled_at,
            auto_start: new.auto_start,
            started_at: None,
            ended_at: None,
            expires_at: None,
            created_at: now,
            updated_at: now,
            version: 1,
        };
        inner.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn save_session(&self, session: &Session) -> Result<Session, DomainError> {
        let mut inner = self.inner.write();
        let stored = inner.sessions.get_mut(&session.id).ok_or_else(|| {
            DomainError::not_found(
                NotFoundKind::Session,
                format!("Session {} not found", session.id),
            )
        })?;
        if stored.version != session.version {
            return Err(DomainError::conflict(
                ConflictKind::OptimisticLock,
                format!(
                    "Session {} was modified concurrently (expected version {})",
                    session.id, session.version
                ),
            ));
        }
        let mut saved = session.clone();
        saved.version += 1;
        *stored = saved.clone();
        Ok(saved)
    }

    async fn find_participant_record(
        &self,
        session_id: SessionId,
        participant_id: UserId,
    ) -> Result<Option<ParticipantRecord>, DomainError> {
        Ok(self
            .inner
            .read()
            .records
            .get(&(session_id, participant_id))
            .cloned())
    }

    async fn upsert_participant_record(
        &self,
        record: &ParticipantRecord,
    ) -> Result<(), DomainError> {
        let mut inner = self.inner.write();
        let key = (record.session_id, record.participant_id);
        let rank = inner.records.get(&key).map_or(record.rank, |r| r.rank);
        let mut stored = record.clone();
        stored.rank = rank;
        inner.records.insert(key, stored);
        Ok(())
    }

    async fn list_participant_records(
        &self,
        session_id: SessionId,
        statuses: &[ParticipantStatus],
    ) -> Result<Vec<ParticipantRecord>, DomainError> {
        let inner = self.inner.read();
        let mut records: Vec<ParticipantRecord> = inner
            .records
            .values()
            .filter(|r| r.session_id == session_id)
            .filter(|r| statuses.is_empty() || statuses.contains(&r.status))
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.joined_at, r.participant_id));
        Ok(records)
    }

    async fn set_ranks(
        &self,
        session_id: SessionId,
        ranks: &[(UserId, Option<u32>)],
    ) -> Result<(), DomainError> {
        let mut inner = self.inner.write();
        for (participant_id, rank) in ranks {
            if let Some(record) = inner.records.get_mut(&(session_id, *participant_id)) {
                record.rank = *rank;
            }
        }
        Ok(())
    }

    async fn list_due_scheduled_sessions(
        &self,
        now: OffsetDateTime,
    ) -> Result<Vec<SessionId>, DomainError> {
        let mut ids: Vec<SessionId> = self
            .inner
            .read()
            .sessions
            .values()
            .filter(|s| s.is_due_for_auto_start(now))
            .map(|s| s.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn list_expired_sessions(
        &self,
        now: OffsetDateTime,
    ) -> Result<Vec<SessionId>, DomainError> {
        let mut ids: Vec<SessionId> = self
            .inner
            .read()
            .sessions
            .values()
            .filter(|s| !s.status.is_terminal() && s.is_expired(now))
            .map(|s| s.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn ping(&self) -> Result<(), DomainError> {
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for InMemoryStore {
    async fn find_user(&self, user_id: UserId) -> Result<Option<UserIdentity>, DomainError> {
        Ok(self.inner.read().users.get(&user_id).cloned())
    }
}
