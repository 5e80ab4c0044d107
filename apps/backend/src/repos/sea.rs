//! Postgres-backed store on top of the SeaORM adapters.

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, Statement};
use serde::de::DeserializeOwned;
use time::OffsetDateTime;

use crate::adapters::participants_sea::{self, RecordUpsert};
use crate::adapters::sessions_sea::{self, SessionCreate, SessionUpdate};
use crate::adapters::users_sea;
use crate::domain::identity::{Role, UserIdentity};
use crate::domain::participant::{ParticipantRecord, ParticipantStatus, RecordParts};
use crate::domain::session::{NewSession, Session, SessionId, SessionStatus, UserId};
use crate::entities::participant_records::{self, ParticipantStatus as DbParticipantStatus};
use crate::entities::quiz_sessions::{self, SessionStatus as DbSessionStatus};
use crate::entities::users::{self, UserRole};
use crate::errors::domain::DomainError;
use crate::infra::db_errors::map_db_err;
use crate::repos::store::{IdentityStore, SessionStore};

#[derive(Clone)]
pub struct SeaStore {
    conn: DatabaseConnection,
}

impl SeaStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }
}

impl From<DbSessionStatus> for SessionStatus {
    fn from(s: DbSessionStatus) -> Self {
        match s {
            DbSessionStatus::Draft => SessionStatus::Draft,
            DbSessionStatus::Scheduled => SessionStatus::Scheduled,
            DbSessionStatus::Waiting => SessionStatus::Waiting,
            DbSessionStatus::Live => SessionStatus::Live,
            DbSessionStatus::QuestionActive => SessionStatus::QuestionActive,
            DbSessionStatus::Leaderboard => SessionStatus::Leaderboard,
            DbSessionStatus::Done => SessionStatus::Done,
        }
    }
}

impl From<SessionStatus> for DbSessionStatus {
    fn from(s: SessionStatus) -> Self {
        match s {
            SessionStatus::Draft => DbSessionStatus::Draft,
            SessionStatus::Scheduled => DbSessionStatus::Scheduled,
            SessionStatus::Waiting => DbSessionStatus::Waiting,
            SessionStatus::Live => DbSessionStatus::Live,
            SessionStatus::QuestionActive => DbSessionStatus::QuestionActive,
            SessionStatus::Leaderboard => DbSessionStatus::Leaderboard,
            SessionStatus::Done => DbSessionStatus::Done,
        }
    }
}

impl From<DbParticipantStatus> for ParticipantStatus {
    fn from(s: DbParticipantStatus) -> Self {
        match s {
            DbParticipantStatus::Waiting => ParticipantStatus::Waiting,
            DbParticipantStatus::InProgress => ParticipantStatus::InProgress,
            DbParticipantStatus::Completed => ParticipantStatus::Completed,
            DbParticipantStatus::Terminated => ParticipantStatus::Terminated,
        }
    }
}

impl From<ParticipantStatus> for DbParticipantStatus {
    fn from(s: ParticipantStatus) -> Self {
        match s {
            ParticipantStatus::Waiting => DbParticipantStatus::Waiting,
            ParticipantStatus::InProgress => DbParticipantStatus::InProgress,
            ParticipantStatus::Completed => DbParticipantStatus::Completed,
            ParticipantStatus::Terminated => DbParticipantStatus::Terminated,
        }
    }
}

impl From<UserRole> for Role {
    fn from(r: UserRole) -> Self {
        match r {
            UserRole::Participant => Role::Participant,
            UserRole::Host => Role::Host,
            UserRole::Admin => Role::Admin,
        }
    }
}

fn from_json<T: DeserializeOwned>(value: serde_json::Value, what: &str) -> Result<T, DomainError> {
    serde_json::from_value(value)
        .map_err(|e| map_db_err(DbErr::Json(format!("{what}: {e}"))))
}

fn to_json<T: serde::Serialize>(value: &T, what: &str) -> Result<serde_json::Value, DomainError> {
    serde_json::to_value(value).map_err(|e| map_db_err(DbErr::Json(format!("{what}: {e}"))))
}

fn session_from_model(model: quiz_sessions::Model) -> Result<Session, DomainError> {
    Ok(Session {
        id: model.id,
        host_id: model.host_id,
        title: model.title,
        questions: from_json(model.questions, "quiz_sessions.questions")?,
        settings: from_json(model.settings, "quiz_sessions.settings")?,
        status: model.status.into(),
        current_question_index: model
            .current_question_index
            .and_then(|i| usize::try_from(i).ok()),
        scheduled_at: model.scheduled_at,
        auto_start: model.auto_start,
        started_at: model.started_at,
        ended_at: model.ended_at,
        expires_at: model.expires_at,
        created_at: model.created_at,
        updated_at: model.updated_at,
        version: model.version,
    })
}

fn record_from_model(model: participant_records::Model) -> Result<ParticipantRecord, DomainError> {
    Ok(ParticipantRecord::from_parts(RecordParts {
        session_id: model.session_id,
        participant_id: model.participant_id,
        display_name: model.display_name,
        status: model.status.into(),
        answers: from_json(model.answers, "participant_records.answers")?,
        tab_switch_count: u32::try_from(model.tab_switch_count).unwrap_or(0),
        rank: model.rank.and_then(|r| u32::try_from(r).ok()),
        joined_at: model.joined_at,
        completed_at: model.completed_at,
        updated_at: model.updated_at,
    }))
}

fn identity_from_model(model: users::Model) -> UserIdentity {
    UserIdentity {
        id: model.id,
        display_name: model.display_name,
        role: model.role.into(),
        is_active: model.is_active,
    }
}

fn saturating_i32(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

#[async_trait]
impl SessionStore for SeaStore {
    async fn find_session(&self, session_id: SessionId) -> Result<Option<Session>, DomainError> {
        sessions_sea::find_by_id(&self.conn, session_id)
            .await
            .map_err(map_db_err)?
            .map(session_from_model)
            .transpose()
    }

    async fn create_session(
        &self,
        new: NewSession,
        now: OffsetDateTime,
    ) -> Result<Session, DomainError> {
        let dto = SessionCreate {
            host_id: new.host_id,
            status: new.initial_status().into(),
            questions: to_json(&new.questions, "questions")?,
            settings: to_json(&new.settings, "settings")?,
            title: new.title,
            scheduled_at: new.scheduled_at,
            auto_start: new.auto_start,
            now,
        };
        let model = sessions_sea::create_session(&self.conn, dto)
            .await
            .map_err(map_db_err)?;
        session_from_model(model)
    }

    async fn save_session(&self, session: &Session) -> Result<Session, DomainError> {
        let dto = SessionUpdate {
            id: session.id,
            current_version: session.version,
            status: session.status.into(),
            current_question_index: session
                .current_question_index
                .map(|i| i32::try_from(i).unwrap_or(i32::MAX)),
            started_at: session.started_at,
            ended_at: session.ended_at,
            expires_at: session.expires_at,
            updated_at: session.updated_at,
        };
        let model = sessions_sea::optimistic_update_then_fetch(&self.conn, dto)
            .await
            .map_err(map_db_err)?;
        session_from_model(model)
    }

    async fn find_participant_record(
        &self,
        session_id: SessionId,
        participant_id: UserId,
    ) -> Result<Option<ParticipantRecord>, DomainError> {
        participants_sea::find(&self.conn, session_id, participant_id)
            .await
            .map_err(map_db_err)?
            .map(record_from_model)
            .transpose()
    }

    async fn upsert_participant_record(
        &self,
        record: &ParticipantRecord,
    ) -> Result<(), DomainError> {
        let dto = RecordUpsert {
            session_id: record.session_id,
            participant_id: record.participant_id,
            display_name: record.display_name.clone(),
            status: record.status.into(),
            answers: to_json(&record.answers(), "answers")?,
            total_score: record.total_score(),
            correct_count: saturating_i32(record.correct_count()),
            total_time_ms: i64::try_from(record.total_time_ms()).unwrap_or(i64::MAX),
            tab_switch_count: saturating_i32(record.tab_switch_count),
            rank: record.rank.map(saturating_i32),
            joined_at: record.joined_at,
            completed_at: record.completed_at,
            updated_at: record.updated_at,
        };
        participants_sea::upsert(&self.conn, dto)
            .await
            .map_err(map_db_err)
    }

    async fn list_participant_records(
        &self,
        session_id: SessionId,
        statuses: &[ParticipantStatus],
    ) -> Result<Vec<ParticipantRecord>, DomainError> {
        let db_statuses: Vec<DbParticipantStatus> = statuses.iter().map(|s| (*s).into()).collect();
        participants_sea::list(&self.conn, session_id, &db_statuses)
            .await
            .map_err(map_db_err)?
            .into_iter()
            .map(record_from_model)
            .collect()
    }

    async fn set_ranks(
        &self,
        session_id: SessionId,
        ranks: &[(UserId, Option<u32>)],
    ) -> Result<(), DomainError> {
        for (participant_id, rank) in ranks {
            participants_sea::set_rank(
                &self.conn,
                session_id,
                *participant_id,
                rank.map(saturating_i32),
            )
            .await
            .map_err(map_db_err)?;
        }
        Ok(())
    }

    async fn list_due_scheduled_sessions(
        &self,
        now: OffsetDateTime,
    ) -> Result<Vec<SessionId>, DomainError> {
        sessions_sea::list_due_scheduled(&self.conn, now)
            .await
            .map_err(map_db_err)
    }

    async fn list_expired_sessions(
        &self,
        now: OffsetDateTime,
    ) -> Result<Vec<SessionId>, DomainError> {
        sessions_sea::list_expired(&self.conn, now)
            .await
            .map_err(map_db_err)
    }

    async fn ping(&self) -> Result<(), DomainError> {
        let backend = self.conn.get_database_backend();
        self.conn
            .execute(Statement::from_string(backend, "SELECT 1"))
            .await
            .map(|_| ())
            .map_err(map_db_err)
    }
}

#[async_trait]
impl IdentityStore for SeaStore {
    async fn find_user(&self, user_id: UserId) -> Result<Option<UserIdentity>, DomainError> {
        Ok(users_sea::find_by_id(&self.conn, user_id)
            .await
            .map_err(map_db_err)?
            .map(identity_from_model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_is_bijective() {
        for status in [
            SessionStatus::Draft,
            SessionStatus::Scheduled,
            SessionStatus::Waiting,
            SessionStatus::Live,
            SessionStatus::QuestionActive,
            SessionStatus::Leaderboard,
            SessionStatus::Done,
        ] {
            let db: DbSessionStatus = status.into();
            assert_eq!(SessionStatus::from(db), status);
        }
    }

    #[test]
    fn corrupt_json_is_data_corruption() {
        let err = from_json::<Vec<u32>>(serde_json::json!({"not": "a list"}), "answers").unwrap_err();
        assert!(matches!(
            err,
            DomainError::Infra(crate::errors::domain::InfraErrorKind::DataCorruption, _)
        ));
    }
}
