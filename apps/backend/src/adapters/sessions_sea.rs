//! SeaORM adapter for quiz sessions - generic over ConnectionTrait.

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, NotSet, QueryFilter, QuerySelect,
    Set,
};
use time::OffsetDateTime;

use crate::entities::quiz_sessions::{self, SessionStatus};
use crate::infra::db_errors::{OPTIMISTIC_LOCK_PREFIX, SESSION_NOT_FOUND_PREFIX};

// Adapter functions return DbErr; the store maps to DomainError.

pub struct SessionCreate {
    pub host_id: i64,
    pub title: String,
    pub status: SessionStatus,
    pub questions: serde_json::Value,
    pub settings: serde_json::Value,
    pub scheduled_at: Option<OffsetDateTime>,
    pub auto_start: bool,
    pub now: OffsetDateTime,
}

/// Lifecycle columns written by a transition. Questions and settings are
/// fixed at creation.
pub struct SessionUpdate {
    pub id: i64,
    pub current_version: i32,
    pub status: SessionStatus,
    pub current_question_index: Option<i32>,
    pub started_at: Option<OffsetDateTime>,
    pub ended_at: Option<OffsetDateTime>,
    pub expires_at: Option<OffsetDateTime>,
    pub updated_at: OffsetDateTime,
}

pub async fn find_by_id<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    session_id: i64,
) -> Result<Option<quiz_sessions::Model>, sea_orm::DbErr> {
    quiz_sessions::Entity::find_by_id(session_id).one(conn).await
}

pub async fn create_session<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    dto: SessionCreate,
) -> Result<quiz_sessions::Model, sea_orm::DbErr> {
    let active = quiz_sessions::ActiveModel {
        id: NotSet,
        host_id: Set(dto.host_id),
        title: Set(dto.title),
        status: Set(dto.status),
        questions: Set(dto.questions),
        settings: Set(dto.settings),
        current_question_index: Set(None),
        scheduled_at: Set(dto.scheduled_at),
        auto_start: Set(dto.auto_start),
        started_at: Set(None),
        ended_at: Set(None),
        expires_at: Set(None),
        created_at: Set(dto.now),
        updated_at: Set(dto.now),
        version: Set(1),
    };
    active.insert(conn).await
}

/// Update lifecycle columns iff the stored version matches, bumping it.
///
/// Zero rows affected means either the row is gone or the version moved on;
/// a re-read tells the two apart.
pub async fn optimistic_update_then_fetch<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    dto: SessionUpdate,
) -> Result<quiz_sessions::Model, sea_orm::DbErr> {
    let result = quiz_sessions::Entity::update_many()
        .col_expr(quiz_sessions::Column::Status, Expr::val(dto.status).into())
        .col_expr(
            quiz_sessions::Column::CurrentQuestionIndex,
            Expr::val(dto.current_question_index).into(),
        )
        .col_expr(quiz_sessions::Column::StartedAt, Expr::val(dto.started_at).into())
        .col_expr(quiz_sessions::Column::EndedAt, Expr::val(dto.ended_at).into())
        .col_expr(quiz_sessions::Column::ExpiresAt, Expr::val(dto.expires_at).into())
        .col_expr(quiz_sessions::Column::UpdatedAt, Expr::val(dto.updated_at).into())
        .col_expr(
            quiz_sessions::Column::Version,
            Expr::col(quiz_sessions::Column::Version).add(1),
        )
        .filter(quiz_sessions::Column::Id.eq(dto.id))
        .filter(quiz_sessions::Column::Version.eq(dto.current_version))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return match find_by_id(conn, dto.id).await? {
            Some(_) => Err(sea_orm::DbErr::Custom(format!(
                "{OPTIMISTIC_LOCK_PREFIX}{{\"session_id\":{},\"expected\":{}}}",
                dto.id, dto.current_version
            ))),
            None => Err(sea_orm::DbErr::Custom(format!(
                "{SESSION_NOT_FOUND_PREFIX}{}",
                dto.id
            ))),
        };
    }

    find_by_id(conn, dto.id)
        .await?
        .ok_or_else(|| sea_orm::DbErr::Custom(format!("{SESSION_NOT_FOUND_PREFIX}{}", dto.id)))
}

pub async fn list_due_scheduled<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    now: OffsetDateTime,
) -> Result<Vec<i64>, sea_orm::DbErr> {
    quiz_sessions::Entity::find()
        .select_only()
        .column(quiz_sessions::Column::Id)
        .filter(quiz_sessions::Column::Status.eq(SessionStatus::Scheduled))
        .filter(quiz_sessions::Column::AutoStart.eq(true))
        .filter(quiz_sessions::Column::ScheduledAt.lte(now))
        .into_tuple::<i64>()
        .all(conn)
        .await
}

pub async fn list_expired<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    now: OffsetDateTime,
) -> Result<Vec<i64>, sea_orm::DbErr> {
    quiz_sessions::Entity::find()
        .select_only()
        .column(quiz_sessions::Column::Id)
        .filter(quiz_sessions::Column::Status.ne(SessionStatus::Done))
        .filter(quiz_sessions::Column::ExpiresAt.lte(now))
        .into_tuple::<i64>()
        .all(conn)
        .await
}
