//! SeaORM adapter for participant records.

use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, NotSet, QueryFilter, QueryOrder, Set};
use time::OffsetDateTime;

use crate::entities::participant_records::{self, ParticipantStatus};

pub struct RecordUpsert {
    pub session_id: i64,
    pub participant_id: i64,
    pub display_name: String,
    pub status: ParticipantStatus,
    pub answers: serde_json::Value,
    pub total_score: i64,
    pub correct_count: i32,
    pub total_time_ms: i64,
    pub tab_switch_count: i32,
    pub rank: Option<i32>,
    pub joined_at: OffsetDateTime,
    pub completed_at: Option<OffsetDateTime>,
    pub updated_at: OffsetDateTime,
}

pub async fn find<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    session_id: i64,
    participant_id: i64,
) -> Result<Option<participant_records::Model>, sea_orm::DbErr> {
    participant_records::Entity::find()
        .filter(participant_records::Column::SessionId.eq(session_id))
        .filter(participant_records::Column::ParticipantId.eq(participant_id))
        .one(conn)
        .await
}

/// Insert, or update everything except `rank` and `joined_at` on the
/// (session, participant) unique index.
pub async fn upsert<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    dto: RecordUpsert,
) -> Result<(), sea_orm::DbErr> {
    use participant_records::Column as C;

    let active = participant_records::ActiveModel {
        id: NotSet,
        session_id: Set(dto.session_id),
        participant_id: Set(dto.participant_id),
        display_name: Set(dto.display_name),
        status: Set(dto.status),
        answers: Set(dto.answers),
        total_score: Set(dto.total_score),
        correct_count: Set(dto.correct_count),
        total_time_ms: Set(dto.total_time_ms),
        tab_switch_count: Set(dto.tab_switch_count),
        rank: Set(dto.rank),
        joined_at: Set(dto.joined_at),
        completed_at: Set(dto.completed_at),
        updated_at: Set(dto.updated_at),
    };

    participant_records::Entity::insert(active)
        .on_conflict(
            OnConflict::columns([C::SessionId, C::ParticipantId])
                .update_columns([
                    C::DisplayName,
                    C::Status,
                    C::Answers,
                    C::TotalScore,
                    C::CorrectCount,
                    C::TotalTimeMs,
                    C::TabSwitchCount,
                    C::CompletedAt,
                    C::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

pub async fn list<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    session_id: i64,
    statuses: &[ParticipantStatus],
) -> Result<Vec<participant_records::Model>, sea_orm::DbErr> {
    let mut query = participant_records::Entity::find()
        .filter(participant_records::Column::SessionId.eq(session_id));
    if !statuses.is_empty() {
        query = query.filter(participant_records::Column::Status.is_in(statuses.iter().copied()));
    }
    query
        .order_by_asc(participant_records::Column::JoinedAt)
        .order_by_asc(participant_records::Column::ParticipantId)
        .all(conn)
        .await
}

pub async fn set_rank<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    session_id: i64,
    participant_id: i64,
    rank: Option<i32>,
) -> Result<(), sea_orm::DbErr> {
    participant_records::Entity::update_many()
        .col_expr(participant_records::Column::Rank, Expr::val(rank).into())
        .filter(participant_records::Column::SessionId.eq(session_id))
        .filter(participant_records::Column::ParticipantId.eq(participant_id))
        .exec(conn)
        .await?;
    Ok(())
}
