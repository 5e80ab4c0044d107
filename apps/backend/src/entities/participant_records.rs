use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ParticipantStatus {
    #[sea_orm(string_value = "WAITING")]
    Waiting,
    #[sea_orm(string_value = "IN_PROGRESS")]
    InProgress,
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    #[sea_orm(string_value = "TERMINATED")]
    Terminated,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "participant_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(column_name = "session_id")]
    pub session_id: i64,
    #[sea_orm(column_name = "participant_id")]
    pub participant_id: i64,
    #[sea_orm(column_name = "display_name")]
    pub display_name: String,
    pub status: ParticipantStatus,
    /// One `AnswerSlot` per question
    #[sea_orm(column_type = "JsonBinary")]
    pub answers: Json,
    /// Denormalized copy of the derived total, for ad-hoc reporting only
    #[sea_orm(column_name = "total_score")]
    pub total_score: i64,
    #[sea_orm(column_name = "correct_count")]
    pub correct_count: i32,
    #[sea_orm(column_name = "total_time_ms")]
    pub total_time_ms: i64,
    #[sea_orm(column_name = "tab_switch_count")]
    pub tab_switch_count: i32,
    pub rank: Option<i32>,
    #[sea_orm(column_name = "joined_at")]
    pub joined_at: OffsetDateTime,
    #[sea_orm(column_name = "completed_at")]
    pub completed_at: Option<OffsetDateTime>,
    #[sea_orm(column_name = "updated_at")]
    pub updated_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::quiz_sessions::Entity",
        from = "Column::SessionId",
        to = "super::quiz_sessions::Column::Id"
    )]
    Session,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::ParticipantId",
        to = "super::users::Column::Id"
    )]
    Participant,
}

impl Related<super::quiz_sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Participant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
