use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum SessionStatus {
    #[sea_orm(string_value = "DRAFT")]
    Draft,
    #[sea_orm(string_value = "SCHEDULED")]
    Scheduled,
    #[sea_orm(string_value = "WAITING")]
    Waiting,
    #[sea_orm(string_value = "LIVE")]
    Live,
    #[sea_orm(string_value = "QUESTION_ACTIVE")]
    QuestionActive,
    #[sea_orm(string_value = "LEADERBOARD")]
    Leaderboard,
    #[sea_orm(string_value = "DONE")]
    Done,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "quiz_sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(column_name = "host_id")]
    pub host_id: i64,
    pub title: String,
    pub status: SessionStatus,
    /// Ordered `Question` list
    #[sea_orm(column_type = "JsonBinary")]
    pub questions: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub settings: Json,
    #[sea_orm(column_name = "current_question_index")]
    pub current_question_index: Option<i32>,
    #[sea_orm(column_name = "scheduled_at")]
    pub scheduled_at: Option<OffsetDateTime>,
    #[sea_orm(column_name = "auto_start")]
    pub auto_start: bool,
    #[sea_orm(column_name = "started_at")]
    pub started_at: Option<OffsetDateTime>,
    #[sea_orm(column_name = "ended_at")]
    pub ended_at: Option<OffsetDateTime>,
    #[sea_orm(column_name = "expires_at")]
    pub expires_at: Option<OffsetDateTime>,
    #[sea_orm(column_name = "created_at")]
    pub created_at: OffsetDateTime,
    #[sea_orm(column_name = "updated_at")]
    pub updated_at: OffsetDateTime,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::HostId",
        to = "super::users::Column::Id"
    )]
    Host,
    #[sea_orm(has_many = "super::participant_records::Entity")]
    ParticipantRecords,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Host.def()
    }
}

impl Related<super::participant_records::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ParticipantRecords.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
