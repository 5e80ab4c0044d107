use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum UserRole {
    #[sea_orm(string_value = "PARTICIPANT")]
    Participant,
    #[sea_orm(string_value = "HOST")]
    Host,
    #[sea_orm(string_value = "ADMIN")]
    Admin,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(column_name = "display_name")]
    pub display_name: String,
    pub role: UserRole,
    #[sea_orm(column_name = "is_active")]
    pub is_active: bool,
    #[sea_orm(column_name = "created_at")]
    pub created_at: OffsetDateTime,
    #[sea_orm(column_name = "updated_at")]
    pub updated_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::quiz_sessions::Entity")]
    HostedSessions,
    #[sea_orm(has_many = "super::participant_records::Entity")]
    ParticipantRecords,
}

impl Related<super::quiz_sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::HostedSessions.def()
    }
}

impl Related<super::participant_records::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ParticipantRecords.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
