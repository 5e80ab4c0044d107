use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_query::{ColumnDef, ForeignKey, ForeignKeyAction, Index, Table};

#[derive(DeriveMigrationName)]
pub struct Migration;

// ----- Iden enums for tables & columns -----
#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    DisplayName,
    Role,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum QuizSessions {
    Table,
    Id,
    HostId,
    Title,
    Status,
    Questions,
    Settings,
    CurrentQuestionIndex,
    ScheduledAt,
    AutoStart,
    StartedAt,
    EndedAt,
    ExpiresAt,
    CreatedAt,
    UpdatedAt,
    Version,
}

#[derive(DeriveIden)]
enum ParticipantRecords {
    Table,
    Id,
    SessionId,
    ParticipantId,
    DisplayName,
    Status,
    Answers,
    TotalScore,
    CorrectCount,
    TotalTimeMs,
    TabSwitchCount,
    Rank,
    JoinedAt,
    CompletedAt,
    UpdatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // users
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .big_integer()
                            .not_null()
                            .primary_key()
                            .auto_increment(),
                    )
                    .col(ColumnDef::new(Users::DisplayName).string().not_null())
                    .col(
                        ColumnDef::new(Users::Role)
                            .string_len(16)
                            .not_null()
                            .default("PARTICIPANT"),
                    )
                    .col(
                        ColumnDef::new(Users::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Users::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // quiz_sessions
        manager
            .create_table(
                Table::create()
                    .table(QuizSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(QuizSessions::Id)
                            .big_integer()
                            .not_null()
                            .primary_key()
                            .auto_increment(),
                    )
                    .col(ColumnDef::new(QuizSessions::HostId).big_integer().not_null())
                    .col(ColumnDef::new(QuizSessions::Title).string().not_null())
                    .col(
                        ColumnDef::new(QuizSessions::Status)
                            .string_len(32)
                            .not_null()
                            .default("DRAFT"),
                    )
                    .col(ColumnDef::new(QuizSessions::Questions).json_binary().not_null())
                    .col(ColumnDef::new(QuizSessions::Settings).json_binary().not_null())
                    .col(
                        ColumnDef::new(QuizSessions::CurrentQuestionIndex)
                            .integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(QuizSessions::ScheduledAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(QuizSessions::AutoStart)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(QuizSessions::StartedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(QuizSessions::EndedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(QuizSessions::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(QuizSessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QuizSessions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QuizSessions::Version)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_quiz_sessions_host")
                            .from(QuizSessions::Table, QuizSessions::HostId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Sweeper scans: due scheduled sessions and lapsed deadlines
        manager
            .create_index(
                Index::create()
                    .name("ix_quiz_sessions_status_scheduled_at")
                    .table(QuizSessions::Table)
                    .col(QuizSessions::Status)
                    .col(QuizSessions::ScheduledAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_quiz_sessions_expires_at")
                    .table(QuizSessions::Table)
                    .col(QuizSessions::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        // participant_records
        manager
            .create_table(
                Table::create()
                    .table(ParticipantRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ParticipantRecords::Id)
                            .big_integer()
                            .not_null()
                            .primary_key()
                            .auto_increment(),
                    )
                    .col(
                        ColumnDef::new(ParticipantRecords::SessionId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ParticipantRecords::ParticipantId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ParticipantRecords::DisplayName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ParticipantRecords::Status)
                            .string_len(16)
                            .not_null()
                            .default("WAITING"),
                    )
                    .col(
                        ColumnDef::new(ParticipantRecords::Answers)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ParticipantRecords::TotalScore)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ParticipantRecords::CorrectCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ParticipantRecords::TotalTimeMs)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ParticipantRecords::TabSwitchCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(ParticipantRecords::Rank).integer().null())
                    .col(
                        ColumnDef::new(ParticipantRecords::JoinedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ParticipantRecords::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ParticipantRecords::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_participant_records_session")
                            .from(ParticipantRecords::Table, ParticipantRecords::SessionId)
                            .to(QuizSessions::Table, QuizSessions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_participant_records_participant")
                            .from(ParticipantRecords::Table, ParticipantRecords::ParticipantId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One record per (session, participant)
        manager
            .create_index(
                Index::create()
                    .name("ux_participant_records_session_participant")
                    .table(ParticipantRecords::Table)
                    .col(ParticipantRecords::SessionId)
                    .col(ParticipantRecords::ParticipantId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // drop in reverse order + drop index before table
        manager
            .drop_index(
                Index::drop()
                    .name("ux_participant_records_session_participant")
                    .table(ParticipantRecords::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(ParticipantRecords::Table).to_owned())
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("ix_quiz_sessions_expires_at")
                    .table(QuizSessions::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("ix_quiz_sessions_status_scheduled_at")
                    .table(QuizSessions::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(QuizSessions::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;

        Ok(())
    }
}
