//! SeaORM -> DomainError translation.
//!
//! Adapters convert `sea_orm::DbErr` into `DomainError` here; the engine and
//! HTTP layer only ever see domain errors.

use tracing::{error, warn};

use crate::errors::domain::{ConflictKind, DomainError, InfraErrorKind, NotFoundKind};

/// Prefix of the `DbErr::Custom` raised by the optimistic session update.
pub const OPTIMISTIC_LOCK_PREFIX: &str = "OPTIMISTIC_LOCK:";
/// Prefix of the `DbErr::Custom` raised when a session row is missing.
pub const SESSION_NOT_FOUND_PREFIX: &str = "SESSION_NOT_FOUND:";

fn mentions_sqlstate(msg: &str, code: &str) -> bool {
    msg.contains(code) || msg.contains(&format!("SQLSTATE({code})"))
}

fn map_unique_constraint(error_msg: &str) -> (ConflictKind, &'static str) {
    if error_msg.contains("ux_participant_records_session_participant") {
        return (
            ConflictKind::ParticipantExists,
            "Participant already joined this session",
        );
    }
    (
        ConflictKind::Other("Unique".into()),
        "Unique constraint violation",
    )
}

#[derive(serde::Deserialize)]
struct LockInfo {
    session_id: i64,
    expected: i32,
}

/// Translate a `DbErr` into a `DomainError` with a displayable detail.
pub fn map_db_err(e: sea_orm::DbErr) -> DomainError {
    let error_msg = e.to_string();

    match &e {
        sea_orm::DbErr::RecordNotFound(_) => {
            return DomainError::not_found(NotFoundKind::Other("Record".into()), "Record not found");
        }
        sea_orm::DbErr::Custom(msg) if msg.starts_with(SESSION_NOT_FOUND_PREFIX) => {
            let id = msg.trim_start_matches(SESSION_NOT_FOUND_PREFIX);
            return DomainError::not_found(NotFoundKind::Session, format!("Session {id} not found"));
        }
        sea_orm::DbErr::Custom(msg) if msg.starts_with(OPTIMISTIC_LOCK_PREFIX) => {
            let json_str = msg.trim_start_matches(OPTIMISTIC_LOCK_PREFIX);
            if let Ok(info) = serde_json::from_str::<LockInfo>(json_str) {
                warn!(
                    session_id = info.session_id,
                    expected = info.expected,
                    "Optimistic lock conflict detected"
                );
                return DomainError::conflict(
                    ConflictKind::OptimisticLock,
                    format!(
                        "Session {} was modified concurrently (expected version {})",
                        info.session_id, info.expected
                    ),
                );
            }
            warn!("Optimistic lock conflict detected (version info unavailable)");
            return DomainError::conflict(
                ConflictKind::OptimisticLock,
                "Session was modified concurrently; please retry",
            );
        }
        sea_orm::DbErr::Json(msg) => {
            error!(raw_error = %msg, "Stored JSON could not be decoded");
            return DomainError::infra(InfraErrorKind::DataCorruption, "Stored data is corrupt");
        }
        sea_orm::DbErr::ConnectionAcquire(_) | sea_orm::DbErr::Conn(_) => {
            warn!(raw_error = %error_msg, "Database unavailable");
            return DomainError::infra(InfraErrorKind::DbUnavailable, "Database unavailable");
        }
        _ => {}
    }

    if mentions_sqlstate(&error_msg, "23505")
        || error_msg.contains("duplicate key value violates unique constraint")
    {
        warn!(raw_error = %error_msg, "Unique constraint violation");
        let (kind, detail) = map_unique_constraint(&error_msg);
        return DomainError::conflict(kind, detail);
    }

    if mentions_sqlstate(&error_msg, "23503") {
        warn!(raw_error = %error_msg, "Foreign key constraint violation");
        return DomainError::not_found(
            NotFoundKind::Other("Reference".into()),
            "Referenced row does not exist",
        );
    }

    if error_msg.contains("timeout") || error_msg.contains("pool") {
        warn!(raw_error = %error_msg, "Database timeout or pool issue");
        return DomainError::infra(InfraErrorKind::Timeout, "Database timeout");
    }

    error!(raw_error = %error_msg, "Unhandled database error");
    DomainError::infra(InfraErrorKind::Other("DbErr".into()), "Database operation failed")
}

#[cfg(test)]
mod tests {
    use sea_orm::DbErr;

    use super::*;

    #[test]
    fn optimistic_lock_payload_is_parsed() {
        let err = map_db_err(DbErr::Custom(format!(
            "{OPTIMISTIC_LOCK_PREFIX}{{\"session_id\":4,\"expected\":7}}"
        )));
        assert!(err.is_optimistic_lock());
        assert!(err.to_string().contains("expected version 7"));
    }

    #[test]
    fn session_not_found_prefix() {
        let err = map_db_err(DbErr::Custom(format!("{SESSION_NOT_FOUND_PREFIX}12")));
        assert!(matches!(err, DomainError::NotFound(NotFoundKind::Session, _)));
    }

    #[test]
    fn participant_unique_violation_is_conflict() {
        let err = map_db_err(DbErr::Custom(
            "duplicate key value violates unique constraint \"ux_participant_records_session_participant\""
                .into(),
        ));
        assert!(matches!(
            err,
            DomainError::Conflict(ConflictKind::ParticipantExists, _)
        ));
    }

    #[test]
    fn timeouts_are_retryable() {
        let err = map_db_err(DbErr::Custom("statement timeout".into()));
        assert!(err.is_retryable());
    }
}
