//! Error codes for the quizroom backend.
//!
//! Add new codes here; never pass ad-hoc strings as error codes. Every code
//! is SCREAMING_SNAKE_CASE and maps 1:1 to the string clients see, both in
//! HTTP problem details and in websocket `error` frames.

use core::fmt;

use serde::{Serialize, Serializer};

/// Centralized error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Authentication & Authorization
    /// Connection credentials missing, invalid or expired
    AuthenticationFailed,
    /// Identity exists but is deactivated
    AccountInactive,
    /// Caller is not allowed to issue this command
    Forbidden,

    // Session commands
    /// Command not valid for the session's current status
    InvalidTransition,
    /// Question already answered by this participant
    DuplicateAnswer,
    /// Session is not accepting this kind of input right now
    SessionInactive,
    /// Session has no questions to run
    EmptySession,
    /// Answer payload malformed
    InvalidAnswer,

    // Request Validation
    /// Websocket frame could not be decoded
    BadRequest,
    /// Unsupported protocol version
    BadProtocol,
    /// General validation error
    ValidationError,

    // Resource Not Found
    /// Session not found
    SessionNotFound,
    /// Question not found in the session
    QuestionNotFound,
    /// No participant record for this caller
    ParticipantNotFound,
    /// User not found
    UserNotFound,
    /// General not found error
    NotFound,

    // Conflicts
    /// Concurrent writer won; re-read and retry
    OptimisticLock,
    /// Generic conflict
    Conflict,

    // System Errors
    /// Database unavailable
    DbUnavailable,
    /// Database timeout
    DbTimeout,
    /// Stored data could not be decoded
    DataCorruption,
    /// Internal server error
    InternalError,
    /// Configuration error
    ConfigError,
}

impl ErrorCode {
    /// Returns the canonical SCREAMING_SNAKE_CASE string for this error code.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "AUTHENTICATION_FAILED",
            Self::AccountInactive => "ACCOUNT_INACTIVE",
            Self::Forbidden => "FORBIDDEN",

            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::DuplicateAnswer => "DUPLICATE_ANSWER",
            Self::SessionInactive => "SESSION_INACTIVE",
            Self::EmptySession => "EMPTY_SESSION",
            Self::InvalidAnswer => "INVALID_ANSWER",

            Self::BadRequest => "BAD_REQUEST",
            Self::BadProtocol => "BAD_PROTOCOL",
            Self::ValidationError => "VALIDATION_ERROR",

            Self::SessionNotFound => "SESSION_NOT_FOUND",
            Self::QuestionNotFound => "QUESTION_NOT_FOUND",
            Self::ParticipantNotFound => "PARTICIPANT_NOT_FOUND",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::NotFound => "NOT_FOUND",

            Self::OptimisticLock => "OPTIMISTIC_LOCK",
            Self::Conflict => "CONFLICT",

            Self::DbUnavailable => "DB_UNAVAILABLE",
            Self::DbTimeout => "DB_TIMEOUT",
            Self::DataCorruption => "DATA_CORRUPTION",
            Self::InternalError => "INTERNAL_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_command_codes() {
        assert_eq!(ErrorCode::InvalidTransition.as_str(), "INVALID_TRANSITION");
        assert_eq!(ErrorCode::DuplicateAnswer.as_str(), "DUPLICATE_ANSWER");
        assert_eq!(ErrorCode::SessionInactive.as_str(), "SESSION_INACTIVE");
        assert_eq!(
            ErrorCode::AuthenticationFailed.as_str(),
            "AUTHENTICATION_FAILED"
        );
        assert_eq!(ErrorCode::SessionNotFound.as_str(), "SESSION_NOT_FOUND");
    }

    #[test]
    fn serializes_as_wire_string() {
        let json = serde_json::to_string(&ErrorCode::DuplicateAnswer).unwrap();
        assert_eq!(json, "\"DUPLICATE_ANSWER\"");
        assert_eq!(format!("{}", ErrorCode::OptimisticLock), "OPTIMISTIC_LOCK");
    }
}
