//! Domain-level error type used across the engine, stores and adapters.
//!
//! This error type is HTTP- and DB-agnostic. The websocket layer reports it
//! to the issuing connection; HTTP handlers convert it into `AppError`.

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Infra error kinds to distinguish operational failures
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum InfraErrorKind {
    Timeout,
    DbUnavailable,
    DataCorruption,
    Other(String),
}

/// Domain-level not found entities
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NotFoundKind {
    User,
    Session,
    Question,
    Participant,
    Other(String),
}

/// Domain-level conflict kinds
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConflictKind {
    /// The question already holds an answer from this participant
    DuplicateAnswer,
    /// Stored version moved on since the caller read it
    OptimisticLock,
    /// A record for this (session, participant) pair already exists
    ParticipantExists,
    Other(String),
}

/// Validation kinds for malformed input
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationKind {
    EmptySession,
    InvalidAnswer,
    Other(String),
}

/// Central domain error type
#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Input/user validation or business rule violation
    Validation(ValidationKind, String),
    /// Semantic conflict
    Conflict(ConflictKind, String),
    /// Missing resource in domain terms
    NotFound(NotFoundKind, String),
    /// Command not valid for the session's current status
    InvalidTransition(String),
    /// Session (or participant) is not accepting this kind of input right now
    SessionInactive(String),
    /// Caller lacks the role required for the command
    Forbidden(String),
    /// Identity could not be verified, or is inactive
    AuthenticationFailed(String),
    /// Infrastructure/operational failures
    Infra(InfraErrorKind, String),
}

impl Display for DomainError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DomainError::Validation(kind, d) => write!(f, "validation error {kind:?}: {d}"),
            DomainError::Conflict(kind, d) => write!(f, "conflict {kind:?}: {d}"),
            DomainError::NotFound(kind, d) => write!(f, "not found {kind:?}: {d}"),
            DomainError::InvalidTransition(d) => write!(f, "invalid transition: {d}"),
            DomainError::SessionInactive(d) => write!(f, "session inactive: {d}"),
            DomainError::Forbidden(d) => write!(f, "forbidden: {d}"),
            DomainError::AuthenticationFailed(d) => write!(f, "authentication failed: {d}"),
            DomainError::Infra(kind, d) => write!(f, "infra {kind:?}: {d}"),
        }
    }
}

impl Error for DomainError {}

impl DomainError {
    pub fn validation(kind: ValidationKind, detail: impl Into<String>) -> Self {
        Self::Validation(kind, detail.into())
    }
    pub fn conflict(kind: ConflictKind, detail: impl Into<String>) -> Self {
        Self::Conflict(kind, detail.into())
    }
    pub fn not_found(kind: NotFoundKind, detail: impl Into<String>) -> Self {
        Self::NotFound(kind, detail.into())
    }
    pub fn invalid_transition(detail: impl Into<String>) -> Self {
        Self::InvalidTransition(detail.into())
    }
    pub fn session_inactive(detail: impl Into<String>) -> Self {
        Self::SessionInactive(detail.into())
    }
    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::Forbidden(detail.into())
    }
    pub fn authentication_failed(detail: impl Into<String>) -> Self {
        Self::AuthenticationFailed(detail.into())
    }
    pub fn infra(kind: InfraErrorKind, detail: impl Into<String>) -> Self {
        Self::Infra(kind, detail.into())
    }

    /// Persistence failures are the only errors worth retrying; every other
    /// variant rejects the command for good.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DomainError::Infra(InfraErrorKind::Timeout | InfraErrorKind::DbUnavailable, _)
                | DomainError::Conflict(ConflictKind::OptimisticLock, _)
        )
    }

    /// Human-readable detail without the variant prefix.
    pub fn detail(&self) -> &str {
        match self {
            DomainError::Validation(_, d)
            | DomainError::Conflict(_, d)
            | DomainError::NotFound(_, d)
            | DomainError::InvalidTransition(d)
            | DomainError::SessionInactive(d)
            | DomainError::Forbidden(d)
            | DomainError::AuthenticationFailed(d)
            | DomainError::Infra(_, d) => d,
        }
    }

    pub fn is_optimistic_lock(&self) -> bool {
        matches!(self, DomainError::Conflict(ConflictKind::OptimisticLock, _))
    }
}
