use actix_web::error::ResponseError;
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::Serialize;
use thiserror::Error;

use crate::errors::domain::{ConflictKind, InfraErrorKind, NotFoundKind, ValidationKind};
use crate::errors::{DomainError, ErrorCode};
use crate::trace_ctx;

#[derive(Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub type_: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub code: ErrorCode,
    pub trace_id: String,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {detail}")]
    Validation { code: ErrorCode, detail: String },
    #[error("Not found: {detail}")]
    NotFound { code: ErrorCode, detail: String },
    #[error("Conflict: {detail}")]
    Conflict { code: ErrorCode, detail: String },
    #[error("Unauthorized: {detail}")]
    Unauthorized { code: ErrorCode, detail: String },
    #[error("Forbidden: {detail}")]
    Forbidden { code: ErrorCode, detail: String },
    #[error("Rejected: {detail}")]
    Rejected { code: ErrorCode, detail: String },
    #[error("Database unavailable: {detail}")]
    DbUnavailable { detail: String },
    #[error("Database timeout: {detail}")]
    Timeout { detail: String },
    #[error("Internal error: {detail}")]
    Internal { detail: String },
    #[error("Configuration error: {detail}")]
    Config { detail: String },
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::Unauthorized { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::Rejected { code, .. } => *code,
            AppError::DbUnavailable { .. } => ErrorCode::DbUnavailable,
            AppError::Timeout { .. } => ErrorCode::DbTimeout,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Config { .. } => ErrorCode::ConfigError,
        }
    }

    pub fn detail(&self) -> String {
        match self {
            AppError::Validation { detail, .. }
            | AppError::NotFound { detail, .. }
            | AppError::Conflict { detail, .. }
            | AppError::Unauthorized { detail, .. }
            | AppError::Forbidden { detail, .. }
            | AppError::Rejected { detail, .. }
            | AppError::DbUnavailable { detail }
            | AppError::Timeout { detail }
            | AppError::Internal { detail }
            | AppError::Config { detail } => detail.clone(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } | AppError::Rejected { .. } => StatusCode::CONFLICT,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::DbUnavailable { .. } | AppError::Timeout { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Internal { .. } | AppError::Config { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Operational failures a caller may retry after re-reading state.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::DbUnavailable { .. }
                | AppError::Timeout { .. }
                | AppError::Conflict {
                    code: ErrorCode::OptimisticLock,
                    ..
                }
        )
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::Unauthorized {
            code: ErrorCode::AuthenticationFailed,
            detail: detail.into(),
        }
    }

    pub fn forbidden(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self::Forbidden {
            code,
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            detail: detail.into(),
        }
    }

    pub fn config(detail: impl Into<String>) -> Self {
        Self::Config {
            detail: detail.into(),
        }
    }

    fn humanize_code(code: &str) -> String {
        code.split('_')
            .map(|word| {
                let lower = word.to_lowercase();
                let mut chars = lower.chars();
                match chars.next() {
                    None => String::new(),
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Wire code for a domain error; shared by HTTP problem details and
/// websocket `error` frames.
pub fn domain_error_code(err: &DomainError) -> ErrorCode {
    match err {
        DomainError::Validation(ValidationKind::EmptySession, _) => ErrorCode::EmptySession,
        DomainError::Validation(ValidationKind::InvalidAnswer, _) => ErrorCode::InvalidAnswer,
        DomainError::Validation(_, _) => ErrorCode::ValidationError,
        DomainError::Conflict(ConflictKind::DuplicateAnswer, _) => ErrorCode::DuplicateAnswer,
        DomainError::Conflict(ConflictKind::OptimisticLock, _) => ErrorCode::OptimisticLock,
        DomainError::Conflict(_, _) => ErrorCode::Conflict,
        DomainError::NotFound(NotFoundKind::Session, _) => ErrorCode::SessionNotFound,
        DomainError::NotFound(NotFoundKind::Question, _) => ErrorCode::QuestionNotFound,
        DomainError::NotFound(NotFoundKind::Participant, _) => ErrorCode::ParticipantNotFound,
        DomainError::NotFound(NotFoundKind::User, _) => ErrorCode::UserNotFound,
        DomainError::NotFound(_, _) => ErrorCode::NotFound,
        DomainError::InvalidTransition(_) => ErrorCode::InvalidTransition,
        DomainError::SessionInactive(_) => ErrorCode::SessionInactive,
        DomainError::Forbidden(_) => ErrorCode::Forbidden,
        DomainError::AuthenticationFailed(_) => ErrorCode::AuthenticationFailed,
        DomainError::Infra(InfraErrorKind::Timeout, _) => ErrorCode::DbTimeout,
        DomainError::Infra(InfraErrorKind::DbUnavailable, _) => ErrorCode::DbUnavailable,
        DomainError::Infra(InfraErrorKind::DataCorruption, _) => ErrorCode::DataCorruption,
        DomainError::Infra(_, _) => ErrorCode::InternalError,
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        let code = domain_error_code(&err);
        match err {
            DomainError::Validation(_, detail) => AppError::Validation { code, detail },
            DomainError::Conflict(_, detail) => AppError::Conflict { code, detail },
            DomainError::NotFound(_, detail) => AppError::NotFound { code, detail },
            DomainError::InvalidTransition(detail) | DomainError::SessionInactive(detail) => {
                AppError::Rejected { code, detail }
            }
            DomainError::Forbidden(detail) => AppError::Forbidden { code, detail },
            DomainError::AuthenticationFailed(detail) => AppError::Unauthorized { code, detail },
            DomainError::Infra(InfraErrorKind::Timeout, detail) => AppError::Timeout { detail },
            DomainError::Infra(InfraErrorKind::DbUnavailable, detail) => {
                AppError::DbUnavailable { detail }
            }
            DomainError::Infra(_, detail) => AppError::Internal { detail },
        }
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(e: sea_orm::DbErr) -> Self {
        crate::infra::db_errors::map_db_err(e).into()
    }
}

impl From<std::env::VarError> for AppError {
    fn from(e: std::env::VarError) -> Self {
        AppError::config(format!("env var error: {e}"))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status();
        let code = self.code();
        let trace_id = trace_ctx::trace_id();

        let problem_details = ProblemDetails {
            type_: format!("https://quizroom.app/errors/{}", code.as_str()),
            title: Self::humanize_code(code.as_str()),
            status: status.as_u16(),
            detail: self.detail(),
            code,
            trace_id: trace_id.clone(),
        };

        HttpResponse::build(status)
            .content_type("application/problem+json")
            .insert_header(("x-trace-id", trace_id))
            .json(problem_details)
    }
}
