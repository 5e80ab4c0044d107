use time::OffsetDateTime;

use super::{SessionEngine, TransitionOutcome};
use crate::domain::identity::{Actor, Role};
use crate::domain::session::{NewSession, Session, SessionId};
use crate::domain::transition::SessionCommand;
use crate::errors::domain::{DomainError, ValidationKind};

impl SessionEngine {
    /// Hand-off from authoring. The caller becomes the host.
    pub async fn create_session(
        &self,
        actor: &Actor,
        mut new: NewSession,
        now: OffsetDateTime,
    ) -> Result<Session, DomainError> {
        if actor.role == Role::Participant {
            return Err(DomainError::forbidden("only hosts can create sessions"));
        }
        if new.title.trim().is_empty() {
            return Err(DomainError::validation(
                ValidationKind::Other("Title".into()),
                "session title must not be empty",
            ));
        }
        let mut ids: Vec<_> = new.questions.iter().map(|q| q.id).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.len() != new.questions.len() {
            return Err(DomainError::validation(
                ValidationKind::Other("QuestionIds".into()),
                "question ids must be unique within a session",
            ));
        }
        new.host_id = actor.user_id;
        self.store.create_session(new, now).await
    }

    pub async fn start(
        &self,
        actor: &Actor,
        session_id: SessionId,
        now: OffsetDateTime,
    ) -> Result<TransitionOutcome, DomainError> {
        self.run_transition(session_id, SessionCommand::Start, now, Some(actor))
            .await
    }

    pub async fn advance(
        &self,
        actor: &Actor,
        session_id: SessionId,
        now: OffsetDateTime,
    ) -> Result<TransitionOutcome, DomainError> {
        self.run_transition(session_id, SessionCommand::Advance, now, Some(actor))
            .await
    }

    pub async fn end(
        &self,
        actor: &Actor,
        session_id: SessionId,
        now: OffsetDateTime,
    ) -> Result<TransitionOutcome, DomainError> {
        self.run_transition(session_id, SessionCommand::End, now, Some(actor))
            .await
    }

    /// Sweeper entry point; goes through the same guards as host commands.
    pub async fn sweep(
        &self,
        session_id: SessionId,
        command: SessionCommand,
        now: OffsetDateTime,
    ) -> Result<TransitionOutcome, DomainError> {
        if !command.is_sweep() {
            return Err(DomainError::forbidden(format!(
                "{command:?} is a host command"
            )));
        }
        self.run_transition(session_id, command, now, None).await
    }
}
