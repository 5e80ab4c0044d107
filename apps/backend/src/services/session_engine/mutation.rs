use time::OffsetDateTime;
use tracing::{debug, info, warn};

use super::{SessionEngine, TransitionOutcome};
use crate::domain::identity::Actor;
use crate::domain::participant::ParticipantStatus;
use crate::domain::session::{Session, SessionId, SessionStatus};
use crate::domain::transition::{
    apply_plan, derive_session_transitions, plan_transition, CloseReason, SessionCommand,
    SessionLifecycleView, TransitionPlan,
};
use crate::domain::view::QuestionView;
use crate::errors::domain::DomainError;
use crate::services::notify::SessionEvent;

pub(super) fn state_changed(session: &Session) -> SessionEvent {
    let reveal = session.settings.show_feedback && session.status == SessionStatus::Leaderboard;
    let question = session
        .current_question()
        .filter(|_| session.status.is_running())
        .map(|q| QuestionView::of(q, session, reveal));
    SessionEvent::StateChanged {
        session_id: session.id,
        status: session.status,
        current_question_index: session.current_question_index,
        expires_at: session.expires_at,
        question,
    }
}

/// True when `current` is the row right after `attempted` was written, i.e.
/// a save reported as failed did commit. Timestamps are left out since the
/// database may store them at lower precision.
fn landed(current: &Session, attempted: &Session) -> bool {
    current.version == attempted.version + 1
        && SessionLifecycleView::from(current) == SessionLifecycleView::from(attempted)
}

/// A failed save whose outcome is unknown until the next read.
struct PendingSave {
    before: Session,
    attempted: Session,
    plan: TransitionPlan,
}

impl SessionEngine {
    /// Run one state-machine command under the session write lock.
    ///
    /// A retry first checks whether the failed save actually committed. If
    /// it did, the command is finished from the stored row. If another
    /// writer moved the lifecycle in between, a stepwise command (start,
    /// advance) is rejected instead of being re-planned on the new state.
    pub(super) async fn run_transition(
        &self,
        session_id: SessionId,
        command: SessionCommand,
        now: OffsetDateTime,
        actor: Option<&Actor>,
    ) -> Result<TransitionOutcome, DomainError> {
        let lock = self.locks.session(session_id);
        let guard = lock.write().await;

        let mut attempt = 0;
        let mut pending: Option<PendingSave> = None;
        let outcome = loop {
            attempt += 1;
            let current = self.load_session(session_id).await?;

            if let Some(failed) = pending.take() {
                if landed(&current, &failed.attempted) {
                    debug!(session_id, ?command, "failed save had committed");
                    break self
                        .commit(&failed.before, current, failed.plan, command, now)
                        .await?;
                }
                let moved = SessionLifecycleView::from(&current)
                    != SessionLifecycleView::from(&failed.before);
                // Closing is valid from any running status, so only the
                // stepwise commands stop here.
                let closing = matches!(command, SessionCommand::End | SessionCommand::SweepExpire);
                if moved && !closing {
                    return Err(DomainError::invalid_transition(format!(
                        "session {session_id} changed to {} while {command:?} was retrying",
                        current.status.as_str()
                    )));
                }
            }

            if let Some(actor) = actor {
                if !actor.controls(&current) {
                    return Err(DomainError::forbidden(format!(
                        "user {} does not host session {session_id}",
                        actor.user_id
                    )));
                }
            }

            let plan = plan_transition(&current, command, now)?;
            if plan == TransitionPlan::AlreadyClosed {
                debug!(session_id, ?command, "session already closed");
                self.finish_interrupted_close(&current, command, now).await?;
                break TransitionOutcome {
                    session: current,
                    transitions: Vec::new(),
                };
            }

            let next = apply_plan(&current, plan, now);
            match self.store.save_session(&next).await {
                Ok(saved) => break self.commit(&current, saved, plan, command, now).await?,
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!(session_id, ?command, attempt, error = %e, "retrying session transition");
                    pending = Some(PendingSave {
                        before: current,
                        attempted: next,
                        plan,
                    });
                }
                Err(e) => return Err(e),
            }
        };

        drop(guard);
        if outcome.session.status.is_terminal() {
            self.locks.release_session(session_id);
            self.notifier.close_session(session_id);
        }
        Ok(outcome)
    }

    async fn commit(
        &self,
        before: &Session,
        saved: Session,
        plan: TransitionPlan,
        command: SessionCommand,
        now: OffsetDateTime,
    ) -> Result<TransitionOutcome, DomainError> {
        let transitions = derive_session_transitions(
            &SessionLifecycleView::from(before),
            &SessionLifecycleView::from(&saved),
        );
        info!(
            session_id = saved.id,
            ?command,
            from = before.status.as_str(),
            to = saved.status.as_str(),
            version = saved.version,
            "session transition applied"
        );
        self.apply_side_effects(&saved, plan, now).await?;
        Ok(TransitionOutcome {
            session: saved,
            transitions,
        })
    }

    /// Completes records a previous close left open, then re-ranks and
    /// re-announces the final board.
    async fn finish_interrupted_close(
        &self,
        session: &Session,
        command: SessionCommand,
        now: OffsetDateTime,
    ) -> Result<(), DomainError> {
        let closed = self.close_open_records(session.id, now).await?;
        if closed == 0 {
            return Ok(());
        }
        let reason = match command {
            SessionCommand::SweepExpire => CloseReason::Expired,
            _ => CloseReason::HostEnded,
        };
        let entries = self.leaderboard.recompute(session.id).await?;
        info!(
            session_id = session.id,
            closed,
            ranked = entries.len(),
            "finished interrupted close"
        );
        self.notifier.publish(SessionEvent::SessionEnded {
            session_id: session.id,
            reason,
            entries,
        });
        Ok(())
    }

    async fn apply_side_effects(
        &self,
        session: &Session,
        plan: TransitionPlan,
        now: OffsetDateTime,
    ) -> Result<(), DomainError> {
        match plan {
            TransitionPlan::Begin { .. } => {
                let waiting = self
                    .store
                    .list_participant_records(session.id, &[ParticipantStatus::Waiting])
                    .await?;
                for mut record in waiting {
                    record.start(now);
                    self.store.upsert_participant_record(&record).await?;
                }
                self.notifier.publish(state_changed(session));
            }
            TransitionPlan::ShowLeaderboard { .. } => {
                self.notifier.publish(state_changed(session));
                self.leaderboard.publish_now(session.id).await?;
            }
            TransitionPlan::NextQuestion { .. } => {
                self.notifier.publish(state_changed(session));
            }
            TransitionPlan::ForceClose { reason } => {
                self.leaderboard.cancel(session.id);
                self.close_open_records(session.id, now).await?;
                let entries = self.leaderboard.recompute(session.id).await?;
                info!(
                    session_id = session.id,
                    reason = reason.as_str(),
                    ranked = entries.len(),
                    "session closed"
                );
                self.notifier.publish(state_changed(session));
                self.notifier.publish(SessionEvent::SessionEnded {
                    session_id: session.id,
                    reason,
                    entries,
                });
            }
            TransitionPlan::AlreadyClosed => {}
        }
        Ok(())
    }

    /// Waiting and in-progress records become completed.
    async fn close_open_records(
        &self,
        session_id: SessionId,
        now: OffsetDateTime,
    ) -> Result<usize, DomainError> {
        let open = self
            .store
            .list_participant_records(
                session_id,
                &[ParticipantStatus::Waiting, ParticipantStatus::InProgress],
            )
            .await?;
        let mut closed = 0;
        for mut record in open {
            if record.close(now) {
                self.store.upsert_participant_record(&record).await?;
                closed += 1;
            }
        }
        Ok(closed)
    }
}
