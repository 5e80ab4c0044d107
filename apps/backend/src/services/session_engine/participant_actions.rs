use time::OffsetDateTime;
use tracing::{debug, info};

use super::{AnswerReceipt, JoinOutcome, SessionEngine};
use crate::domain::anti_cheat::{self, TabSwitchVerdict};
use crate::domain::identity::Actor;
use crate::domain::participant::{apply_answer, GradedAnswer, ParticipantRecord};
use crate::domain::scoring::{grade, recorded_time_ms};
use crate::domain::session::{AnswerValue, QuestionId, Session, SessionId, SessionStatus};
use crate::domain::view::session_snapshot;
use crate::errors::domain::{DomainError, NotFoundKind};
use crate::services::notify::SessionEvent;

fn ensure_not_done(session: &Session) -> Result<(), DomainError> {
    if session.status.is_terminal() {
        return Err(DomainError::session_inactive(format!(
            "session {} has ended",
            session.id
        )));
    }
    Ok(())
}

impl SessionEngine {
    /// Join a session. Owners and admins land in the host room without a
    /// record; everyone else gets (or resumes) their participant record.
    pub async fn join(
        &self,
        actor: &Actor,
        session_id: SessionId,
        now: OffsetDateTime,
    ) -> Result<JoinOutcome, DomainError> {
        let session = self.load_session(session_id).await?;
        ensure_not_done(&session)?;
        if actor.controls(&session) {
            return Ok(JoinOutcome::Host {
                snapshot: session_snapshot(&session, None, now),
            });
        }

        let lock = self.locks.session(session_id);
        let _session_guard = lock.read().await;
        let participant_lock = self.locks.participant(session_id, actor.user_id);
        let _participant_guard = participant_lock.lock().await;

        let session = self.reload_locked(session_id).await?;
        ensure_not_done(&session)?;

        if let Some(existing) = self
            .store
            .find_participant_record(session_id, actor.user_id)
            .await?
        {
            debug!(session_id, user_id = actor.user_id, "participant rejoined");
            return Ok(JoinOutcome::Participant {
                snapshot: session_snapshot(&session, Some(&existing), now),
                rejoined: true,
            });
        }

        let record = ParticipantRecord::new(&session, actor.user_id, &actor.display_name, now);
        self.store.upsert_participant_record(&record).await?;
        info!(
            session_id,
            user_id = actor.user_id,
            status = record.status.as_str(),
            "participant joined"
        );

        self.notifier.publish(SessionEvent::ParticipantJoined {
            session_id,
            participant_id: actor.user_id,
            display_name: record.display_name.clone(),
        });
        self.leaderboard.trigger(session_id);

        Ok(JoinOutcome::Participant {
            snapshot: session_snapshot(&session, Some(&record), now),
            rejoined: false,
        })
    }

    /// Grade and record an answer for the active question.
    pub async fn submit_answer(
        &self,
        actor: &Actor,
        session_id: SessionId,
        question_id: QuestionId,
        answer: Option<AnswerValue>,
        time_taken_ms: u64,
        now: OffsetDateTime,
    ) -> Result<AnswerReceipt, DomainError> {
        ensure_not_done(&self.load_session(session_id).await?)?;

        let lock = self.locks.session(session_id);
        let _session_guard = lock.read().await;
        let participant_lock = self.locks.participant(session_id, actor.user_id);
        let _participant_guard = participant_lock.lock().await;

        let session = self.reload_locked(session_id).await?;
        ensure_not_done(&session)?;
        if session.status != SessionStatus::QuestionActive {
            return Err(DomainError::session_inactive(format!(
                "session {session_id} is {}, not accepting answers",
                session.status.as_str()
            )));
        }
        let (index, question) = session.find_question(question_id).ok_or_else(|| {
            DomainError::not_found(
                NotFoundKind::Question,
                format!("question {question_id} is not part of session {session_id}"),
            )
        })?;
        if session.current_question_index != Some(index) {
            return Err(DomainError::session_inactive(format!(
                "question {question_id} is not the active question"
            )));
        }
        if session.is_expired(now) {
            return Err(DomainError::session_inactive("time is up for this question"));
        }

        let record = self
            .store
            .find_participant_record(session_id, actor.user_id)
            .await?
            .ok_or_else(|| {
                DomainError::not_found(
                    NotFoundKind::Participant,
                    format!("user {} has not joined session {session_id}", actor.user_id),
                )
            })?;
        if !record.status.is_open() {
            return Err(DomainError::session_inactive(format!(
                "participant is {}",
                record.status.as_str()
            )));
        }

        let time_taken_ms = recorded_time_ms(question, &session.settings, time_taken_ms);
        let graded = grade(
            question,
            answer.as_ref(),
            time_taken_ms as f64 / 1000.0,
            &session.settings,
        );
        let mut updated = apply_answer(
            &record,
            GradedAnswer {
                question_id,
                answer,
                grade: graded,
                time_taken_ms,
                answered_at: now,
            },
        )?;
        updated.start(now);
        self.store.upsert_participant_record(&updated).await?;

        debug!(
            session_id,
            user_id = actor.user_id,
            question_id,
            is_correct = graded.is_correct,
            points = graded.points_earned,
            "answer recorded"
        );

        self.notifier.publish(SessionEvent::AnswerReceived {
            session_id,
            participant_id: actor.user_id,
            question_id,
            is_correct: graded.is_correct,
            points_earned: graded.points_earned,
            total_score: updated.total_score(),
        });
        self.leaderboard.trigger(session_id);

        let feedback = session.settings.show_feedback;
        Ok(AnswerReceipt {
            question_id,
            is_correct: feedback.then_some(graded.is_correct),
            points_earned: feedback.then_some(graded.points_earned),
            total_score: feedback.then_some(updated.total_score()),
        })
    }

    pub async fn report_tab_switch(
        &self,
        actor: &Actor,
        session_id: SessionId,
        now: OffsetDateTime,
    ) -> Result<TabSwitchVerdict, DomainError> {
        ensure_not_done(&self.load_session(session_id).await?)?;

        let lock = self.locks.session(session_id);
        let _session_guard = lock.read().await;
        let participant_lock = self.locks.participant(session_id, actor.user_id);
        let _participant_guard = participant_lock.lock().await;

        let session = self.reload_locked(session_id).await?;
        ensure_not_done(&session)?;
        let mut record = self.require_record(session_id, actor).await?;
        let verdict = anti_cheat::report_tab_switch(&session, &mut record, now)?;

        match verdict {
            TabSwitchVerdict::Ignored => return Ok(verdict),
            TabSwitchVerdict::Recorded { count } => {
                self.store.upsert_participant_record(&record).await?;
                self.notifier.publish(SessionEvent::TabSwitchAlert {
                    session_id,
                    participant_id: actor.user_id,
                    count,
                    terminated: false,
                });
            }
            TabSwitchVerdict::Terminated { count } => {
                self.store.upsert_participant_record(&record).await?;
                info!(session_id, user_id = actor.user_id, count, "participant terminated");
                self.notifier.publish(SessionEvent::TabSwitchAlert {
                    session_id,
                    participant_id: actor.user_id,
                    count,
                    terminated: true,
                });
                self.notifier.publish(SessionEvent::ParticipantTerminated {
                    session_id,
                    participant_id: actor.user_id,
                });
                self.leaderboard.trigger(session_id);
            }
        }
        Ok(verdict)
    }

    /// Participant finished early. Completed and terminated records cannot
    /// complete again.
    pub async fn complete(
        &self,
        actor: &Actor,
        session_id: SessionId,
        now: OffsetDateTime,
    ) -> Result<ParticipantRecord, DomainError> {
        if self.load_session(session_id).await?.status.is_terminal() {
            return Err(DomainError::invalid_transition(format!(
                "session {session_id} has ended"
            )));
        }

        let lock = self.locks.session(session_id);
        let _session_guard = lock.read().await;
        let participant_lock = self.locks.participant(session_id, actor.user_id);
        let _participant_guard = participant_lock.lock().await;

        if self.reload_locked(session_id).await?.status.is_terminal() {
            return Err(DomainError::invalid_transition(format!(
                "session {session_id} has ended"
            )));
        }
        let mut record = self.require_record(session_id, actor).await?;
        record.complete(now)?;
        self.store.upsert_participant_record(&record).await?;

        self.notifier.publish(SessionEvent::ParticipantCompleted {
            session_id,
            participant_id: actor.user_id,
            total_score: record.total_score(),
        });
        self.leaderboard.trigger(session_id);
        Ok(record)
    }

    /// Re-read the session once its locks are held. A close that won the
    /// race has already released this session's locks, so the entries this
    /// call re-created are dropped again.
    async fn reload_locked(&self, session_id: SessionId) -> Result<Session, DomainError> {
        let session = self.load_session(session_id).await?;
        if session.status.is_terminal() {
            self.locks.release_session(session_id);
        }
        Ok(session)
    }

    async fn require_record(
        &self,
        session_id: SessionId,
        actor: &Actor,
    ) -> Result<ParticipantRecord, DomainError> {
        self.store
            .find_participant_record(session_id, actor.user_id)
            .await?
            .ok_or_else(|| {
                DomainError::not_found(
                    NotFoundKind::Participant,
                    format!("user {} has not joined session {session_id}", actor.user_id),
                )
            })
    }
}
