//! Per-(session, participant) record with derived totals.
//!
//! `total_score` and `correct_count` are private and recomputed from the
//! answer slots on every mutation; nothing can set them directly.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::scoring::Grade;
use crate::domain::session::{AnswerValue, QuestionId, Session, SessionId, UserId};
use crate::errors::domain::{ConflictKind, DomainError, NotFoundKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Waiting,
    InProgress,
    Completed,
    Terminated,
}

impl ParticipantStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Terminated => "terminated",
        }
    }

    /// Still able to answer or report.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Waiting | Self::InProgress)
    }

    /// Statuses that appear on the leaderboard.
    pub fn is_ranked(&self) -> bool {
        !matches!(self, Self::Terminated)
    }
}

/// One slot per question, in question order. A slot is filled once
/// `answered_at` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSlot {
    pub question_id: QuestionId,
    #[serde(default)]
    pub answer: Option<AnswerValue>,
    #[serde(default)]
    pub is_correct: bool,
    #[serde(default)]
    pub points_earned: u32,
    #[serde(default)]
    pub time_taken_ms: u64,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub answered_at: Option<OffsetDateTime>,
}

impl AnswerSlot {
    pub fn empty(question_id: QuestionId) -> Self {
        Self {
            question_id,
            answer: None,
            is_correct: false,
            points_earned: 0,
            time_taken_ms: 0,
            answered_at: None,
        }
    }

    pub fn is_filled(&self) -> bool {
        self.answered_at.is_some()
    }
}

/// Output of grading, ready to be folded into a record.
#[derive(Debug, Clone, PartialEq)]
pub struct GradedAnswer {
    pub question_id: QuestionId,
    pub answer: Option<AnswerValue>,
    pub grade: Grade,
    pub time_taken_ms: u64,
    pub answered_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantRecord {
    pub session_id: SessionId,
    pub participant_id: UserId,
    pub display_name: String,
    pub status: ParticipantStatus,
    answers: Vec<AnswerSlot>,
    total_score: i64,
    correct_count: u32,
    total_time_ms: u64,
    pub tab_switch_count: u32,
    pub rank: Option<u32>,
    pub joined_at: OffsetDateTime,
    pub completed_at: Option<OffsetDateTime>,
    pub updated_at: OffsetDateTime,
}

impl ParticipantRecord {
    /// Fresh record with one empty slot per question.
    pub fn new(
        session: &Session,
        participant_id: UserId,
        display_name: impl Into<String>,
        now: OffsetDateTime,
    ) -> Self {
        let status = if session.status.is_running() {
            ParticipantStatus::InProgress
        } else {
            ParticipantStatus::Waiting
        };
        let answers = session
            .questions
            .iter()
            .map(|q| AnswerSlot::empty(q.id))
            .collect();
        Self::from_parts(RecordParts {
            session_id: session.id,
            participant_id,
            display_name: display_name.into(),
            status,
            answers,
            tab_switch_count: 0,
            rank: None,
            joined_at: now,
            completed_at: None,
            updated_at: now,
        })
    }

    /// Rebuild a record from storage; totals are derived, not loaded.
    pub fn from_parts(parts: RecordParts) -> Self {
        let mut record = Self {
            session_id: parts.session_id,
            participant_id: parts.participant_id,
            display_name: parts.display_name,
            status: parts.status,
            answers: parts.answers,
            total_score: 0,
            correct_count: 0,
            total_time_ms: 0,
            tab_switch_count: parts.tab_switch_count,
            rank: parts.rank,
            joined_at: parts.joined_at,
            completed_at: parts.completed_at,
            updated_at: parts.updated_at,
        };
        record.recompute_totals();
        record
    }

    pub fn answers(&self) -> &[AnswerSlot] {
        &self.answers
    }

    pub fn total_score(&self) -> i64 {
        self.total_score
    }

    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    /// Sum of time taken over answered questions; leaderboard tie-break.
    pub fn total_time_ms(&self) -> u64 {
        self.total_time_ms
    }

    pub fn slot(&self, question_id: QuestionId) -> Option<&AnswerSlot> {
        self.answers.iter().find(|s| s.question_id == question_id)
    }

    fn recompute_totals(&mut self) {
        let filled = self.answers.iter().filter(|s| s.is_filled());
        let (score, correct, time) = filled.fold((0i64, 0u32, 0u64), |acc, s| {
            (
                acc.0.saturating_add(i64::from(s.points_earned)),
                acc.1.saturating_add(u32::from(s.is_correct)),
                acc.2.saturating_add(s.time_taken_ms),
            )
        });
        self.total_score = score;
        self.correct_count = correct;
        self.total_time_ms = time;
    }

    pub fn start(&mut self, now: OffsetDateTime) {
        if self.status == ParticipantStatus::Waiting {
            self.status = ParticipantStatus::InProgress;
            self.updated_at = now;
        }
    }

    /// Participant-initiated completion.
    pub fn complete(&mut self, now: OffsetDateTime) -> Result<(), DomainError> {
        if !self.status.is_open() {
            return Err(DomainError::invalid_transition(format!(
                "participant already {}",
                self.status.as_str()
            )));
        }
        self.status = ParticipantStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Force-close path: open records become completed, others are kept.
    /// Returns whether anything changed.
    pub fn close(&mut self, now: OffsetDateTime) -> bool {
        if !self.status.is_open() {
            return false;
        }
        self.status = ParticipantStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
        true
    }

    pub fn terminate(&mut self, now: OffsetDateTime) {
        if self.status != ParticipantStatus::Terminated {
            self.status = ParticipantStatus::Terminated;
            self.completed_at.get_or_insert(now);
            self.updated_at = now;
        }
    }
}

/// Stored shape of a record, before totals are derived.
#[derive(Debug, Clone)]
pub struct RecordParts {
    pub session_id: SessionId,
    pub participant_id: UserId,
    pub display_name: String,
    pub status: ParticipantStatus,
    pub answers: Vec<AnswerSlot>,
    pub tab_switch_count: u32,
    pub rank: Option<u32>,
    pub joined_at: OffsetDateTime,
    pub completed_at: Option<OffsetDateTime>,
    pub updated_at: OffsetDateTime,
}

/// Fold a graded answer into a record, returning the new record.
///
/// A filled slot is never overwritten: a second submission for the same
/// question fails with `DuplicateAnswer` and the input is left untouched.
pub fn apply_answer(
    record: &ParticipantRecord,
    graded: GradedAnswer,
) -> Result<ParticipantRecord, DomainError> {
    let pos = record
        .answers
        .iter()
        .position(|s| s.question_id == graded.question_id)
        .ok_or_else(|| {
            DomainError::not_found(
                NotFoundKind::Question,
                format!("question {} has no answer slot", graded.question_id),
            )
        })?;

    if record.answers[pos].is_filled() {
        return Err(DomainError::conflict(
            ConflictKind::DuplicateAnswer,
            format!("question {} already answered", graded.question_id),
        ));
    }

    let mut next = record.clone();
    next.answers[pos] = AnswerSlot {
        question_id: graded.question_id,
        answer: graded.answer,
        is_correct: graded.grade.is_correct,
        points_earned: graded.grade.points_earned,
        time_taken_ms: graded.time_taken_ms,
        answered_at: Some(graded.answered_at),
    };
    next.updated_at = graded.answered_at;
    next.recompute_totals();
    Ok(next)
}
