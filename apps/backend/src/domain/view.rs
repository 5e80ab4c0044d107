//! Participant-facing projections. The correct answer is only revealed once
//! its question has closed.

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::participant::{AnswerSlot, ParticipantRecord, ParticipantStatus};
use crate::domain::session::{
    AnswerValue, Difficulty, Question, QuestionId, QuestionKind, Session, SessionId,
    SessionStatus,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub id: QuestionId,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub prompt: String,
    pub options: Vec<String>,
    pub points: u32,
    pub time_limit_seconds: u32,
    pub difficulty: Difficulty,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<AnswerValue>,
}

impl QuestionView {
    pub fn of(question: &Question, session: &Session, reveal: bool) -> Self {
        Self {
            id: question.id,
            kind: question.kind,
            prompt: question.prompt.clone(),
            options: question.options.clone(),
            points: question.points,
            time_limit_seconds: session.settings.effective_time_limit(question).unwrap_or(0),
            difficulty: question.difficulty,
            correct_answer: reveal.then(|| question.correct_answer.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerView {
    pub question_id: QuestionId,
    pub answer: Option<AnswerValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_earned: Option<u32>,
    pub time_taken_ms: u64,
}

impl AnswerView {
    fn of(slot: &AnswerSlot, show_feedback: bool) -> Self {
        Self {
            question_id: slot.question_id,
            answer: slot.answer.clone(),
            is_correct: show_feedback.then_some(slot.is_correct),
            points_earned: show_feedback.then_some(slot.points_earned),
            time_taken_ms: slot.time_taken_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantView {
    pub status: ParticipantStatus,
    pub total_score: i64,
    pub correct_count: u32,
    pub rank: Option<u32>,
    pub tab_switch_count: u32,
    pub answers: Vec<AnswerView>,
}

/// Authoritative current state returned by `sync`. No history replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub title: String,
    pub status: SessionStatus,
    pub current_question_index: Option<usize>,
    pub question_count: usize,
    pub remaining_ms: Option<i64>,
    pub current_question: Option<QuestionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant: Option<ParticipantView>,
}

pub fn session_snapshot(
    session: &Session,
    record: Option<&ParticipantRecord>,
    now: OffsetDateTime,
) -> SessionSnapshot {
    let show_feedback = session.settings.show_feedback;
    let reveal = show_feedback && session.status != SessionStatus::QuestionActive;
    let current_question = session
        .current_question()
        .filter(|_| session.status.is_running() || session.status.is_terminal())
        .map(|q| QuestionView::of(q, session, reveal));

    SessionSnapshot {
        session_id: session.id,
        title: session.title.clone(),
        status: session.status,
        current_question_index: session.current_question_index,
        question_count: session.questions.len(),
        remaining_ms: session.remaining_ms(now),
        current_question,
        participant: record.map(|r| ParticipantView {
            status: r.status,
            total_score: r.total_score(),
            correct_count: r.correct_count(),
            rank: r.rank,
            tab_switch_count: r.tab_switch_count,
            answers: r
                .answers()
                .iter()
                .filter(|s| s.is_filled())
                .map(|s| AnswerView::of(s, show_feedback))
                .collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use time::Duration;

    use super::*;
    use crate::domain::session::SessionSettings;

    fn active_session() -> Session {
        let t0 = datetime!(2026-01-01 12:00 UTC);
        Session {
            id: 3,
            host_id: 1,
            title: "capitals".into(),
            questions: vec![Question {
                id: 1,
                kind: QuestionKind::SingleChoice,
                prompt: "Capital of France?".into(),
                options: vec!["Paris".into(), "Rome".into()],
                correct_answer: AnswerValue::Text("Paris".into()),
                points: 10,
                time_limit_seconds: 30,
                difficulty: Difficulty::Easy,
            }],
            settings: SessionSettings::default(),
            status: SessionStatus::QuestionActive,
            current_question_index: Some(0),
            scheduled_at: None,
            auto_start: false,
            started_at: Some(t0),
            ended_at: None,
            expires_at: Some(t0 + Duration::seconds(30)),
            created_at: t0,
            updated_at: t0,
            version: 2,
        }
    }

    #[test]
    fn active_question_hides_correct_answer() {
        let s = active_session();
        let snap = session_snapshot(&s, None, datetime!(2026-01-01 12:00:10 UTC));
        let q = snap.current_question.unwrap();
        assert_eq!(q.correct_answer, None);
        assert_eq!(snap.remaining_ms, Some(20_000));

        let json = serde_json::to_string(&q).unwrap();
        assert!(!json.contains("correct_answer"));
    }

    #[test]
    fn leaderboard_reveals_when_feedback_on() {
        let mut s = active_session();
        s.status = SessionStatus::Leaderboard;
        let snap = session_snapshot(&s, None, datetime!(2026-01-01 12:00:10 UTC));
        assert_eq!(
            snap.current_question.and_then(|q| q.correct_answer),
            Some(AnswerValue::Text("Paris".into()))
        );
    }
}
