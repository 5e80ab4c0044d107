//! Builders for sessions, questions and callers.

use quizroom::domain::identity::{Actor, Role, UserIdentity};
use quizroom::domain::session::{
    AnswerValue, Difficulty, NewSession, Question, QuestionId, QuestionKind, SessionSettings,
    UserId,
};
use time::macros::datetime;
use time::OffsetDateTime;

pub const HOST_ID: UserId = 1;

pub fn t0() -> OffsetDateTime {
    datetime!(2026-03-01 18:00 UTC)
}

/// `t0` plus whole seconds.
pub fn at(seconds: i64) -> OffsetDateTime {
    t0() + time::Duration::seconds(seconds)
}

/// Single choice, correct option "a", 10 points.
pub fn single_choice(id: QuestionId, time_limit_seconds: u32) -> Question {
    Question {
        id,
        kind: QuestionKind::SingleChoice,
        prompt: format!("Question {id}?"),
        options: vec!["a".into(), "b".into(), "c".into()],
        correct_answer: AnswerValue::Text("a".into()),
        points: 10,
        time_limit_seconds,
        difficulty: Difficulty::Medium,
    }
}

pub fn quiz(count: usize, time_limit_seconds: u32) -> Vec<Question> {
    (1..=count as QuestionId)
        .map(|id| single_choice(id * 100, time_limit_seconds))
        .collect()
}

pub fn new_session(questions: Vec<Question>, settings: SessionSettings) -> NewSession {
    NewSession {
        host_id: HOST_ID,
        title: "Friday quiz".into(),
        questions,
        settings,
        scheduled_at: None,
        auto_start: false,
    }
}

pub fn host() -> Actor {
    Actor {
        user_id: HOST_ID,
        display_name: "Host".into(),
        role: Role::Host,
    }
}

pub fn player(user_id: UserId) -> Actor {
    Actor {
        user_id,
        display_name: format!("Player {user_id}"),
        role: Role::Participant,
    }
}

pub fn identity(user_id: UserId, role: Role, is_active: bool) -> UserIdentity {
    UserIdentity {
        id: user_id,
        display_name: format!("User {user_id}"),
        role,
        is_active,
    }
}

pub fn right() -> Option<AnswerValue> {
    Some(AnswerValue::Text("a".into()))
}

pub fn wrong() -> Option<AnswerValue> {
    Some(AnswerValue::Text("b".into()))
}
