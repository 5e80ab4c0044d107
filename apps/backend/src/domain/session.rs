//! Session aggregate: questions, settings and lifecycle status.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

pub type SessionId = i64;
pub type UserId = i64;
pub type QuestionId = i64;

/// Lifecycle status. `Live` is transient: a start immediately opens the
/// first question, so stored sessions are never observed in it for long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Draft,
    Scheduled,
    Waiting,
    Live,
    QuestionActive,
    Leaderboard,
    Done,
}

impl SessionStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Waiting => "waiting",
            Self::Live => "live",
            Self::QuestionActive => "question_active",
            Self::Leaderboard => "leaderboard",
            Self::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Statuses in which participants are actively playing.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Live | Self::QuestionActive | Self::Leaderboard)
    }

    /// Statuses a start command may leave from.
    pub fn is_pre_start(&self) -> bool {
        matches!(self, Self::Draft | Self::Scheduled | Self::Waiting)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    SingleChoice,
    MultiChoice,
    FillBlank,
    FreeText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// Raw answer payload. Choice questions submit a list, text questions a
/// string; either shape is accepted and normalized by the scorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Text(String),
    Choices(Vec<String>),
}

impl AnswerValue {
    pub fn is_blank(&self) -> bool {
        match self {
            AnswerValue::Text(s) => s.trim().is_empty(),
            AnswerValue::Choices(c) => c.iter().all(|s| s.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_answer: AnswerValue,
    pub points: u32,
    /// Zero falls back to the session default.
    #[serde(default)]
    pub time_limit_seconds: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TabSwitchPolicy {
    #[default]
    Ignore,
    /// Up to `max_switches` switches are tolerated; one more terminates.
    Tolerate { max_switches: u32 },
    Forbid,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default)]
    pub question_time_limit_seconds: Option<u32>,
    #[serde(default)]
    pub quiz_time_limit_seconds: Option<u32>,
    #[serde(default = "default_true")]
    pub speed_bonus: bool,
    #[serde(default = "default_true")]
    pub show_feedback: bool,
    #[serde(default)]
    pub tab_switch_policy: TabSwitchPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            question_time_limit_seconds: None,
            quiz_time_limit_seconds: None,
            speed_bonus: true,
            show_feedback: true,
            tab_switch_policy: TabSwitchPolicy::Ignore,
        }
    }
}

impl SessionSettings {
    /// The question's own limit when positive, else the session default.
    pub fn effective_time_limit(&self, question: &Question) -> Option<u32> {
        if question.time_limit_seconds > 0 {
            Some(question.time_limit_seconds)
        } else {
            self.question_time_limit_seconds.filter(|s| *s > 0)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: SessionId,
    pub host_id: UserId,
    pub title: String,
    pub questions: Vec<Question>,
    pub settings: SessionSettings,
    pub status: SessionStatus,
    pub current_question_index: Option<usize>,
    pub scheduled_at: Option<OffsetDateTime>,
    pub auto_start: bool,
    pub started_at: Option<OffsetDateTime>,
    pub ended_at: Option<OffsetDateTime>,
    pub expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub version: i32,
}

impl Session {
    pub fn current_question(&self) -> Option<&Question> {
        self.current_question_index
            .and_then(|idx| self.questions.get(idx))
    }

    /// Position and question for an id.
    pub fn find_question(&self, question_id: QuestionId) -> Option<(usize, &Question)> {
        self.questions
            .iter()
            .enumerate()
            .find(|(_, q)| q.id == question_id)
    }

    pub fn has_more_questions(&self) -> bool {
        match self.current_question_index {
            Some(idx) => idx + 1 < self.questions.len(),
            None => !self.questions.is_empty(),
        }
    }

    /// Whole-quiz deadline, anchored at `started_at`.
    pub fn quiz_deadline(&self) -> Option<OffsetDateTime> {
        let started = self.started_at?;
        let limit = self.settings.quiz_time_limit_seconds.filter(|s| *s > 0)?;
        Some(started + Duration::seconds(i64::from(limit)))
    }

    /// Expiry for question `index` opened at `now`: the earlier of the
    /// question deadline and the quiz deadline.
    pub fn question_expiry(&self, index: usize, now: OffsetDateTime) -> Option<OffsetDateTime> {
        let question_deadline = self
            .questions
            .get(index)
            .and_then(|q| self.settings.effective_time_limit(q))
            .map(|secs| now + Duration::seconds(i64::from(secs)));
        earliest(question_deadline, self.quiz_deadline())
    }

    pub fn remaining_ms(&self, now: OffsetDateTime) -> Option<i64> {
        self.expires_at
            .map(|exp| (exp - now).whole_milliseconds().max(0) as i64)
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    pub fn is_due_for_auto_start(&self, now: OffsetDateTime) -> bool {
        self.status == SessionStatus::Scheduled
            && self.auto_start
            && self.scheduled_at.is_some_and(|at| at <= now)
    }
}

pub(crate) fn earliest(
    a: Option<OffsetDateTime>,
    b: Option<OffsetDateTime>,
) -> Option<OffsetDateTime> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Input for creating a session; hand-off from the authoring side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSession {
    pub host_id: UserId,
    pub title: String,
    pub questions: Vec<Question>,
    #[serde(default)]
    pub settings: SessionSettings,
    #[serde(default)]
    pub scheduled_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub auto_start: bool,
}

impl NewSession {
    /// Initial status: scheduled when a start time is given, else waiting.
    pub fn initial_status(&self) -> SessionStatus {
        if self.scheduled_at.is_some() {
            SessionStatus::Scheduled
        } else {
            SessionStatus::Waiting
        }
    }
}
