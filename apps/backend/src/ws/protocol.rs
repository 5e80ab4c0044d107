use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::leaderboard::LeaderboardEntry;
use crate::domain::session::{AnswerValue, QuestionId, SessionId, SessionStatus, UserId};
use crate::domain::view::{QuestionView, SessionSnapshot};
use crate::errors::ErrorCode;
use crate::services::notify::SessionEvent;
use crate::services::session_engine::{AnswerReceipt, SyncPayload};

pub const PROTOCOL_VERSION: i32 = 1;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    Hello {
        protocol: i32,
    },
    Join {
        session_id: SessionId,
    },
    Start {
        session_id: SessionId,
    },
    Advance {
        session_id: SessionId,
    },
    End {
        session_id: SessionId,
    },
    SubmitAnswer {
        session_id: SessionId,
        question_id: QuestionId,
        #[serde(default)]
        answer: Option<AnswerValue>,
        #[serde(default)]
        time_taken_ms: u64,
    },
    ReportTabSwitch {
        session_id: SessionId,
    },
    Complete {
        session_id: SessionId,
    },
    Sync {
        session_id: SessionId,
    },
}

impl ClientMsg {
    pub const fn name(&self) -> &'static str {
        match self {
            ClientMsg::Hello { .. } => "hello",
            ClientMsg::Join { .. } => "join",
            ClientMsg::Start { .. } => "start",
            ClientMsg::Advance { .. } => "advance",
            ClientMsg::End { .. } => "end",
            ClientMsg::SubmitAnswer { .. } => "submit_answer",
            ClientMsg::ReportTabSwitch { .. } => "report_tab_switch",
            ClientMsg::Complete { .. } => "complete",
            ClientMsg::Sync { .. } => "sync",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinedAs {
    Host,
    Participant,
}

#[allow(clippy::large_enum_variant)]
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    HelloAck {
        protocol: i32,
        user_id: UserId,
    },

    Joined {
        session_id: SessionId,
        role: JoinedAs,
        rejoined: bool,
        snapshot: SessionSnapshot,
    },

    Ack {
        command: &'static str,
        session_id: SessionId,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<SessionStatus>,
    },

    AnswerReceipt {
        session_id: SessionId,
        #[serde(flatten)]
        receipt: AnswerReceipt,
    },

    Sync {
        #[serde(flatten)]
        payload: SyncPayload,
    },

    StateChanged {
        session_id: SessionId,
        status: SessionStatus,
        current_question_index: Option<usize>,
        #[serde(with = "time::serde::rfc3339::option")]
        expires_at: Option<OffsetDateTime>,
        question: Option<QuestionView>,
    },

    Leaderboard {
        session_id: SessionId,
        entries: Vec<LeaderboardEntry>,
    },

    SessionEnded {
        session_id: SessionId,
        reason: &'static str,
        entries: Vec<LeaderboardEntry>,
    },

    ParticipantJoined {
        session_id: SessionId,
        participant_id: UserId,
        display_name: String,
    },

    AnswerReceived {
        session_id: SessionId,
        participant_id: UserId,
        question_id: QuestionId,
        is_correct: bool,
        points_earned: u32,
        total_score: i64,
    },

    TabSwitchAlert {
        session_id: SessionId,
        participant_id: UserId,
        count: u32,
        terminated: bool,
    },

    ParticipantCompleted {
        session_id: SessionId,
        participant_id: UserId,
        total_score: i64,
    },

    ParticipantTerminated {
        session_id: SessionId,
        participant_id: UserId,
    },

    Error {
        code: ErrorCode,
        message: String,
        retryable: bool,
    },
}

impl ServerMsg {
    pub fn error(code: ErrorCode, message: impl Into<String>, retryable: bool) -> Self {
        ServerMsg::Error {
            code,
            message: message.into(),
            retryable,
        }
    }
}

impl From<&SessionEvent> for ServerMsg {
    fn from(event: &SessionEvent) -> Self {
        match event.clone() {
            SessionEvent::StateChanged {
                session_id,
                status,
                current_question_index,
                expires_at,
                question,
            } => ServerMsg::StateChanged {
                session_id,
                status,
                current_question_index,
                expires_at,
                question,
            },
            SessionEvent::Leaderboard {
                session_id,
                entries,
            } => ServerMsg::Leaderboard {
                session_id,
                entries,
            },
            SessionEvent::SessionEnded {
                session_id,
                reason,
                entries,
            } => ServerMsg::SessionEnded {
                session_id,
                reason: reason.as_str(),
                entries,
            },
            SessionEvent::ParticipantJoined {
                session_id,
                participant_id,
                display_name,
            } => ServerMsg::ParticipantJoined {
                session_id,
                participant_id,
                display_name,
            },
            SessionEvent::AnswerReceived {
                session_id,
                participant_id,
                question_id,
                is_correct,
                points_earned,
                total_score,
            } => ServerMsg::AnswerReceived {
                session_id,
                participant_id,
                question_id,
                is_correct,
                points_earned,
                total_score,
            },
            SessionEvent::TabSwitchAlert {
                session_id,
                participant_id,
                count,
                terminated,
            } => ServerMsg::TabSwitchAlert {
                session_id,
                participant_id,
                count,
                terminated,
            },
            SessionEvent::ParticipantCompleted {
                session_id,
                participant_id,
                total_score,
            } => ServerMsg::ParticipantCompleted {
                session_id,
                participant_id,
                total_score,
            },
            SessionEvent::ParticipantTerminated {
                session_id,
                participant_id,
            } => ServerMsg::ParticipantTerminated {
                session_id,
                participant_id,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::transition::CloseReason;

    #[test]
    fn submit_answer_accepts_text_and_choices() {
        let text: ClientMsg = serde_json::from_value(json!({
            "type": "submit_answer",
            "session_id": 7,
            "question_id": 3,
            "answer": "Paris",
            "time_taken_ms": 1200
        }))
        .unwrap();
        assert_eq!(
            text,
            ClientMsg::SubmitAnswer {
                session_id: 7,
                question_id: 3,
                answer: Some(AnswerValue::Text("Paris".into())),
                time_taken_ms: 1200,
            }
        );

        let choices: ClientMsg = serde_json::from_value(json!({
            "type": "submit_answer",
            "session_id": 7,
            "question_id": 4,
            "answer": ["a", "c"]
        }))
        .unwrap();
        assert!(matches!(
            choices,
            ClientMsg::SubmitAnswer { answer: Some(AnswerValue::Choices(ref c)), time_taken_ms: 0, .. } if c.len() == 2
        ));
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        let parsed = serde_json::from_value::<ClientMsg>(json!({"type": "subscribe"}));
        assert!(parsed.is_err());
    }

    #[test]
    fn session_ended_serializes_reason_and_tag() {
        let msg = ServerMsg::from(&SessionEvent::SessionEnded {
            session_id: 5,
            reason: CloseReason::Expired,
            entries: vec![],
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "session_ended");
        assert_eq!(value["reason"], CloseReason::Expired.as_str());
        assert_eq!(value["entries"], json!([]));
    }

    #[test]
    fn error_frame_carries_code_and_retryable() {
        let value =
            serde_json::to_value(ServerMsg::error(ErrorCode::OptimisticLock, "try again", true))
                .unwrap();
        assert_eq!(
            value,
            json!({
                "type": "error",
                "code": "OPTIMISTIC_LOCK",
                "message": "try again",
                "retryable": true
            })
        );
    }
}
