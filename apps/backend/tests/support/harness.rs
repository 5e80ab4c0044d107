use std::sync::Arc;
use std::time::Duration;

use quizroom::config::engine::EngineConfig;
use quizroom::domain::participant::ParticipantRecord;
use quizroom::domain::session::{NewSession, Session, SessionId, SessionSettings, UserId};
use quizroom::services::session_engine::SessionEngine;

use super::fixtures::{host, new_session, player, quiz, t0};
use super::flaky_store::FlakyStore;
use super::recording::RecordingNotifier;

pub struct Harness {
    pub engine: Arc<SessionEngine>,
    pub store: Arc<FlakyStore>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn engine_config() -> EngineConfig {
    EngineConfig {
        leaderboard_debounce: Duration::from_millis(2_000),
        ..EngineConfig::default()
    }
}

pub fn harness() -> Harness {
    harness_with(engine_config())
}

pub fn harness_with(config: EngineConfig) -> Harness {
    let store = Arc::new(FlakyStore::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let engine = Arc::new(SessionEngine::new(store.clone(), notifier.clone(), &config));
    Harness {
        engine,
        store,
        notifier,
    }
}

impl Harness {
    pub async fn create(&self, new: NewSession) -> Session {
        self.engine
            .create_session(&host(), new, t0())
            .await
            .expect("create session")
    }

    /// Waiting session with `questions` single-choice questions of
    /// `limit` seconds each.
    pub async fn create_quiz(&self, questions: usize, limit: u32) -> Session {
        self.create(new_session(quiz(questions, limit), SessionSettings::default()))
            .await
    }

    pub async fn join_all(&self, session_id: SessionId, players: &[UserId]) {
        for id in players {
            self.engine
                .join(&player(*id), session_id, t0())
                .await
                .expect("join");
        }
    }

    pub async fn session(&self, session_id: SessionId) -> Session {
        self.engine
            .store()
            .find_session(session_id)
            .await
            .expect("find session")
            .expect("session exists")
    }

    pub async fn record(&self, session_id: SessionId, user_id: UserId) -> ParticipantRecord {
        self.engine
            .store()
            .find_participant_record(session_id, user_id)
            .await
            .expect("find record")
            .expect("record exists")
    }
}
