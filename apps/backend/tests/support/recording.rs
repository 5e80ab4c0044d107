use parking_lot::Mutex;
use quizroom::domain::session::SessionId;
use quizroom::services::notify::{SessionEvent, SessionNotifier};

/// Keeps every published event for later assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<SessionEvent>>,
    closed: Mutex<Vec<SessionId>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().clone()
    }

    pub fn of_kind(&self, kind: &str) -> Vec<SessionEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.of_kind(kind).len()
    }

    pub fn closed_sessions(&self) -> Vec<SessionId> {
        self.closed.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl SessionNotifier for RecordingNotifier {
    fn publish(&self, event: SessionEvent) {
        self.events.lock().push(event);
    }

    fn close_session(&self, session_id: SessionId) {
        self.closed.lock().push(session_id);
    }
}
