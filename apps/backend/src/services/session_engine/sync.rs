use serde::Serialize;
use time::OffsetDateTime;

use super::SessionEngine;
use crate::domain::identity::Actor;
use crate::domain::leaderboard::{compute_leaderboard, LeaderboardEntry};
use crate::domain::session::SessionId;
use crate::domain::view::{session_snapshot, SessionSnapshot};
use crate::errors::domain::DomainError;

#[derive(Debug, Clone, Serialize)]
pub struct SyncPayload {
    #[serde(flatten)]
    pub snapshot: SessionSnapshot,
    pub leaderboard: Vec<LeaderboardEntry>,
}

impl SessionEngine {
    /// Authoritative current state for the caller. Read-only, lock-free:
    /// it reports whatever the store holds right now.
    pub async fn sync(
        &self,
        actor: &Actor,
        session_id: SessionId,
        now: OffsetDateTime,
    ) -> Result<SyncPayload, DomainError> {
        let session = self.load_session(session_id).await?;
        let records = self.store.list_participant_records(session_id, &[]).await?;
        let own = if actor.controls(&session) {
            None
        } else {
            records.iter().find(|r| r.participant_id == actor.user_id)
        };

        Ok(SyncPayload {
            snapshot: session_snapshot(&session, own, now),
            leaderboard: compute_leaderboard(&records),
        })
    }
}
