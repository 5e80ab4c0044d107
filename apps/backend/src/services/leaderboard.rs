//! Debounced leaderboard recomputation.
//!
//! One pending timer per session at most. A trigger that arrives while a
//! timer is pending folds into it; the flush always reads the latest
//! records, so every broadcast is a full snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::leaderboard::{changed_ranks, compute_leaderboard, LeaderboardEntry};
use crate::domain::session::SessionId;
use crate::errors::domain::DomainError;
use crate::repos::store::SessionStore;
use crate::services::locks::SessionLocks;
use crate::services::notify::{SessionEvent, SessionNotifier};

struct PendingFlush {
    generation: u64,
    handle: JoinHandle<()>,
}

pub struct LeaderboardAggregator {
    store: Arc<dyn SessionStore>,
    notifier: Arc<dyn SessionNotifier>,
    locks: Arc<SessionLocks>,
    window: Duration,
    pending: DashMap<SessionId, PendingFlush>,
    generation: AtomicU64,
}

impl LeaderboardAggregator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        notifier: Arc<dyn SessionNotifier>,
        locks: Arc<SessionLocks>,
        window: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            locks,
            window,
            pending: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    /// Schedule a recomputation unless one is already pending.
    pub fn trigger(self: &Arc<Self>, session_id: SessionId) {
        let entry = self.pending.entry(session_id);
        if let Entry::Occupied(ref e) = entry {
            if !e.get().handle.is_finished() {
                return;
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(this.window).await;
            this.pending
                .remove_if(&session_id, |_, p| p.generation == generation);
            if let Err(e) = this.flush(session_id).await {
                warn!(session_id, error = %e, "leaderboard flush failed");
            }
        });

        let pending = PendingFlush { generation, handle };
        match entry {
            Entry::Occupied(mut e) => {
                e.insert(pending);
            }
            Entry::Vacant(e) => {
                e.insert(pending);
            }
        }
    }

    /// Abort the pending timer, if any.
    pub fn cancel(&self, session_id: SessionId) {
        if let Some((_, pending)) = self.pending.remove(&session_id) {
            pending.handle.abort();
            debug!(session_id, "leaderboard timer cancelled");
        }
    }

    pub fn has_pending(&self, session_id: SessionId) -> bool {
        self.pending
            .get(&session_id)
            .is_some_and(|p| !p.handle.is_finished())
    }

    /// Timer path: takes the session read lock so it never interleaves with
    /// a transition, and skips sessions that have ended.
    async fn flush(&self, session_id: SessionId) -> Result<(), DomainError> {
        let lock = self.locks.session(session_id);
        let _guard = lock.read().await;

        let Some(session) = self.store.find_session(session_id).await? else {
            return Ok(());
        };
        if session.status.is_terminal() {
            debug!(session_id, "skipping leaderboard flush for ended session");
            return Ok(());
        }
        let entries = self.recompute(session_id).await?;
        self.notifier.publish(SessionEvent::Leaderboard {
            session_id,
            entries,
        });
        Ok(())
    }

    /// Recompute ranks from the latest records and write changed ranks
    /// back. Callers hold the session lock.
    pub async fn recompute(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<LeaderboardEntry>, DomainError> {
        let records = self.store.list_participant_records(session_id, &[]).await?;
        let entries = compute_leaderboard(&records);
        let changed: Vec<_> = changed_ranks(&records, &entries)
            .into_iter()
            .map(|r| (r.participant_id, r.rank))
            .collect();
        if !changed.is_empty() {
            self.store.set_ranks(session_id, &changed).await?;
        }
        Ok(entries)
    }

    /// Recompute and broadcast right away; used on entering the
    /// leaderboard status.
    pub async fn publish_now(&self, session_id: SessionId) -> Result<(), DomainError> {
        let entries = self.recompute(session_id).await?;
        self.notifier.publish(SessionEvent::Leaderboard {
            session_id,
            entries,
        });
        Ok(())
    }
}
