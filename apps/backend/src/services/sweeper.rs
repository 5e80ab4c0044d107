//! Schedule sweeper: promotes due scheduled sessions and force-closes
//! expired ones through the engine's normal entry points.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::session::SessionId;
use crate::domain::transition::SessionCommand;
use crate::errors::domain::DomainError;
use crate::services::session_engine::SessionEngine;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub started: Vec<SessionId>,
    pub closed: Vec<SessionId>,
    /// Lost a race with a host command; the guard rejected the sweep.
    pub skipped: usize,
    pub failed: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty() && self.closed.is_empty() && self.skipped == 0 && self.failed == 0
    }
}

/// One sweep at `now`.
pub async fn tick(engine: &SessionEngine, now: OffsetDateTime) -> Result<SweepReport, DomainError> {
    let mut report = SweepReport::default();

    let due = engine.store().list_due_scheduled_sessions(now).await?;
    for session_id in due {
        match engine.sweep(session_id, SessionCommand::SweepStart, now).await {
            Ok(outcome) if outcome.changed() => report.started.push(session_id),
            Ok(_) => report.skipped += 1,
            Err(DomainError::InvalidTransition(reason)) => {
                debug!(session_id, %reason, "scheduled start no longer applies");
                report.skipped += 1;
            }
            Err(e) => {
                warn!(session_id, error = %e, "scheduled start failed");
                report.failed += 1;
            }
        }
    }

    let expired = engine.store().list_expired_sessions(now).await?;
    for session_id in expired {
        match engine.sweep(session_id, SessionCommand::SweepExpire, now).await {
            Ok(outcome) if outcome.changed() => report.closed.push(session_id),
            Ok(_) => report.skipped += 1,
            Err(DomainError::InvalidTransition(reason)) => {
                debug!(session_id, %reason, "expiry no longer applies");
                report.skipped += 1;
            }
            Err(e) => {
                warn!(session_id, error = %e, "expiry force-close failed");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Run `tick` every `interval` until `shutdown` is cancelled.
pub fn spawn(
    engine: Arc<SessionEngine>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_ms = interval.as_millis() as u64, "schedule sweeper started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    match tick(&engine, OffsetDateTime::now_utc()).await {
                        Ok(report) if !report.is_empty() => info!(
                            started = report.started.len(),
                            closed = report.closed.len(),
                            skipped = report.skipped,
                            failed = report.failed,
                            "sweep finished"
                        ),
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "sweep failed"),
                    }
                }
            }
        }
        info!("schedule sweeper stopped");
    })
}
