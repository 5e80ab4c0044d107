//! Tab-switch monitoring.

use crate::domain::participant::ParticipantRecord;
use crate::domain::session::{Session, TabSwitchPolicy};
use crate::errors::domain::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabSwitchVerdict {
    /// Policy does not restrict switching; nothing recorded.
    Ignored,
    /// Counted and within tolerance.
    Recorded { count: u32 },
    /// Counted and over the limit; the record is now terminated.
    Terminated { count: u32 },
}

/// Apply a reported tab switch to `record` in place.
pub fn report_tab_switch(
    session: &Session,
    record: &mut ParticipantRecord,
    now: time::OffsetDateTime,
) -> Result<TabSwitchVerdict, DomainError> {
    if !session.status.is_running() {
        return Err(DomainError::session_inactive(format!(
            "session is {}",
            session.status.as_str()
        )));
    }
    if !record.status.is_open() {
        return Err(DomainError::session_inactive(format!(
            "participant is {}",
            record.status.as_str()
        )));
    }

    let verdict = match session.settings.tab_switch_policy {
        TabSwitchPolicy::Ignore => return Ok(TabSwitchVerdict::Ignored),
        TabSwitchPolicy::Tolerate { max_switches } => {
            let count = record.tab_switch_count.saturating_add(1);
            if count > max_switches {
                TabSwitchVerdict::Terminated { count }
            } else {
                TabSwitchVerdict::Recorded { count }
            }
        }
        TabSwitchPolicy::Forbid => TabSwitchVerdict::Terminated {
            count: record.tab_switch_count.saturating_add(1),
        },
    };

    match verdict {
        TabSwitchVerdict::Recorded { count } => {
            record.tab_switch_count = count;
            record.updated_at = now;
        }
        TabSwitchVerdict::Terminated { count } => {
            record.tab_switch_count = count;
            record.terminate(now);
        }
        TabSwitchVerdict::Ignored => {}
    }
    Ok(verdict)
}
