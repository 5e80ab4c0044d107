//! Authenticated callers.

use serde::{Deserialize, Serialize};

use crate::domain::session::{Session, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Participant,
    Host,
    Admin,
}

/// Identity as returned by the identity lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: UserId,
    pub display_name: String,
    pub role: Role,
    pub is_active: bool,
}

/// The caller of an engine command, resolved at connect time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub display_name: String,
    pub role: Role,
}

impl Actor {
    /// Owner of the session, or an admin.
    pub fn controls(&self, session: &Session) -> bool {
        self.role == Role::Admin || session.host_id == self.user_id
    }
}

impl From<&UserIdentity> for Actor {
    fn from(identity: &UserIdentity) -> Self {
        Self {
            user_id: identity.id,
            display_name: identity.display_name.clone(),
            role: identity.role,
        }
    }
}
