//! Connection registry: who is connected, which sessions they joined,
//! and in which role. Doubles as the engine's notifier.

use std::collections::HashSet;

use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;
use uuid::Uuid;

use crate::domain::session::{SessionId, UserId};
use crate::services::notify::{Audience, SessionEvent, SessionNotifier};
use crate::ws::protocol::ServerMsg;

pub type Outbound = UnboundedSender<ServerMsg>;

struct Connection {
    user_id: UserId,
    tx: Outbound,
    sessions: HashSet<SessionId>,
}

#[derive(Default)]
pub struct WsRegistry {
    connections: DashMap<Uuid, Connection>,
    by_user: DashMap<UserId, HashSet<Uuid>>,
    members: DashMap<SessionId, HashSet<Uuid>>,
    hosts: DashMap<SessionId, HashSet<Uuid>>,
}

impl WsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_connection(&self, conn_id: Uuid, user_id: UserId, tx: Outbound) {
        self.connections.insert(
            conn_id,
            Connection {
                user_id,
                tx,
                sessions: HashSet::new(),
            },
        );
        self.by_user.entry(user_id).or_default().insert(conn_id);
    }

    pub fn unregister_connection(&self, conn_id: Uuid) {
        let Some((_, conn)) = self.connections.remove(&conn_id) else {
            return;
        };
        remove_from(&self.by_user, conn.user_id, conn_id);
        for session_id in conn.sessions {
            remove_from(&self.members, session_id, conn_id);
            remove_from(&self.hosts, session_id, conn_id);
        }
    }

    /// Add a connection to a session room; hosts also join the host room.
    pub fn join_session(&self, conn_id: Uuid, session_id: SessionId, as_host: bool) {
        let Some(mut conn) = self.connections.get_mut(&conn_id) else {
            return;
        };
        conn.sessions.insert(session_id);
        drop(conn);

        self.members.entry(session_id).or_default().insert(conn_id);
        if as_host {
            self.hosts.entry(session_id).or_default().insert(conn_id);
        }
    }

    /// Direct reply to one connection.
    pub fn send_to(&self, conn_id: Uuid, msg: ServerMsg) {
        if let Some(conn) = self.connections.get(&conn_id) {
            if conn.tx.send(msg).is_err() {
                debug!(conn_id = %conn_id, "outbound channel closed");
            }
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn member_count(&self, session_id: SessionId) -> usize {
        self.members.get(&session_id).map_or(0, |m| m.len())
    }

    pub fn host_count(&self, session_id: SessionId) -> usize {
        self.hosts.get(&session_id).map_or(0, |h| h.len())
    }

    fn recipients(&self, session_id: SessionId, audience: Audience) -> Vec<Uuid> {
        match audience {
            Audience::Session => self
                .members
                .get(&session_id)
                .map(|m| m.iter().copied().collect())
                .unwrap_or_default(),
            Audience::Hosts => self
                .hosts
                .get(&session_id)
                .map(|h| h.iter().copied().collect())
                .unwrap_or_default(),
            Audience::User(user_id) => {
                let Some(conns) = self.by_user.get(&user_id) else {
                    return Vec::new();
                };
                let Some(members) = self.members.get(&session_id) else {
                    return Vec::new();
                };
                conns
                    .iter()
                    .filter(|c| members.contains(*c))
                    .copied()
                    .collect()
            }
        }
    }
}

fn remove_from<K>(map: &DashMap<K, HashSet<Uuid>>, key: K, conn_id: Uuid)
where
    K: Eq + std::hash::Hash + Copy,
{
    if let Some(mut set) = map.get_mut(&key) {
        set.remove(&conn_id);
    }
    map.remove_if(&key, |_, set| set.is_empty());
}

impl SessionNotifier for WsRegistry {
    fn publish(&self, event: SessionEvent) {
        let session_id = event.session_id();
        let mut targets: HashSet<Uuid> = HashSet::new();
        for audience in event.audiences() {
            targets.extend(self.recipients(session_id, audience));
        }
        if targets.is_empty() {
            return;
        }

        let msg = ServerMsg::from(&event);
        debug!(
            session_id,
            kind = event.kind(),
            recipients = targets.len(),
            "fan-out"
        );
        for conn_id in targets {
            self.send_to(conn_id, msg.clone());
        }
    }

    fn close_session(&self, session_id: SessionId) {
        let members = self.members.remove(&session_id).map(|(_, m)| m);
        self.hosts.remove(&session_id);
        for conn_id in members.into_iter().flatten() {
            if let Some(mut conn) = self.connections.get_mut(&conn_id) {
                conn.sessions.remove(&session_id);
            }
        }
    }
}
