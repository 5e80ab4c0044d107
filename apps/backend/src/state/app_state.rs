use std::sync::Arc;

use super::security_config::SecurityConfig;
use crate::config::engine::EngineConfig;
use crate::repos::store::{IdentityStore, SessionStore};
use crate::services::session_engine::SessionEngine;
use crate::ws::hub::WsRegistry;

/// Shared handles for HTTP handlers and websocket sessions.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SessionEngine>,
    pub identities: Arc<dyn IdentityStore>,
    /// Live connections; also the engine's notifier
    pub registry: Arc<WsRegistry>,
    pub security: SecurityConfig,
    pub config: EngineConfig,
}

impl AppState {
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        self.engine.store()
    }
}
