use std::sync::Arc;

use tracing::info;

use crate::config::db::{db_url, StoreKind};
use crate::config::engine::EngineConfig;
use crate::error::AppError;
use crate::infra::db::connect_db;
use crate::repos::memory::InMemoryStore;
use crate::repos::sea::SeaStore;
use crate::repos::store::{IdentityStore, SessionStore};
use crate::services::notify::SessionNotifier;
use crate::services::session_engine::SessionEngine;
use crate::state::app_state::AppState;
use crate::state::security_config::SecurityConfig;
use crate::ws::hub::WsRegistry;

enum Backend {
    Kind(StoreKind),
    Memory(Arc<InMemoryStore>),
}

/// Builder for `AppState` (used in both tests and main)
pub struct StateBuilder {
    security_config: SecurityConfig,
    engine_config: EngineConfig,
    backend: Backend,
}

impl StateBuilder {
    pub fn new() -> Self {
        Self {
            security_config: SecurityConfig::default(),
            engine_config: EngineConfig::default(),
            backend: Backend::Kind(StoreKind::Memory),
        }
    }

    pub fn with_store(mut self, kind: StoreKind) -> Self {
        self.backend = Backend::Kind(kind);
        self
    }

    /// Use a store the caller keeps a handle to (seeding users in tests).
    pub fn with_memory_store(mut self, store: Arc<InMemoryStore>) -> Self {
        self.backend = Backend::Memory(store);
        self
    }

    pub fn with_security(mut self, security_config: SecurityConfig) -> Self {
        self.security_config = security_config;
        self
    }

    pub fn with_engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    pub async fn build(self) -> Result<AppState, AppError> {
        let (store, identities): (Arc<dyn SessionStore>, Arc<dyn IdentityStore>) =
            match self.backend {
                Backend::Memory(store) => split(store),
                Backend::Kind(StoreKind::Memory) => {
                    info!(store = "memory", "session store selected");
                    split(Arc::new(InMemoryStore::new()))
                }
                Backend::Kind(StoreKind::Postgres) => {
                    let conn = connect_db(&db_url()?).await?;
                    info!(store = "postgres", "session store selected");
                    split(Arc::new(SeaStore::new(conn)))
                }
            };

        let registry = Arc::new(WsRegistry::new());
        let notifier: Arc<dyn SessionNotifier> = registry.clone();
        let engine = Arc::new(SessionEngine::new(store, notifier, &self.engine_config));

        Ok(AppState {
            engine,
            identities,
            registry,
            security: self.security_config,
            config: self.engine_config,
        })
    }
}

fn split<S>(store: Arc<S>) -> (Arc<dyn SessionStore>, Arc<dyn IdentityStore>)
where
    S: SessionStore + IdentityStore + 'static,
{
    let sessions: Arc<dyn SessionStore> = store.clone();
    let identities: Arc<dyn IdentityStore> = store;
    (sessions, identities)
}

impl Default for StateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn build_state() -> StateBuilder {
    StateBuilder::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_build_needs_no_database() {
        let state = build_state().build().await.unwrap();
        assert_eq!(state.registry.connection_count(), 0);
        assert!(state.store().ping().await.is_ok());
    }

    #[tokio::test]
    async fn shared_memory_store_backs_identities() {
        use crate::domain::identity::{Role, UserIdentity};

        let store = Arc::new(InMemoryStore::new());
        store.insert_user(UserIdentity {
            id: 9,
            display_name: "Quinn".into(),
            role: Role::Host,
            is_active: true,
        });
        let state = build_state()
            .with_memory_store(store)
            .build()
            .await
            .unwrap();
        let found = state.identities.find_user(9).await.unwrap();
        assert_eq!(found.map(|u| u.display_name), Some("Quinn".into()));
    }
}
