//! Explicitly constructed application context.
//!
//! One context per tab/session owns the shared stores; the gateway and the
//! guard chain borrow them by `Arc`. Construction order matters: the context
//! (and thus the credential store) must exist before a gateway is built.

use crate::menu::MenuCache;
use crate::permissions::PermissionCache;
use crate::session::{CredentialStore, MemoryStorage, SessionStorage};
use crate::session_limit::SessionLimitCoordinator;
use std::sync::Arc;
use tracing::debug;

pub struct SessionContext {
    pub credentials: Arc<CredentialStore>,
    pub permissions: Arc<PermissionCache>,
    pub menu: Arc<MenuCache>,
    pub session_limit: Arc<SessionLimitCoordinator>,
}

impl SessionContext {
    /// Builds the context over a persistence backend and restores any prior
    /// session once.
    #[must_use]
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        let credentials = Arc::new(CredentialStore::new(storage));
        credentials.initialize();

        Self {
            credentials,
            permissions: Arc::new(PermissionCache::default()),
            menu: Arc::new(MenuCache::default()),
            session_limit: Arc::new(SessionLimitCoordinator::default()),
        }
    }

    /// Context backed by in-memory storage, for headless use and tests.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::default()))
    }

    /// Tears the session down on logout. The credential store is cleared
    /// first: permission checks must never run against a stale-but-present
    /// set for a now-unauthenticated identity.
    pub fn teardown(&self) {
        debug!("tearing down session context");
        self.credentials.clear();
        self.permissions.clear();
        self.menu.clear();
    }
}
