//! Session-limit coordinator.
//!
//! Triggered exclusively by the gateway's distinguished 403 denial code. The
//! dialog-open flag is the mutual exclusion preventing duplicate prompts when
//! several in-flight requests fail simultaneously for the same reason. The
//! coordinator never clears the credential store: exceeding the session limit
//! is not an authentication failure.

use crate::endpoints;
use crate::error::GatewayError;
use crate::gateway::Gateway;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::debug;

/// One concurrent session as reported by the server, read-only.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SessionDescriptor {
    pub public_id: String,
    pub device_description: String,
    pub is_current_session: bool,
    pub created_at: Option<String>,
}

impl Default for SessionDescriptor {
    fn default() -> Self {
        Self {
            public_id: String::new(),
            device_description: String::new(),
            is_current_session: false,
            created_at: None,
        }
    }
}

/// Server response for "my sessions".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionsSnapshot {
    pub sessions: Vec<SessionDescriptor>,
    pub is_max_sessions_reached: bool,
}

pub struct SessionLimitCoordinator {
    open: AtomicBool,
    snapshot: Mutex<Option<SessionsSnapshot>>,
    open_tx: watch::Sender<bool>,
}

impl Default for SessionLimitCoordinator {
    fn default() -> Self {
        let (open_tx, _) = watch::channel(false);
        Self {
            open: AtomicBool::new(false),
            snapshot: Mutex::new(None),
            open_tx,
        }
    }
}

impl SessionLimitCoordinator {
    /// Opens the dialog if it is not already open. Returns false when a prompt
    /// is already active, in which case the triggering request simply fails.
    ///
    /// Opening only flips the flag: the subscriber observing the change via
    /// [`subscribe`](Self::subscribe) is expected to call
    /// [`load_sessions`](Self::load_sessions) to populate the list it
    /// presents.
    pub fn begin(&self) -> bool {
        let opened = self
            .open
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if opened {
            let _ = self.open_tx.send(true);
        }
        opened
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Watch the dialog-open state; the UI subscribes once and presents the
    /// session list whenever this flips to true.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.open_tx.subscribe()
    }

    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        let _ = self.open_tx.send(false);
    }

    /// The "keep using the current credential" resolution: closes the dialog,
    /// no further action.
    pub fn continue_with_current(&self) {
        debug!("continuing with current session");
        self.close();
    }

    #[must_use]
    pub fn snapshot(&self) -> Option<SessionsSnapshot> {
        self.snapshot.lock().expect("snapshot poisoned").clone()
    }

    /// Fetches the concurrent sessions for the current identity.
    ///
    /// # Errors
    /// Returns the gateway error; the previous snapshot, if any, is kept.
    pub async fn load_sessions(
        &self,
        gateway: &Gateway,
    ) -> Result<SessionsSnapshot, GatewayError> {
        let snapshot: SessionsSnapshot = gateway.get_json(endpoints::MY_SESSIONS).await?;
        *self.snapshot.lock().expect("snapshot poisoned") = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Revokes one other session, then refetches. If the limit condition is no
    /// longer reported the dialog auto-closes. Returns the fresh snapshot.
    ///
    /// # Errors
    /// Returns the gateway error from the revoke or the refetch.
    pub async fn revoke_session(
        &self,
        gateway: &Gateway,
        session_id: &str,
    ) -> Result<SessionsSnapshot, GatewayError> {
        gateway
            .post(&endpoints::revoke_session(session_id), None)
            .await?;

        let snapshot = self.load_sessions(gateway).await?;
        if !snapshot.is_max_sessions_reached {
            debug!("session limit cleared after revocation, closing dialog");
            self.close();
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_is_mutually_exclusive() {
        let coordinator = SessionLimitCoordinator::default();

        assert!(coordinator.begin());
        assert!(!coordinator.begin());
        assert!(coordinator.is_open());

        coordinator.close();
        assert!(!coordinator.is_open());
        assert!(coordinator.begin());
    }

    #[test]
    fn subscribe_observes_open_and_close() {
        let coordinator = SessionLimitCoordinator::default();
        let rx = coordinator.subscribe();

        assert!(!*rx.borrow());
        coordinator.begin();
        assert!(*rx.borrow());
        coordinator.continue_with_current();
        assert!(!*rx.borrow());
    }
}
