//! Permission cache: the authenticated identity's granted capability set.
//!
//! Fetched once per session and consulted synchronously by the guards. The
//! fetch is single-flight: a second caller while a fetch is outstanding awaits
//! the same fetch instead of issuing a duplicate request.

use crate::endpoints;
use crate::error::GatewayError;
use crate::gateway::Gateway;
use serde_json::Value;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Normalizes the three server response shapes (bare array, `Permissions`,
/// `permissions`) into one canonical list. Unrecognized shapes yield `None`;
/// the caller logs and falls back to the empty set, a deliberate availability
/// tradeoff.
#[must_use]
pub fn normalize_permissions(value: &Value) -> Option<Vec<String>> {
    let array = if let Some(array) = value.as_array() {
        array
    } else {
        value
            .get("Permissions")
            .or_else(|| value.get("permissions"))?
            .as_array()?
    };

    Some(
        array
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
    )
}

pub struct PermissionCache {
    permissions: Mutex<Vec<String>>,
    // Serializes fetches; held across the network call so concurrent callers
    // coalesce onto one outstanding request.
    fetch_lock: tokio::sync::Mutex<()>,
}

impl Default for PermissionCache {
    fn default() -> Self {
        Self {
            permissions: Mutex::new(Vec::new()),
            fetch_lock: tokio::sync::Mutex::new(()),
        }
    }
}

impl PermissionCache {
    /// Case-insensitive exact membership check. Empty names never match.
    #[must_use]
    pub fn has_permission(&self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        let wanted = name.to_lowercase();
        self.permissions
            .lock()
            .expect("permissions poisoned")
            .iter()
            .any(|permission| permission.to_lowercase() == wanted)
    }

    #[must_use]
    pub fn is_populated(&self) -> bool {
        !self.permissions.lock().expect("permissions poisoned").is_empty()
    }

    /// Fetches the permission set if not already populated. Idempotent while
    /// populated; coalesces concurrent callers onto one request.
    ///
    /// # Errors
    /// Returns the gateway error; the cache is left empty in that case and a
    /// later navigation retries.
    pub async fn fetch(&self, gateway: &Gateway) -> Result<(), GatewayError> {
        if self.is_populated() {
            return Ok(());
        }

        let _guard = self.fetch_lock.lock().await;
        if self.is_populated() {
            // Another caller completed the fetch while we waited.
            return Ok(());
        }

        let value = gateway.get(endpoints::MY_PERMISSIONS).await?;
        let permissions = match normalize_permissions(&value) {
            Some(permissions) => permissions,
            None => {
                warn!("unrecognized permissions response shape, treating as empty");
                Vec::new()
            }
        };

        debug!("loaded {} permissions", permissions.len());
        *self.permissions.lock().expect("permissions poisoned") = permissions;
        Ok(())
    }

    /// Explicit invalidate-then-refetch, used after a permission-altering
    /// action elsewhere in the system.
    ///
    /// # Errors
    /// Returns the gateway error from the refetch.
    pub async fn refetch(&self, gateway: &Gateway) -> Result<(), GatewayError> {
        self.clear();
        self.fetch(gateway).await
    }

    /// Invoked on logout, always after the credential store is cleared.
    pub fn clear(&self) {
        self.permissions.lock().expect("permissions poisoned").clear();
    }
}
