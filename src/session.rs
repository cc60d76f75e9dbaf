//! Credential store and its tab-scoped persistence.
//!
//! The store is the single source of truth for "is this session
//! authenticated". The token lives in memory as a [`SecretString`] and is
//! mirrored to a [`SessionStorage`] under two fixed keys so a reloaded tab can
//! restore the session once at startup.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

pub const TOKEN_KEY: &str = "auth_token";
pub const SUBJECT_KEY: &str = "auth_public_id";

/// Tab-scoped key/value persistence. Not shared across tabs; cleared
/// completely on logout.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-memory [`SessionStorage`], the default for headless use and tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().expect("storage poisoned").get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .expect("storage poisoned")
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().expect("storage poisoned").remove(key);
    }
}

/// Access credential plus identity pointer.
#[derive(Clone)]
pub struct Credential {
    pub access_token: SecretString,
    pub subject_id: String,
}

/// Denormalized user attributes, fetched lazily once a credential exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct UserProfile {
    pub public_id: String,
    pub user_name: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub mobile_number: Option<String>,
    pub is_active: bool,
    pub must_change_password: bool,
    pub last_login_at: Option<String>,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            public_id: String::new(),
            user_name: String::new(),
            first_name: String::new(),
            last_name: None,
            email: String::new(),
            phone: None,
            mobile_number: None,
            is_active: false,
            must_change_password: false,
            last_login_at: None,
        }
    }
}

/// Owns the current [`Credential`] and user identity for one tab.
pub struct CredentialStore {
    storage: Arc<dyn SessionStorage>,
    credential: Mutex<Option<Credential>>,
    profile: Mutex<Option<UserProfile>>,
    restored: AtomicBool,
    // Explicit signal from the password-change flow: a changed password
    // invalidates both the access and refresh credential at once, so the
    // gateway must skip refresh entirely on the next 401.
    password_changed: AtomicBool,
}

impl CredentialStore {
    #[must_use]
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            storage,
            credential: Mutex::new(None),
            profile: Mutex::new(None),
            restored: AtomicBool::new(false),
            password_changed: AtomicBool::new(false),
        }
    }

    /// One-time restore of a prior session from persisted state. Subsequent
    /// calls are no-ops.
    pub fn initialize(&self) {
        if self.restored.swap(true, Ordering::SeqCst) {
            return;
        }

        let token = self.storage.get(TOKEN_KEY);
        let subject = self.storage.get(SUBJECT_KEY);

        if let (Some(token), Some(subject)) = (token, subject) {
            debug!("restored session for subject {subject}");
            *self.credential.lock().expect("credential poisoned") = Some(Credential {
                access_token: token.into(),
                subject_id: subject,
            });
        }
    }

    /// Stores a fresh credential after login and persists it. Clears the
    /// password-changed signal from any previous session.
    pub fn set_auth(&self, access_token: &str, subject_id: &str) {
        self.storage.set(TOKEN_KEY, access_token);
        self.storage.set(SUBJECT_KEY, subject_id);

        *self.credential.lock().expect("credential poisoned") = Some(Credential {
            access_token: access_token.to_string().into(),
            subject_id: subject_id.to_string(),
        });
        self.password_changed.store(false, Ordering::SeqCst);
        self.restored.store(true, Ordering::SeqCst);
    }

    /// Replaces the access token in place after a successful refresh.
    pub fn replace_token(&self, access_token: &str) {
        let mut credential = self.credential.lock().expect("credential poisoned");
        match credential.as_mut() {
            Some(credential) => {
                credential.access_token = access_token.to_string().into();
                self.storage.set(TOKEN_KEY, access_token);
            }
            None => warn!("refresh succeeded but no credential is present"),
        }
    }

    pub fn set_profile(&self, profile: UserProfile) {
        *self.profile.lock().expect("profile poisoned") = Some(profile);
    }

    #[must_use]
    pub fn profile(&self) -> Option<UserProfile> {
        self.profile.lock().expect("profile poisoned").clone()
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.credential
            .lock()
            .expect("credential poisoned")
            .as_ref()
            .map(|credential| credential.access_token.expose_secret().to_string())
    }

    #[must_use]
    pub fn subject_id(&self) -> Option<String> {
        self.credential
            .lock()
            .expect("credential poisoned")
            .as_ref()
            .map(|credential| credential.subject_id.clone())
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.credential.lock().expect("credential poisoned").is_some()
    }

    /// Clears the credential, profile and persisted state. Returns whether a
    /// credential was actually present, so callers can run follow-up side
    /// effects (permission clear, navigation) exactly once under concurrent
    /// failures.
    pub fn clear(&self) -> bool {
        let had_credential = self
            .credential
            .lock()
            .expect("credential poisoned")
            .take()
            .is_some();
        *self.profile.lock().expect("profile poisoned") = None;

        self.storage.remove(TOKEN_KEY);
        self.storage.remove(SUBJECT_KEY);

        had_credential
    }

    pub fn mark_password_changed(&self) {
        self.password_changed.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn password_changed(&self) -> bool {
        self.password_changed.load(Ordering::SeqCst)
    }
}
