//! API endpoint paths and the substring predicates the gateway uses to decide
//! retry and refresh policy. Exact paths are a server contract; the gateway
//! only needs to recognize them, never to construct anything beyond these.

pub const AUTH_LOGIN: &str = "/Auth/login";
pub const AUTH_LOGOUT: &str = "/Auth/logout";
pub const AUTH_LOGOUT_ALL: &str = "/Auth/logout-all";
pub const AUTH_REFRESH: &str = "/Auth/refresh";
pub const AUTH_CHANGE_PASSWORD: &str = "/Auth/change-password";

pub const MY_PERMISSIONS: &str = "/Permission/my-permissions";
pub const MENU_MY_TREE: &str = "/Menu/my-tree";

pub const MY_SESSIONS: &str = "/Session/MySessions";

/// Machine-readable denial code on a 403 meaning the concurrent-session limit
/// was reached. Distinguishes "open the session dialog" from a plain 403.
pub const DENIAL_MAX_SESSIONS: &str = "MAX_SESSIONS_REACHED";

#[must_use]
pub fn revoke_session(session_id: &str) -> String {
    format!("/Session/RevokeSession/{session_id}")
}

#[must_use]
pub fn user_by_id(public_id: &str) -> String {
    format!("/Users/{public_id}")
}

#[must_use]
pub fn is_login_path(path: &str) -> bool {
    path.contains("/Auth/login")
}

#[must_use]
pub fn is_refresh_path(path: &str) -> bool {
    path.contains("/Auth/refresh")
}

#[must_use]
pub fn is_logout_path(path: &str) -> bool {
    path.contains("/Auth/logout")
}

#[must_use]
pub fn is_user_management_path(path: &str) -> bool {
    path.contains("/Users/")
}

/// True when a refresh failure message indicates the refresh credential was
/// simply absent. This is the soft branch: the access credential may still be
/// valid, so the session must not be cleared.
#[must_use]
pub fn is_refresh_token_missing_message(message: &str) -> bool {
    message.to_lowercase().contains("refresh token")
}
