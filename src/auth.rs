//! Login, logout and password-change flows over the gateway.
//!
//! These wrappers centralize the session mutations so route code never touches
//! the credential store directly. A failed login surfaces the server message
//! through the returned error and takes no session action.

use crate::context::SessionContext;
use crate::endpoints;
use crate::error::GatewayError;
use crate::gateway::Gateway;
use crate::hooks::Navigator;
use crate::session::UserProfile;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoginRequest {
    pub user_name: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LoginResponse {
    pub token: String,
    pub public_id: String,
    pub full_name: String,
    pub roles: Vec<String>,
    pub expires_at: Option<String>,
    pub requires_mfa: bool,
}

impl Default for LoginResponse {
    fn default() -> Self {
        Self {
            token: String::new(),
            public_id: String::new(),
            full_name: String::new(),
            roles: Vec::new(),
            expires_at: None,
            requires_mfa: false,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Authenticates and stores the credential, then fetches the profile
/// best-effort. MFA-gated logins return without a session; the caller drives
/// the MFA flow first.
///
/// # Errors
/// Returns the gateway error; a 401/400 carries the server's message.
pub async fn login(
    gateway: &Gateway,
    context: &SessionContext,
    request: &LoginRequest,
) -> Result<LoginResponse, GatewayError> {
    let response: LoginResponse = gateway.post_json(endpoints::AUTH_LOGIN, request).await?;

    if response.requires_mfa {
        debug!("login requires MFA, no session stored yet");
        return Ok(response);
    }

    context
        .credentials
        .set_auth(&response.token, &response.public_id);

    match fetch_profile(gateway, &response.public_id).await {
        Ok(profile) => context.credentials.set_profile(profile),
        Err(err) => warn!("failed to fetch user profile after login: {err}"),
    }

    Ok(response)
}

/// # Errors
/// Returns the gateway error or `Decode` on an unexpected body.
pub async fn fetch_profile(
    gateway: &Gateway,
    public_id: &str,
) -> Result<UserProfile, GatewayError> {
    gateway.get_json(&endpoints::user_by_id(public_id)).await
}

/// Ends the session: best-effort server-side logout, then local teardown and
/// navigation to login. The teardown happens even when the logout call fails.
pub async fn logout(gateway: &Gateway, context: &SessionContext, navigator: &dyn Navigator) {
    if let Err(err) = gateway.post(endpoints::AUTH_LOGOUT, None).await {
        warn!("logout call failed: {err}");
    }

    context.teardown();
    navigator.to_login(None);
}

/// Ends every session for this identity, then tears down locally.
pub async fn logout_all(gateway: &Gateway, context: &SessionContext, navigator: &dyn Navigator) {
    if let Err(err) = gateway.post(endpoints::AUTH_LOGOUT_ALL, None).await {
        warn!("logout-all call failed: {err}");
    }

    context.teardown();
    navigator.to_login(None);
}

/// Changes the password and marks the password-changed signal: the server
/// invalidates both credentials at that point, so the next 401 must bypass
/// refresh and clear the session directly.
///
/// # Errors
/// Returns the gateway error from the change-password call.
pub async fn change_password(
    gateway: &Gateway,
    context: &SessionContext,
    request: &ChangePasswordRequest,
) -> Result<(), GatewayError> {
    gateway
        .post(
            endpoints::AUTH_CHANGE_PASSWORD,
            Some(serde_json::to_value(request).map_err(|err| {
                GatewayError::Decode(format!("failed to encode request: {err}"))
            })?),
        )
        .await?;

    context.credentials.mark_password_changed();
    Ok(())
}
