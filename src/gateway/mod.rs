//! HTTP gateway: every outbound API call passes through here.
//!
//! The gateway attaches the current credential, classifies failures and owns
//! the refresh/retry/logout cascade. Recovery policy, in order:
//! - 401 with the password-changed signal set: skip refresh entirely, clear
//!   the session and redirect. Refresh or logout calls would themselves 401.
//! - 401 on a login call: the caller surfaces the server message, no session
//!   action.
//! - 401 elsewhere, not yet retried: join the refresh gate. The leader issues
//!   the one refresh call; followers wait for its outcome. On success the
//!   request is retried exactly once.
//! - 403 carrying the max-sessions denial code: open the session-limit
//!   dialog instead of failing the session.
//! - 403 on a user-management endpoint: hard authorization violation tied to
//!   identity, forces logout.
//! - Other 4xx/5xx: surface the server message as a transient notification.
//! - No response at all: classified as a connectivity failure, never as an
//!   HTTP failure.

pub mod refresh;
pub mod transport;

use crate::config::GatewayConfig;
use crate::context::SessionContext;
use crate::endpoints;
use crate::error::GatewayError;
use crate::hooks::{Navigator, Notifier, NoticeLevel};
use crate::menu::MenuCache;
use crate::permissions::PermissionCache;
use crate::session::CredentialStore;
use crate::session_limit::SessionLimitCoordinator;
use refresh::{RefreshGate, RefreshOutcome, RefreshTicket};
use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};
use transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport};

const CONNECTIVITY_MESSAGE: &str =
    "Unable to reach the server. Check your connection and try again.";
const TIMEOUT_MESSAGE: &str = "Request timed out. Please try again.";

pub struct Gateway {
    config: GatewayConfig,
    transport: Arc<dyn Transport>,
    credentials: Arc<CredentialStore>,
    permissions: Arc<PermissionCache>,
    menu: Arc<MenuCache>,
    session_limit: Arc<SessionLimitCoordinator>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
    refresh_gate: RefreshGate,
}

impl Gateway {
    /// Builds a gateway over an explicit transport. The context (and thus the
    /// credential store) must exist before the gateway is constructed.
    #[must_use]
    pub fn new(
        config: GatewayConfig,
        context: &SessionContext,
        transport: Arc<dyn Transport>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            transport,
            credentials: context.credentials.clone(),
            permissions: context.permissions.clone(),
            menu: context.menu.clone(),
            session_limit: context.session_limit.clone(),
            navigator,
            notifier,
            refresh_gate: RefreshGate::default(),
        }
    }

    /// Builds a gateway with the production `reqwest` transport.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_reqwest(
        config: GatewayConfig,
        context: &SessionContext,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, GatewayError> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Ok(Self::new(config, context, transport, navigator, notifier))
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// # Errors
    /// Returns the final error after recovery is exhausted.
    pub async fn get(&self, path: &str) -> Result<Value, GatewayError> {
        self.send(Method::GET, path, None).await
    }

    /// # Errors
    /// Returns the final error after recovery is exhausted.
    pub async fn post(&self, path: &str, body: Option<Value>) -> Result<Value, GatewayError> {
        self.send(Method::POST, path, body).await
    }

    /// # Errors
    /// Returns the final error after recovery is exhausted, or `Decode` if the
    /// body does not match `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let value = self.get(path).await?;
        serde_json::from_value(value).map_err(|err| GatewayError::Decode(err.to_string()))
    }

    /// # Errors
    /// Returns the final error after recovery is exhausted, or `Decode` if the
    /// body does not match `T`.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        let body = serde_json::to_value(body)
            .map_err(|err| GatewayError::Decode(format!("failed to encode request: {err}")))?;
        let value = self.post(path, Some(body)).await?;
        serde_json::from_value(value).map_err(|err| GatewayError::Decode(err.to_string()))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, GatewayError> {
        let mut retried = false;

        loop {
            let response = self.execute(method.clone(), path, body.clone()).await?;

            if response.status.is_success() {
                return Ok(response.body);
            }

            // Ok(()) means the refresh succeeded and the request may be
            // retried. recover() rejects a request already marked retried, so
            // the loop runs at most twice.
            self.recover(&response, path, retried).await?;
            retried = true;
        }
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse, GatewayError> {
        let request = ApiRequest {
            method,
            path: path.to_string(),
            bearer_token: self.credentials.token(),
            body,
        };

        match self.transport.execute(request).await {
            Ok(response) => Ok(response),
            Err(err) => {
                let err = GatewayError::from(err);
                let message = match &err {
                    GatewayError::Timeout => TIMEOUT_MESSAGE,
                    _ => CONNECTIVITY_MESSAGE,
                };
                warn!("transport failure on {path}: {err}");
                self.notifier.notify(NoticeLevel::Error, message);
                Err(err)
            }
        }
    }

    /// Decides whether the failed request may be retried. `Ok(())` means a
    /// refresh succeeded and the caller retries; any `Err` is final.
    async fn recover(
        &self,
        response: &ApiResponse,
        path: &str,
        retried: bool,
    ) -> Result<(), GatewayError> {
        let status = response.status;
        let message = response.message();

        if status == StatusCode::UNAUTHORIZED {
            if self.credentials.password_changed() {
                debug!("401 with password-changed signal set, clearing session");
                self.force_logout();
                return Err(GatewayError::Unauthenticated {
                    message: "password changed, sign in again".to_string(),
                });
            }

            if endpoints::is_login_path(path) {
                return Err(GatewayError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            if endpoints::is_refresh_path(path) {
                // A refresh issued directly through the gateway failed; apply
                // the same policy the internal refresh uses.
                if endpoints::is_refresh_token_missing_message(&message) {
                    return Err(GatewayError::RefreshUnavailable { message });
                }
                self.force_logout();
                return Err(GatewayError::Unauthenticated { message });
            }

            if endpoints::is_logout_path(path) {
                return Err(GatewayError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            if retried {
                return Err(GatewayError::Unauthenticated { message });
            }

            return self.refresh_or_wait().await;
        }

        if status == StatusCode::FORBIDDEN {
            if response.denial_code() == Some(endpoints::DENIAL_MAX_SESSIONS) {
                if self.session_limit.begin() {
                    debug!("session limit reached, opening session dialog");
                }
                return Err(GatewayError::SessionLimit);
            }

            if endpoints::is_user_management_path(path) {
                warn!("403 on user-management endpoint {path}, forcing logout");
                self.force_logout();
                return Err(GatewayError::Forbidden { message });
            }

            self.notifier.notify(
                NoticeLevel::Error,
                if message.is_empty() {
                    "You do not have access to this resource."
                } else {
                    message.as_str()
                },
            );
            return Err(GatewayError::Forbidden { message });
        }

        if status.is_server_error() {
            error!("server error on {path}: {}", message);
        }

        // Login and refresh errors are surfaced by their own flows.
        if !endpoints::is_login_path(path) && !endpoints::is_refresh_path(path) {
            let shown = if message.is_empty() {
                format!("Request failed ({})", status.as_u16())
            } else {
                message.clone()
            };
            self.notifier.notify(NoticeLevel::Error, &shown);
        }

        Err(GatewayError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Join the refresh gate: lead the one refresh call or wait on the one in
    /// flight. `Ok(())` means the caller holds a fresh credential.
    async fn refresh_or_wait(&self) -> Result<(), GatewayError> {
        match self.refresh_gate.join() {
            RefreshTicket::Leader => {
                let outcome = self.run_refresh().await;
                self.refresh_gate.settle(&outcome);
                outcome_to_result(outcome)
            }
            RefreshTicket::Follower(rx) => match rx.await {
                Ok(outcome) => outcome_to_result(outcome),
                Err(_) => Err(GatewayError::Unauthenticated {
                    message: "credential refresh was aborted".to_string(),
                }),
            },
        }
    }

    /// The one refresh call. Side effects on hard failure (logout call, store
    /// clear, navigation) run here, in the leader, exactly once.
    async fn run_refresh(&self) -> RefreshOutcome {
        let request = ApiRequest {
            method: Method::POST,
            path: endpoints::AUTH_REFRESH.to_string(),
            bearer_token: self.credentials.token(),
            body: None,
        };

        let response = match self.transport.execute(request).await {
            Ok(response) => response,
            Err(err) => {
                let message = GatewayError::from(err).to_string();
                error!("refresh transport failure: {message}");
                self.fail_session().await;
                return RefreshOutcome::Failed(message);
            }
        };

        if response.status.is_success() {
            match extract_token(&response.body) {
                Some(token) => self.credentials.replace_token(&token),
                // Some deployments rotate the credential via cookie only.
                None => warn!("refresh response carried no token field"),
            }
            debug!("credential refreshed");
            return RefreshOutcome::Refreshed;
        }

        let message = response.message();

        if response.status == StatusCode::UNAUTHORIZED
            && endpoints::is_refresh_token_missing_message(&message)
        {
            debug!("no refresh credential present, keeping session");
            return RefreshOutcome::MissingRefreshToken(message);
        }

        error!("refresh failed ({}): {}", response.status, message);
        self.fail_session().await;
        RefreshOutcome::Failed(if message.is_empty() {
            format!("refresh failed ({})", response.status.as_u16())
        } else {
            message
        })
    }

    /// Best-effort server-side logout, then local teardown and redirect.
    async fn fail_session(&self) {
        let request = ApiRequest {
            method: Method::POST,
            path: endpoints::AUTH_LOGOUT.to_string(),
            bearer_token: self.credentials.token(),
            body: None,
        };
        if let Err(err) = self.transport.execute(request).await {
            debug!("logout call failed during session teardown: {err:?}");
        }

        self.force_logout();
    }

    /// Clears the session exactly once and navigates to login. The credential
    /// store is always cleared before the permission cache so no permission
    /// check can run against a stale set for an unauthenticated identity.
    fn force_logout(&self) {
        if self.credentials.clear() {
            self.permissions.clear();
            self.menu.clear();
            self.navigator.to_login(None);
        }
    }
}

fn outcome_to_result(outcome: RefreshOutcome) -> Result<(), GatewayError> {
    match outcome {
        RefreshOutcome::Refreshed => Ok(()),
        RefreshOutcome::MissingRefreshToken(message) => {
            Err(GatewayError::RefreshUnavailable { message })
        }
        RefreshOutcome::Failed(message) => Err(GatewayError::Unauthenticated { message }),
    }
}

fn extract_token(body: &Value) -> Option<String> {
    ["token", "Token", "accessToken", "AccessToken"]
        .iter()
        .find_map(|key| body.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
}
