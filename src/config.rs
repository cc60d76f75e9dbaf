use crate::error::GatewayError;
use std::time::Duration;
use url::Url;

/// Default upper bound for a single HTTP call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// Gateway and guard configuration.
///
/// Routes are application paths, not API paths: `login_route` is where an
/// unauthenticated user lands, `default_landing` is the safe fallback for
/// denied navigations, and `open_routes` bypass the menu-membership gate.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub login_route: String,
    pub default_landing: String,
    pub open_routes: Vec<String>,
}

impl GatewayConfig {
    /// # Errors
    /// Returns an error if `api_base_url` cannot be parsed or has no host.
    pub fn new(api_base_url: &str) -> Result<Self, GatewayError> {
        let url = Url::parse(api_base_url)
            .map_err(|err| GatewayError::Config(format!("invalid API base URL: {err}")))?;

        if url.host().is_none() {
            return Err(GatewayError::Config(
                "invalid API base URL: no host specified".to_string(),
            ));
        }

        Ok(Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: APP_USER_AGENT.to_string(),
            login_route: "/login".to_string(),
            default_landing: "/dashboard".to_string(),
            open_routes: vec![
                "/login".to_string(),
                "/forgot-password".to_string(),
                "/dashboard".to_string(),
            ],
        })
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_default_landing(mut self, route: &str) -> Self {
        self.default_landing = route.to_string();
        self
    }
}
