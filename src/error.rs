use thiserror::Error;

/// Final outcomes surfaced to callers after the gateway has exhausted
/// recovery (refresh-and-retry, queue-and-wait).
///
/// `RefreshUnavailable` is deliberately separate from `Unauthenticated`: a
/// missing refresh credential does not prove the access credential expired,
/// so the session is left intact and the caller decides what degrades.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("authentication required: {message}")]
    Unauthenticated { message: String },

    #[error("refresh credential unavailable: {message}")]
    RefreshUnavailable { message: String },

    #[error("access denied: {message}")]
    Forbidden { message: String },

    #[error("maximum concurrent sessions reached")]
    SessionLimit,

    #[error("request failed ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("request timed out")]
    Timeout,

    #[error("unable to reach the server: {0}")]
    Network(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// True for failures where no HTTP response was received at all.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Timeout | Self::Network(_))
    }
}
