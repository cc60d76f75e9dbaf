//! UI side-effect seams. The gateway and guards never render anything; they
//! call through these traits and the embedding application decides how a
//! redirect or a transient notification actually looks.
//!
//! Implementations must be idempotent: the gateway may ask to navigate to the
//! login entry point more than once while concurrent failures settle.

/// Severity of a transient notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
    Warning,
    Info,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, level: NoticeLevel, message: &str);
}

pub trait Navigator: Send + Sync {
    /// Navigate to the login entry point, optionally carrying the originally
    /// intended path for post-login redirect.
    fn to_login(&self, redirect: Option<&str>);
}

/// Drops notifications. Useful for headless callers and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _level: NoticeLevel, _message: &str) {}
}

/// Ignores navigation requests. Useful for headless callers and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn to_login(&self, _redirect: Option<&str>) {}
}
