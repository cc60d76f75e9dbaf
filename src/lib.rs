//! Session gateway for admin consoles: credential lifecycle, token refresh
//! with request coalescing, permission-gated navigation and concurrent-session
//! arbitration.
//!
//! Flow Overview:
//! - Build a [`SessionContext`] (credential store, permission cache, menu
//!   cache, session-limit coordinator) backed by a [`session::SessionStorage`].
//! - Build a [`Gateway`] over the context; every API call goes through it. The
//!   gateway attaches the bearer credential, and on a 401 runs a single
//!   serialized refresh while queueing overlapping requests.
//! - Before each navigation, evaluate the [`guards::GuardChain`]; it answers
//!   `Allow` or `Redirect` from the credential store, the permission cache and
//!   the user's menu tree.
//! - A 403 carrying the max-sessions denial code opens the
//!   [`session_limit::SessionLimitCoordinator`] instead of failing the session.
//!
//! The crate never renders anything; UI concerns are reached only through the
//! [`hooks::Navigator`] and [`hooks::Notifier`] seams.

pub mod auth;
pub mod config;
pub mod context;
pub mod endpoints;
pub mod error;
pub mod gateway;
pub mod guards;
pub mod hooks;
pub mod menu;
pub mod permissions;
pub mod session;
pub mod session_limit;

pub use config::GatewayConfig;
pub use context::SessionContext;
pub use error::GatewayError;
pub use gateway::Gateway;
pub use guards::{GuardChain, GuardDecision, Redirect, RouteMeta, RouteTarget};
