//! Navigation guard chain.
//!
//! Three gates run in fixed order before a navigation resolves:
//! authentication, fine-grained permission, menu membership. Each gate is a
//! decision function over the target and the session; the runner stops at the
//! first non-Allow result. Authentication and permission mismatches fail
//! closed (redirect to a safe route); only the menu gate fails open on
//! infrastructure errors, so a backend outage cannot strand the user.

use crate::context::SessionContext;
use crate::gateway::Gateway;
use crate::hooks::{Notifier, NoticeLevel};
use crate::menu;
use std::sync::Arc;
use tracing::{error, warn};

const ACCESS_DENIED_MESSAGE: &str = "You do not have permission to view this page.";

/// Per-route declared requirements. Absence of both permission lists makes the
/// permission gate a no-op for the route, so public routes cost zero fetches.
#[derive(Debug, Clone, Default)]
pub struct RouteMeta {
    pub requires_auth: bool,
    /// All listed permissions are required.
    pub permissions: Vec<String>,
    /// At least one listed permission is required. Takes precedence over
    /// `permissions` when both are set.
    pub permissions_any: Vec<String>,
}

/// The navigation target under evaluation.
#[derive(Debug, Clone)]
pub struct RouteTarget {
    pub path: String,
    /// Path plus query, carried through a login redirect so the user lands
    /// where they intended.
    pub full_path: String,
    pub meta: RouteMeta,
}

impl RouteTarget {
    #[must_use]
    pub fn new(path: &str, meta: RouteMeta) -> Self {
        Self {
            path: path.to_string(),
            full_path: path.to_string(),
            meta,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl Redirect {
    #[must_use]
    pub fn to(path: &str) -> Self {
        Self {
            path: path.to_string(),
            query: Vec::new(),
        }
    }
}

/// Outcome of one gate, or of the whole chain. A redirect short-circuits the
/// remaining gates; the router re-evaluates the chain for the new target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(Redirect),
}

pub struct GuardChain<'a> {
    gateway: &'a Gateway,
    context: &'a SessionContext,
    notifier: Arc<dyn Notifier>,
}

impl<'a> GuardChain<'a> {
    #[must_use]
    pub fn new(
        gateway: &'a Gateway,
        context: &'a SessionContext,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            gateway,
            context,
            notifier,
        }
    }

    /// Runs the gates in order, stopping at the first non-Allow decision.
    pub async fn evaluate(&self, target: &RouteTarget) -> GuardDecision {
        if let GuardDecision::Redirect(redirect) = self.authentication_gate(target) {
            return GuardDecision::Redirect(redirect);
        }

        if let GuardDecision::Redirect(redirect) = self.permission_gate(target).await {
            return GuardDecision::Redirect(redirect);
        }

        self.menu_gate(target).await
    }

    /// Authentication gate. Checks the in-memory flag first, then attempts the
    /// one-time restore from persisted state. Unauthenticated access to a
    /// protected route redirects to login carrying the intended path; visiting
    /// login while authenticated redirects to the default landing page.
    fn authentication_gate(&self, target: &RouteTarget) -> GuardDecision {
        let config = self.gateway.config();
        let authenticated = self.is_authenticated();

        if target.meta.requires_auth && !authenticated {
            return GuardDecision::Redirect(Redirect {
                path: config.login_route.clone(),
                query: vec![("redirect".to_string(), target.full_path.clone())],
            });
        }

        if target.path == config.login_route && authenticated {
            return GuardDecision::Redirect(Redirect::to(&config.default_landing));
        }

        GuardDecision::Allow
    }

    fn is_authenticated(&self) -> bool {
        if !self.context.credentials.is_authenticated() {
            self.context.credentials.initialize();
        }
        self.context.credentials.is_authenticated()
    }

    /// Permission gate: all-of over `permissions`, any-of over
    /// `permissions_any`, case-insensitively. Skipped entirely when the route
    /// declares neither.
    async fn permission_gate(&self, target: &RouteTarget) -> GuardDecision {
        let all = &target.meta.permissions;
        let any = &target.meta.permissions_any;

        if all.is_empty() && any.is_empty() {
            return GuardDecision::Allow;
        }

        if let Err(err) = self.context.permissions.fetch(self.gateway).await {
            warn!("permission fetch failed, denying by empty set: {err}");
        }

        let cache = &self.context.permissions;
        let granted = if any.is_empty() {
            all.iter().all(|name| cache.has_permission(name))
        } else {
            any.iter().any(|name| cache.has_permission(name))
        };

        if granted {
            return GuardDecision::Allow;
        }

        self.notifier.notify(NoticeLevel::Error, ACCESS_DENIED_MESSAGE);
        GuardDecision::Redirect(Redirect::to(&self.gateway.config().default_landing))
    }

    /// Menu-membership gate. Open routes are always allowed; everything else
    /// must appear in the user's menu tree. A fetch failure fails open: a
    /// transient menu outage must not lock the user out entirely.
    async fn menu_gate(&self, target: &RouteTarget) -> GuardDecision {
        let config = self.gateway.config();
        let normalized = menu::normalize_path(&target.path);

        if config
            .open_routes
            .iter()
            .any(|route| menu::normalize_path(route) == normalized)
        {
            return GuardDecision::Allow;
        }

        let nodes = match self.context.menu.load(self.gateway).await {
            Ok(nodes) => nodes,
            Err(err) => {
                error!("menu fetch failed, allowing navigation: {err}");
                return GuardDecision::Allow;
            }
        };

        if menu::find_by_path(&nodes, &target.path).is_some() {
            return GuardDecision::Allow;
        }

        warn!("route {} is not in the user's menu, redirecting", target.path);
        self.notifier.notify(NoticeLevel::Error, ACCESS_DENIED_MESSAGE);
        GuardDecision::Redirect(Redirect::to(&config.default_landing))
    }
}
