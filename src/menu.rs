//! Menu tree: the server-provided navigable structure and the path
//! normalization shared between tree construction and guard matching.
//!
//! A node lacking both a path and descendants is pruned. A node marked
//! non-navigable (`IsMenu` false) is elided, but its navigable descendants are
//! hoisted to the parent's level, flattening invisible groupings.

use crate::endpoints;
use crate::error::GatewayError;
use crate::gateway::Gateway;
use serde::Deserialize;
use std::sync::Mutex;
use tracing::debug;

/// Normalizes a path so server and route-table spellings compare equal:
/// lowercase, leading `/api` / `api/` segments stripped, exactly one leading
/// slash. Only whole segments are stripped (`/apikeys` keeps its prefix), and
/// stripping repeats until no segment remains so the function is idempotent.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let mut normalized = path.trim().to_lowercase();

    loop {
        if let Some(rest) = normalized.strip_prefix("/api") {
            if rest.is_empty() || rest.starts_with('/') {
                normalized = rest.to_string();
                continue;
            }
        }
        if let Some(rest) = normalized.strip_prefix("api/") {
            normalized = rest.to_string();
            continue;
        }
        break;
    }

    if !normalized.starts_with('/') {
        normalized.insert(0, '/');
    }

    normalized
}

/// Server shape of one menu entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawMenuItem {
    pub public_id: String,
    pub title: String,
    pub path: Option<String>,
    pub icon: Option<String>,
    pub is_menu: bool,
    pub children: Vec<RawMenuItem>,
}

impl Default for RawMenuItem {
    fn default() -> Self {
        Self {
            public_id: String::new(),
            title: String::new(),
            path: None,
            icon: None,
            is_menu: true,
            children: Vec::new(),
        }
    }
}

/// One navigable node. `path` is stored normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuNode {
    pub id: String,
    pub label: String,
    pub icon: Option<String>,
    pub path: Option<String>,
    pub children: Vec<MenuNode>,
}

/// Builds the visible tree from the server structure, pruning empty nodes and
/// hoisting children of non-navigable groupings.
#[must_use]
pub fn build_menu(items: &[RawMenuItem]) -> Vec<MenuNode> {
    let mut nodes = Vec::new();

    for item in items {
        let (node, hoisted) = convert(item);
        if let Some(node) = node {
            nodes.push(node);
        }
        nodes.extend(hoisted);
    }

    nodes
}

/// Returns the converted node plus any descendants hoisted past an elided
/// grouping, destined for the caller's level.
fn convert(item: &RawMenuItem) -> (Option<MenuNode>, Vec<MenuNode>) {
    let mut children = Vec::new();
    for child in &item.children {
        let (node, hoisted) = convert(child);
        if let Some(node) = node {
            children.push(node);
        }
        children.extend(hoisted);
    }

    let path = item
        .path
        .as_deref()
        .filter(|path| !path.trim().is_empty())
        .map(normalize_path);

    if !item.is_menu {
        // Elide the grouping itself, hoist whatever survived below it.
        return (None, children);
    }

    if path.is_none() && children.is_empty() {
        return (None, Vec::new());
    }

    (
        Some(MenuNode {
            id: item.public_id.clone(),
            label: item.title.clone(),
            icon: item.icon.clone(),
            path,
            children,
        }),
        Vec::new(),
    )
}

/// Depth-first search for a node whose navigable path matches the requested
/// path after normalization.
#[must_use]
pub fn find_by_path<'a>(nodes: &'a [MenuNode], path: &str) -> Option<&'a MenuNode> {
    let wanted = normalize_path(path);

    for node in nodes {
        if node.path.as_deref() == Some(wanted.as_str()) {
            return Some(node);
        }
        if let Some(found) = find_by_path(&node.children, path) {
            return Some(found);
        }
    }

    None
}

/// Session-scoped menu cache with a single-flight fetch.
pub struct MenuCache {
    nodes: Mutex<Vec<MenuNode>>,
    fetch_lock: tokio::sync::Mutex<()>,
}

impl Default for MenuCache {
    fn default() -> Self {
        Self {
            nodes: Mutex::new(Vec::new()),
            fetch_lock: tokio::sync::Mutex::new(()),
        }
    }
}

impl MenuCache {
    /// Returns the cached tree, fetching it first if empty.
    ///
    /// # Errors
    /// Returns the gateway error; the cache stays empty so a later navigation
    /// retries.
    pub async fn load(&self, gateway: &Gateway) -> Result<Vec<MenuNode>, GatewayError> {
        {
            let nodes = self.nodes.lock().expect("menu poisoned");
            if !nodes.is_empty() {
                return Ok(nodes.clone());
            }
        }

        let _guard = self.fetch_lock.lock().await;
        {
            let nodes = self.nodes.lock().expect("menu poisoned");
            if !nodes.is_empty() {
                return Ok(nodes.clone());
            }
        }

        let items: Vec<RawMenuItem> = gateway.get_json(endpoints::MENU_MY_TREE).await?;
        let built = build_menu(&items);
        debug!("loaded menu tree with {} top-level nodes", built.len());

        *self.nodes.lock().expect("menu poisoned") = built.clone();
        Ok(built)
    }

    #[must_use]
    pub fn cached(&self) -> Vec<MenuNode> {
        self.nodes.lock().expect("menu poisoned").clone()
    }

    pub fn clear(&self) {
        self.nodes.lock().expect("menu poisoned").clear();
    }
}
