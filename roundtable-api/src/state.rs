//! Shared application state for the HTTP API

use roundtable_core::config::Config;
use roundtable_core::core_identity::IdentityResolver;
use roundtable_core::core_invite::InviteResolver;
use roundtable_core::core_server::ServerManager;
use roundtable_core::core_timeline::Timeline;
use roundtable_core::ChatStore;
use std::sync::Arc;

/// Application state shared across all request handlers.
///
/// Every component borrows the same store; the state itself is wrapped
/// in an `Arc` by the router and cloned per request.
pub struct AppState {
    pub identity: IdentityResolver,
    pub servers: ServerManager,
    pub invites: InviteResolver,
    pub timeline: Timeline,
}

impl AppState {
    pub fn new(store: Arc<ChatStore>, config: &Config) -> Self {
        AppState {
            identity: IdentityResolver::new(store.clone()),
            servers: ServerManager::new(store.clone()),
            invites: InviteResolver::new(store.clone()),
            timeline: Timeline::new(
                store,
                config.timeline.max_skew,
                config.timeline.page_limit,
            ),
        }
    }
}
