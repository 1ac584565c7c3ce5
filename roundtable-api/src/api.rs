//! API routes definition

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;

/// Build the API router with all endpoints
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Server routes
        .route(
            "/api/servers",
            post(handlers::create_server).get(handlers::list_servers),
        )
        .route(
            "/api/servers/:id",
            get(handlers::get_server)
                .patch(handlers::update_server)
                .delete(handlers::delete_server),
        )
        // Member routes
        .route("/api/servers/:id/members", get(handlers::list_members))
        .route(
            "/api/servers/:id/members/:member_id",
            patch(handlers::change_member_role).delete(handlers::kick_member),
        )
        // Message routes
        .route(
            "/api/servers/:id/messages",
            get(handlers::list_messages).post(handlers::create_message),
        )
        .route(
            "/api/servers/:id/messages/:message_id",
            patch(handlers::edit_message).delete(handlers::delete_message),
        )
        // Invite routes
        .route("/api/invites/:code/join", post(handlers::join_server))
        // Account routes
        .route("/api/account/export", get(handlers::export_account))
        .route("/api/account", delete(handlers::delete_account))
        // State
        .with_state(state)
}
