use axum::{
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;

use crate::handlers::api::{
    add_block, close_session, delete_block, get_changes, get_session, open_session,
    reload_session, save_session, set_block_context, update_block, AppState,
};
use crate::handlers::health::health_check;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let session_routes = Router::new()
        .route("/sessions", post(open_session))
        .route("/sessions/:session_id", get(get_session).delete(close_session))
        .route("/sessions/:session_id/blocks", post(add_block))
        .route(
            "/sessions/:session_id/blocks/:block_id",
            patch(update_block).delete(delete_block),
        )
        .route(
            "/sessions/:session_id/blocks/:block_id/context",
            put(set_block_context),
        )
        .route("/sessions/:session_id/changes", get(get_changes))
        .route("/sessions/:session_id/save", post(save_session))
        .route("/sessions/:session_id/reload", post(reload_session));

    Router::new()
        .route("/health", get(health_check))
        .merge(session_routes)
        .with_state(app_state)
}
