use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::handlers::{
    chat, create_session, delete_session, get_session, health_check, upload_image,
};
use crate::state::AppState;

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

pub fn create_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/api/health", get(health_check))

        // Sessions
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/chat", post(chat))
        .route(
            "/api/sessions/:id/upload",
            post(upload_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
}
