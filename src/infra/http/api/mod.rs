pub mod error;
pub mod handlers;
pub mod state;

pub use state::ApiState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub fn build_api_router(state: ApiState) -> Router {
    Router::new()
        .route("/api", get(handlers::api_index))
        .route("/api/convert/html", post(handlers::convert_html))
        .route("/api/convert/email", post(handlers::convert_email))
        .route("/api/convert/wechat", post(handlers::convert_wechat))
        .route("/api/convert/plain", post(handlers::convert_plain))
        .route("/api/convert/templates", get(handlers::list_templates))
        .route("/api/stats", post(handlers::stats))
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
