use axum::{routing::get, Router};

pub const ROOT_BANNER: &str = "LINE GPT Webhook is running!";

pub async fn root_handler() -> &'static str {
    ROOT_BANNER
}

/// Health check
pub async fn health_handler() -> &'static str {
    "healthy"
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
}
