use crate::api::context::AppState;
use anyhow::Context;
use axum::{routing::post, Router};
use tower_http::trace::TraceLayer;

mod callback;
pub mod context;
mod health;

pub use health::ROOT_BANNER;

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/callback", post(callback::callback_handler))
        .with_state(app_state)
        .merge(health::router())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(bind_address: &str, app_state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("failed to bind to {}", bind_address))?;

    tracing::info!("🚀 line-storybot listening on {}", bind_address);

    axum::serve(listener, router(app_state).into_make_service())
        .await
        .context("error starting service")
}
