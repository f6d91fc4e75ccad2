mod health;
mod report;

use axum::{Router, routing::get};
use health::health_router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(report::index).post(report::analyze))
        .nest("/health", health_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
