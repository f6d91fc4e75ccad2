use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::state::{AppState, RunSummary};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    running_runs: usize,
    runs: Vec<RunSummary>,
}

pub fn health_router() -> Router<AppState> {
    Router::new()
        .route("/live", get(live))
        .route("/ready", get(ready))
}

async fn live(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(build_response("ok", &state))
}

// The agent runner is built before the router, so a serving process is ready.
async fn ready(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(build_response("ready", &state))
}

fn build_response(status: &'static str, state: &AppState) -> HealthResponse {
    let runs = state.runs().snapshot();
    HealthResponse {
        status,
        running_runs: runs.len(),
        runs,
    }
}
