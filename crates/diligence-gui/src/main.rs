use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use diligence_core::{AgentConfig, build_agent};
use diligence_gui::config::AppConfig;
use diligence_gui::routes;
use diligence_gui::state::AppState;
use diligence_gui::telemetry::init_tracing;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let config = AppConfig::from_env()?;
    let agent_config = AgentConfig::from_env()?;
    let agent = build_agent(&agent_config)?;
    info!(
        model = %agent_config.model,
        max_iterations = agent_config.max_iterations,
        "agent configured"
    );

    let state = AppState::try_new(&config, Arc::new(agent))?;
    let runs = state.runs();
    let app: Router = routes::build_router(state);

    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!(address = %config.listen_addr, "diligence-gui listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            runs.cancel_all();
        })
        .await
        .map_err(|err| {
            error!(error = %err, "server shutdown with error");
            err
        })?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            stream.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}
