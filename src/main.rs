use anyhow::Context;
use clap::Parser; // for cli
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shimmy_gateway::config::Args;
use shimmy_gateway::{AppState, create_router};

// this is main async function with tokio
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // parse cli arguments
    let args = Args::parse();

    // creating shared state
    let state = Arc::new(AppState::from_args(&args).context("failed to build HTTP client")?);
    let app = create_router(state.clone());

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("{}", "=".repeat(70));
    info!("Shimmy gateway listening on: {addr}");
    info!("Forwarding to Shimmy at: {}", state.backend.base_url());
    info!("Models directory: {}", state.downloads.models_dir().display());
    info!("Completions mode: {:?}", args.completions_mode);
    info!("Endpoints:");
    info!("  /v1/health     -> /health");
    info!("  /v1/generate   -> /api/generate");
    info!("  /v1/models     -> /v1/models");
    info!("  /v1/completions, /v1/chat/completions -> /api/generate");
    info!("  /v1/api/pull   -> download GGUF models from HuggingFace");
    info!("{}", "=".repeat(70));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
