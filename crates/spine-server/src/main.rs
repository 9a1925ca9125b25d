//! Spine HTTP server.

use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use spine_core::reaper;
use spine_core::storage::JsonJobStore;
use spine_core::{config::Config, JobEngine};
use spine_server::{create_router, ServerState};

/// Spine job queue server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding jobs/, events/, and blobs/
    ///
    /// Can also be set via SPINE_DATA_DIR. Defaults to ./.spine if not specified.
    #[arg(short, long, env = "SPINE_DATA_DIR", default_value = ".spine")]
    data_dir: String,

    /// Address to bind the server to
    #[arg(short, long, env = "SPINE_BIND", default_value = "0.0.0.0:4000")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt().with_target(false).compact().init();

    info!("Starting Spine server...");

    let config = Config::from_env().map_err(|e| {
        anyhow::anyhow!(
            "Failed to load configuration: {e}\n\n\
             Spine requires a bearer token configured for each of head, left-claw,\n\
             and right-claw before it will accept requests."
        )
    })?;

    let store = JsonJobStore::new(&args.data_dir);
    let engine = JobEngine::new(store, config.engine_config())?;
    info!(data_dir = %args.data_dir, "job store initialized");

    let reaper_handle = reaper::spawn(engine.clone(), config.reaper_interval);

    let state = Arc::new(ServerState {
        engine,
        token_roles: config.token_roles,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app: Router = create_router(state)
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    info!("Server listening on http://{}", args.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    reaper_handle.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
