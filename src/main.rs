//! Scoreboard auth - bearer credentials for the HPL scoreboard API

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scoreboard_auth::{config::Args, server, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("scoreboard_auth={},info", log_level).into()),
        )
        .with(args.log_json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!args.log_json).then(tracing_subscriber::fmt::layer))
        .init();

    args.validate().context("invalid configuration")?;

    info!("======================================");
    info!("  Scoreboard auth");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Token duration: {}s", args.token_duration_seconds);
    info!("CORS origins: {}", args.cors_allowed_origins.join(", "));
    info!("======================================");

    let state = Arc::new(AppState::from_args(args).context("cannot create token maker")?);

    server::run(state)
        .await
        .inspect_err(|e| error!("Server error: {:?}", e))
        .context("server error")
}
