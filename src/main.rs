//! Vilux Care: server entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Init logger (`VILUX_LOG_LEVEL` > `RUST_LOG` > config)
//!   4. Build shared state (provider, knowledge lookup, system prompt)
//!   5. Warm the knowledge base
//!   6. Spawn Ctrl-C → shutdown signal watcher
//!   7. Serve the HTTP channel until shutdown

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use vilux_care::{bootstrap, config, error, logger};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), error::AppError> {
    // Load .env if present; the file is optional.
    let _ = dotenvy::dotenv();

    let config = config::load()?;

    let force_level = std::env::var("VILUX_LOG_LEVEL").is_ok();
    logger::init(&config.log_level, force_level)?;

    info!(
        app_name = %config.app_name,
        log_level = %config.log_level,
        provider = %config.llm.provider,
        "config loaded"
    );

    let state = Arc::new(bootstrap::build_state(&config)?);

    let entries = state.knowledge().load().await;
    info!(entries, "knowledge base warm");

    // Shared shutdown token: Ctrl-C cancels it, the channel watches it.
    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received: initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    serve(&config, state, shutdown).await?;

    info!("shutdown complete");
    Ok(())
}

#[cfg(feature = "channel-axum")]
async fn serve(
    config: &config::Config,
    state: Arc<vilux_care::comms::CommsState>,
    shutdown: CancellationToken,
) -> Result<(), error::AppError> {
    use vilux_care::comms::axum_channel::AxumChannel;

    if !config.comms.axum.enabled {
        info!("axum channel disabled: waiting for shutdown");
        shutdown.cancelled().await;
        return Ok(());
    }
    AxumChannel::new("axum0", config.comms.axum.bind.clone(), state)
        .with_chat_body_limit(config.comms.axum.max_body_bytes)
        .run(shutdown)
        .await
}

#[cfg(not(feature = "channel-axum"))]
async fn serve(
    _config: &config::Config,
    _state: Arc<vilux_care::comms::CommsState>,
    shutdown: CancellationToken,
) -> Result<(), error::AppError> {
    info!("built without an HTTP channel: waiting for shutdown");
    shutdown.cancelled().await;
    Ok(())
}
