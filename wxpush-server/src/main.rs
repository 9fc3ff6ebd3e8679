//! WxPush Server - Callback receiver for the WeCom encrypted message protocol.
//!
//! This binary serves one callback path that:
//! - Answers URL verification challenges on GET
//! - Decrypts inbound messages and replies with an encrypted echo on POST

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wxpush::{router, AppState, Config, EchoReply, WxBizMsgCrypt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!(error = %e, "config_invalid");
        e
    })?;
    info!(
        port = config.port,
        callback_path = %config.callback_path,
        receiver_id = %config.receiver_id,
        "config_loaded"
    );

    let crypt = WxBizMsgCrypt::new(
        config.token.clone(),
        &config.encoding_aes_key,
        config.receiver_id.clone(),
    )
    .map_err(|e| {
        error!(error = %e, code = e.code(), "crypto_init_failed");
        e
    })
    .context("Invalid callback crypto configuration")?;

    let replier = EchoReply::new(config.reply_prefix.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let callback_path = config.callback_path.clone();

    let state = AppState::new(config, Arc::new(crypt), Arc::new(replier));
    let app = router(state);

    // Bind to address
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| {
            error!(address = %addr, error = %e, "web_server_bind_failed");
            e
        })
        .context("Failed to bind to address")?;

    info!(address = %addr, callback_path = %callback_path, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
