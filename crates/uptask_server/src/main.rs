//! Server entry point.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use uptask_core::{init_logging, open_db, open_db_in_memory, LogMailer};
use uptask_server::{router, AppState, ServerConfig, SessionKeys};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::parse();
    config.validate().context("invalid configuration")?;
    init_logging(config.log_level(), config.log_dir.as_deref())
        .context("failed to initialize logging")?;

    let conn = if config.is_in_memory() {
        open_db_in_memory()
    } else {
        open_db(&config.database)
    }
    .with_context(|| format!("failed to open database `{}`", config.database))?;

    let sessions = SessionKeys::new(
        config.session_secret.as_bytes(),
        Duration::from_secs(config.session_ttl_hours * 3600),
    );
    let mailer = Arc::new(LogMailer::new(config.frontend_url.clone()));
    let state = AppState::new(conn, sessions, mailer, config.secure_cookies)
        .with_allowed_origins(config.cors_origins());

    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    info!(
        "event=server_start module=server status=ok listen={} version={}",
        config.listen,
        uptask_core::core_version()
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("event=server_stop module=server status=ok");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
