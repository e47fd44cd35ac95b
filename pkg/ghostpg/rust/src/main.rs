// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use anyhow::{Context, Result};
use ghost_postgres::{Config, GhostPostgres, LogSink, config_path, load_config};
use log::{info, warn};
use tokio::signal::unix::{SignalKind, signal};

#[tokio::main]
async fn main() -> Result<()> {
    simple_logger::init_with_level(log::Level::Info)?;
    info!(
        "ghost-postgres starting (version {})",
        env!("CARGO_PKG_VERSION")
    );

    let mut config = match config_path() {
        Some(path) => {
            info!("loading config from {}", path.display());
            load_config(&path)?
        }
        None => Config::default(),
    };
    config.log_sink = LogSink::Log {
        level: log::Level::Info,
    };

    let mut gp = GhostPostgres::new(config).context("building controller")?;
    if let Err(e) = gp.prepare().await {
        if let Err(cleanup) = gp.terminate().await {
            warn!("cleanup after failed prepare: {cleanup}");
        }
        return Err(e).context("preparing postgres");
    }

    info!("url: {}", gp.url());
    info!("conn string: {}", gp.conn_string());

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }

    info!("ghost-postgres shutting down");
    gp.terminate().await.context("terminating postgres")?;
    Ok(())
}
