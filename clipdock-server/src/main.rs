//! # Clipdock Server
//!
//! Local ingest broker for sandboxed editing-app panels.
//!
//! ## Overview
//!
//! Clipdock watches configured folders for finished media files, batches
//! arrivals per target, and queues import jobs that consumer panels pull
//! over plain HTTP:
//!
//! - **Folder Sync**: Debounced per-target batching with a content-hash
//!   ledger so files import once, confirmed by the consumer.
//! - **Job Broker**: Pull-only delivery gated on a fresh active-project
//!   report from the consumer.
//! - **Downloads Intake**: Optional one-shot imports from the user's
//!   download directory into the last-known open project.

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clipdock_core::{DownloadsWatcher, ExtensionClassifier};
use clipdock_server::{Config, build_app_state, create_app};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "clipdock-server")]
#[command(about = "Local ingest broker serving pull-based import jobs to editing-app panels")]
struct Cli {
    /// Server port (overrides config)
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,

    /// Watch-target state file (overrides config)
    #[arg(long, env = "CLIPDOCK_STATE_PATH")]
    state_path: Option<PathBuf>,

    /// Downloads directory for one-shot intake (overrides config)
    #[arg(long, env = "CLIPDOCK_DOWNLOADS_DIR")]
    downloads_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_file_loaded = dotenvy::dotenv().is_ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if env_file_loaded {
        info!("loaded .env file");
    }

    let mut config = Config::from_env().context("failed to load configuration")?;
    if let Some(port) = cli.port {
        config.server_port = port;
    }
    if let Some(host) = cli.host {
        config.server_host = host;
    }
    if let Some(state_path) = cli.state_path {
        config.state_path = state_path;
    }
    if let Some(downloads_dir) = cli.downloads_dir {
        config.downloads_dir = Some(downloads_dir);
    }

    info!(
        sync.debounce_ms = config.ingest.sync.debounce_ms,
        sync.max_batch_files = config.ingest.sync.max_batch_files,
        broker.freshness_window_secs = config.ingest.broker.freshness_window_secs,
        broker.sent_job_ttl_secs = config.ingest.broker.sent_job_ttl_secs,
        "ingest configuration in effect"
    );
    info!(state = %config.state_path.display(), "watch-target state document");

    let downloads_config = config.downloads_config();
    let downloads_watch_config = config.downloads_watch_config();
    let broker_ttl = config.broker_config().sent_job_ttl;

    let state = build_app_state(config).await?;

    // Resume watching everything that was enabled before the restart.
    state.sync_engine.start_enabled_targets().await;

    let downloads_watcher = match downloads_config {
        Some(downloads) => {
            if downloads.dir.is_dir() {
                Some(
                    DownloadsWatcher::start(
                        downloads,
                        Arc::clone(&state.broker),
                        Arc::new(ExtensionClassifier::default()),
                        downloads_watch_config,
                    )
                    .await?,
                )
            } else {
                warn!(dir = %downloads.dir.display(), "downloads directory missing, intake disabled");
                None
            }
        }
        None => None,
    };

    // Unacknowledged sent jobs age out on a fraction of their TTL so
    // redelivery does not wait for the next poll to notice.
    let sweep_broker = Arc::clone(&state.broker);
    let sweep_task = tokio::spawn(async move {
        let interval = broker_ttl.min(Duration::from_secs(60)).max(Duration::from_secs(1));
        loop {
            tokio::time::sleep(interval).await;
            let expired = sweep_broker.expire_sent().await;
            if expired > 0 {
                info!(expired, "expired unacknowledged jobs");
            }
        }
    });

    let addr: SocketAddr = format!(
        "{}:{}",
        state.config.server_host, state.config.server_port
    )
    .parse()
    .context("invalid server host/port")?;

    let app = create_app(state.clone());

    info!("Starting Clipdock Server on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down");
    sweep_task.abort();
    if let Some(watcher) = downloads_watcher {
        watcher.stop();
    }
    state.sync_engine.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => warn!(error = %err, "failed to install sigterm handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
