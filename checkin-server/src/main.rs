//! Check-in Server (checkin-server) - Main entry point
//!
//! Accepts athlete check-ins with pose photos and a posing video, stores
//! them per athlete and date, and serves a password-protected coach
//! dashboard.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use checkin_common::config::{load_toml_config, ConfigOverrides};
use checkin_common::{open_gateway, BackendKind, Config};
use checkin_server::notify::{notifier_for, NotificationQueue};
use checkin_server::{build_router, AppState};

/// How long queued notifications may take to drain on shutdown
const NOTIFY_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Command-line arguments for checkin-server
#[derive(Parser, Debug)]
#[command(name = "checkin-server")]
#[command(about = "Athlete check-in intake and coach dashboard")]
#[command(version)]
struct Args {
    /// TOML config file (default: ~/.config/checkin/config.toml)
    #[arg(short, long, env = "CHECKIN_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding uploads/ and the SQLite database
    #[arg(short, long, env = "CHECKIN_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Persistence backend: document or relational
    #[arg(short, long, env = "CHECKIN_BACKEND")]
    backend: Option<BackendKind>,

    /// SQLite database file for the relational backend
    #[arg(long, env = "CHECKIN_DATABASE_PATH")]
    database_path: Option<PathBuf>,

    /// Listen address (host:port)
    #[arg(long, env = "CHECKIN_BIND_ADDR")]
    bind_addr: Option<String>,

    /// Listen on 0.0.0.0 with this port; ignored when --bind-addr is set
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Coach dashboard password; the dashboard is disabled without one
    #[arg(long, env = "CHECKIN_COACH_PASSWORD", hide_env_values = true)]
    coach_password: Option<String>,

    /// Maximum request body in bytes
    #[arg(long, env = "CHECKIN_MAX_UPLOAD_BYTES")]
    max_upload_bytes: Option<usize>,

    /// Reject attachments that are not an allowed image or video type
    #[arg(long, env = "CHECKIN_STRICT_EXTENSIONS")]
    strict_extensions: Option<bool>,

    /// POST a JSON notice here for every accepted check-in
    #[arg(long, env = "CHECKIN_NOTIFY_WEBHOOK_URL")]
    notify_webhook_url: Option<String>,

    /// Notices buffered before new ones are dropped
    #[arg(long, env = "CHECKIN_NOTIFY_QUEUE_CAPACITY")]
    notify_queue_capacity: Option<usize>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            root_folder: self.root_folder.clone(),
            backend: self.backend,
            database_path: self.database_path.clone(),
            bind_addr: self
                .bind_addr
                .clone()
                .or_else(|| self.port.map(|p| format!("0.0.0.0:{}", p))),
            coach_password: self.coach_password.clone(),
            max_upload_bytes: self.max_upload_bytes,
            strict_extensions: self.strict_extensions,
            notify_webhook_url: self.notify_webhook_url.clone(),
            notify_queue_capacity: self.notify_queue_capacity,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "checkin_server=info,checkin_common=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting Check-in Server v{}", env!("CARGO_PKG_VERSION"));

    let toml = load_toml_config(args.config.as_deref()).context("Failed to load config file")?;
    let config = Config::resolve(args.overrides(), toml).context("Invalid configuration")?;

    info!("Root folder: {}", config.root_folder.display());
    info!("Backend: {}", config.backend);
    if config.coach_password.is_none() {
        warn!("No coach password configured; dashboard is disabled");
    }

    tokio::fs::create_dir_all(config.upload_root())
        .await
        .with_context(|| format!("Failed to create {}", config.upload_root().display()))?;

    let gateway = open_gateway(&config)
        .await
        .context("Failed to open check-in storage")?;

    let notifier = notifier_for(config.notify_webhook_url.as_deref())
        .context("Failed to set up notifications")?;
    let (notifications, notify_worker) =
        NotificationQueue::start(notifier, config.notify_queue_capacity);

    let bind_addr = config.bind_addr.clone();
    let app = build_router(AppState::new(config, gateway, notifications));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // The router owned the last queue handle; the worker drains and exits
    if tokio::time::timeout(NOTIFY_DRAIN_TIMEOUT, notify_worker)
        .await
        .is_err()
    {
        warn!("Pending notifications were not delivered before shutdown");
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
