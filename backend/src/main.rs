//! Main entry point for the Keygate backend.
//!
//! Parses the command line, initializes tracing, loads configuration, picks
//! the storage and notification backends and serves the router until a
//! shutdown signal arrives.

use adapters::{
    HttpMailer, HttpMailerConfig, InMemoryDirectory, LogNotifier, NotificationSender,
    UserDirectory,
};
use anyhow::Context;
use backend::config::{AppConfig, NotifierKind, StorageKind};
use backend::database::{self, PgDirectory};
use backend::{build_router, AppState};
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "keygate")]
#[command(about = "Account registration, activation and login service", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "KEYGATE_CONFIG")]
    config: Option<String>,

    /// Log level, overrides LOG_LEVEL
    #[arg(long)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    json: bool,
}

fn init_tracing(level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.to_string().into());

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn open_directory(config: &AppConfig) -> anyhow::Result<Arc<dyn UserDirectory>> {
    match config.storage {
        StorageKind::Memory => {
            tracing::warn!("using in-memory storage; accounts are lost on restart");
            Ok(Arc::new(InMemoryDirectory::new()))
        }
        StorageKind::Postgres => {
            let pool = database::connect(config)
                .await
                .context("connecting to PostgreSQL")?;
            database::init_schema(&pool)
                .await
                .context("initializing database schema")?;
            Ok(Arc::new(PgDirectory::new(pool)))
        }
    }
}

fn build_notifier(config: &AppConfig) -> anyhow::Result<Arc<dyn NotificationSender>> {
    match config.notifier {
        NotifierKind::Log => Ok(Arc::new(LogNotifier)),
        NotifierKind::Http => {
            let mailer = HttpMailer::new(HttpMailerConfig {
                api_url: config.mail_api_url.clone(),
                api_key: config.mail_api_key.clone(),
                from_email: config.mail_from_email.clone(),
                from_name: config.mail_from_name.clone(),
                timeout: config.outbound_timeout(),
            })
            .context("configuring activation mailer")?;
            Ok(Arc::new(mailer))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_tracing(level, cli.json || config.log_json);
    tracing::debug!(?config, "configuration loaded");

    let directory = open_directory(&config).await?;
    let notifier = build_notifier(&config)?;
    let state = AppState::new(&config, directory, notifier)?;
    let app = build_router(state);

    let addr = config.listen_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!("keygate listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    tracing::info!("keygate shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(%err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received terminate signal, shutting down"),
    }
}
