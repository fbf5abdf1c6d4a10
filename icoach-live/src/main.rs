//! icoach-live - Main entry point
//!
//! Live interview coaching microservice: one WebSocket session per candidate,
//! shared worker pool for model-bound analysis, SQLite session store.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use icoach_common::config::load_or_default;
use icoach_live::providers::Providers;
use icoach_live::session::SessionServices;
use icoach_live::store::{DetachedSessionStore, SessionStore, SqliteSessionStore};
use icoach_live::AppState;

const MODULE_NAME: &str = "icoach-live";

/// Command-line arguments for icoach-live
#[derive(Parser, Debug)]
#[command(name = "icoach-live")]
#[command(about = "Live interview coaching microservice")]
#[command(version)]
struct Args {
    /// TOML config file (default: <config_dir>/icoach/icoach-live.toml)
    #[arg(short, long, env = "ICOACH_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:8000
    #[arg(short, long, env = "ICOACH_BIND")]
    bind: Option<String>,

    /// SQLite database file
    #[arg(short, long, env = "ICOACH_DATABASE")]
    database: Option<PathBuf>,

    /// API key for the chat-completions and transcription backends
    #[arg(long, env = "ICOACH_LLM_API_KEY", hide_env_values = true)]
    llm_api_key: Option<String>,

    /// Question dataset (JSON)
    #[arg(long, env = "ICOACH_QUESTIONS")]
    questions: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_or_default(args.config.as_deref(), MODULE_NAME)
        .context("Failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(database) = args.database {
        config.database.path = database;
    }
    if let Some(key) = args.llm_api_key {
        config.providers.llm.api_key = Some(key);
    }
    if let Some(questions) = args.questions {
        config.questions_path = Some(questions);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},tower_http=info", config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting {} v{} [{}] built {} ({})",
        MODULE_NAME,
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
    );
    info!("Embedded question branches: {}", env!("QUESTION_BRANCHES"));
    info!("Database: {}", config.database.path.display());
    info!("Worker pool size: {}", config.worker_pool.size);

    let store: Arc<dyn SessionStore> = match SqliteSessionStore::open(&config.database.path).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!("Session store unavailable, running detached: {}", e);
            Arc::new(DetachedSessionStore::new(e.to_string()))
        }
    };

    let providers = Providers::from_config(&config).context("Failed to initialize providers")?;
    let services = SessionServices::new(&config, providers, store);
    let registry = services.registry.clone();
    let pool = services.pool.clone();

    let app = icoach_live::build_router(AppState::new(services));

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.bind))?;
    info!("Listening on http://{}", config.server.bind);
    info!("Interview socket: ws://{}/ws/interview", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let cancelled = registry.shutdown_all("Server shutting down").await;
            info!(sessions = cancelled, "Live sessions notified");
            pool.close();
        })
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
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
