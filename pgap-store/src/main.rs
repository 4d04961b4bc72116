//! pgap-store - Hybrid assessment store service
//!
//! Serves the assessment lifecycle, aggregates and department maintenance
//! over HTTP. The remote tier is a SQLite database under the root folder;
//! the local cache is a JSON file next to it.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pgap_common::config::{
    write_toml_config, RootFolderInitializer, RootFolderResolver, TomlConfig, DEFAULT_PORT,
};
use pgap_common::time::millis_to_duration;
use pgap_store::adapters::local::{FileBackend, LocalCache};
use pgap_store::adapters::remote::SqliteRemoteStore;
use pgap_store::api::BuildInfo;
use pgap_store::{build_router, db, AppState, HybridStore};
use tokio::signal;
use tracing::{error, info, warn};

/// Command-line arguments for pgap-store
#[derive(Parser, Debug)]
#[command(name = "pgap-store")]
#[command(about = "Hybrid assessment store and aggregation service")]
#[command(version)]
struct Args {
    /// Root folder holding the database and cache file
    #[arg(short, long, env = "PGAP_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Port to listen on [default: 5740]
    #[arg(short, long, env = "PGAP_PORT")]
    port: Option<u16>,

    /// Remote database file [default: {root}/pgap.db]
    #[arg(long, env = "PGAP_REMOTE_DB")]
    remote_db: Option<PathBuf>,

    /// Local cache file [default: {root}/pgap-cache.json]
    #[arg(long, env = "PGAP_CACHE_FILE")]
    cache_file: Option<PathBuf>,

    /// Write the effective configuration to this TOML file and exit
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,
}

fn init_tracing(config: &TomlConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    let log_file = config.logging.file.as_ref().and_then(|path| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| eprintln!("Cannot open log file {}: {}", path.display(), e))
            .ok()
    });

    match log_file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init(),
        None => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load_or_default();

    init_tracing(&config);

    // Build identification first, before any database work
    let build = BuildInfo::current();
    info!("Starting {}", build);
    if build.is_dirty() {
        warn!("Built from a checkout with uncommitted changes");
    }

    let root_folder = RootFolderResolver::new(&config)
        .with_cli_arg(args.root_folder.clone())
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer.ensure_directory_exists()?;
    info!("Root folder: {}", initializer.root().display());

    let db_path = args
        .remote_db
        .or_else(|| config.remote_database.clone())
        .unwrap_or_else(|| initializer.database_path());
    info!("Remote database: {}", db_path.display());

    let cache_path = args
        .cache_file
        .or_else(|| config.cache_file.clone())
        .unwrap_or_else(|| initializer.cache_path());
    let port = args.port.or(config.port).unwrap_or(DEFAULT_PORT);

    if let Some(path) = args.write_config.as_deref() {
        let effective = config.resolved(initializer.root(), &db_path, &cache_path, port);
        write_toml_config(&effective, path)
            .with_context(|| format!("Failed to write configuration to {}", path.display()))?;
        info!("Configuration written to {}", path.display());
        return Ok(());
    }

    let pool = match db::init_database_pool(&db_path).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to open remote database: {}", e);
            return Err(e.into());
        }
    };

    let settings = config.store_settings();
    let remote = Arc::new(SqliteRemoteStore::new(
        pool,
        millis_to_duration(settings.probe_timeout_ms),
    ));

    let local = match FileBackend::open(&cache_path) {
        Ok(backend) => {
            info!("Local cache: {}", cache_path.display());
            LocalCache::new(Arc::new(backend))
        }
        Err(e) => {
            warn!(
                "Local cache file {} unavailable ({}), using in-memory cache",
                cache_path.display(),
                e
            );
            LocalCache::in_memory()
        }
    };

    let store = Arc::new(HybridStore::new(remote, local, settings));
    match store.seed_demo_assessment().await {
        Ok(Some(demo)) => info!("Demo assessment ready: {}", demo.id),
        Ok(None) => {}
        Err(e) => warn!("Demo seeding failed: {}", e),
    }

    let app = build_router(AppState::new(store));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("pgap-store listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
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
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
