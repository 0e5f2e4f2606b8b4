//! Strata data node daemon

use anyhow::{Result, bail};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use strata_auth::JwtTokens;
use strata_dataserver::config::{BackendKind, Config};
use strata_dataserver::{AppState, AuthState, router};
use strata_storage::{LocalFsBackend, MemoryBackend, StorageBackend};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "strata-dataserver")]
#[command(about = "Strata data node")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/strata/dataserver.toml")]
    config: String,

    /// Listen address for the data API
    #[arg(short, long)]
    listen: Option<String>,

    /// Storage backend
    #[arg(long, value_enum)]
    backend: Option<BackendKind>,

    /// Folder holding user files (local backend)
    #[arg(long)]
    data_dir: Option<String>,

    /// Folder for in-flight uploads (local backend)
    #[arg(long)]
    temp_dir: Option<String>,

    /// Upload size ceiling in bytes
    #[arg(long)]
    max_file_size: Option<u64>,

    /// Secret used to verify bearer tokens
    #[arg(long, env = "STRATA_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = Config::load(&args.config)?;

    // Merge CLI args with config file (CLI takes precedence)
    let listen = args.listen.unwrap_or(config.server.listen);
    let backend_kind = args.backend.unwrap_or(config.storage.backend);
    let data_dir = args.data_dir.unwrap_or(config.storage.data_dir);
    let temp_dir = args.temp_dir.unwrap_or(config.storage.temp_dir);
    if let Some(max) = args.max_file_size {
        config.upload.max_file_size = max;
    }
    let jwt_secret = args.jwt_secret.or(config.auth.jwt_secret);
    let log_level = if args.log_level == "info" {
        config.logging.level
    } else {
        args.log_level
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Strata data node");
    info!("Config file: {}", args.config);

    let Some(jwt_secret) = jwt_secret.filter(|s| !s.is_empty()) else {
        bail!("no token secret configured; set --jwt-secret or [auth] jwt_secret");
    };

    let backend: Arc<dyn StorageBackend> = match backend_kind {
        BackendKind::Local => Arc::new(LocalFsBackend::new(&data_dir, &temp_dir).await?),
        BackendKind::Memory => {
            warn!("Using the in-memory backend; files are lost on restart");
            Arc::new(MemoryBackend::new())
        }
    };
    info!("Upload size limit: {} bytes", config.upload.max_file_size);

    // validity only matters for issuing; this node verifies
    let tokens = JwtTokens::new(jwt_secret.as_bytes(), Duration::from_secs(3600));
    let app = router(
        AppState::new(backend, config.upload),
        AuthState::new(Arc::new(tokens)),
    );

    let addr: SocketAddr = listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address {}: {}", listen, e))?;

    info!("Starting data API server on {}", addr);
    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down...");
        })
        .await?;

    info!("Data node shut down gracefully");
    Ok(())
}
