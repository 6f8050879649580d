//! ruach-studio - recording session orchestration service
//!
//! Tracks multi-angle recording sessions from ingestion through sync,
//! transcription and editing to published renders. HTTP REST + SSE.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ruach_common::config::{RootFolderInitializer, RootFolderResolver};
use ruach_common::events::EventBus;
use ruach_studio::config::{StudioConfig, MODULE_NAME};
use ruach_studio::{AppState, Collaborators};

#[derive(Debug, Parser)]
#[command(name = "ruach-studio", version, about = "Recording session orchestration service")]
struct Args {
    /// Root folder holding the database, configuration and media
    #[arg(long, env = "RUACH_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Port override (default from ruach-studio.toml)
    #[arg(long, env = "RUACH_STUDIO_PORT")]
    port: Option<u16>,

    /// Bind address override
    #[arg(long, env = "RUACH_STUDIO_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ruach_studio=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();

    info!("Starting {} v{} ({})", MODULE_NAME, env!("CARGO_PKG_VERSION"), env!("GIT_HASH"));

    // Root folder: CLI → env → ~/.config/ruach/config.toml → OS default
    let root_folder = RootFolderResolver::new(MODULE_NAME)
        .with_cli_arg(args.root_folder)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let config_path = initializer.service_config_path(MODULE_NAME);
    let mut config = StudioConfig::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = ruach_studio::db::init_database_pool(&db_path).await?;

    let interrupted = ruach_studio::db::fail_stale_transcripts(&db_pool).await?;
    if interrupted > 0 {
        warn!(count = interrupted, "Marked transcripts interrupted by a previous run as failed");
    }

    let event_bus = EventBus::new(config.server.event_capacity);
    let collaborators = Collaborators::from_config(&config, initializer.root_folder())
        .context("Failed to configure transcription provider")?;
    let address = format!("{}:{}", config.server.bind_address, config.server.port);

    let state = AppState::new(db_pool, event_bus, config, collaborators);
    let _sweeper = state.rate_limiter.spawn_sweeper();

    let app = ruach_studio::build_router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Listening on http://{}", address);
    info!("Health check: http://{}/health", address);

    axum::serve(listener, app).await?;

    Ok(())
}
