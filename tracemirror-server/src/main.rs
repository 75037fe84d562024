//! # tracemirror server
//!
//! Mirrors the Lightstep service directory into PostgreSQL and publishes
//! exemplar span ids from saved streams to Redis on a minute-of-hour
//! schedule.
//!
//! ## Commands
//!
//! - *(default)*: run the sync driver (when enabled) and serve the HTTP API
//! - `db migrate`: apply registry migrations and exit
//! - `sync once`: run a single pass of both tracks, print the summary, exit

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracemirror_config::{Config, ConfigLoad, ConfigLoader};
use tracemirror_core::{
    ports::RegistryStore,
    sync::{DriverState, SyncStatus, SyncStatusHandle},
};
use tracemirror_server::{
    AppState, create_app,
    infra::startup::{build_driver, connect_registry},
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "tracemirror-server")]
#[command(
    about = "Keeps a service registry in step with Lightstep and fans out exemplar traces"
)]
struct Cli {
    /// Path to a tracemirror.toml file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(ClapArgs, Debug, Clone)]
struct ServeArgs {
    /// Server port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long)]
    host: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(subcommand)]
    Db(DbCommand),
    #[command(subcommand)]
    Sync(SyncCommand),
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Apply database migrations and exit
    Migrate,
}

#[derive(Debug, Subcommand)]
enum SyncCommand {
    /// Run one pass of both tracks and exit
    Once,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_runtime_config(&cli)?;

    match cli.command {
        Some(Command::Db(DbCommand::Migrate)) => run_db_migrate(&config).await,
        Some(Command::Sync(SyncCommand::Once)) => run_sync_once(&config).await,
        None => run_server(config).await,
    }
}

fn load_runtime_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_config_path(path);
    }
    let ConfigLoad {
        mut config,
        warnings,
    } = loader.load().context("failed to load configuration")?;

    if let Some(port) = cli.serve.port {
        config.server.port = port;
    }
    if let Some(host) = cli.serve.host.clone() {
        config.server.host = host;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                // Override via RUST_LOG.
                "info,tracemirror_core=info,tower_http=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration file loaded");
    }

    for warning in warnings.iter() {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => {
                warn!(message = %warning.message, "configuration warning")
            }
        }
    }

    info!(
        sync.enabled = config.sync.enabled,
        sync.interval_minutes = config.sync.interval_minutes,
        sync.lookback_secs = config.sync.stream_lookback.as_secs(),
        sync.range_secs = config.sync.stream_range.as_secs(),
        sync.max_concurrent_streams = config.sync.max_concurrent_streams,
        sync.topic = %config.sync.topic,
        "synchronization configuration in effect"
    );

    Ok(config)
}

async fn run_db_migrate(config: &Config) -> anyhow::Result<()> {
    connect_registry(config).await?;
    info!("Database migrations applied");
    Ok(())
}

async fn run_sync_once(config: &Config) -> anyhow::Result<()> {
    let registry: Arc<dyn RegistryStore> = connect_registry(config).await?;
    let driver = build_driver(config, registry).await?;

    let summary = driver.trigger_pass().await.join().await;
    println!(
        "{}",
        serde_json::to_string_pretty(&summary)
            .context("failed to render pass summary")?
    );

    if summary.had_errors() {
        anyhow::bail!("synchronization pass {} had errors", summary.pass_id);
    }
    Ok(())
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    let registry: Option<Arc<dyn RegistryStore>> =
        if config.sync.enabled || config.database.url.is_some() {
            Some(connect_registry(&config).await? as Arc<dyn RegistryStore>)
        } else {
            None
        };

    let driver = match (&registry, config.sync.enabled) {
        (Some(registry), true) => {
            Some(build_driver(&config, Arc::clone(registry)).await?)
        }
        _ => None,
    };

    let sync_status = match &driver {
        Some(driver) => driver.status(),
        None => SyncStatusHandle::new(SyncStatus::new(
            DriverState::Disabled,
            config.sync.interval_minutes,
        )),
    };

    if let Some(driver) = &driver {
        driver.start().await;
    } else {
        info!("Synchronization disabled; serving the registry only");
    }

    let app = create_app(AppState::new(registry, sync_status));
    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Starting tracemirror server on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    if let Some(driver) = driver {
        driver.shutdown().await;
    }
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for Ctrl-C; shutting down");
        return;
    }
    info!("Ctrl-C received; shutting down");
}
