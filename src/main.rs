use anyhow::{Context, Result};
use borealis_sync::background_jobs::jobs::PeriodicSyncJob;
use borealis_sync::background_jobs::SyncScheduler;
use borealis_sync::config::{AppConfig, CliConfig, FileConfig};
use borealis_sync::{metrics, InMemorySettings, JellyfinClient, SqliteRepository, SyncService};
use borealis_sync::{Repository, SyncResult};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Its values override the flags below.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite database file.
    #[clap(long)]
    pub db_path: Option<PathBuf>,

    /// Media server host, optionally with scheme and port.
    #[clap(long)]
    pub jellyfin_host: Option<String>,

    /// Media server port.
    #[clap(long)]
    pub jellyfin_port: Option<String>,

    /// API key sent with every request.
    #[clap(long, env = "JELLYFIN_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Seconds between periodic syncs.
    #[clap(long)]
    pub sync_interval_secs: Option<i64>,

    /// Timeout in seconds for a single remote request.
    #[clap(long)]
    pub timeout_secs: Option<u64>,

    /// Run the initial sync (metadata with auto-tracking, full activity) and exit.
    #[clap(long, conflicts_with = "once")]
    pub initial: bool,

    /// Run one periodic sync and exit.
    #[clap(long)]
    pub once: bool,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_path: self.db_path.clone(),
            jellyfin_host: self.jellyfin_host.clone(),
            jellyfin_port: self.jellyfin_port.clone(),
            api_key: self.api_key.clone(),
            sync_interval_secs: self.sync_interval_secs,
            timeout_secs: self.timeout_secs,
        }
    }
}

fn log_metrics_snapshot() {
    info!("Metrics at exit:\n{}", metrics::encode_metrics());
}

fn report(result: &SyncResult) -> Result<()> {
    log_metrics_snapshot();
    if result.success {
        return Ok(());
    }
    for err in &result.errors {
        warn!("  {}", err);
    }
    anyhow::bail!("Sync finished {}", result.outcome.as_str())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    info!(
        "borealis-sync {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("BOREALIS_GIT_HASH")
    );

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    metrics::init_metrics();

    info!("Opening SQLite database at {:?}...", config.db_path);
    let repository = Arc::new(SqliteRepository::new(&config.db_path)?);
    match repository.mark_stale_tasks_failed() {
        Ok(count) if count > 0 => info!("Marked {} stale sync tasks as failed", count),
        Ok(_) => {}
        Err(e) => error!("Failed to mark stale sync tasks: {:#}", e),
    }

    let settings = Arc::new(InMemorySettings::new(config.server.clone()));
    let client = JellyfinClient::new(settings, config.timeout, config.retry_policy.clone())?;
    let service = Arc::new(SyncService::new(
        Arc::new(client),
        repository,
        config.sync.clone(),
    ));

    if cli_args.initial {
        return report(&service.sync_initial().await);
    }
    if cli_args.once {
        return report(&service.sync_periodic().await);
    }

    match service.validate_connection().await {
        Ok(info) => info!(
            "Connected to {} (version {})",
            info.server_name.as_deref().unwrap_or("media server"),
            info.version.as_deref().unwrap_or("unknown")
        ),
        Err(e) => warn!("Media server not reachable yet: {}", e),
    }

    let job = Arc::new(PeriodicSyncJob::new(Arc::clone(&service)));
    let scheduler = SyncScheduler::new(job, config.server.sync_interval_secs);
    scheduler.start();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown requested");
    scheduler.stop().await;
    log_metrics_snapshot();

    Ok(())
}
