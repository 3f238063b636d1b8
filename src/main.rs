use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use std::{fmt::Debug, path::PathBuf};
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use swipesound_server::config::{AppConfig, CliConfig, FileConfig};
use swipesound_server::server::metrics;
use swipesound_server::{
    run_server, DeezerCatalogClient, DiscoveryEngine, RequestsLoggingLevel, SqliteUserStore,
    UserManager,
};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file, its values override the command line.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding the SQLite database.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Base URL of the music catalog API.
    #[clap(long)]
    pub catalog_base_url: Option<String>,

    /// Timeout in seconds for catalog requests, 0 means the default.
    #[clap(long, default_value_t = 0)]
    pub catalog_timeout_sec: u64,

    /// Number of days an unused auth token is kept. Set to 0 to disable pruning.
    #[clap(long, default_value_t = 30)]
    pub auth_token_retention_days: u64,

    /// Interval in hours between pruning runs. Set to 0 to disable pruning.
    #[clap(long, default_value_t = 24)]
    pub prune_interval_hours: u64,
}

impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        CliConfig {
            db_dir: args.db_dir.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            frontend_dir_path: args.frontend_dir_path.clone(),
            catalog_base_url: args.catalog_base_url.clone(),
            catalog_timeout_sec: args.catalog_timeout_sec,
            auth_token_retention_days: args.auth_token_retention_days,
            prune_interval_hours: args.prune_interval_hours,
        }
    }
}

fn spawn_auth_token_pruning(user_manager: Arc<UserManager>, retention_days: u64, interval_hours: u64) {
    info!(
        "Auth token pruning enabled: retaining {} days, pruning every {} hours",
        retention_days, interval_hours
    );

    tokio::spawn(async move {
        let interval = Duration::from_secs(interval_hours * 60 * 60);
        let mut ticker = tokio::time::interval(interval);

        // Skip the first immediate tick, wait for the first interval
        ticker.tick().await;

        loop {
            ticker.tick().await;

            match user_manager.prune_unused_auth_tokens(retention_days) {
                Ok(count) => {
                    if count > 0 {
                        info!("Pruned {} unused auth tokens", count);
                    }
                }
                Err(e) => {
                    error!("Failed to prune auth tokens: {}", e);
                }
            }
        }
    });
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
        .try_init()?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}...", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&CliConfig::from(&cli_args), file_config)?;

    info!("Initializing metrics...");
    metrics::init_metrics();

    let db_path = config.user_db_path();
    info!("Opening SQLite database at {:?}...", db_path);
    let user_store = Arc::new(SqliteUserStore::new(&db_path)?);

    info!("Using catalog at {}", config.catalog.base_url);
    let catalog = Arc::new(DeezerCatalogClient::new(
        &config.catalog.base_url,
        config.catalog.timeout_sec,
    )?);

    let discovery = DiscoveryEngine::new(user_store.clone(), catalog, config.discovery.clone())?;

    let user_manager = Arc::new(UserManager::new(
        user_store,
        discovery.taxonomy().clone(),
    ));

    if config.auth_token_retention_days > 0 && config.prune_interval_hours > 0 {
        spawn_auth_token_pruning(
            user_manager.clone(),
            config.auth_token_retention_days,
            config.prune_interval_hours,
        );
    }

    run_server(
        user_manager,
        discovery,
        config.logging_level,
        config.port,
        config.metrics_port,
        config.frontend_dir_path,
    )
    .await
}
