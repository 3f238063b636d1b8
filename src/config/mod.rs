mod file_config;

pub use file_config::{CatalogConfig, DiscoveryConfig, FileConfig};

use crate::catalog_client::DEFAULT_CATALOG_BASE_URL;
use crate::discovery::{ALL_GENRES, DEFAULT_TAXONOMY};
use crate::interactions::GenreId;
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub catalog_base_url: Option<String>,
    pub catalog_timeout_sec: u64,
    pub auth_token_retention_days: u64,
    pub prune_interval_hours: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub auth_token_retention_days: u64,
    pub prune_interval_hours: u64,

    pub catalog: CatalogSettings,
    pub discovery: DiscoverySettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSettings {
    pub base_url: String,
    pub timeout_sec: u64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CATALOG_BASE_URL.to_string(),
            timeout_sec: 10,
        }
    }
}

/// Knobs of feed composition.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoverySettings {
    /// How many recent decisions are analyzed.
    pub history_window: usize,
    /// How many of the newest decisions count for fatigue.
    pub fatigue_window: usize,
    /// Rejects within the fatigue window that make a viewer fatigued.
    pub fatigue_reject_threshold: usize,
    pub aversion_min_samples: usize,
    pub aversion_skip_ratio: f64,
    pub genres_per_round: usize,
    /// How many recent accepts are eligible as expansion seed.
    pub seed_pool_size: usize,
    pub related_limit: usize,
    pub chart_limit: usize,
    pub fetch_timeout_ms: u64,
    pub taxonomy: Vec<GenreId>,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            history_window: 20,
            fatigue_window: 10,
            fatigue_reject_threshold: 7,
            aversion_min_samples: 3,
            aversion_skip_ratio: 0.8,
            genres_per_round: 3,
            seed_pool_size: 5,
            related_limit: 20,
            chart_limit: 40,
            fetch_timeout_ms: 5000,
            taxonomy: DEFAULT_TAXONOMY.iter().map(|(id, _)| *id).collect(),
        }
    }
}

impl DiscoverySettings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.history_window == 0 || self.fatigue_window == 0 {
            bail!("history_window and fatigue_window must be greater than 0");
        }
        if self.fatigue_window > self.history_window {
            bail!(
                "fatigue_window ({}) cannot exceed history_window ({})",
                self.fatigue_window,
                self.history_window
            );
        }
        if self.fatigue_reject_threshold == 0 || self.fatigue_reject_threshold > self.fatigue_window
        {
            bail!(
                "fatigue_reject_threshold must be between 1 and fatigue_window ({})",
                self.fatigue_window
            );
        }
        if !(self.aversion_skip_ratio > 0.0 && self.aversion_skip_ratio <= 1.0) {
            bail!(
                "aversion_skip_ratio must be in (0, 1], got {}",
                self.aversion_skip_ratio
            );
        }
        if self.aversion_min_samples == 0 {
            bail!("aversion_min_samples must be greater than 0");
        }
        if self.genres_per_round == 0 || self.seed_pool_size == 0 {
            bail!("genres_per_round and seed_pool_size must be greater than 0");
        }
        if self.related_limit == 0 || self.chart_limit == 0 {
            bail!("related_limit and chart_limit must be greater than 0");
        }
        if self.fetch_timeout_ms == 0 {
            bail!("fetch_timeout_ms must be greater than 0");
        }
        if self.taxonomy.is_empty() {
            bail!("The genre taxonomy cannot be empty");
        }
        if self.taxonomy.contains(&ALL_GENRES) {
            bail!(
                "Genre id {} is reserved and cannot be part of the taxonomy",
                ALL_GENRES
            );
        }
        Ok(())
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());
        let auth_token_retention_days = file
            .auth_token_retention_days
            .unwrap_or(cli.auth_token_retention_days);
        let prune_interval_hours = file
            .prune_interval_hours
            .unwrap_or(cli.prune_interval_hours);

        let catalog_file = file.catalog.unwrap_or_default();
        let catalog_defaults = CatalogSettings::default();
        let catalog = CatalogSettings {
            base_url: catalog_file
                .base_url
                .or_else(|| cli.catalog_base_url.clone())
                .unwrap_or(catalog_defaults.base_url),
            timeout_sec: catalog_file.timeout_sec.unwrap_or(if cli.catalog_timeout_sec > 0 {
                cli.catalog_timeout_sec
            } else {
                catalog_defaults.timeout_sec
            }),
        };
        if catalog.timeout_sec == 0 {
            bail!("catalog timeout_sec must be greater than 0");
        }

        let discovery_file = file.discovery.unwrap_or_default();
        let defaults = DiscoverySettings::default();
        let discovery = DiscoverySettings {
            history_window: discovery_file
                .history_window
                .unwrap_or(defaults.history_window),
            fatigue_window: discovery_file
                .fatigue_window
                .unwrap_or(defaults.fatigue_window),
            fatigue_reject_threshold: discovery_file
                .fatigue_reject_threshold
                .unwrap_or(defaults.fatigue_reject_threshold),
            aversion_min_samples: discovery_file
                .aversion_min_samples
                .unwrap_or(defaults.aversion_min_samples),
            aversion_skip_ratio: discovery_file
                .aversion_skip_ratio
                .unwrap_or(defaults.aversion_skip_ratio),
            genres_per_round: discovery_file
                .genres_per_round
                .unwrap_or(defaults.genres_per_round),
            seed_pool_size: discovery_file
                .seed_pool_size
                .unwrap_or(defaults.seed_pool_size),
            related_limit: discovery_file
                .related_limit
                .unwrap_or(defaults.related_limit),
            chart_limit: discovery_file.chart_limit.unwrap_or(defaults.chart_limit),
            fetch_timeout_ms: discovery_file
                .fetch_timeout_ms
                .unwrap_or(defaults.fetch_timeout_ms),
            taxonomy: discovery_file.taxonomy.unwrap_or(defaults.taxonomy),
        };
        discovery.validate()?;

        Ok(Self {
            db_dir,
            port,
            metrics_port,
            logging_level,
            frontend_dir_path,
            auth_token_retention_days,
            prune_interval_hours,
            catalog,
            discovery,
        })
    }

    pub fn user_db_path(&self) -> PathBuf {
        self.db_dir.join("swipesound.db")
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
