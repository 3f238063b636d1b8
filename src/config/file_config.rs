use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub frontend_dir_path: Option<String>,
    pub auth_token_retention_days: Option<u64>,
    pub prune_interval_hours: Option<u64>,

    // Feature configs
    pub catalog: Option<CatalogConfig>,
    pub discovery: Option<DiscoveryConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: Option<String>,
    pub timeout_sec: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub history_window: Option<usize>,
    pub fatigue_window: Option<usize>,
    pub fatigue_reject_threshold: Option<usize>,
    pub aversion_min_samples: Option<usize>,
    pub aversion_skip_ratio: Option<f64>,
    pub genres_per_round: Option<usize>,
    pub seed_pool_size: Option<usize>,
    pub related_limit: Option<usize>,
    pub chart_limit: Option<usize>,
    pub fetch_timeout_ms: Option<u64>,
    /// Genre ids that make up the taxonomy.
    pub taxonomy: Option<Vec<u32>>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
