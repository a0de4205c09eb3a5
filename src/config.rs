use serde::Deserialize;
use std::path::Path;

use crate::date::is_valid_date_as_integer;

/// Top-level config loaded from `civic_analytics.toml`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AnalyticsConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub rollup: RollupConfig,
    #[serde(default)]
    pub lookups: LookupConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "./civic_analytics.db".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Deserialize)]
pub struct RollupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_300")]
    pub interval_secs: u64,
    #[serde(default = "default_30")]
    pub startup_delay_secs: u64,
    /// Days the cursor may walk forward looking for events before giving up.
    #[serde(default = "default_500")]
    pub max_scan_days: u32,
    #[serde(default = "default_7")]
    pub max_days_per_tick: u32,
    /// Fixed offset of the timezone whose midnight ends a day. DST is not applied.
    #[serde(default = "default_offset")]
    pub reference_utc_offset_hours: i32,
    /// Cursor start when nothing has been processed yet.
    #[serde(default)]
    pub start_day: Option<u32>,
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
            startup_delay_secs: 30,
            max_scan_days: 500,
            max_days_per_tick: 7,
            reference_utc_offset_hours: -8,
            start_day: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_300() -> u64 {
    300
}

fn default_30() -> u64 {
    30
}

fn default_500() -> u32 {
    500
}

fn default_7() -> u32 {
    7
}

fn default_offset() -> i32 {
    -8
}

#[derive(Debug, Clone, Deserialize)]
pub struct LookupConfig {
    /// Directory service root. Without it an empty in-memory directory is used.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    10
}

impl AnalyticsConfig {
    /// Load config from a TOML file. Returns defaults if the file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: AnalyticsConfig = toml::from_str(&contents)?;
            tracing::info!("loaded config from {}", path.display());
            config
        } else {
            tracing::info!("config file not found at {}, using defaults", path.display());
            Self::default()
        };
        if let Ok(db_path) = std::env::var("CIVIC_ANALYTICS_DB") {
            config.storage.db_path = db_path;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let rollup = &self.rollup;
        if !(-23..=23).contains(&rollup.reference_utc_offset_hours) {
            anyhow::bail!(
                "rollup.reference_utc_offset_hours must be within -23..=23, got {}",
                rollup.reference_utc_offset_hours
            );
        }
        if rollup.max_scan_days == 0 {
            anyhow::bail!("rollup.max_scan_days must be greater than 0");
        }
        if let Some(day) = rollup.start_day {
            if !is_valid_date_as_integer(day) {
                anyhow::bail!("rollup.start_day {day} is not a valid YYYYMMDD date");
            }
        }
        Ok(())
    }
}
