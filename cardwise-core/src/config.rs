//! Configuration management
//!
//! Settings live in `settings.json` in the data directory:
//! ```json
//! {
//!   "app": {
//!     "demoMode": false,
//!     "conversionCacheTtlSecs": 300,
//!     "defaultTargetCurrency": "KF",
//!     "insightLookbackDays": 30
//!   }
//! }
//! ```
//! Keys this crate does not manage are kept when the file is saved.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};

/// Environment variable pointing at the data directory
pub const DATA_DIR_ENV: &str = "CARDWISE_DIR";

/// Environment override for demo mode (CI and testing)
pub const DEMO_MODE_ENV: &str = "CARDWISE_DEMO_MODE";

const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_LOOKBACK_DAYS: u32 = 30;

fn default_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_lookback() -> u32 {
    DEFAULT_LOOKBACK_DAYS
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    app: AppSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppSettings {
    #[serde(default)]
    demo_mode: bool,
    #[serde(default = "default_cache_ttl")]
    conversion_cache_ttl_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_target_currency: Option<String>,
    #[serde(default = "default_lookback")]
    insight_lookback_days: u32,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            demo_mode: false,
            conversion_cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            default_target_currency: None,
            insight_lookback_days: DEFAULT_LOOKBACK_DAYS,
            other: HashMap::new(),
        }
    }
}

/// Cardwise configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub demo_mode: bool,
    pub conversion_cache_ttl: Duration,
    /// Reward currency code simulations convert into by default
    pub default_target_currency: Option<String>,
    pub insight_lookback_days: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_settings(&AppSettings::default())
    }
}

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

impl Config {
    fn from_settings(app: &AppSettings) -> Self {
        Self {
            demo_mode: app.demo_mode,
            conversion_cache_ttl: Duration::from_secs(app.conversion_cache_ttl_secs),
            default_target_currency: app.default_target_currency.clone(),
            insight_lookback_days: app.insight_lookback_days.max(1),
        }
    }

    fn read_settings(data_dir: &Path) -> Result<SettingsFile> {
        let settings_path = data_dir.join("settings.json");
        if !settings_path.exists() {
            return Ok(SettingsFile::default());
        }
        let content = std::fs::read_to_string(&settings_path)?;
        match serde_json::from_str(&content) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                tracing::warn!(path = %settings_path.display(), error = %e, "unreadable settings.json, using defaults");
                Ok(SettingsFile::default())
            }
        }
    }

    /// Load settings from the data directory.
    ///
    /// `CARDWISE_DEMO_MODE` overrides the stored demo flag.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let settings = Self::read_settings(data_dir)?;
        let mut config = Self::from_settings(&settings.app);

        if let Some(demo) = std::env::var(DEMO_MODE_ENV).ok().as_deref().and_then(parse_bool_env) {
            config.demo_mode = demo;
        }
        Ok(config)
    }

    /// Save the managed fields, keeping everything else in the file
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(data_dir)?;
        let mut settings = Self::read_settings(data_dir)?;

        settings.app.demo_mode = self.demo_mode;
        settings.app.conversion_cache_ttl_secs = self.conversion_cache_ttl.as_secs();
        settings.app.default_target_currency = self.default_target_currency.clone();
        settings.app.insight_lookback_days = self.insight_lookback_days;

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(data_dir.join("settings.json"), content)?;
        Ok(())
    }

    pub fn enable_demo_mode(&mut self) {
        self.demo_mode = true;
    }

    pub fn disable_demo_mode(&mut self) {
        self.demo_mode = false;
    }

    /// Database file for the current mode
    pub fn database_filename(&self) -> &'static str {
        if self.demo_mode {
            "demo.duckdb"
        } else {
            "cardwise.duckdb"
        }
    }
}

/// Data directory: `CARDWISE_DIR` if set, otherwise `~/.cardwise`
pub fn data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    dirs::home_dir()
        .map(|home| home.join(".cardwise"))
        .ok_or_else(|| Error::Config("cannot determine home directory".to_string()))
}
