//! Client configuration.
//!
//! Stored in `~/.gridfeed/config.toml`. Partial files are fine; anything
//! left out takes its default.

use std::path::{Path, PathBuf};

use gridfeed_core::{FeedError, FeedResult};
use serde::{Deserialize, Serialize};

pub const DEFAULT_EIA_BASE_URL: &str = "https://api.eia.gov/v2/";

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub eia: EiaConfig,
}

/// Settings for the EIA v2 API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EiaConfig {
    pub base_url: String,

    /// Falls back to `EIA_API_KEY` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Page fetch workers (0 = one per CPU).
    pub concurrency: usize,

    /// Log request and progress details at info level.
    pub verbose: bool,
}

impl Default for EiaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_EIA_BASE_URL.to_string(),
            api_key: None,
            concurrency: 1,
            verbose: false,
        }
    }
}

impl FeedConfig {
    pub fn config_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".gridfeed"))
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config.toml"))
    }

    /// Load configuration from the default location.
    ///
    /// Returns the default config if the file doesn't exist.
    pub fn load() -> FeedResult<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> FeedResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|err| FeedError::Config(format!("parsing {}: {err}", path.display())))
    }

    pub fn save_to(&self, path: &Path) -> FeedResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|err| FeedError::Config(format!("serializing config: {err}")))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }
}
