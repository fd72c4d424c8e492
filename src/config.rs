//! Configuration Module
//!
//! Loads and validates server configuration from a JSON file.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{CleanupMode, PolicyKind};
use crate::error::{CacheError, Result};

/// Port used when the configuration file does not name one
pub const DEFAULT_PORT: u16 = 3000;

// == Cache Mode ==
/// Cleanup strategy named in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheMode {
    /// Lazy expiration only
    Simple,
    /// Lazy expiration plus a periodic sweep
    CleanInterval,
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheMode::Simple => write!(f, "simple"),
            CacheMode::CleanInterval => write!(f, "clean-interval"),
        }
    }
}

/// Sweep settings for `clean-interval` mode.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanInterval {
    /// Seconds between sweeps
    pub interval: u64,
}

/// Server configuration parameters.
///
/// ```json
/// {
///   "port": 3000,
///   "cache": "clean-interval",
///   "eviction-policy": "lru",
///   "clean-interval": { "interval": 1 },
///   "size-cap-config": { "10": 2, "100": 1 }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Cache protocol TCP port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Cleanup strategy
    pub cache: CacheMode,
    /// Eviction strategy used by every partition
    pub eviction_policy: PolicyKind,
    /// Sweep settings, required in `clean-interval` mode
    #[serde(default)]
    pub clean_interval: Option<CleanInterval>,
    /// Size-class table: max value length -> max entry count
    pub size_cap_config: BTreeMap<usize, usize>,
    /// Optional HTTP admin port serving health and statistics
    #[serde(default)]
    pub admin_port: Option<u16>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Config {
    /// Reads and validates a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| {
            CacheError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&data)
    }

    /// Parses and validates configuration from a JSON document.
    ///
    /// Unknown cache modes or eviction policies are rejected here, before the
    /// server accepts any connection.
    pub fn from_json(data: &str) -> Result<Self> {
        let config: Config =
            serde_json::from_str(data).map_err(|e| CacheError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.size_cap_config.is_empty() {
            return Err(CacheError::InvalidConfig(
                "size-cap-config must define at least one size class".to_string(),
            ));
        }

        if let Some((boundary, _)) = self.size_cap_config.iter().find(|(_, &cap)| cap == 0) {
            return Err(CacheError::InvalidConfig(format!(
                "size class {} must have a capacity greater than zero",
                boundary
            )));
        }

        self.cleanup_mode().map(|_| ())
    }

    /// Largest value length the server accepts: the maximum size-class boundary.
    pub fn max_value_length(&self) -> usize {
        self.size_cap_config.keys().next_back().copied().unwrap_or(0)
    }

    /// Resolves the cleanup strategy together with its sweep interval.
    pub fn cleanup_mode(&self) -> Result<CleanupMode> {
        match self.cache {
            CacheMode::Simple => Ok(CleanupMode::Simple),
            CacheMode::CleanInterval => match &self.clean_interval {
                Some(CleanInterval { interval }) if *interval > 0 => {
                    Ok(CleanupMode::CleanInterval(Duration::from_secs(*interval)))
                }
                Some(_) => Err(CacheError::InvalidConfig(
                    "clean-interval.interval must be greater than zero".to_string(),
                )),
                None => Err(CacheError::InvalidConfig(
                    "clean-interval mode requires a clean-interval.interval setting".to_string(),
                )),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            cache: CacheMode::Simple,
            eviction_policy: PolicyKind::Lru,
            clean_interval: None,
            size_cap_config: BTreeMap::from([(64, 1000), (1024, 500), (65536, 100)]),
            admin_port: None,
        }
    }
}
