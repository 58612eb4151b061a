//! Device selection settings

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Environment variable holding the default device name
pub const DEVICE_ENV: &str = "OPLHW_DEVICE";

/// Default IMF capture rate (Hz)
pub const DEFAULT_IMF_RATE: u32 = 560;

/// Settings consulted when opening a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device name used when the caller passes an empty name
    pub default_device: Option<String>,
    /// Tick rate of `imfwrite:` captures
    pub imf_rate: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_device: None,
            imf_rate: DEFAULT_IMF_RATE,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config whose default device comes from `OPLHW_DEVICE`.
    pub fn from_env() -> Self {
        let default_device = std::env::var(DEVICE_ENV)
            .ok()
            .filter(|name| !name.is_empty());
        Self {
            default_device,
            ..Self::default()
        }
    }

    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config =
            serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        if config.imf_rate == 0 {
            return Err(Error::Config("imf_rate must be non-zero".into()));
        }
        Ok(config)
    }

    pub fn with_default_device(mut self, name: impl Into<String>) -> Self {
        self.default_device = Some(name.into());
        self
    }

    /// Resolve the name to open: the caller's name, else the configured default.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        if !name.is_empty() {
            return name;
        }
        self.default_device.as_deref().unwrap_or("")
    }
}
