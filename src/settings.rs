use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::config::{DEFAULT_BAUD_RATE, SERIAL_TIMEOUT_MS, SpreadingFactor};
use crate::error::{Error, Result};

/// Serial link settings read from a JSON file. Missing fields take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    pub port: Option<String>,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    pub spreading_factor: Option<u8>,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: SERIAL_TIMEOUT_MS,
            spreading_factor: None,
        }
    }
}

impl LinkSettings {
    /// Load settings from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Settings(format!("failed to read {}: {e}", path.display())))?;

        let settings: LinkSettings = serde_json::from_str(&contents)?;
        settings.spreading_factor()?;
        Ok(settings)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn spreading_factor(&self) -> Result<Option<SpreadingFactor>> {
        self.spreading_factor
            .map(|sf| SpreadingFactor::new(sf).ok_or(Error::InvalidSpreadingFactor(sf)))
            .transpose()
    }
}
