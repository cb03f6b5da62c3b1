//! # Configuration
//!
//! Server configuration is read from a single YAML file:
//!
//! ```yaml
//! bind_address: "127.0.0.1:3000"
//! log_level: "info"
//! cors_origin: "http://localhost:8080"
//! store:
//!   kind: firebase
//!   database_url: "https://antropometri-default-rtdb.firebaseio.com"
//!   api_key: "AIza..."
//!   timeout_secs: 15
//! ```
//!
//! The file is looked up at `$ANTROPOMETRI_CONFIG`, falling back to
//! `<config dir>/antropometri/config.yaml`. A missing file yields the
//! defaults (in-memory store on `127.0.0.1:3000`).
//!
//! `ANTROPOMETRI_BIND` overrides the bind address. `RUST_LOG`, when set,
//! takes precedence over `log_level` when the subscriber is installed.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CONFIG_PATH_ENV: &str = "ANTROPOMETRI_CONFIG";
pub const BIND_ADDRESS_ENV: &str = "ANTROPOMETRI_BIND";

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:3000";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind_address: String,
    pub log_level: String,
    /// Allowed browser origin; any origin when unset
    pub cors_origin: Option<String>,
    pub store: StoreConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            cors_origin: None,
            store: StoreConfig::Memory,
        }
    }
}

/// Which record store adapter to run against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    Memory,
    File {
        path: PathBuf,
    },
    Firebase {
        database_url: String,
        api_key: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl AppConfig {
    /// Load from the default location and apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let mut config = match &path {
            Some(path) => Self::load_from(path)?,
            None => {
                info!("No config directory available, using defaults");
                Self::default()
            }
        };
        config.apply_overrides(std::env::var(BIND_ADDRESS_ENV).ok());
        Ok(config)
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let yaml_content =
            fs::read_to_string(path).with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: AppConfig =
            serde_yaml::from_str(&yaml_content).with_context(|| format!("Invalid config file {:?}", path))?;
        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        if let Ok(explicit) = std::env::var(CONFIG_PATH_ENV) {
            if !explicit.trim().is_empty() {
                return Some(PathBuf::from(explicit));
            }
        }
        dirs::config_dir().map(|dir| dir.join("antropometri").join("config.yaml"))
    }

    fn apply_overrides(&mut self, bind_address: Option<String>) {
        if let Some(bind_address) = bind_address.filter(|value| !value.trim().is_empty()) {
            info!("Bind address overridden from environment: {}", bind_address);
            self.bind_address = bind_address;
        }
    }
}
