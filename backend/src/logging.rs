//! # Logging
//!
//! The subscriber is installed before the configuration file is read, so the
//! config loader's own messages are not lost. The configured `log_level` is
//! applied afterwards through a reload handle; `RUST_LOG`, when set, wins.

use anyhow::{Context, Result};
use tracing_subscriber::{prelude::*, reload, EnvFilter, Registry};

use crate::config::AppConfig;

pub struct LogFilterHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

impl LogFilterHandle {
    /// Switch to the configured level; returns false when `RUST_LOG` is in charge
    pub fn apply_configured(&self, level: &str) -> Result<bool> {
        if self.from_env {
            return Ok(false);
        }
        self.handle
            .reload(EnvFilter::new(level))
            .context("Failed to apply configured log level")?;
        Ok(true)
    }
}

/// Reloadable filter starting from `env`, or the default level
pub fn filter_layer(env: Option<EnvFilter>) -> (reload::Layer<EnvFilter, Registry>, LogFilterHandle) {
    let from_env = env.is_some();
    let initial = env.unwrap_or_else(|| EnvFilter::new(AppConfig::default().log_level));
    let (layer, handle) = reload::Layer::new(initial);
    (layer, LogFilterHandle { handle, from_env })
}

/// Install the global fmt subscriber
pub fn init() -> LogFilterHandle {
    let (filter, handle) = filter_layer(EnvFilter::try_from_default_env().ok());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
    handle
}
