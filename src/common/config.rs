//! Configuration loading with environment variable support
//!
//! Reads a TOML file when a path is given, applies `LUCKYSIX_*` overrides and
//! validates the result.

use crate::config::LotteryConfig;
use crate::errors::ConfigError;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Configuration loader with environment variable support
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration from file and process environment
    pub fn load(&self) -> Result<LotteryConfig, ConfigError> {
        self.load_with(|key| env::var(key).ok())
    }

    /// Load configuration, resolving overrides through `lookup`
    pub fn load_with<F>(&self, lookup: F) -> Result<LotteryConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match self.config_path {
            Some(ref path) => Self::load_from_file(path)?,
            None => LotteryConfig::default(),
        };

        apply_overrides(&mut config, lookup)?;
        config.validate()?;

        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<LotteryConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::LoadFailed(format!("failed to read {}: {}", path.display(), e))
        })?;
        debug!("loaded configuration from {}", path.display());
        Ok(toml::from_str(&content)?)
    }
}

/// Apply `LUCKYSIX_*` overrides on top of `config`
pub fn apply_overrides<F>(config: &mut LotteryConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = parse_var(&lookup, "LUCKYSIX_POOL_MIN")? {
        config.draw.pool_min = v;
    }
    if let Some(v) = parse_var(&lookup, "LUCKYSIX_POOL_MAX")? {
        config.draw.pool_max = v;
    }
    if let Some(v) = parse_var(&lookup, "LUCKYSIX_PICK_COUNT")? {
        config.draw.pick_count = v;
    }
    if let Some(v) = parse_var(&lookup, "LUCKYSIX_DRAW_LENGTH")? {
        config.draw.draw_length = v;
    }
    if let Some(v) = parse_var(&lookup, "LUCKYSIX_TICKET_PRICE")? {
        config.entry.ticket_price = Some(v);
    }
    if let Some(v) = parse_var(&lookup, "LUCKYSIX_AUTO_SETTLE")? {
        config.settlement.auto_settle = v;
    }
    if let Some(v) = parse_var(&lookup, "LUCKYSIX_ORACLE_DELAY_MS")? {
        config.oracle.fulfillment_delay_ms = v;
    }
    if let Some(v) = parse_var(&lookup, "LUCKYSIX_ORACLE_PREPAID_REQUESTS")? {
        config.oracle.prepaid_requests = v;
    }
    Ok(())
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::invalid(key, format!("cannot parse '{}'", raw))),
        None => Ok(None),
    }
}
