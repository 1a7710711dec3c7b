//! # Server Configuration
//!
//! Loaded once at startup, read-only afterwards.
//!
//! ## Configuration Sources (Priority Order)
//! 1. Environment variables (`TALLY_*`)
//! 2. Config file (`TALLY_CONFIG`, or `tally.toml` in the working directory if present)
//! 3. Defaults (this file)
//!
//! ```toml
//! bind_addr = "0.0.0.0:8080"
//! database_path = "/var/lib/tally/tally.db"
//! max_connections = 5
//! tax_rate_bps = 825          # 8.25%
//! points_unit_cents = 1000    # one point per $10
//! event_buffer = 256
//! store_name = "Corner Store"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tally_core::money::BPS_SCALE;
use tally_core::{Money, SettlementPolicy, TaxRate};
use thiserror::Error;

/// Config file read when `TALLY_CONFIG` is not set.
pub const DEFAULT_CONFIG_FILE: &str = "tally.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
    pub max_connections: u32,
    /// Tax applied at settlement, in basis points.
    pub tax_rate_bps: u32,
    /// Subtotal that earns one base loyalty point.
    pub points_unit_cents: i64,
    /// Events buffered per observer before a slow one starts lagging.
    pub event_buffer: usize,
    pub store_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_path: default_database_path(),
            max_connections: 5,
            tax_rate_bps: 1000,
            points_unit_cents: 1000,
            event_buffer: tally_events::DEFAULT_EVENT_BUFFER,
            store_name: "Tally Store".to_string(),
        }
    }
}

impl ServerConfig {
    /// Loads from the process environment and config file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Loads using `env` to look up variables.
    pub fn load_with(env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match env("TALLY_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => ServerConfig::default(),
        };

        config.apply_env(&env)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parses TOML; keys that are absent keep their defaults.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    fn apply_env(&mut self, env: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(v) = env("TALLY_BIND_ADDR") {
            self.bind_addr = parse_var("TALLY_BIND_ADDR", &v)?;
        }
        if let Some(v) = env("TALLY_DATABASE_PATH") {
            self.database_path = PathBuf::from(v);
        }
        if let Some(v) = env("TALLY_MAX_CONNECTIONS") {
            self.max_connections = parse_var("TALLY_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = env("TALLY_TAX_RATE_BPS") {
            self.tax_rate_bps = parse_var("TALLY_TAX_RATE_BPS", &v)?;
        }
        if let Some(v) = env("TALLY_POINTS_UNIT_CENTS") {
            self.points_unit_cents = parse_var("TALLY_POINTS_UNIT_CENTS", &v)?;
        }
        if let Some(v) = env("TALLY_EVENT_BUFFER") {
            self.event_buffer = parse_var("TALLY_EVENT_BUFFER", &v)?;
        }
        if let Some(v) = env("TALLY_STORE_NAME") {
            self.store_name = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tax_rate_bps > BPS_SCALE {
            return Err(ConfigError::Invalid(format!(
                "tax_rate_bps must be at most {} (100%)",
                BPS_SCALE
            )));
        }
        if self.points_unit_cents <= 0 {
            return Err(ConfigError::Invalid("points_unit_cents must be positive".into()));
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::Invalid("event_buffer must be positive".into()));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid("max_connections must be positive".into()));
        }
        Ok(())
    }

    /// The settlement parameters this store runs with.
    pub fn policy(&self) -> SettlementPolicy {
        SettlementPolicy {
            tax_rate: TaxRate::from_bps(self.tax_rate_bps),
            points_unit: Money::from_cents(self.points_unit_cents),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Platform data directory, e.g. `~/.local/share/tally-pos/tally.db` on Linux.
fn default_database_path() -> PathBuf {
    ProjectDirs::from("com", "tally", "pos")
        .map(|dirs| dirs.data_dir().join("tally.db"))
        .unwrap_or_else(|| PathBuf::from("tally.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.tax_rate_bps, 1000);
        assert_eq!(config.points_unit_cents, 1000);
        assert_eq!(config.event_buffer, 256);
        assert!(config.database_path.ends_with("tally.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServerConfig::from_toml("tax_rate_bps = 825\nstore_name = \"Corner\"").unwrap();
        assert_eq!(config.tax_rate_bps, 825);
        assert_eq!(config.store_name, "Corner");
        assert_eq!(config.points_unit_cents, 1000);
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = std::env::temp_dir().join(format!("tally-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("tally.toml");
        std::fs::write(&file, "tax_rate_bps = 825\nevent_buffer = 16\n").unwrap();

        let config = ServerConfig::load_with(env_of(&[
            ("TALLY_CONFIG", file.to_str().unwrap()),
            ("TALLY_TAX_RATE_BPS", "500"),
            ("TALLY_BIND_ADDR", "127.0.0.1:9000"),
        ]))
        .unwrap();

        assert_eq!(config.tax_rate_bps, 500);
        assert_eq!(config.event_buffer, 16);
        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = ServerConfig::load_with(env_of(&[("TALLY_CONFIG", "/nonexistent/tally.toml")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_bad_env_value() {
        let err = ServerConfig::load_with(env_of(&[
            ("TALLY_CONFIG", "/dev/null"),
            ("TALLY_EVENT_BUFFER", "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_validation_rejects_bad_policy() {
        let config = ServerConfig {
            tax_rate_bps: 10_001,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ServerConfig {
            points_unit_cents: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_policy_from_config() {
        let policy = ServerConfig::default().policy();
        assert_eq!(policy, SettlementPolicy::default());
    }
}
