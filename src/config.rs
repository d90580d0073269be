//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub simulator: SimulatorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Simulated transport configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorConfig {
    /// Delay before deferred deliveries (handshake, client sends) run
    #[serde(default = "default_delivery_delay")]
    pub delivery_delay_ms: u64,

    /// URL used by `io()` when none is given
    #[serde(default = "default_socket_io_url")]
    pub default_socket_io_url: String,
}

fn default_delivery_delay() -> u64 {
    4
}

fn default_socket_io_url() -> String {
    "http://localhost/".to_string()
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            delivery_delay_ms: default_delivery_delay(),
            default_socket_io_url: default_socket_io_url(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("mocksocket").join("config.toml")),
            Some(PathBuf::from("./mocksocket.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        // Simulator overrides
        if let Ok(delay) = std::env::var("MOCKSOCKET_DELAY_MS") {
            if let Ok(ms) = delay.parse() {
                self.simulator.delivery_delay_ms = ms;
            }
        }
        if let Ok(url) = std::env::var("MOCKSOCKET_SOCKET_IO_URL") {
            self.simulator.default_socket_io_url = url;
        }

        // Logging overrides
        if let Ok(level) = std::env::var("MOCKSOCKET_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("MOCKSOCKET_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# mocksocket Configuration
#
# Environment variables override these settings:
# - MOCKSOCKET_DELAY_MS
# - MOCKSOCKET_SOCKET_IO_URL
# - MOCKSOCKET_LOG_LEVEL
# - MOCKSOCKET_LOG_FORMAT

[simulator]
# Delay before handshakes and client sends are delivered (ms)
delivery_delay_ms = 4

# URL used by io() when called without one
default_socket_io_url = "http://localhost/"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for CI)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.simulator.delivery_delay_ms, 4);
        assert_eq!(config.simulator.default_socket_io_url, "http://localhost/");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_default_template_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.simulator.delivery_delay_ms, 4);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[simulator]\ndelivery_delay_ms = 0").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.simulator.delivery_delay_ms, 0);
        assert_eq!(config.simulator.default_socket_io_url, "http://localhost/");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(Config::load(&missing), Err(ConfigError::Io { .. })));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[simulator\ndelivery_delay_ms = ").unwrap();
        assert!(matches!(Config::load(file.path()), Err(ConfigError::Parse { .. })));
    }
}
