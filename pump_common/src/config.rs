//! TOML configuration loading, mirroring the teacher workspace's
//! `evo_common::config` module.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::PID_CHANNEL_COUNT;
use crate::state::{HardwareConfig, PidParams};

/// Log level for configuration. Serializes to lowercase strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace-level verbosity.
    Trace,
    /// Debug-level verbosity.
    Debug,
    /// Info-level verbosity (default).
    Info,
    /// Warning-level verbosity.
    Warn,
    /// Error-level verbosity.
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    /// Map to the `tracing` env-filter directive string for this level.
    pub const fn as_filter_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// Reading the configuration file failed.
    #[error("failed to read configuration file {path}: {source}")]
    ReadError {
        /// Path that failed to read.
        path: String,
        /// Underlying IO error message.
        source: String,
    },

    /// TOML parsing failed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Boot-time defaults and board identity, loaded once from a TOML file
/// before the first client ever connects (§3, §9).
///
/// `SetHardwareConfig`/`SetFlowConfig` wire commands mutate only live,
/// in-memory state afterward — persistent configuration storage stays out
/// of scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Logging verbosity.
    #[serde(default)]
    pub log_level: LogLevel,
    /// Board identification string reported by `GET_SYS_INFO`.
    pub board_id: String,
    /// TCP listen port.
    pub listen_port: u16,
    /// Default hardware configuration applied at boot (pump board only).
    #[serde(default)]
    pub hardware: HardwareConfig,
    /// I²C address of the pH probe (sensor board only).
    #[serde(default = "default_ph_address")]
    pub ph_i2c_address: u8,
    /// I²C address of each temperature probe, one per PID channel (sensor
    /// board only).
    #[serde(default = "default_temp_addresses")]
    pub temp_i2c_addresses: [u8; PID_CHANNEL_COUNT],
    /// Default PID gains applied at boot, one per channel (sensor board only).
    #[serde(default)]
    pub pid_defaults: Vec<PidParams>,
}

fn default_ph_address() -> u8 {
    0x63
}

fn default_temp_addresses() -> [u8; PID_CHANNEL_COUNT] {
    [0x66, 0x67, 0x68]
}

impl BoardConfig {
    /// Validate semantic constraints beyond what serde/TOML parsing checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.board_id.is_empty() {
            return Err(ConfigError::ValidationError(
                "board_id cannot be empty".to_string(),
            ));
        }
        if self.listen_port == 0 {
            return Err(ConfigError::ValidationError(
                "listen_port cannot be 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Load, parse and validate a `BoardConfig` from a TOML file on disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound(path.display().to_string())
            } else {
                ConfigError::ReadError {
                    path: path.display().to_string(),
                    source: e.to_string(),
                }
            }
        })?;
        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_minimal_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.toml");
        std::fs::write(
            &path,
            r#"
            board_id = "pump-01"
            listen_port = 7851
            "#,
        )
        .unwrap();
        let cfg = BoardConfig::load(&path).unwrap();
        assert_eq!(cfg.board_id, "pump-01");
        assert_eq!(cfg.listen_port, 7851);
        assert_eq!(cfg.ph_i2c_address, 0x63);
        assert_eq!(cfg.temp_i2c_addresses, [0x66, 0x67, 0x68]);
        assert_eq!(cfg.log_level, LogLevel::Info);
    }

    #[test]
    fn missing_file_reports_not_found() {
        let err = BoardConfig::load(Path::new("/nonexistent/board.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn empty_board_id_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.toml");
        std::fs::write(&path, "board_id = \"\"\nlisten_port = 7851\n").unwrap();
        let err = BoardConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn zero_port_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.toml");
        std::fs::write(&path, "board_id = \"pump-01\"\nlisten_port = 0\n").unwrap();
        let err = BoardConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }
}
