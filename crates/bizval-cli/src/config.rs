//! CLI configuration.
//!
//! Priority (highest to lowest): `--log-level`, `BIZVAL_LOG_LEVEL`, the
//! TOML file given with `--config`, built-in defaults.

use std::path::Path;
use std::str::FromStr;

use bizval_core::config::EngineSettings;
use serde::Deserialize;
use thiserror::Error;

pub const LOG_LEVEL_ENV: &str = "BIZVAL_LOG_LEVEL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Configuration file error: {0}")]
    FileError(String),

    #[error("Invalid engine settings: {0}")]
    InvalidEngine(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::InvalidLogLevel(s.to_string())),
        }
    }
}

impl LogLevel {
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        LogLevel::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub logging: LoggingConfig,
    pub engine: EngineSettings,
}

impl CliConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::FileError(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: CliConfig = toml::from_str(content)
            .map_err(|e| ConfigError::FileError(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine
            .validate()
            .map_err(|e| ConfigError::InvalidEngine(e.to_string()))
    }
}

/// Resolve the configuration from every source.
pub fn build_config(
    config_file: Option<&Path>,
    env_level: Option<&str>,
    cli_level: Option<&str>,
) -> Result<CliConfig, ConfigError> {
    let mut config = match config_file {
        Some(path) => CliConfig::from_file(path)?,
        None => CliConfig::default(),
    };
    if let Some(level) = env_level {
        config.logging.level = LogLevel::from_str(level)?;
    }
    if let Some(level) = cli_level {
        config.logging.level = LogLevel::from_str(level)?;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let config = build_config(None, None, None).unwrap();
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert_eq!(config.engine.valuation.range_width, dec!(0.15));
    }

    #[test]
    fn test_toml_sections() {
        let config = CliConfig::from_toml(
            r#"
            [logging]
            level = "debug"

            [engine.valuation]
            range_width = "0.10"
            default_currency = "EUR"

            [engine.scenarios.arima]
            rule = "bound_envelope"
            volatility_factor = "0.25"
            "#,
        )
        .unwrap();
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.engine.valuation.range_width, dec!(0.10));
    }

    #[test]
    fn test_override_priority() {
        let config = build_config(None, Some("info"), Some("trace")).unwrap();
        assert_eq!(config.logging.level, LogLevel::Trace);
        let config = build_config(None, Some("error"), None).unwrap();
        assert_eq!(config.logging.level, LogLevel::Error);
    }

    #[test]
    fn test_unknown_level_rejected() {
        assert!(matches!(
            build_config(None, None, Some("loud")),
            Err(ConfigError::InvalidLogLevel(_))
        ));
        assert!(CliConfig::from_toml("[logging]\nlevel = \"loud\"").is_err());
    }

    #[test]
    fn test_invalid_engine_rejected() {
        let err = CliConfig::from_toml("[engine.valuation]\nrange_width = \"1.5\"").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEngine(_)));
    }
}
