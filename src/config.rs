//! Optional TOML configuration.
//!
//! Lets a user keep their name, a preferred unit and logging options in a
//! file instead of repeating them on every run:
//!
//! ```toml
//! [defaults]
//! user_name = "Di Wu"
//! unit = "CMD"
//! start_date = "2017-01-01T12:00:00"
//!
//! [logging]
//! level = "info"
//! file = "hdgfrom.log"
//! ```
//!
//! Values given on the command line win over the file, which wins over the
//! built-in defaults.

use std::path::Path;

use chrono::NaiveDateTime;
use serde::Deserialize;
use thiserror::Error;

use crate::logging::LogLevel;
use crate::units::Unit;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration file: {0}")]
    Io(String),

    #[error("invalid configuration: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Fallback values for the per-run options.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    pub user_name: Option<String>,
    pub water_body: Option<String>,
    pub unit: Option<Unit>,
    /// ISO 8601, e.g. "2017-01-01T12:00:00".
    pub start_date: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    pub file: Option<String>,
    #[serde(default)]
    pub timestamps: bool,
}

fn default_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
            timestamps: false,
        }
    }
}

impl LoggingConfig {
    pub fn min_level(&self) -> Result<LogLevel, ConfigError> {
        LogLevel::from_name(&self.level)
            .ok_or_else(|| ConfigError::Parse(format!("unknown log level '{}'", self.level)))
    }
}

impl Config {
    /// Load from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.logging.min_level()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.logging.min_level().unwrap(), LogLevel::Warning);
    }

    #[test]
    fn test_full_file() {
        let config = Config::from_toml(
            r#"
            [defaults]
            user_name = "Di Wu"
            water_body = "Lyngsvatnet"
            unit = "cmd"
            start_date = "2017-03-01T06:30:00"

            [logging]
            level = "debug"
            file = "hdgfrom.log"
            timestamps = true
            "#,
        )
        .unwrap();

        assert_eq!(config.defaults.user_name.as_deref(), Some("Di Wu"));
        assert_eq!(config.defaults.water_body.as_deref(), Some("Lyngsvatnet"));
        assert_eq!(config.defaults.unit, Some(Unit::Cmd));
        assert_eq!(
            config.defaults.start_date,
            NaiveDate::from_ymd_opt(2017, 3, 1).unwrap().and_hms_opt(6, 30, 0)
        );
        assert_eq!(config.logging.min_level().unwrap(), LogLevel::Debug);
        assert_eq!(config.logging.file.as_deref(), Some("hdgfrom.log"));
        assert!(config.logging.timestamps);
    }

    #[test]
    fn test_unknown_unit_is_rejected() {
        let err = Config::from_toml("[defaults]\nunit = \"XYZ\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "got {:?}", err);
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        let err = Config::from_toml("[logging]\nlevel = \"loud\"\n").unwrap_err();
        assert!(err.to_string().contains("loud"));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(Config::from_toml("[defaults]\ncolour = \"blue\"\n").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
