//! `crm.toml` loading.
//!
//! Order of precedence, lowest first: built-in defaults, the TOML file,
//! `CRM_*` environment variables, command-line flags. Validation runs
//! after the environment is applied; flags are checked again by the
//! caller once they are merged.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//! log_level = "info"
//! log_format = "text"
//!
//! [data]
//! path = "crates/cli/tests/fixtures/dataset.json"
//! page_size = 1000
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crm_storage::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("environment variable {var} has invalid value '{value}'")]
    InvalidEnv { var: &'static str, value: String },

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// JSON dataset served by `crm serve`.
    pub path: Option<PathBuf>,
    /// Rows requested per page from the record source.
    pub page_size: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            path: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrmConfig {
    pub server: ServerConfig,
    pub data: DataConfig,
}

impl CrmConfig {
    /// Defaults plus environment, or the named file plus environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let mut config = CrmConfig::default();
                config.apply_env_overrides()?;
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse_toml(&contents)
    }

    /// Parse TOML, apply environment overrides, then validate.
    pub fn parse_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut config: CrmConfig = toml::from_str(toml_str)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CRM_*` variables from the process environment:
    /// - `CRM_SERVER_HOST` → `server.host`
    /// - `CRM_SERVER_PORT` → `server.port`
    /// - `CRM_LOG_LEVEL` → `server.log_level`
    /// - `CRM_LOG_FORMAT` → `server.log_format`
    /// - `CRM_DATA_PATH` → `data.path`
    /// - `CRM_DATA_PAGE_SIZE` → `data.page_size`
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CRM_SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("CRM_SERVER_PORT") {
            self.server.port = parse_env("CRM_SERVER_PORT", v)?;
        }
        if let Some(v) = lookup("CRM_LOG_LEVEL") {
            self.server.log_level = v.trim().to_ascii_lowercase();
        }
        if let Some(v) = lookup("CRM_LOG_FORMAT") {
            self.server.log_format = parse_env("CRM_LOG_FORMAT", v)?;
        }
        if let Some(v) = lookup("CRM_DATA_PATH") {
            self.data.path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("CRM_DATA_PAGE_SIZE") {
            self.data.page_size = parse_env("CRM_DATA_PAGE_SIZE", v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid(
                "server.port must be > 0 (got 0). Set a valid port in crm.toml or via CRM_SERVER_PORT.".to_string(),
            ));
        }
        if !LOG_LEVELS.contains(&self.server.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "server.log_level must be one of: {} (got '{}').",
                LOG_LEVELS.join(", "),
                self.server.log_level
            )));
        }
        if self.data.page_size == 0 || self.data.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid(format!(
                "data.page_size must be between 1 and {} (got {}).",
                MAX_PAGE_SIZE, self.data.page_size
            )));
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { var, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let c = CrmConfig::default();
        assert_eq!(c.server.port, 8080);
        assert_eq!(c.data.page_size, 1000);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c: CrmConfig = toml::from_str(
            r#"
            [server]
            port = 9000
            log_format = "json"

            [data]
            path = "crates/cli/tests/fixtures/dataset.json"
            "#,
        )
        .unwrap();
        assert_eq!(c.server.port, 9000);
        assert_eq!(c.server.host, "0.0.0.0");
        assert_eq!(c.server.log_format, LogFormat::Json);
        assert_eq!(c.data.path, Some(PathBuf::from("crates/cli/tests/fixtures/dataset.json")));
        assert_eq!(c.data.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn env_overrides_file() {
        let mut c = CrmConfig::default();
        c.apply_overrides(env(&[
            ("CRM_SERVER_PORT", "7070"),
            ("CRM_LOG_LEVEL", "DEBUG"),
            ("CRM_LOG_FORMAT", "json"),
            ("CRM_DATA_PAGE_SIZE", "250"),
            ("CRM_DATA_PATH", "/srv/crm.json"),
        ]))
        .unwrap();
        assert_eq!(c.server.port, 7070);
        assert_eq!(c.server.log_level, "debug");
        assert_eq!(c.server.log_format, LogFormat::Json);
        assert_eq!(c.data.page_size, 250);
        assert_eq!(c.data.path, Some(PathBuf::from("/srv/crm.json")));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn bad_env_value_is_reported() {
        let mut c = CrmConfig::default();
        let err = c
            .apply_overrides(env(&[("CRM_SERVER_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                var: "CRM_SERVER_PORT",
                ..
            }
        ));
    }

    #[test]
    fn validation_bounds() {
        let mut c = CrmConfig::default();
        c.data.page_size = 1001;
        assert!(c.validate().is_err());
        c.data.page_size = 0;
        assert!(c.validate().is_err());

        let mut c = CrmConfig::default();
        c.server.log_level = "loud".to_string();
        assert!(c.validate().is_err());

        let mut c = CrmConfig::default();
        c.server.port = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn unknown_log_format_in_toml_fails() {
        let r: Result<CrmConfig, _> = toml::from_str("[server]\nlog_format = \"xml\"\n");
        assert!(r.is_err());
    }
}
