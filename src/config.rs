//! Process-wide configuration, read from the environment the deployment sets up.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str = "https://nyc3.digitaloceanspaces.com";
pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?} (expected {expected})")]
    InvalidValue {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub staging: StagingConfig,
    pub logging: LoggingConfig,
}

/// Connection settings for the S3-compatible store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(skip_serializing)]
    pub access_key: Option<String>,
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
    pub bucket: Option<String>,
    pub endpoint: String,
    pub region: String,
    /// Address the bucket as `endpoint/bucket` instead of `bucket.endpoint`.
    pub path_style: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "asciiart_core=debug,warn".
    pub level: String,
    pub json: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            access_key: None,
            secret_key: None,
            bucket: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            region: DEFAULT_REGION.to_string(),
            path_style: false,
        }
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source. Unset or empty variables
    /// keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        config.storage.access_key = get("SPACES_KEY");
        config.storage.secret_key = get("SPACES_SECRET");
        config.storage.bucket = get("SPACES_NAME");
        if let Some(endpoint) = get("SPACES_ENDPOINT") {
            config.storage.endpoint = endpoint;
        }
        if let Some(region) = get("SPACES_REGION") {
            config.storage.region = region;
        }
        if let Some(raw) = get("SPACES_PATH_STYLE") {
            config.storage.path_style = parse_bool("SPACES_PATH_STYLE", &raw)?;
        }
        if let Some(dir) = get("ASCIIART_STAGING_DIR") {
            config.staging.dir = PathBuf::from(dir);
        }
        if let Some(level) = get("ASCIIART_LOG") {
            config.logging.level = level;
        }
        if let Some(raw) = get("ASCIIART_LOG_JSON") {
            config.logging.json = parse_bool("ASCIIART_LOG_JSON", &raw)?;
        }

        Ok(config)
    }
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: raw.to_string(),
            expected: "a boolean",
        }),
    }
}
