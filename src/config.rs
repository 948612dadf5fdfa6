//! Strongly-typed configuration loaded from the process environment.
//!
//! Values are read after loading a `.env` file if present. Every value is
//! validated up front; the binary refuses to start on a [`ConfigError`].

use std::env;
use std::fmt;
use std::num::ParseIntError;
use std::path::PathBuf;

use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::logging::LogConfig;
use crate::pipeline::{CaptureSettings, HarvestSettings, ListingLayout};
use crate::timing::{Deadlines, RetryPolicy};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_ITEMS: usize = 3;
pub const DEFAULT_SCREENSHOT_PATH: &str = "./screenshots";
pub const DEFAULT_SCREENSHOT_PREFIX: &str = "post";

/// Deployment environment; decides the log threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    #[default]
    Development,
    Testing,
    Staging,
    Production,
}

impl AppEnv {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" => Some(AppEnv::Development),
            "testing" => Some(AppEnv::Testing),
            "staging" => Some(AppEnv::Staging),
            "production" => Some(AppEnv::Production),
            _ => None,
        }
    }
}

impl fmt::Display for AppEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AppEnv::Development => "development",
            AppEnv::Testing => "testing",
            AppEnv::Staging => "staging",
            AppEnv::Production => "production",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestConfig {
    pub target_url: Url,
    pub app_env: AppEnv,
    pub port: u16,
    pub headless: bool,
    pub save_screenshots: bool,
    pub screenshot_path: PathBuf,
    pub screenshot_prefix: String,
    pub max_items: usize,
    pub chrome_executable: Option<PathBuf>,
    pub layout: ListingLayout,
}

impl HarvestConfig {
    /// Defaults for everything but the listing URL.
    pub fn new(target_url: Url) -> Self {
        Self {
            target_url,
            app_env: AppEnv::default(),
            port: DEFAULT_PORT,
            headless: true,
            save_screenshots: false,
            screenshot_path: PathBuf::from(DEFAULT_SCREENSHOT_PATH),
            screenshot_prefix: DEFAULT_SCREENSHOT_PREFIX.to_string(),
            max_items: DEFAULT_MAX_ITEMS,
            chrome_executable: None,
            layout: ListingLayout::default(),
        }
    }

    /// Construct a configuration from environment variables, after loading a
    /// `.env` file if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv();

        let raw_url = env_var("TARGET_URL").ok_or(ConfigError::Missing {
            field: "TARGET_URL",
        })?;
        let mut config = HarvestConfig::new(parse_url("TARGET_URL", &raw_url)?);

        if let Some(value) = env_var("APP_ENV") {
            config.app_env = AppEnv::parse(&value)
                .ok_or_else(|| ConfigError::invalid_enum("APP_ENV", value.clone()))?;
        }

        if let Some(value) = env_var("PORT") {
            config.port = parse_u16("PORT", &value)?;
        }

        if let Some(value) = env_var("HEADLESS") {
            config.headless = parse_bool("HEADLESS", &value)?;
        }

        if let Some(value) = env_var("SAVE_SCREENSHOTS") {
            config.save_screenshots = parse_bool("SAVE_SCREENSHOTS", &value)?;
        }

        if let Some(value) = env_var("SCREENSHOT_PATH") {
            config.screenshot_path = PathBuf::from(value);
        }

        if let Some(value) = env_var("SCREENSHOT_PREFIX") {
            config.screenshot_prefix = value;
        }

        if let Some(value) = env_var("MAX_ITEMS") {
            config.max_items = parse_usize("MAX_ITEMS", &value)?;
            if config.max_items == 0 {
                return Err(ConfigError::OutOfRange {
                    field: "MAX_ITEMS",
                    value,
                    expected: "at least 1",
                });
            }
        }

        if let Some(value) = env_var("HARVEST_CHROME_BIN") {
            config.chrome_executable = Some(PathBuf::from(value));
        }

        if let Some(value) = env_var("LISTING_CONTAINER_SELECTOR") {
            config.layout.container = value;
        }
        if let Some(value) = env_var("LISTING_ENTRY_SELECTOR") {
            config.layout.entry = value;
        }
        if let Some(value) = env_var("LISTING_TARGET_SELECTOR") {
            config.layout.target = value;
        }

        Ok(config)
    }

    /// Orchestrator settings with the default deadlines and retry policy.
    pub fn settings(&self) -> HarvestSettings {
        HarvestSettings {
            target_url: self.target_url.to_string(),
            max_items: self.max_items,
            layout: self.layout.clone(),
            capture: CaptureSettings {
                enabled: self.save_screenshots,
                directory: self.screenshot_path.clone(),
                prefix: self.screenshot_prefix.clone(),
            },
            deadlines: Deadlines::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig::for_environment(self.app_env)
    }
}

/// Errors that can arise while constructing a [`HarvestConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be set")]
    Missing { field: &'static str },
    #[error("invalid value '{value}' for {field}")]
    InvalidEnumVariant { field: &'static str, value: String },
    #[error("invalid boolean '{value}' for {field}")]
    InvalidBool { field: &'static str, value: String },
    #[error("invalid number '{value}' for {field}: {source}")]
    InvalidNumber {
        field: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("{field} must be {expected}, got '{value}'")]
    OutOfRange {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("invalid URL '{value}' for {field}: {reason}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid_enum(field: &'static str, value: String) -> Self {
        ConfigError::InvalidEnumVariant { field, value }
    }
}

fn env_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bool(field: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            field,
            value: value.to_string(),
        }),
    }
}

fn parse_u16(field: &'static str, value: &str) -> Result<u16, ConfigError> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|source| ConfigError::InvalidNumber {
            field,
            value: value.to_string(),
            source,
        })
}

fn parse_usize(field: &'static str, value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|source| ConfigError::InvalidNumber {
            field,
            value: value.to_string(),
            source,
        })
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
        reason,
    };
    let url = Url::parse(value).map_err(|err| invalid(err.to_string()))?;
    match url.scheme() {
        "http" | "https" | "file" => Ok(url),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}
