//! Structured leveled logging for harvest runs.
//!
//! Records carry a category and optional JSON auxiliary data. By default they
//! are forwarded to the `log` facade under the `harvest::<category>` target;
//! an external callback can take over delivery instead.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::AppEnv;

/// Convenience alias for external logging callbacks.
pub type LogCallback = Arc<dyn Fn(&HarvestLogRecord) + Send + Sync + 'static>;

/// Threshold and sink selection for a [`HarvestLogger`].
#[derive(Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub external_logger: Option<LogCallback>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            external_logger: None,
        }
    }
}

impl LogConfig {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Development logs everything; every other environment keeps warnings
    /// and errors only.
    pub fn for_environment(env: AppEnv) -> Self {
        match env {
            AppEnv::Development => Self::new(LogLevel::Debug),
            _ => Self::new(LogLevel::Warn),
        }
    }

    pub fn should_log(&self, level: LogLevel) -> bool {
        level == LogLevel::Error || level <= self.level
    }
}

/// Severity ladder, most severe first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Http = 3,
    Debug = 4,
}

impl LogLevel {
    fn facade_level(self) -> log::Level {
        match self {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info | LogLevel::Http => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
        }
    }
}

/// Structured log entry shared with external callbacks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarvestLogRecord {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub level: LogLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auxiliary: Option<Value>,
}

impl HarvestLogRecord {
    pub fn new(
        message: impl Into<String>,
        level: LogLevel,
        category: Option<String>,
        auxiliary: Option<Value>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
            level,
            category,
            auxiliary,
        }
    }
}

/// Default sink: forward to the `log` facade.
pub fn default_log_handler(record: &HarvestLogRecord) {
    let target = match &record.category {
        Some(category) => format!("harvest::{category}"),
        None => "harvest".to_string(),
    };
    let level = record.level.facade_level();
    match &record.auxiliary {
        Some(aux) if !aux.is_null() => {
            log::log!(target: &target, level, "{} {}", record.message, aux)
        }
        _ => log::log!(target: &target, level, "{}", record.message),
    }
}

pub struct HarvestLogger {
    config: LogConfig,
    default_handler: LogCallback,
}

impl fmt::Debug for HarvestLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarvestLogger")
            .field("level", &self.config.level)
            .field("external_logger", &self.config.external_logger.is_some())
            .finish()
    }
}

impl Default for HarvestLogger {
    fn default() -> Self {
        Self::with_config(LogConfig::default())
    }
}

impl HarvestLogger {
    pub fn with_config(config: LogConfig) -> Self {
        Self {
            config,
            default_handler: Arc::new(default_log_handler),
        }
    }

    pub fn new(level: LogLevel) -> Self {
        Self::with_config(LogConfig::new(level))
    }

    pub fn set_external_logger(&mut self, logger: Option<LogCallback>) {
        self.config.external_logger = logger;
    }

    pub fn log(
        &self,
        message: impl Into<String>,
        level: LogLevel,
        category: Option<&str>,
        auxiliary: Option<Value>,
    ) {
        if !self.config.should_log(level) {
            return;
        }

        let record =
            HarvestLogRecord::new(message, level, category.map(|c| c.to_string()), auxiliary);

        if let Some(callback) = &self.config.external_logger {
            callback(&record);
        } else {
            (self.default_handler)(&record);
        }
    }

    pub fn error(&self, message: impl Into<String>, category: Option<&str>, auxiliary: Option<Value>) {
        self.log(message, LogLevel::Error, category, auxiliary);
    }

    pub fn warn(&self, message: impl Into<String>, category: Option<&str>, auxiliary: Option<Value>) {
        self.log(message, LogLevel::Warn, category, auxiliary);
    }

    pub fn info(&self, message: impl Into<String>, category: Option<&str>, auxiliary: Option<Value>) {
        self.log(message, LogLevel::Info, category, auxiliary);
    }

    pub fn http(&self, message: impl Into<String>, category: Option<&str>, auxiliary: Option<Value>) {
        self.log(message, LogLevel::Http, category, auxiliary);
    }

    pub fn debug(&self, message: impl Into<String>, category: Option<&str>, auxiliary: Option<Value>) {
        self.log(message, LogLevel::Debug, category, auxiliary);
    }

    /// Timing record for a finished operation.
    pub fn performance(&self, operation: &str, elapsed: Duration, auxiliary: Option<Value>) {
        let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let mut payload = json!({ "operation": operation, "duration_ms": millis });
        if let (Some(extra), Some(map)) = (auxiliary, payload.as_object_mut()) {
            map.insert("details".to_string(), extra);
        }
        self.info(
            format!("{operation} completed in {millis}ms"),
            Some("performance"),
            Some(payload),
        );
    }
}
