//! Browser launch options derived from the harvest configuration.

use std::path::PathBuf;

use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::handler::viewport::Viewport as CdpViewport;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::HarvestConfig;

/// Flags passed to every launched browser.
pub const DEFAULT_LAUNCH_ARGS: [&str; 5] = [
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-accelerated-2d-canvas",
];

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("invalid browser launch configuration: {0}")]
    Config(String),
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("browser error: {0}")]
    Message(String),
}

/// Viewport applied to every tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport {
            width: 1280,
            height: 720,
            device_scale_factor: 1.0,
        }
    }
}

impl From<&Viewport> for CdpViewport {
    fn from(viewport: &Viewport) -> Self {
        CdpViewport {
            width: viewport.width,
            height: viewport.height,
            device_scale_factor: Some(viewport.device_scale_factor),
            emulating_mobile: false,
            is_landscape: viewport.width >= viewport.height,
            has_touch: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaunchOptions {
    pub headless: bool,
    pub args: Vec<String>,
    pub viewport: Viewport,
    pub chrome_executable: Option<PathBuf>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            args: DEFAULT_LAUNCH_ARGS.iter().map(|arg| arg.to_string()).collect(),
            viewport: Viewport::default(),
            chrome_executable: None,
        }
    }
}

impl LaunchOptions {
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self {
            headless: config.headless,
            chrome_executable: config.chrome_executable.clone(),
            ..Self::default()
        }
    }

    /// Translate into a chromiumoxide [`BrowserConfig`].
    pub fn browser_config(&self) -> Result<BrowserConfig, BrowserError> {
        let mut builder = BrowserConfig::builder();

        if let Some(path) = &self.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        let builder = builder
            .viewport(CdpViewport::from(&self.viewport))
            .args(self.args.clone());

        let builder = if self.headless {
            builder
        } else {
            builder.with_head()
        };

        builder.build().map_err(BrowserError::Config)
    }
}
