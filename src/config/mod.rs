//! Configuration module for netfault-rs
//!
//! This module handles the dashboard configuration: remote endpoints, logging
//! and the per-component settings from [`settings`].
//!
//! # Config Location
//!
//! The configuration is stored as TOML in the platform-appropriate location:
//! - **Linux**: `~/.config/dev.netfault.netfault-rs/config.toml`
//! - **macOS**: `~/Library/Application Support/dev.netfault.netfault-rs/config.toml`
//! - **Windows**: `%APPDATA%\dev.netfault.netfault-rs\config.toml`
//!
//! # Example
//!
//! ```ignore
//! use netfault_rs::config::DashboardConfig;
//!
//! let mut config = DashboardConfig::load_or_default();
//! config.endpoint.base_url = "http://noc.internal:5000".to_string();
//! config.save()?;
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{DashboardError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for config directories
pub const APP_ID: &str = "dev.netfault.netfault-rs";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default base URL of the dashboard API
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

/// Default per-request timeout for topology and telemetry calls in milliseconds
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

// ==================== Config Directory ====================

/// Get the application config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Ensure the config directory exists
pub fn ensure_config_dir() -> Result<PathBuf> {
    let dir = config_dir().ok_or_else(|| {
        DashboardError::Config("Could not determine config directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            DashboardError::Config(format!("Failed to create config directory: {}", e))
        })?;
    }

    Ok(dir)
}

/// Get the path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== Sections ====================

/// Remote API endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Base URL; API paths are appended to it
    pub base_url: String,

    /// Timeout for topology and telemetry requests
    pub request_timeout_ms: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl EndpointConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Join an API path onto the base URL
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    pub filter: String,

    /// Directory for daily rolling log files; stderr only when unset
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,netfault_rs=debug".to_string(),
            directory: None,
        }
    }
}

// ==================== Dashboard Config ====================

/// Complete dashboard configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub endpoint: EndpointConfig,
    pub logging: LoggingConfig,
    pub topology: TopologySettings,
    pub layout: LayoutSettings,
    pub relaxation: RelaxationSettings,
    pub correlation: CorrelationSettings,
    pub session: SessionSettings,
}

impl DashboardConfig {
    /// Load config from the default location, defaulting when no file exists
    pub fn load() -> Result<Self> {
        let path = config_path().ok_or_else(|| {
            DashboardError::Config("Could not determine config path".to_string())
        })?;

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load config, returning defaults on any error
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Load config from an explicit path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DashboardError::Config(format!("Failed to read config {:?}: {}", path, e))
        })?;

        toml::from_str(&content).map_err(|e| {
            DashboardError::Config(format!("Failed to parse config {:?}: {}", path, e))
        })
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        let dir = ensure_config_dir()?;
        self.save_to(dir.join(CONFIG_FILE))
    }

    /// Save config to an explicit path
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DashboardError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)?;

        std::fs::write(path, content).map_err(|e| {
            DashboardError::Config(format!("Failed to write config {:?}: {}", path, e))
        })
    }
}
