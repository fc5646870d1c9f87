//! Error handling for netfault-rs
//!
//! This module defines the error taxonomy shared by the graph builder, the
//! correlation engine and the analysis session coordinator, plus a Result
//! alias for use throughout the crate.

use thiserror::Error;

/// Main error type for netfault-rs operations
#[derive(Error, Debug)]
pub enum DashboardError {
    /// The target equipment is unknown to both the alarm list and the equipment directory
    #[error("Equipment not found: {0}")]
    NotFound(String),

    /// A connection record or wire payload could not be decoded
    #[error("Malformed record: {0}")]
    Malformed(String),

    /// Remote call failed or the stream channel dropped
    #[error("Network error: {0}")]
    Network(String),

    /// The remote side answered but refused the request
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// Timeout errors
    #[error("Timeout: {0}")]
    Timeout(String),

    /// An analysis session is already in flight
    #[error("An analysis is already in progress")]
    ConcurrentAnalysis,

    /// A telemetry check for one element failed
    #[error("Telemetry check failed for {element}: {message}")]
    PartialTelemetry { element: String, message: String },

    /// The stream completed without ever delivering a result
    #[error("Analysis completed without a result")]
    NoResult,

    /// The analysis service reported a failure
    #[error("Analysis failed: {0}")]
    Analysis(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<DashboardError>,
    },
}

impl DashboardError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        DashboardError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping context layers
    pub fn root(&self) -> &DashboardError {
        match self {
            DashboardError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<serde_json::Error> for DashboardError {
    fn from(err: serde_json::Error) -> Self {
        DashboardError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for DashboardError {
    fn from(err: toml::de::Error) -> Self {
        DashboardError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DashboardError {
    fn from(err: toml::ser::Error) -> Self {
        DashboardError::Config(err.to_string())
    }
}

/// Result type alias for netfault-rs operations
pub type Result<T> = std::result::Result<T, DashboardError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DashboardError::NotFound("EQ-404".to_string());
        assert_eq!(err.to_string(), "Equipment not found: EQ-404");
    }

    #[test]
    fn test_error_with_context() {
        let err = DashboardError::Network("connection refused".to_string());
        let with_ctx = err.with_context("Failed to fetch neighborhood");
        assert!(with_ctx.to_string().contains("Failed to fetch neighborhood"));
        assert!(with_ctx.to_string().contains("connection refused"));
    }

    #[test]
    fn test_root_skips_context_layers() {
        let err = DashboardError::NoResult
            .with_context("stream")
            .with_context("session");
        assert!(matches!(err.root(), DashboardError::NoResult));
    }

    #[test]
    fn test_partial_telemetry_display() {
        let err = DashboardError::PartialTelemetry {
            element: "EQ-200".to_string(),
            message: "timed out".to_string(),
        };
        assert!(err.to_string().contains("EQ-200"));
        assert!(err.to_string().contains("timed out"));
    }
}
