//! Collaborator implementations
//!
//! The library core only talks to [`TopologyClient`], [`TelemetryClient`] and
//! [`AnalysisTransport`]. This module provides the concrete implementations:
//!
//! - [`HttpBackend`] - all three traits over HTTP/JSON against the alarm
//!   dashboard API, with the analysis stream read as server-sent events
//! - [`StaticTopologyClient`] / [`ScriptedTelemetry`] - fixed in-memory answers
//! - [`LocalAnalysisTransport`] - runs the correlation engine in process
//!
//! # Example
//!
//! ```ignore
//! use netfault_rs::app::DashboardContext;
//! use netfault_rs::backend::Collaborators;
//! use netfault_rs::config::DashboardConfig;
//! use netfault_rs::topology::AlarmDirectory;
//!
//! let config = DashboardConfig::load_or_default();
//! let collaborators = Collaborators::http(&config);
//! let context = DashboardContext::new(config, collaborators, AlarmDirectory::default());
//! ```

pub mod http;
pub mod local;

pub use http::HttpBackend;
pub use local::{LocalAnalysisTransport, ScriptedTelemetry, StaticTopologyClient};

use crate::config::DashboardConfig;
use crate::correlation::{FaultCorrelationEngine, NoopTelemetry, TelemetryClient};
use crate::session::{AnalysisTransport, NoopTransport};
use crate::topology::{NoopTopologyClient, TopologyClient};
use std::sync::Arc;

/// The set of collaborators a dashboard context is wired with
#[derive(Clone)]
pub struct Collaborators {
    pub topology: Arc<dyn TopologyClient>,
    pub telemetry: Arc<dyn TelemetryClient>,
    pub transport: Arc<dyn AnalysisTransport>,
}

impl Collaborators {
    /// Every collaborator served by one HTTP backend
    pub fn http(config: &DashboardConfig) -> Self {
        let backend = Arc::new(HttpBackend::new(config.endpoint.clone()));
        Self {
            topology: backend.clone(),
            telemetry: backend.clone(),
            transport: backend,
        }
    }

    /// Fixed topology and telemetry with in-process analysis
    pub fn local(
        config: &DashboardConfig,
        topology: StaticTopologyClient,
        telemetry: ScriptedTelemetry,
    ) -> Self {
        let telemetry: Arc<dyn TelemetryClient> = Arc::new(telemetry);
        let engine = FaultCorrelationEngine::new(config.correlation.clone(), Arc::clone(&telemetry));
        Self {
            topology: Arc::new(topology),
            telemetry,
            transport: Arc::new(LocalAnalysisTransport::new(engine)),
        }
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            topology: Arc::new(NoopTopologyClient),
            telemetry: Arc::new(NoopTelemetry),
            transport: Arc::new(NoopTransport),
        }
    }
}
