//! # netfault-rs: Topology Fault Correlation
//!
//! Builds the equipment neighborhood of an alarmed network element, lays it
//! out for display, and classifies the likely failure points among its nodes
//! and links. The architecture keeps the synchronous core (graph build,
//! layout, correlation) separate from the I/O collaborators it talks to.
//!
//! ## Architecture
//!
//! - **Topology**: BFS neighborhood builder over an injected [`TopologyClient`]
//! - **Layout**: deterministic hierarchical placement plus a time-boxed force relaxation
//! - **Correlation**: five-stage fault classification with MW telemetry checks
//! - **Session**: single-flight streaming analysis with a non-streaming fallback
//! - **Backend**: HTTP (`ureq`) and in-memory collaborator implementations
//! - **Communication**: Crossbeam channels between session workers and the caller
//!
//! ## Configuration
//!
//! Settings are stored as TOML in the platform-appropriate config directory
//! under `dev.netfault.netfault-rs`:
//!
//! - **Linux**: `~/.config/dev.netfault.netfault-rs/`
//! - **macOS**: `~/Library/Application Support/dev.netfault.netfault-rs/`
//! - **Windows**: `%APPDATA%\dev.netfault.netfault-rs\`
//!
//! ## Example
//!
//! ```ignore
//! use netfault_rs::{
//!     app::{AnalysisPoll, DashboardContext},
//!     backend::Collaborators,
//!     config::DashboardConfig,
//!     topology::AlarmDirectory,
//! };
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = DashboardConfig::load_or_default();
//!     let directory = AlarmDirectory::load("alarms.json")?;
//!     let collaborators = Collaborators::http(&config);
//!
//!     let mut context = DashboardContext::new(config, collaborators, directory);
//!     context.select_target("EQ-100", std::time::Instant::now())?;
//!     context.start_analysis()?;
//!
//!     if let AnalysisPoll::Finished(outcome) = context.wait_analysis() {
//!         println!("{:?}", outcome.report());
//!     }
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod backend;
pub mod config;
pub mod correlation;
pub mod error;
pub mod events;
pub mod layout;
pub mod session;
pub mod topology;
pub mod types;

// Re-export commonly used types
pub use app::{AnalysisPoll, DashboardContext};
pub use backend::Collaborators;
pub use config::DashboardConfig;
pub use correlation::{AnalysisSnapshot, CorrelationReport, FaultCorrelationEngine, TelemetryClient};
pub use error::{DashboardError, Result};
pub use events::{EventBus, InteractionEvent};
pub use session::{AnalysisSessionCoordinator, AnalysisTransport, Generation, SessionOutcome};
pub use topology::{AlarmDirectory, TopologyClient, TopologyGraph, TopologyGraphBuilder};
pub use types::{Alarm, EquipmentNode, FailurePoint, Field, Link};
