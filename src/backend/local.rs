//! In-memory collaborators
//!
//! Used for offline runs and tests: a topology client serving fixed
//! neighborhood data, a telemetry client answering from tables, and an
//! analysis transport that runs the correlation engine in process.

use crate::correlation::{
    CorrelationReport, FadingStatus, FaultCorrelationEngine, PowerStatus, TelemetryClient,
};
use crate::error::{DashboardError, Result};
use crate::session::{AnalysisRequest, AnalysisTransport, StreamFrame, SubmitAck};
use crate::topology::{NeighborhoodRequest, NeighborhoodResponse, TopologyClient};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ==================== Topology ====================

/// Serves the same neighborhood for every target
#[derive(Debug, Clone, Default)]
pub struct StaticTopologyClient {
    response: NeighborhoodResponse,
}

impl StaticTopologyClient {
    pub fn new(response: NeighborhoodResponse) -> Self {
        Self { response }
    }

    /// Load a neighborhood response saved as JSON
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DashboardError::Io(e).with_context(format!("Failed to read {}", path.display()))
        })?;
        Ok(Self::new(serde_json::from_str(&content)?))
    }
}

impl TopologyClient for StaticTopologyClient {
    fn fetch_neighborhood(&self, request: &NeighborhoodRequest) -> Result<NeighborhoodResponse> {
        tracing::debug!("Serving static neighborhood for {}", request.equip_id);
        Ok(self.response.clone())
    }
}

// ==================== Telemetry ====================

/// Telemetry answering from lookup tables; unknown equipment is healthy
#[derive(Debug, Clone, Default)]
pub struct ScriptedTelemetry {
    fading: HashSet<(String, String)>,
    battery: HashSet<String>,
    unreachable: HashSet<String>,
}

impl ScriptedTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report the hop between `a` and `b` as fading, in either direction
    pub fn with_fading(mut self, a: &str, b: &str) -> Self {
        self.fading.insert((a.to_string(), b.to_string()));
        self
    }

    pub fn with_battery(mut self, equip_id: &str) -> Self {
        self.battery.insert(equip_id.to_string());
        self
    }

    /// Make every check touching `equip_id` fail
    pub fn with_unreachable(mut self, equip_id: &str) -> Self {
        self.unreachable.insert(equip_id.to_string());
        self
    }

    fn reachable(&self, equip_id: &str) -> Result<()> {
        if self.unreachable.contains(equip_id) {
            Err(DashboardError::Timeout(format!("no telemetry from {}", equip_id)))
        } else {
            Ok(())
        }
    }
}

impl TelemetryClient for ScriptedTelemetry {
    fn check_fading(&self, source_id: &str, target_id: &str) -> Result<FadingStatus> {
        self.reachable(source_id)?;
        self.reachable(target_id)?;
        let forward = (source_id.to_string(), target_id.to_string());
        let backward = (target_id.to_string(), source_id.to_string());
        Ok(
            if self.fading.contains(&forward) || self.fading.contains(&backward) {
                FadingStatus::Fading
            } else {
                FadingStatus::Normal
            },
        )
    }

    fn check_power(&self, equip_id: &str, _site: &str) -> Result<PowerStatus> {
        self.reachable(equip_id)?;
        Ok(if self.battery.contains(equip_id) {
            PowerStatus::Battery
        } else {
            PowerStatus::Mains
        })
    }
}

// ==================== Analysis ====================

/// Capacity of an in-process session stream
const LOCAL_STREAM_CAPACITY: usize = 64;

/// Runs the correlation engine in process and streams its progress
pub struct LocalAnalysisTransport {
    engine: Arc<FaultCorrelationEngine>,
    pending: Mutex<HashMap<String, Receiver<StreamFrame>>>,
}

impl LocalAnalysisTransport {
    pub fn new(engine: FaultCorrelationEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn stream_session(engine: &FaultCorrelationEngine, request: &AnalysisRequest, tx: &Sender<StreamFrame>) {
        let report = engine.analyze_with_progress(&request.snapshot, &mut |message: &str| {
            let _ = tx.send(StreamFrame::progress(message));
        });
        let frames = match StreamFrame::result(&report) {
            Ok(result) => vec![result, StreamFrame::complete()],
            Err(e) => vec![StreamFrame::error(e.to_string())],
        };
        for frame in frames {
            if tx.send(frame).is_err() {
                tracing::debug!("Local analysis stream abandoned");
                return;
            }
        }
    }
}

impl AnalysisTransport for LocalAnalysisTransport {
    fn submit(&self, request: &AnalysisRequest, _timeout: Duration) -> Result<SubmitAck> {
        let Some(session_id) = request.session_id.clone() else {
            return Ok(SubmitAck::rejected("streaming request without a session id"));
        };

        let (tx, rx) = bounded(LOCAL_STREAM_CAPACITY);
        self.pending
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(session_id.clone(), rx);

        let engine = Arc::clone(&self.engine);
        let request = request.clone();
        std::thread::Builder::new()
            .name("local-analysis".to_string())
            .spawn(move || Self::stream_session(&engine, &request, &tx))?;

        tracing::debug!("Accepted local analysis session {}", session_id);
        Ok(SubmitAck::accepted())
    }

    fn open_stream(&self, session_id: &str) -> Result<Receiver<StreamFrame>> {
        self.pending
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(session_id)
            .ok_or_else(|| DashboardError::NotFound(format!("analysis session {}", session_id)))
    }

    fn submit_blocking(&self, request: &AnalysisRequest, _timeout: Duration) -> Result<CorrelationReport> {
        Ok(self.engine.analyze(&request.snapshot))
    }

    fn close_stream(&self, session_id: &str) {
        self.pending
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(session_id);
    }
}
