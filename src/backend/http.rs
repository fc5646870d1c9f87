//! HTTP/JSON collaborators backed by `ureq`
//!
//! A single [`HttpBackend`] serves the neighborhood fetch, both MW telemetry
//! checks and the analysis transport. The analysis stream is read as
//! server-sent events on a dedicated reader thread.

use crate::config::EndpointConfig;
use crate::correlation::telemetry::{FadingRequest, FadingResponse, PowerRequest, PowerResponse};
use crate::correlation::{CorrelationReport, FadingStatus, PowerStatus, TelemetryClient};
use crate::error::{DashboardError, Result};
use crate::session::{AnalysisRequest, AnalysisTransport, StreamFrame, SubmitAck};
use crate::topology::{NeighborhoodRequest, NeighborhoodResponse, TopologyClient};
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const NEIGHBORHOOD_PATH: &str = "/api/alarm_dashboard_equip";
pub const FADING_PATH: &str = "/api/check_mw_fading";
pub const POWER_PATH: &str = "/api/check_mw_power";
pub const ANALYSIS_PATH: &str = "/api/infer_failure_point";
pub const ANALYSIS_STREAM_PATH: &str = "/api/infer_failure_point_stream";

/// Capacity of the frame channel fed by the stream reader
const STREAM_CAPACITY: usize = 256;

fn map_ureq_error(url: &str, err: ureq::Error) -> DashboardError {
    match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            DashboardError::Rejected(format!("{} returned {}: {}", url, code, body.trim()))
        }
        ureq::Error::Transport(transport) => {
            let timed_out = std::error::Error::source(&transport)
                .and_then(|source| source.downcast_ref::<std::io::Error>())
                .is_some_and(|io| {
                    matches!(
                        io.kind(),
                        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
                    )
                });
            if timed_out {
                DashboardError::Timeout(format!("{}: {}", url, transport))
            } else {
                DashboardError::Network(format!("{}: {}", url, transport))
            }
        }
    }
}

/// Cancel flags of the open analysis streams, by session id
type StreamRegistry = Arc<Mutex<HashMap<String, Arc<AtomicBool>>>>;

/// Registration of one open stream, released when its reader exits
struct StreamLease {
    registry: StreamRegistry,
    session_id: String,
    cancel: Arc<AtomicBool>,
}

impl StreamLease {
    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }
}

impl Drop for StreamLease {
    fn drop(&mut self) {
        let mut streams = self.registry.lock().unwrap_or_else(|p| p.into_inner());
        // A later stream may have reused the id
        if streams
            .get(&self.session_id)
            .is_some_and(|cancel| Arc::ptr_eq(cancel, &self.cancel))
        {
            streams.remove(&self.session_id);
        }
    }
}

/// All remote collaborators over one `ureq` agent
pub struct HttpBackend {
    agent: ureq::Agent,
    endpoint: EndpointConfig,
    streams: StreamRegistry,
}

impl HttpBackend {
    pub fn new(endpoint: EndpointConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(endpoint.request_timeout())
            .build();
        Self {
            agent,
            endpoint,
            streams: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn endpoint(&self) -> &EndpointConfig {
        &self.endpoint
    }

    /// Number of analysis streams whose reader is still running
    pub fn open_stream_count(&self) -> usize {
        self.streams.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    fn post_json<B, R>(&self, path: &str, body: &B, timeout: Duration) -> Result<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = self.endpoint.url(path);
        let payload = serde_json::to_string(body)?;
        tracing::trace!("POST {} ({} bytes)", url, payload.len());

        let response = self
            .agent
            .post(&url)
            .timeout(timeout)
            .set("content-type", "application/json")
            .send_string(&payload)
            .map_err(|e| map_ureq_error(&url, e))?;
        let text = response
            .into_string()
            .map_err(|e| DashboardError::Network(format!("read response from {}: {}", url, e)))?;
        Ok(serde_json::from_str(&text)?)
    }

    fn register_stream(&self, session_id: &str) -> StreamLease {
        let cancel = Arc::new(AtomicBool::new(false));
        let mut streams = self.streams.lock().unwrap_or_else(|p| p.into_inner());
        streams.insert(session_id.to_string(), Arc::clone(&cancel));
        StreamLease {
            registry: Arc::clone(&self.streams),
            session_id: session_id.to_string(),
            cancel,
        }
    }
}

impl TopologyClient for HttpBackend {
    fn fetch_neighborhood(&self, request: &NeighborhoodRequest) -> Result<NeighborhoodResponse> {
        self.post_json(NEIGHBORHOOD_PATH, request, self.endpoint.request_timeout())
    }
}

impl TelemetryClient for HttpBackend {
    fn check_fading(&self, source_id: &str, target_id: &str) -> Result<FadingStatus> {
        let response: FadingResponse = self.post_json(
            FADING_PATH,
            &FadingRequest::new(source_id, target_id),
            self.endpoint.request_timeout(),
        )?;
        response.status()
    }

    fn check_power(&self, equip_id: &str, site: &str) -> Result<PowerStatus> {
        let response: PowerResponse = self.post_json(
            POWER_PATH,
            &PowerRequest::new(equip_id, site),
            self.endpoint.request_timeout(),
        )?;
        response.status()
    }
}

impl AnalysisTransport for HttpBackend {
    fn submit(&self, request: &AnalysisRequest, timeout: Duration) -> Result<SubmitAck> {
        self.post_json(ANALYSIS_PATH, request, timeout)
    }

    fn open_stream(&self, session_id: &str) -> Result<Receiver<StreamFrame>> {
        let url = self
            .endpoint
            .url(&format!("{}/{}", ANALYSIS_STREAM_PATH, session_id));
        let response = self
            .agent
            .get(&url)
            .set("accept", "text/event-stream")
            .call()
            .map_err(|e| map_ureq_error(&url, e))?;

        let lease = self.register_stream(session_id);
        let (tx, rx) = bounded(STREAM_CAPACITY);
        let reader = response.into_reader();

        std::thread::Builder::new()
            .name("analysis-stream".to_string())
            .spawn(move || read_event_stream(reader, tx, lease))?;

        tracing::debug!("Opened analysis stream {}", url);
        Ok(rx)
    }

    fn submit_blocking(&self, request: &AnalysisRequest, timeout: Duration) -> Result<CorrelationReport> {
        let report: CorrelationReport = self.post_json(ANALYSIS_PATH, request, timeout)?;
        Ok(report.with_derived_summary())
    }

    fn close_stream(&self, session_id: &str) {
        let mut streams = self.streams.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(cancel) = streams.remove(session_id) {
            cancel.store(true, Ordering::Release);
            tracing::debug!("Closed analysis stream {}", session_id);
        }
    }
}

// ==================== Event Stream ====================

/// Decode one server-sent-event line into a frame
///
/// Only `data:` lines carry frames; comments, blank lines and other fields
/// yield `None`, as does a payload that is not a frame.
pub fn parse_event_line(line: &str) -> Option<StreamFrame> {
    let payload = line.strip_prefix("data:")?.trim();
    if payload.is_empty() {
        return None;
    }
    match serde_json::from_str(payload) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::warn!("Dropping undecodable stream event: {}", e);
            None
        }
    }
}

fn read_event_stream(reader: impl Read, tx: Sender<StreamFrame>, lease: StreamLease) {
    let session_id = lease.session_id.as_str();
    for line in BufReader::new(reader).lines() {
        if lease.is_cancelled() {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Analysis stream {} read failed: {}", session_id, e);
                break;
            }
        };
        let Some(frame) = parse_event_line(&line) else {
            continue;
        };
        let terminal = matches!(
            frame.kind,
            crate::session::FrameKind::Complete | crate::session::FrameKind::Error
        );
        if tx.send(frame).is_err() || terminal {
            break;
        }
    }
    tracing::debug!("Analysis stream reader {} exiting", session_id);
}
