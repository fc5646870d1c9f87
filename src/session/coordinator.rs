//! Analysis session coordinator
//!
//! Runs one submit → stream → result session at a time on a worker thread
//! and relays [`SessionEvent`]s to the caller through a [`SessionHandle`].

use super::protocol::{AnalysisRequest, FrameKind, StreamFrame, SubmitAck};
use super::transport::AnalysisTransport;
use super::types::{Generation, SessionEvent, SessionOutcome, SessionPhase};
use crate::config::SessionSettings;
use crate::correlation::{AnalysisSnapshot, CorrelationReport};
use crate::error::{DashboardError, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub const FALLBACK_PROGRESS_MESSAGE: &str = "Retrying analysis without streaming";

type SharedPhase = Arc<Mutex<SessionPhase>>;

fn set_phase(phase: &SharedPhase, next: SessionPhase) {
    let mut guard = phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = next;
}

/// Releases the single-flight latch when the worker ends, panics included
struct LatchGuard {
    in_progress: Arc<AtomicBool>,
    phase: SharedPhase,
}

impl Drop for LatchGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            tracing::error!("Analysis session worker panicked");
        }
        set_phase(&self.phase, SessionPhase::Idle);
        self.in_progress.store(false, Ordering::Release);
    }
}

// ==================== Coordinator ====================

/// Single-flight analysis session coordinator
pub struct AnalysisSessionCoordinator {
    transport: Arc<dyn AnalysisTransport>,
    settings: SessionSettings,
    in_progress: Arc<AtomicBool>,
    phase: SharedPhase,
    sequence: AtomicU64,
}

impl AnalysisSessionCoordinator {
    pub fn new(transport: Arc<dyn AnalysisTransport>, settings: SessionSettings) -> Self {
        Self {
            transport,
            settings,
            in_progress: Arc::new(AtomicBool::new(false)),
            phase: Arc::new(Mutex::new(SessionPhase::Idle)),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Whether a session is in flight
    pub fn is_busy(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_session_id(&self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("session_{}_{}", millis, seq)
    }

    /// Start a session for `snapshot`
    ///
    /// Fails with [`DashboardError::ConcurrentAnalysis`] while another session
    /// is in flight; the transport is not called in that case.
    pub fn submit(&self, snapshot: AnalysisSnapshot, generation: Generation) -> Result<SessionHandle> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("Analysis submission rejected: a session is already running");
            return Err(DashboardError::ConcurrentAnalysis);
        }

        let latch = LatchGuard {
            in_progress: Arc::clone(&self.in_progress),
            phase: Arc::clone(&self.phase),
        };
        set_phase(&self.phase, SessionPhase::Submitting);

        let session_id = self.next_session_id();
        let (event_tx, event_rx) = bounded(self.settings.event_capacity.max(1));
        let worker = SessionWorker {
            transport: Arc::clone(&self.transport),
            settings: self.settings.clone(),
            phase: Arc::clone(&self.phase),
            session_id: session_id.clone(),
            generation,
            events: event_tx,
        };

        tracing::info!(
            "Starting analysis session {} ({} nodes, {} links, {} alarms)",
            session_id,
            snapshot.nodes.len(),
            snapshot.links.len(),
            snapshot.alarms.len()
        );

        let worker = std::thread::Builder::new()
            .name("analysis-session".to_string())
            .spawn(move || worker.run(snapshot, latch))?;

        Ok(SessionHandle {
            session_id,
            generation,
            events: event_rx,
            worker: Some(worker),
        })
    }
}

// ==================== Worker ====================

struct SessionWorker {
    transport: Arc<dyn AnalysisTransport>,
    settings: SessionSettings,
    phase: SharedPhase,
    session_id: String,
    generation: Generation,
    events: Sender<SessionEvent>,
}

impl SessionWorker {
    fn run(self, snapshot: AnalysisSnapshot, latch: LatchGuard) {
        let outcome = self.drive(snapshot);
        set_phase(&self.phase, outcome.phase());

        match &outcome {
            SessionOutcome::Completed(report) => tracing::info!(
                "Analysis session {} completed with {} failure points",
                self.session_id,
                report.failure_points.len()
            ),
            SessionOutcome::Failed(e) => {
                tracing::error!("Analysis session {} failed: {}", self.session_id, e)
            }
            SessionOutcome::TimedOut => {
                tracing::warn!("Analysis session {} timed out", self.session_id)
            }
        }

        // Free the latch before the caller can observe the terminal event
        drop(latch);

        let event = SessionEvent::Finished {
            session_id: self.session_id.clone(),
            generation: self.generation,
            outcome,
        };
        if self.events.send(event).is_err() {
            tracing::debug!("Session {} finished after its handle was dropped", self.session_id);
        }
    }

    fn drive(&self, snapshot: AnalysisSnapshot) -> SessionOutcome {
        let request = AnalysisRequest::streaming(snapshot, self.session_id.as_str());

        let accepted = self
            .transport
            .submit(&request, self.settings.submit_timeout())
            .and_then(SubmitAck::into_result);
        if let Err(e) = accepted {
            tracing::warn!("Streaming submission failed: {}", e);
            return self.fallback(request);
        }

        set_phase(&self.phase, SessionPhase::Streaming);
        match self.transport.open_stream(&self.session_id) {
            Ok(frames) => self.consume(&frames),
            Err(e) => SessionOutcome::Failed(e.with_context("Failed to open analysis stream")),
        }
    }

    fn fallback(&self, request: AnalysisRequest) -> SessionOutcome {
        self.progress(FALLBACK_PROGRESS_MESSAGE.to_string());
        match self
            .transport
            .submit_blocking(&request.into_blocking(), self.settings.fallback_timeout())
        {
            Ok(report) => SessionOutcome::Completed(report),
            Err(e) => SessionOutcome::Failed(e.with_context("Non-streaming analysis failed")),
        }
    }

    fn consume(&self, frames: &Receiver<StreamFrame>) -> SessionOutcome {
        let deadline = Instant::now() + self.settings.stream_timeout();
        let mut result: Option<CorrelationReport> = None;

        loop {
            let frame = match frames.recv_deadline(deadline) {
                Ok(frame) => frame,
                Err(RecvTimeoutError::Timeout) => {
                    self.transport.close_stream(&self.session_id);
                    return SessionOutcome::TimedOut;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return SessionOutcome::Failed(DashboardError::Network(
                        "analysis stream closed before completion".to_string(),
                    ));
                }
            };

            match frame.kind {
                FrameKind::Progress => {
                    if let Some(message) = frame.message {
                        self.progress(message);
                    }
                }
                FrameKind::Result if result.is_some() => {
                    tracing::debug!("Ignoring duplicate result on session {}", self.session_id);
                }
                FrameKind::Result => match frame.decode_report() {
                    Ok(report) => result = Some(report),
                    Err(e) => tracing::warn!("Undecodable result on session {}: {}", self.session_id, e),
                },
                FrameKind::Complete => {
                    return match result.take() {
                        Some(report) => SessionOutcome::Completed(report),
                        None => SessionOutcome::Failed(DashboardError::NoResult),
                    };
                }
                FrameKind::Error => {
                    let message = frame
                        .message
                        .unwrap_or_else(|| "analysis service reported an error".to_string());
                    return SessionOutcome::Failed(DashboardError::Analysis(message));
                }
                FrameKind::Heartbeat => {}
                FrameKind::Unknown => {
                    tracing::debug!("Ignoring unknown frame on session {}", self.session_id);
                }
            }
        }
    }

    fn progress(&self, message: String) {
        let event = SessionEvent::Progress {
            session_id: self.session_id.clone(),
            generation: self.generation,
            message,
        };
        // Blocks while the caller is behind so no progress is lost
        if self.events.send(event).is_err() {
            tracing::trace!("Progress for session {} has no receiver", self.session_id);
        }
    }
}

// ==================== Handle ====================

/// Caller-side handle of a running session
pub struct SessionHandle {
    session_id: String,
    generation: Generation,
    events: Receiver<SessionEvent>,
    worker: Option<JoinHandle<()>>,
}

impl SessionHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Non-blocking receive
    pub fn try_recv(&self) -> Option<SessionEvent> {
        self.events.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event
    pub fn recv_timeout(&self, timeout: Duration) -> Option<SessionEvent> {
        self.events.recv_timeout(timeout).ok()
    }

    /// Drain every pending event
    pub fn drain(&self) -> impl Iterator<Item = SessionEvent> + '_ {
        std::iter::from_fn(move || self.events.try_recv().ok())
    }

    /// Block until the session finishes, discarding progress
    pub fn wait(mut self) -> SessionOutcome {
        let outcome = loop {
            match self.events.recv() {
                Ok(SessionEvent::Finished { outcome, .. }) => break outcome,
                Ok(SessionEvent::Progress { .. }) => continue,
                Err(_) => {
                    break SessionOutcome::Failed(DashboardError::Channel(
                        "analysis session ended without a result".to_string(),
                    ))
                }
            }
        };
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Analysis session worker {} panicked", self.session_id);
            }
        }
        outcome
    }
}
