//! Scripted collaborators for integration tests

use crossbeam_channel::{unbounded, Receiver, Sender};
use netfault_rs::correlation::CorrelationReport;
use netfault_rs::error::{DashboardError, Result};
use netfault_rs::session::{AnalysisRequest, AnalysisTransport, StreamFrame, SubmitAck};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Transport whose stream is fed by the test through a sender
///
/// Counts every call so tests can assert how often the service was reached.
pub struct ScriptedTransport {
    ack: SubmitAck,
    fallback: Mutex<Option<Result<CorrelationReport>>>,
    stream: Mutex<Option<Receiver<StreamFrame>>>,
    pub submits: AtomicUsize,
    pub fallbacks: AtomicUsize,
    pub closed: AtomicUsize,
}

impl ScriptedTransport {
    /// Accepting transport plus the sender that feeds its stream
    pub fn accepting() -> (Self, Sender<StreamFrame>) {
        let (tx, rx) = unbounded();
        (Self::new(SubmitAck::accepted(), Some(rx)), tx)
    }

    /// Transport that rejects streaming and answers the fallback with `fallback`
    pub fn rejecting(fallback: Result<CorrelationReport>) -> Self {
        let transport = Self::new(SubmitAck::rejected("streaming unavailable"), None);
        *transport.fallback.lock().unwrap() = Some(fallback);
        transport
    }

    fn new(ack: SubmitAck, stream: Option<Receiver<StreamFrame>>) -> Self {
        Self {
            ack,
            fallback: Mutex::new(None),
            stream: Mutex::new(stream),
            submits: AtomicUsize::new(0),
            fallbacks: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        }
    }

    pub fn submit_count(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }
}

impl AnalysisTransport for ScriptedTransport {
    fn submit(&self, _request: &AnalysisRequest, _timeout: Duration) -> Result<SubmitAck> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        Ok(self.ack.clone())
    }

    fn open_stream(&self, _session_id: &str) -> Result<Receiver<StreamFrame>> {
        self.stream
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| DashboardError::Network("stream already opened".to_string()))
    }

    fn submit_blocking(&self, _request: &AnalysisRequest, _timeout: Duration) -> Result<CorrelationReport> {
        self.fallbacks.fetch_add(1, Ordering::SeqCst);
        self.fallback
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(DashboardError::Network("no fallback scripted".to_string())))
    }

    fn close_stream(&self, _session_id: &str) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}
