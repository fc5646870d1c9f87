//! Transport seam between the coordinator and an analysis service

use super::protocol::{AnalysisRequest, StreamFrame, SubmitAck};
use crate::correlation::CorrelationReport;
use crate::error::{DashboardError, Result};
use crossbeam_channel::Receiver;
use std::time::Duration;

/// Carries analysis requests to a service and frames back
#[cfg_attr(test, mockall::automock)]
pub trait AnalysisTransport: Send + Sync {
    /// Submit a streaming request, waiting at most `timeout` for the acknowledgement
    fn submit(&self, request: &AnalysisRequest, timeout: Duration) -> Result<SubmitAck>;

    /// Open the frame stream of an accepted session
    ///
    /// The receiver disconnects when the underlying connection drops.
    fn open_stream(&self, session_id: &str) -> Result<Receiver<StreamFrame>>;

    /// Submit a non-streaming request and wait for the full report
    fn submit_blocking(&self, request: &AnalysisRequest, timeout: Duration)
        -> Result<CorrelationReport>;

    /// Release the stream of a session that is being abandoned
    fn close_stream(&self, _session_id: &str) {}
}

/// Transport with no service behind it
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTransport;

impl AnalysisTransport for NoopTransport {
    fn submit(&self, _request: &AnalysisRequest, _timeout: Duration) -> Result<SubmitAck> {
        Err(DashboardError::Network("no analysis service configured".to_string()))
    }

    fn open_stream(&self, _session_id: &str) -> Result<Receiver<StreamFrame>> {
        Err(DashboardError::Network("no analysis service configured".to_string()))
    }

    fn submit_blocking(
        &self,
        _request: &AnalysisRequest,
        _timeout: Duration,
    ) -> Result<CorrelationReport> {
        Err(DashboardError::Network("no analysis service configured".to_string()))
    }
}
