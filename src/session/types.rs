//! Analysis session state types

use crate::correlation::CorrelationReport;
use crate::error::DashboardError;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle phase of the analysis coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// No session in flight
    #[default]
    Idle,
    /// Submission request sent, waiting for acceptance
    Submitting,
    /// Accepted, consuming the result stream
    Streaming,
    /// Result received
    Completed,
    /// Ended with an error
    Failed,
    /// No terminal frame before the deadline
    TimedOut,
}

impl SessionPhase {
    /// Check if a session is in flight
    pub fn is_active(&self) -> bool {
        matches!(self, SessionPhase::Submitting | SessionPhase::Streaming)
    }

    /// Check if this is a terminal phase
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionPhase::Completed | SessionPhase::Failed | SessionPhase::TimedOut
        )
    }

    /// Display name for the phase
    pub fn display_name(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "Idle",
            SessionPhase::Submitting => "Submitting",
            SessionPhase::Streaming => "Streaming",
            SessionPhase::Completed => "Completed",
            SessionPhase::Failed => "Failed",
            SessionPhase::TimedOut => "Timed out",
        }
    }
}

/// How a session ended
#[derive(Debug)]
pub enum SessionOutcome {
    Completed(CorrelationReport),
    Failed(DashboardError),
    TimedOut,
}

impl SessionOutcome {
    pub fn phase(&self) -> SessionPhase {
        match self {
            SessionOutcome::Completed(_) => SessionPhase::Completed,
            SessionOutcome::Failed(_) => SessionPhase::Failed,
            SessionOutcome::TimedOut => SessionPhase::TimedOut,
        }
    }

    pub fn report(&self) -> Option<&CorrelationReport> {
        match self {
            SessionOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }

    pub fn into_report(self) -> Option<CorrelationReport> {
        match self {
            SessionOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }
}

/// Token identifying one target selection; late results from older
/// generations are discarded by their consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Generation(pub u64);

/// Monotonic source of [`Generation`] tokens
#[derive(Debug, Default)]
pub struct GenerationCounter {
    current: AtomicU64,
}

impl GenerationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation, invalidating every earlier one
    pub fn advance(&self) -> Generation {
        Generation(self.current.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn current(&self) -> Generation {
        Generation(self.current.load(Ordering::Acquire))
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.current() == generation
    }
}

/// Events relayed from a session worker to its caller
#[derive(Debug)]
pub enum SessionEvent {
    /// A progress message, in arrival order
    Progress {
        session_id: String,
        generation: Generation,
        message: String,
    },
    /// The session reached a terminal state; always the last event
    Finished {
        session_id: String,
        generation: Generation,
        outcome: SessionOutcome,
    },
}

impl SessionEvent {
    pub fn generation(&self) -> Generation {
        match self {
            SessionEvent::Progress { generation, .. } | SessionEvent::Finished { generation, .. } => {
                *generation
            }
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            SessionEvent::Progress { session_id, .. } | SessionEvent::Finished { session_id, .. } => {
                session_id
            }
        }
    }
}
