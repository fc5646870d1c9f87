//! Analysis session lifecycle
//!
//! This module drives a correlation request through a remote (or in-process)
//! analysis service: streaming submission, progress relay, result capture,
//! timeout and a single non-streaming fallback.
//!
//! # Features
//!
//! - At most one session in flight; a second submission fails fast
//! - Progress messages relayed in arrival order
//! - Every event tagged with the [`Generation`] of the selection that started it
//!
//! # Example
//!
//! ```ignore
//! use netfault_rs::session::{AnalysisSessionCoordinator, Generation, SessionEvent};
//!
//! let coordinator = AnalysisSessionCoordinator::new(transport, config.session.clone());
//! let handle = coordinator.submit(snapshot, Generation(1))?;
//!
//! for event in handle.drain() {
//!     if let SessionEvent::Progress { message, .. } = event {
//!         println!("{}", message);
//!     }
//! }
//! ```

pub mod coordinator;
pub mod protocol;
pub mod transport;
pub mod types;

pub use coordinator::{AnalysisSessionCoordinator, SessionHandle, FALLBACK_PROGRESS_MESSAGE};
pub use protocol::{AnalysisRequest, FrameKind, StreamFrame, SubmitAck};
pub use transport::{AnalysisTransport, NoopTransport};
pub use types::{Generation, GenerationCounter, SessionEvent, SessionOutcome, SessionPhase};
