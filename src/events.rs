//! Interaction events published to the view layer

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Capacity of each subscriber queue
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionEvent {
    /// Ask the view to highlight an element (node or link id)
    HighlightRequested(String),
    /// The hovered element changed
    HoverChanged(Option<String>),
}

/// Fan-out of interaction events to any number of subscribers
///
/// Subscribers that fall behind lose events; disconnected ones are pruned on
/// the next publish.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<InteractionEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<InteractionEvent> {
        let (tx, rx) = bounded(DEFAULT_SUBSCRIBER_CAPACITY);
        self.subscribers.push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn publish(&mut self, event: InteractionEvent) {
        self.subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::trace!("Interaction subscriber full, dropping {:?}", event);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}
