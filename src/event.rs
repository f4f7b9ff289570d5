//! Event system for session observers.
//!
//! Every state transition and every decoded (or undecodable) notification
//! is dispatched here, so no state is silently entered or exited.

use std::sync::Arc;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::DecodeError;
use crate::session::SessionState;
use crate::types::Measurement;

/// Events dispatched by a session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The session moved to a new state.
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    /// A measurement was decoded and appended to the log.
    Measurement(Measurement),
    /// A notification could not be decoded; the session stays active.
    DecodeFailed { uuid: Uuid, error: DecodeError },
    /// The transport reported a disconnect while the session was active.
    ConnectionLost,
}

/// A subscription to session events.
pub struct Subscription {
    receiver: broadcast::Receiver<SessionEvent>,
}

impl Subscription {
    /// Receives the next event, skipping over any lag gaps.
    ///
    /// Returns `None` once the session and all dispatchers are gone.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

struct EventDispatcherInner {
    sender: broadcast::Sender<SessionEvent>,
}

/// Dispatches session events to subscribers.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<EventDispatcherInner>,
}

impl EventDispatcher {
    /// Creates a new dispatcher with the given buffer capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(EventDispatcherInner { sender }),
        }
    }

    /// Dispatches an event to all subscribers.
    ///
    /// Having no subscribers is fine; the event is dropped.
    pub fn dispatch(&self, event: SessionEvent) {
        let _ = self.inner.sender.send(event);
    }

    /// Subscribes to events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.inner.sender.subscribe(),
        }
    }
}
