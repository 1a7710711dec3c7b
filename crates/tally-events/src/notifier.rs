//! # Change Notifier
//!
//! A cloneable handle over a bounded broadcast channel.
//!
//! ```text
//!   publish(e) ──► [ e5 e4 e3 e2 e1 ]  capacity = event_buffer
//!                        │
//!          ┌─────────────┼─────────────┐
//!          ▼             ▼             ▼
//!     observer A    observer B    observer C (slow)
//!     reads e5      reads e5      lagged: e1,e2 overwritten,
//!                                 resumes at e3
//! ```
//!
//! Publishing never waits on observers. A full buffer overwrites the oldest
//! event for whoever has not read it yet.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use crate::event::ChangeEvent;

/// Default number of events buffered per observer.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<Arc<ChangeEvent>>,
}

impl ChangeNotifier {
    /// Creates a notifier buffering up to `capacity` events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        ChangeNotifier { tx }
    }

    /// Fans `event` out to every current observer.
    ///
    /// Returns how many observers it reached. Zero observers is not an error.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let kind = event.kind();
        match self.tx.send(Arc::new(event)) {
            Ok(reached) => {
                debug!(event = kind, reached, "Event published");
                reached
            }
            Err(_) => {
                debug!(event = kind, "Event published with no observers");
                0
            }
        }
    }

    /// Registers a new observer. It sees events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ChangeEvent>> {
        self.tx.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        ChangeNotifier::new(DEFAULT_EVENT_BUFFER)
    }
}
