//! # tally-events: Change Notifier for Tally POS
//!
//! Tells observers about committed changes. Settlement and customer
//! adjustments publish here after their transaction commits; the `/ws` hub
//! forwards every event to every connected observer.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Change Notification                              │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 ChangeNotifier (notifier.rs)                     │  │
//! │  │                                                                  │  │
//! │  │  publish(event) ──► broadcast::Sender<Arc<ChangeEvent>>          │  │
//! │  │  returns the number of observers reached (0 is fine)            │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │ subscribe()                             │
//! │                               ▼                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                    Hub (hub.rs, GET /ws)                         │  │
//! │  │                                                                  │  │
//! │  │  per connection: subscribe ► greet ► forward events ► ping      │  │
//! │  │  lag: drop missed events, log, keep going                       │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  WIRE FORMAT (event.rs):                                               │
//! │  • { "type": "connected",        "data": { observerId, serverTime } }  │
//! │  • { "type": "sale_created",     "data": SaleWithRelations }           │
//! │  • { "type": "customer_updated", "data": Customer }                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Delivery is best effort. There is no replay, acknowledgement or topic
//! filtering; an observer that reconnects starts from the next event.
//!
//! ## Module Organization
//! - [`error`] - Hub error types
//! - [`event`] - The event envelope
//! - [`hub`] - The axum WebSocket endpoint
//! - [`notifier`] - The publish/subscribe handle

pub mod error;
pub mod event;
pub mod hub;
pub mod notifier;

pub use error::{EventError, EventResult};
pub use event::{ChangeEvent, Greeting};
pub use hub::ws_handler;
pub use notifier::{ChangeNotifier, DEFAULT_EVENT_BUFFER};
