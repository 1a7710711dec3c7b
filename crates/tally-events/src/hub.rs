//! # Observer Hub
//!
//! The `GET /ws` endpoint. Every connection becomes one observer of the
//! [`ChangeNotifier`].
//!
//! ## Connection Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Observer Connection                              │
//! │                                                                         │
//! │  1. WebSocket upgrade                                                  │
//! │  2. Subscribe to the notifier (nothing published after this is lost)   │
//! │  3. Send { "type": "connected", "data": { observerId, serverTime } }   │
//! │  4. Three tasks until either side goes away:                           │
//! │                                                                         │
//! │     ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐     │
//! │     │  forwarder   │   │    pinger    │   │   receive loop       │     │
//! │     │ broadcast ─► │   │ every 30s ─► │   │ Close/error ─► stop  │     │
//! │     │   outgoing   │   │   outgoing   │   │ anything else ignored│     │
//! │     └──────┬───────┘   └──────┬───────┘   └──────────────────────┘     │
//! │            └────────┬─────────┘                                        │
//! │                     ▼                                                   │
//! │               writer task ─► socket                                    │
//! │                                                                         │
//! │  Lagged: log how many events were dropped, keep forwarding.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use chrono::Utc;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval_at, Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::EventResult;
use crate::event::{ChangeEvent, Greeting};
use crate::notifier::ChangeNotifier;

// =============================================================================
// Constants
// =============================================================================

/// Ping interval to keep idle connections open through proxies.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Observers only ever send control frames; anything large is abuse.
const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Frames queued for one observer's socket.
const OUTGOING_QUEUE: usize = 64;

// =============================================================================
// WebSocket Handler
// =============================================================================

/// WebSocket upgrade handler. Mount at `/ws` on a router whose state yields
/// a [`ChangeNotifier`] (directly or through `FromRef`).
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(notifier): State<ChangeNotifier>,
) -> impl IntoResponse {
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, notifier))
}

async fn handle_socket(socket: WebSocket, notifier: ChangeNotifier) {
    let observer_id = Uuid::new_v4().to_string();
    let (mut sender, mut receiver) = socket.split();

    let mut events = notifier.subscribe();

    let greeting = ChangeEvent::Connected(Greeting {
        observer_id: observer_id.clone(),
        server_time: Utc::now(),
    });
    if let Err(e) = send_event(&mut sender, &greeting).await {
        warn!(observer_id = %observer_id, error = %e, "Failed to greet observer");
        return;
    }

    info!(
        observer_id = %observer_id,
        observers = notifier.observer_count(),
        "Observer connected"
    );

    let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<Message>(OUTGOING_QUEUE);

    let outgoing_handle = tokio::spawn(async move {
        while let Some(msg) = outgoing_rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let forward_tx = outgoing_tx.clone();
    let forward_id = observer_id.clone();
    let forward_handle = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let frame = match encode(&event) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!(observer_id = %forward_id, error = %e, "Dropping unencodable event");
                            continue;
                        }
                    };
                    if forward_tx.send(frame).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(observer_id = %forward_id, missed, "Observer lagged, events dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let ping_tx = outgoing_tx;
    let ping_handle = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + PING_INTERVAL, PING_INTERVAL);
        loop {
            ticker.tick().await;
            if ping_tx.send(Message::Ping(axum::body::Bytes::new())).await.is_err() {
                break;
            }
        }
    });

    loop {
        match receiver.next().await {
            Some(Ok(Message::Close(_))) => {
                debug!(observer_id = %observer_id, "Observer requested close");
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                debug!(observer_id = %observer_id, error = %e, "WebSocket error");
                break;
            }
            None => break,
        }
    }

    ping_handle.abort();
    forward_handle.abort();
    outgoing_handle.abort();
    info!(observer_id = %observer_id, "Observer disconnected");
}

fn encode(event: &Arc<ChangeEvent>) -> EventResult<Message> {
    let json = serde_json::to_string(event.as_ref())?;
    Ok(Message::Text(json.into()))
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &ChangeEvent,
) -> EventResult<()> {
    let json = serde_json::to_string(event)?;
    sender.send(Message::Text(json.into())).await?;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
