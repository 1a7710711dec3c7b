//! # Application State
//!
//! Everything a handler needs, cloned cheaply per request.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  AppState                                                        │
//! │  ├── db: Database             (SqlitePool inside, thread-safe)   │
//! │  ├── notifier: ChangeNotifier (broadcast::Sender inside)         │
//! │  ├── policy: SettlementPolicy (tax rate, points unit)            │
//! │  └── config: Arc<ServerConfig> (read-only after startup)         │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use axum::extract::FromRef;
use tally_core::SettlementPolicy;
use tally_db::Database;
use tally_events::ChangeNotifier;

use crate::config::ServerConfig;

#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    pub notifier: ChangeNotifier,
    pub policy: SettlementPolicy,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(db: Database, config: ServerConfig) -> Self {
        AppState {
            db,
            notifier: ChangeNotifier::new(config.event_buffer),
            policy: config.policy(),
            config: Arc::new(config),
        }
    }
}

/// Lets the `/ws` handler extract the notifier directly.
impl FromRef<AppState> for ChangeNotifier {
    fn from_ref(state: &AppState) -> Self {
        state.notifier.clone()
    }
}
