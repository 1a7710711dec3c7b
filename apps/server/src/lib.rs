//! # Tally Server Library
//!
//! The HTTP/JSON boundary. `main.rs` only loads config and calls into here,
//! so tests drive the same [`app`] router without a socket.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Request Lifecycle                                │
//! │                                                                         │
//! │  TraceLayer (span per request)                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Router ─► handler(State<AppState>, Actor, Json<..>)                   │
//! │                │          │                                             │
//! │                │          └─ x-user-id ─► active user or 401           │
//! │                ▼                                                        │
//! │           permission gate ─► 403                                       │
//! │                │                                                        │
//! │                ▼                                                        │
//! │           tally-db repository (tally-core rules inside)                │
//! │                │                                                        │
//! │                ▼                                                        │
//! │           ChangeNotifier::publish (after commit, best effort)          │
//! │                │                                                        │
//! │                ▼                                                        │
//! │           Json<T> or ApiError { code, message }                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod state;


use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::handlers::{customers, health, loyalty, permissions, products, sales, users};
pub use crate::config::{ConfigError, ServerConfig};
pub use crate::error::{ApiError, ApiResult, ErrorCode};
pub use crate::state::AppState;

/// Builds the full router.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health::health))
        // Sales
        .route("/sales", post(sales::create_sale).get(sales::list_sales))
        .route("/sales/{id}", get(sales::get_sale))
        // Customers
        .route(
            "/customers",
            get(customers::list_customers).post(customers::create_customer),
        )
        .route("/customers/{id}", get(customers::get_customer))
        .route("/customers/{id}/sales", get(customers::customer_sales))
        .route("/customers/{id}/points", post(customers::adjust_points))
        // Products
        .route(
            "/products",
            get(products::list_products).post(products::create_product),
        )
        .route("/products/{id}", delete(products::deactivate_product))
        .route("/products/{id}/price", put(products::update_price))
        // Loyalty tiers
        .route(
            "/loyalty-tiers",
            get(loyalty::list_tiers).post(loyalty::create_tier),
        )
        .route(
            "/loyalty-tiers/{id}",
            put(loyalty::update_tier).delete(loyalty::deactivate_tier),
        )
        // Permissions
        .route("/permissions/check", post(permissions::check))
        .route(
            "/permission-templates",
            get(permissions::list_templates).post(permissions::create_template),
        )
        .route(
            "/permission-templates/{id}",
            delete(permissions::delete_template),
        )
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{id}/permission-template",
            put(permissions::assign_template),
        );

    Router::new()
        .nest("/api", api)
        .route("/ws", get(tally_events::ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=tally_db=trace` - Trace one crate
/// - Default: `info,tally=debug,sqlx=warn`
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tally=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
