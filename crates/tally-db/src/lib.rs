//! # tally-db: Database Layer for Tally
//!
//! SQLite storage for the settlement engine, loyalty tiers and permission
//! templates, accessed asynchronously through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tally Data Flow                                │
//! │                                                                         │
//! │  HTTP handler (POST /api/sales)                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tally-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │               │    │ SaleRepo       │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ CustomerRepo   │    │ 001_init.sql │  │   │
//! │  │   │               │    │ LoyaltyTierRepo│    │ 002_perm.sql │  │   │
//! │  │   │               │    │ PermissionRepo │    │              │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (WAL) or an in-memory database for tests         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Business rules (pricing, tier resolution, permission evaluation) live in
//! `tally-core`. This crate decides when they run and makes their results
//! durable.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{Database, DbConfig};
//! use tally_core::SettlementPolicy;
//!
//! let db = Database::new(DbConfig::new("tally.db")).await?;
//! let sale = db.sales().settle(&request, &SettlementPolicy::default()).await?;
//! println!("{}", sale.sale.receipt_number);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult, RepoError, RepoResult, SettleError};
pub use pool::{Database, DbConfig};

pub use repository::customer::CustomerRepository;
pub use repository::loyalty_tier::LoyaltyTierRepository;
pub use repository::permission::PermissionRepository;
pub use repository::product::ProductRepository;
pub use repository::sale::SaleRepository;
pub use repository::user::UserRepository;
