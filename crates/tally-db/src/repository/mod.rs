//! # Repository Module
//!
//! One repository per aggregate. Each holds a clone of the pool.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  db.sales().settle(..)                                                  │
//! │       │                                                                 │
//! │       ├── product::fetch_by_ids        (reads, before BEGIN)            │
//! │       ├── user::fetch_cashier                                           │
//! │       │                                                                 │
//! │       │  BEGIN                                                          │
//! │       ├── customer aggregates + sale + items                           │
//! │       ├── loyalty_tier::sync_customer_tier                              │
//! │       │  COMMIT                                                         │
//! │                                                                         │
//! │  Anything that changes points or tiers goes through                    │
//! │  sync_customer_tier / resync_all_customers on the same transaction,    │
//! │  so the cached tier on a customer never disagrees with the resolver.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `pub(crate)` helpers take a `&mut SqliteConnection` so they run on
//! whatever transaction the caller holds.

pub mod customer;
pub mod loyalty_tier;
pub mod permission;
pub mod product;
pub mod sale;
pub mod user;
