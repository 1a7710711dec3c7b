//! # tally-core: Pure Business Logic for Tally POS
//!
//! This crate holds every business rule of the sale settlement and loyalty
//! flow as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Storefront UI (React, external)                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ HTTP / WebSocket                       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 tally-server (gate → settle → notify)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌────────────┐ ┌──────────────┐    │   │
//! │  │   │  money   │ │ loyalty  │ │ settlement │ │  permission  │    │   │
//! │  │   │  Money   │ │ resolve_ │ │ plan_      │ │  Permission  │    │   │
//! │  │   │ TaxRate  │ │  tier    │ │ settlement │ │  evaluate    │    │   │
//! │  │   └──────────┘ └──────────┘ └────────────┘ └──────────────┘    │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tally-db (Database Layer)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Customer, Sale, LoyaltyTier, User, ...)
//! - [`money`] - Money, TaxRate and Multiplier with integer arithmetic
//! - [`loyalty`] - Tier resolver and points accrual
//! - [`settlement`] - Cart validation and sale totals
//! - [`permission`] - Closed permission set and template rule evaluation
//! - [`error`] - Domain error types
//! - [`validation`] - Field-level validation
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::money::{Money, TaxRate};
//!
//! let subtotal = Money::from_cents(10_000); // $100.00
//! let tax = subtotal.calculate_tax(TaxRate::from_bps(1000)); // 10%
//!
//! assert_eq!(tax.cents(), 1_000);
//! assert_eq!((subtotal + tax).cents(), 11_000);
//! ```

pub mod error;
pub mod loyalty;
pub mod money;
pub mod permission;
pub mod settlement;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ValidationError};
pub use loyalty::{resolve_tier, TierAssignment};
pub use money::{Money, Multiplier, TaxRate};
pub use permission::{Action, Permission, Resource};
pub use settlement::{SettlementPlan, SettlementPolicy};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items allowed in a single sale.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line.
///
/// Guards against typing 1000 instead of 10 at the keypad.
pub const MAX_ITEM_QUANTITY: i64 = 999;
