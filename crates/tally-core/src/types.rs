//! # Domain Types
//!
//! Core domain types used throughout Tally POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  LoyaltyTier    │   │    Customer     │   │      Sale       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  name           │◄──│  loyalty_tier   │◄──│  customer_id    │       │
//! │  │  min_points     │   │  multiplier_bps │   │  cashier_id ────┼──► User│
//! │  │  multiplier_bps │   │  loyalty_points │   │  receipt_number │       │
//! │  └─────────────────┘   └─────────────────┘   └────────┬────────┘       │
//! │                                                       │ 1..n           │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌────────▼────────┐       │
//! │  │ PermissionTempl │   │TemplatePermissn │   │    SaleItem     │       │
//! │  │  ─────────────  │──►│  resource       │   │  name_snapshot  │       │
//! │  │  is_system      │   │  action, field  │   │  unit_price     │       │
//! │  │  is_default     │   │  allowed        │   │  line_no        │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All identifiers are SQLite integer keys. Everything crossing the HTTP
//! boundary is camelCase.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::loyalty::TierAssignment;
use crate::money::{Money, Multiplier, BPS_SCALE};

// =============================================================================
// Loyalty Tier
// =============================================================================

/// A points threshold granting a multiplier on future accrual.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LoyaltyTier {
    pub id: i64,
    pub name: String,
    pub min_points: i64,
    /// 12500 = 1.25x
    pub points_multiplier_bps: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl LoyaltyTier {
    #[inline]
    pub fn multiplier(&self) -> Multiplier {
        bps_to_multiplier(self.points_multiplier_bps)
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A registered customer with loyalty aggregates.
///
/// `loyalty_tier` and `points_multiplier_bps` are a cache of
/// [`crate::loyalty::resolve_tier`] over `loyalty_points`. They are written
/// only by the storage layer's tier sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub loyalty_points: i64,
    pub loyalty_tier: Option<String>,
    pub points_multiplier_bps: i64,
    pub total_spent_cents: i64,
    pub total_orders: i64,
    #[ts(as = "Option<String>")]
    pub last_visit: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    #[inline]
    pub fn multiplier(&self) -> Multiplier {
        bps_to_multiplier(self.points_multiplier_bps)
    }

    #[inline]
    pub fn total_spent(&self) -> Money {
        Money::from_cents(self.total_spent_cents)
    }

    /// The cached tier as the resolver would report it.
    pub fn cached_assignment(&self) -> TierAssignment {
        TierAssignment {
            tier: self.loyalty_tier.clone(),
            multiplier: self.multiplier(),
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    pub id: i64,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    /// Price in cents (smallest currency unit).
    pub price_cents: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Users
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum UserRole {
    Admin,
    Manager,
    Cashier,
}

impl UserRole {
    pub const ALL: [UserRole; 3] = [UserRole::Admin, UserRole::Manager, UserRole::Cashier];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Manager => "manager",
            UserRole::Cashier => "cashier",
        }
    }

    pub fn parse(value: &str) -> Option<UserRole> {
        UserRole::ALL
            .into_iter()
            .find(|role| role.as_str() == value.trim().to_ascii_lowercase())
    }
}

/// A staff account. Cashiers settle sales; managers and admins administer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub role: UserRole,
    pub permission_template_id: Option<i64>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Cashier identity echoed back on a settled sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CashierSummary {
    pub id: i64,
    pub username: String,
    pub display_name: String,
}

impl From<&User> for CashierSummary {
    fn from(user: &User) -> Self {
        CashierSummary {
            id: user.id,
            username: user.username.clone(),
            display_name: user.display_name.clone(),
        }
    }
}

// =============================================================================
// Payment Type
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PaymentType {
    Cash,
    Card,
    Mobile,
}

impl PaymentType {
    pub const ALL: [PaymentType; 3] = [PaymentType::Cash, PaymentType::Card, PaymentType::Mobile];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Cash => "cash",
            PaymentType::Card => "card",
            PaymentType::Mobile => "mobile",
        }
    }

    /// Case-insensitive lookup; `None` for anything outside the enumerated set.
    pub fn parse(value: &str) -> Option<PaymentType> {
        let value = value.trim().to_ascii_lowercase();
        PaymentType::ALL.into_iter().find(|p| p.as_str() == value)
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A settled sale. Immutable once inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Sale {
    pub id: i64,
    /// `YYYYMMDD-NNNNNN`
    pub receipt_number: String,
    pub cashier_id: i64,
    pub customer_id: Option<i64>,
    pub payment_type: PaymentType,
    pub subtotal_cents: i64,
    pub tax_rate_bps: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub points_earned: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line item in a sale.
/// Uses snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleItem {
    pub id: i64,
    pub sale_id: i64,
    /// Position in the submitted cart, starting at 1.
    pub line_no: i64,
    pub product_id: i64,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    pub quantity: i64,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    /// quantity × unit_price_cents
    pub total_price_cents: i64,
}

/// The persisted sale with its items, the refreshed customer and the cashier.
///
/// This is both the settlement response and the `sale_created` event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleWithRelations {
    #[serde(flatten)]
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub customer: Option<Customer>,
    pub cashier: CashierSummary,
}

// =============================================================================
// Permission Templates
// =============================================================================

/// A named bundle of permission rules assigned to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PermissionTemplate {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Built-in templates cannot be deleted.
    pub is_system: bool,
    /// Assigned to new users of `role` when no template is given.
    pub is_default: bool,
    pub role: Option<UserRole>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// One rule of a template. An empty `field` means the rule is not
/// field-scoped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TemplatePermission {
    pub id: i64,
    pub template_id: i64,
    pub resource: String,
    pub action: String,
    pub field: String,
    pub allowed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PermissionTemplateWithRules {
    #[serde(flatten)]
    pub template: PermissionTemplate,
    pub permissions: Vec<TemplatePermission>,
}

// =============================================================================
// Requests
// =============================================================================

/// One cart line submitted for settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[ts(export)]
pub struct SettleLine {
    pub product_id: i64,
    pub quantity: i64,
    /// Overrides the catalogue price for this line, in major units
    /// (`20.00` is $20). Converted to cents during validation.
    #[serde(default)]
    #[ts(type = "number | null")]
    pub unit_price: Option<Decimal>,
}

/// Settlement entry point body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
#[ts(export)]
pub struct SettleRequest {
    #[serde(default)]
    pub customer_id: Option<i64>,
    pub cashier_id: i64,
    /// Parsed with [`PaymentType::parse`] during validation so an unknown
    /// value is reported as a field error.
    pub payment_type: String,
    pub items: Vec<SettleLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewCustomer {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PointsAdjustment {
    /// Signed change to the balance.
    pub delta: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewUser {
    pub username: String,
    pub display_name: String,
    pub role: UserRole,
    #[serde(default)]
    pub permission_template_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewLoyaltyTier {
    pub name: String,
    pub min_points: i64,
    pub points_multiplier_bps: i64,
}

/// Partial tier update; absent fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LoyaltyTierUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub min_points: Option<i64>,
    #[serde(default)]
    pub points_multiplier_bps: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewTemplatePermission {
    pub resource: String,
    pub action: String,
    #[serde(default)]
    pub field: Option<String>,
    /// Required: a rule only grants what it states.
    pub allowed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewPermissionTemplate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub role: Option<UserRole>,
    pub permissions: Vec<NewTemplatePermission>,
}

/// Permission check entry point body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PermissionCheck {
    pub user_id: i64,
    pub resource: String,
    pub action: String,
    #[serde(default)]
    pub field: Option<String>,
}

// =============================================================================
// Helpers
// =============================================================================

/// Columns hold bps as INTEGER; anything outside u32 falls back to 1.0x.
fn bps_to_multiplier(bps: i64) -> Multiplier {
    match u32::try_from(bps) {
        Ok(bps) => Multiplier::from_bps(bps),
        Err(_) => Multiplier::from_bps(BPS_SCALE),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
