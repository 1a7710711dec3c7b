//! # Settlement Module
//!
//! Pure half of sale settlement: request validation and the sale totals.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SettleRequest                                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate_request()     items non-empty, ≤ 100 lines, qty 1..=999,      │
//! │       │                 overrides ≥ 0, payment type recognised          │
//! │       ▼                                                                 │
//! │  (tally-db loads the referenced products and the cashier)              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  plan_settlement()      unit price = override or catalogue price        │
//! │       │                 line total = qty × unit price                   │
//! │       │                 subtotal   = Σ line totals (input order)        │
//! │       │                 tax        = subtotal × rate, half up           │
//! │       │                 total      = subtotal + tax                     │
//! │       ▼                                                                 │
//! │  SettlementPlan  ──────► written by tally-db in one transaction         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::loyalty;
use crate::money::{Money, Multiplier, TaxRate};
use crate::types::{PaymentType, Product, SettleLine, SettleRequest};
use crate::validation::{validate_quantity, validate_unit_price};
use crate::MAX_CART_ITEMS;

/// Externally configured inputs to settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementPolicy {
    pub tax_rate: TaxRate,
    /// Subtotal that earns one base point.
    pub points_unit: Money,
}

impl Default for SettlementPolicy {
    /// 10% tax, one point per $10.
    fn default() -> Self {
        SettlementPolicy {
            tax_rate: TaxRate::from_bps(1000),
            points_unit: Money::from_cents(1000),
        }
    }
}

/// A priced cart line ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLine {
    pub line_no: i64,
    pub product_id: i64,
    pub name_snapshot: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub total_price: Money,
}

/// Everything about a sale that can be computed before touching storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementPlan {
    pub payment_type: PaymentType,
    pub lines: Vec<PlannedLine>,
    pub subtotal: Money,
    pub tax_rate: TaxRate,
    pub tax: Money,
    pub total: Money,
    points_unit: Money,
}

impl SettlementPlan {
    /// Points this sale earns for a customer holding `multiplier`.
    pub fn points_earned(&self, multiplier: Multiplier) -> i64 {
        loyalty::points_earned(self.subtotal, self.points_unit, multiplier)
    }
}

/// Checks the shape of a request without looking anything up.
///
/// Returns the parsed payment type.
pub fn validate_request(request: &SettleRequest) -> CoreResult<PaymentType> {
    if request.items.is_empty() {
        return Err(CoreError::EmptyCart);
    }

    if request.items.len() > MAX_CART_ITEMS {
        return Err(CoreError::CartTooLarge {
            max: MAX_CART_ITEMS,
        });
    }

    for line in &request.items {
        validate_quantity(line.quantity)?;
        price_override(line)?;
    }

    PaymentType::parse(&request.payment_type).ok_or_else(|| {
        ValidationError::NotAllowed {
            field: "paymentType".to_string(),
            allowed: PaymentType::ALL
                .iter()
                .map(|p| p.as_str().to_string())
                .collect(),
        }
        .into()
    })
}

/// The line's `unitPrice` in cents, if it carries one.
fn price_override(line: &SettleLine) -> CoreResult<Option<Money>> {
    Ok(line.unit_price.map(validate_unit_price).transpose()?)
}

/// Prices every line and computes the sale totals.
///
/// `products` must contain every product the request references; missing or
/// inactive products are rejected with [`CoreError::ProductNotFound`], even
/// when the line carries a price override.
///
/// ```rust
/// use chrono::Utc;
/// use tally_core::settlement::{plan_settlement, SettlementPolicy};
/// use tally_core::types::{Product, SettleLine, SettleRequest};
///
/// let widget = Product {
///     id: 7,
///     sku: "WIDGET".to_string(),
///     name: "Widget".to_string(),
///     price_cents: 2500,
///     is_active: true,
///     created_at: Utc::now(),
///     updated_at: Utc::now(),
/// };
/// let request = SettleRequest {
///     customer_id: None,
///     cashier_id: 1,
///     payment_type: "cash".to_string(),
///     items: vec![SettleLine { product_id: 7, quantity: 4, unit_price: None }],
/// };
/// let plan = plan_settlement(&request, &[widget], &SettlementPolicy::default()).unwrap();
/// assert_eq!(plan.subtotal.cents(), 10_000);
/// assert_eq!(plan.tax.cents(), 1_000);
/// assert_eq!(plan.total.cents(), 11_000);
/// ```
pub fn plan_settlement(
    request: &SettleRequest,
    products: &[Product],
    policy: &SettlementPolicy,
) -> CoreResult<SettlementPlan> {
    let payment_type = validate_request(request)?;

    let mut lines = Vec::with_capacity(request.items.len());
    let mut subtotal = Money::zero();

    for (idx, line) in request.items.iter().enumerate() {
        let product = products
            .iter()
            .find(|p| p.id == line.product_id && p.is_active)
            .ok_or(CoreError::ProductNotFound(line.product_id))?;

        let unit_price = price_override(line)?.unwrap_or_else(|| product.price());

        let total_price = unit_price
            .checked_multiply_quantity(line.quantity)
            .ok_or_else(|| amount_overflow("items"))?;
        subtotal = subtotal
            .checked_add(total_price)
            .ok_or_else(|| amount_overflow("items"))?;

        lines.push(PlannedLine {
            line_no: idx as i64 + 1,
            product_id: line.product_id,
            name_snapshot: product.name.clone(),
            quantity: line.quantity,
            unit_price,
            total_price,
        });
    }

    let tax = subtotal.calculate_tax(policy.tax_rate);
    let total = subtotal
        .checked_add(tax)
        .ok_or_else(|| amount_overflow("total"))?;

    Ok(SettlementPlan {
        payment_type,
        lines,
        subtotal,
        tax_rate: policy.tax_rate,
        tax,
        total,
        points_unit: policy.points_unit,
    })
}

fn amount_overflow(field: &str) -> CoreError {
    ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "amount is too large".to_string(),
    }
    .into()
}

// =============================================================================
// Unit Tests
// =============================================================================
