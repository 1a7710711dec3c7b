//! # Loyalty Module
//!
//! Tier resolution and points accrual.
//!
//! ## Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Active tiers:  Bronze ≥ 0 (1.0x)   Silver ≥ 100 (1.25x)   Gold ≥ 500  │
//! │                                                                         │
//! │  points      0 ──────── 99 │ 100 ─────── 499 │ 500 ─────────────▶       │
//! │  tier        Bronze 1.0x   │ Silver 1.25x    │ Gold 1.5x                │
//! │                                                                         │
//! │  The highest threshold not exceeding the balance wins. No tier          │
//! │  qualifies (or no tiers at all): (None, 1.0x).                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Accrual
//! ```text
//!   base_points   = floor(subtotal / points_unit)      $23.50 / $10 → 2
//!   points_earned = floor(base_points × multiplier)    2 × 1.25     → 2
//! ```
//!
//! The multiplier used for accrual is the customer's cached one, i.e. the
//! tier held *before* this sale. The new balance is resolved afterwards and
//! applies to the next sale.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, Multiplier};
use crate::types::LoyaltyTier;

/// Output of [`resolve_tier`]: the tier name and the multiplier it grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TierAssignment {
    pub tier: Option<String>,
    pub multiplier: Multiplier,
}

impl TierAssignment {
    /// No tier, default multiplier.
    pub fn untiered() -> Self {
        TierAssignment {
            tier: None,
            multiplier: Multiplier::ONE,
        }
    }
}

/// Maps a points balance to the best qualifying active tier.
///
/// Inactive tiers are ignored, so callers may pass the full table.
///
/// ```rust
/// use tally_core::loyalty::resolve_tier;
///
/// let assignment = resolve_tier(50, &[]);
/// assert_eq!(assignment.tier, None);
/// assert_eq!(assignment.multiplier.bps(), 10_000);
/// ```
pub fn resolve_tier(points: i64, tiers: &[LoyaltyTier]) -> TierAssignment {
    tiers
        .iter()
        .filter(|t| t.is_active && t.min_points <= points)
        .max_by_key(|t| t.min_points)
        .map(|t| TierAssignment {
            tier: Some(t.name.clone()),
            multiplier: t.multiplier(),
        })
        .unwrap_or_else(TierAssignment::untiered)
}

/// Whole points for a subtotal before the multiplier, truncated.
///
/// A non-positive unit or subtotal earns nothing.
pub fn base_points(subtotal: Money, points_unit: Money) -> i64 {
    if points_unit.cents() <= 0 || subtotal.cents() <= 0 {
        return 0;
    }
    subtotal.cents() / points_unit.cents()
}

/// Points a sale earns given the customer's current multiplier.
///
/// ```rust
/// use tally_core::loyalty::points_earned;
/// use tally_core::money::{Money, Multiplier};
///
/// let earned = points_earned(
///     Money::from_cents(2350),
///     Money::from_cents(1000),
///     Multiplier::from_bps(12500),
/// );
/// assert_eq!(earned, 2);
/// ```
pub fn points_earned(subtotal: Money, points_unit: Money, multiplier: Multiplier) -> i64 {
    multiplier.apply(base_points(subtotal, points_unit))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn tier(id: i64, name: &str, min_points: i64, bps: i64) -> LoyaltyTier {
        LoyaltyTier {
            id,
            name: name.to_string(),
            min_points,
            points_multiplier_bps: bps,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn standard_tiers() -> Vec<LoyaltyTier> {
        vec![
            tier(1, "Bronze", 0, 10_000),
            tier(2, "Silver", 100, 12_500),
            tier(3, "Gold", 500, 15_000),
        ]
    }

    #[test]
    fn test_resolves_highest_qualifying_tier() {
        let tiers = standard_tiers();

        let a = resolve_tier(99, &tiers);
        assert_eq!(a.tier.as_deref(), Some("Bronze"));
        assert_eq!(a.multiplier, Multiplier::from_bps(10_000));

        let a = resolve_tier(100, &tiers);
        assert_eq!(a.tier.as_deref(), Some("Silver"));
        assert_eq!(a.multiplier, Multiplier::from_bps(12_500));

        let a = resolve_tier(5000, &tiers);
        assert_eq!(a.tier.as_deref(), Some("Gold"));
        assert_eq!(a.multiplier, Multiplier::from_bps(15_000));
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let mut tiers = standard_tiers();
        tiers.reverse();
        assert_eq!(resolve_tier(250, &tiers).tier.as_deref(), Some("Silver"));
    }

    #[test]
    fn test_below_every_threshold_is_untiered() {
        let tiers = vec![tier(2, "Silver", 100, 12_500), tier(3, "Gold", 500, 15_000)];
        assert_eq!(resolve_tier(99, &tiers), TierAssignment::untiered());
    }

    #[test]
    fn test_empty_tier_set_is_untiered() {
        assert_eq!(resolve_tier(1_000_000, &[]), TierAssignment::untiered());
    }

    #[test]
    fn test_inactive_tiers_are_ignored() {
        let mut tiers = standard_tiers();
        tiers[2].is_active = false;
        assert_eq!(resolve_tier(5000, &tiers).tier.as_deref(), Some("Silver"));
    }

    #[test]
    fn test_points_accrual_example() {
        // $23.50 at 1.25x with one point per $10
        let earned = points_earned(
            Money::from_cents(2350),
            Money::from_cents(1000),
            Multiplier::from_bps(12_500),
        );
        assert_eq!(earned, 2);
    }

    #[test]
    fn test_base_points_truncates() {
        let unit = Money::from_cents(1000);
        assert_eq!(base_points(Money::from_cents(999), unit), 0);
        assert_eq!(base_points(Money::from_cents(1000), unit), 1);
        assert_eq!(base_points(Money::from_cents(10_999), unit), 10);
    }

    #[test]
    fn test_degenerate_inputs_earn_nothing() {
        assert_eq!(base_points(Money::from_cents(5000), Money::zero()), 0);
        assert_eq!(base_points(Money::zero(), Money::from_cents(1000)), 0);
    }
}
