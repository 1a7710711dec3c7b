//! # Validation Module
//!
//! Input validation utilities for Tally POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP boundary (tally-server)                                 │
//! │  └── Type validation (JSON deserialization)                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Field rules (lengths, ranges, formats)                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK / NOT NULL constraints                                      │
//! │  ├── UNIQUE constraints (sku, username, active tier thresholds)        │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Field names in errors are the camelCase names the client sent.

use rust_decimal::Decimal;

use crate::error::ValidationError;
use crate::money::{Money, BPS_SCALE};
use crate::types::{LoyaltyTierUpdate, NewCustomer, NewLoyaltyTier, NewProduct, NewUser};
use crate::MAX_ITEM_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Largest accepted points multiplier (10x).
pub const MAX_MULTIPLIER_BPS: i64 = 10 * BPS_SCALE as i64;

/// Largest single administrative points adjustment, either direction.
pub const MAX_POINTS_ADJUSTMENT: i64 = 1_000_000_000;

/// Ceiling on a customer's balance after an administrative adjustment.
pub const MAX_POINT_BALANCE: i64 = 1_000_000_000_000_000;

// =============================================================================
// String Validators
// =============================================================================

/// Checks a required, length-bounded text field.
///
/// ```rust
/// use tally_core::validation::validate_required;
///
/// assert!(validate_required("name", "Gold", 50).is_ok());
/// assert!(validate_required("name", "   ", 50).is_err());
/// ```
pub fn validate_required(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a SKU: 1-50 characters of letters, digits, hyphens, underscores.
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    validate_required("sku", sku, 50)?;

    if !sku
        .trim()
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Usernames are lowercase-insensitive identifiers without whitespace.
pub fn validate_username(username: &str) -> ValidationResult<()> {
    validate_required("username", username, 50)?;

    if username.trim().chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "username".to_string(),
            reason: "must not contain spaces".to_string(),
        });
    }

    Ok(())
}

/// A loose shape check; deliverability is not our concern.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };

    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must look like name@example.com".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed (free items).
///
/// ```rust
/// use tally_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(1099).is_ok());
/// assert!(validate_price_cents(0).is_ok());
/// assert!(validate_price_cents(-100).is_err());
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "priceCents".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a decimal price override (`unitPrice`) and converts it to cents.
///
/// Amounts with sub-cent precision are rejected, never rounded.
///
/// ```rust
/// use rust_decimal::Decimal;
/// use tally_core::validation::validate_unit_price;
///
/// assert_eq!(validate_unit_price(Decimal::new(2000, 2)).unwrap().cents(), 2000);
/// assert!(validate_unit_price(Decimal::new(19999, 3)).is_err());
/// assert!(validate_unit_price(Decimal::new(-1, 0)).is_err());
/// ```
pub fn validate_unit_price(price: Decimal) -> ValidationResult<Money> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ValidationError::OutOfRange {
            field: "unitPrice".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Money::from_decimal(price).ok_or_else(|| ValidationError::InvalidFormat {
        field: "unitPrice".to_string(),
        reason: "must have at most 2 decimal places and fit in cents".to_string(),
    })
}

/// Validates a tax rate in basis points (0% to 100%).
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > BPS_SCALE {
        return Err(ValidationError::OutOfRange {
            field: "taxRateBps".to_string(),
            min: 0,
            max: BPS_SCALE as i64,
        });
    }

    Ok(())
}

/// Bounds an administrative points delta.
pub fn validate_points_delta(delta: i64) -> ValidationResult<()> {
    if delta.unsigned_abs() > MAX_POINTS_ADJUSTMENT as u64 {
        return Err(ValidationError::OutOfRange {
            field: "delta".to_string(),
            min: -MAX_POINTS_ADJUSTMENT,
            max: MAX_POINTS_ADJUSTMENT,
        });
    }

    Ok(())
}

pub fn validate_min_points(points: i64) -> ValidationResult<()> {
    if points < 0 {
        return Err(ValidationError::OutOfRange {
            field: "minPoints".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Multipliers are positive and capped at [`MAX_MULTIPLIER_BPS`].
pub fn validate_multiplier_bps(bps: i64) -> ValidationResult<()> {
    if bps <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "pointsMultiplierBps".to_string(),
        });
    }

    if bps > MAX_MULTIPLIER_BPS {
        return Err(ValidationError::OutOfRange {
            field: "pointsMultiplierBps".to_string(),
            min: 1,
            max: MAX_MULTIPLIER_BPS,
        });
    }

    Ok(())
}

// =============================================================================
// Request Validators
// =============================================================================

pub fn validate_new_customer(input: &NewCustomer) -> ValidationResult<()> {
    validate_required("name", &input.name, 200)?;
    if let Some(email) = input.email.as_deref().filter(|e| !e.trim().is_empty()) {
        validate_email(email)?;
    }
    if let Some(phone) = input.phone.as_deref() {
        if phone.trim().chars().count() > 30 {
            return Err(ValidationError::TooLong {
                field: "phone".to_string(),
                max: 30,
            });
        }
    }
    Ok(())
}

pub fn validate_new_product(input: &NewProduct) -> ValidationResult<()> {
    validate_sku(&input.sku)?;
    validate_required("name", &input.name, 200)?;
    validate_price_cents(input.price_cents)
}

pub fn validate_new_user(input: &NewUser) -> ValidationResult<()> {
    validate_username(&input.username)?;
    validate_required("displayName", &input.display_name, 100)
}

pub fn validate_new_tier(input: &NewLoyaltyTier) -> ValidationResult<()> {
    validate_required("name", &input.name, 50)?;
    validate_min_points(input.min_points)?;
    validate_multiplier_bps(input.points_multiplier_bps)
}

/// An update must change something, and whatever it sets must be valid.
pub fn validate_tier_update(input: &LoyaltyTierUpdate) -> ValidationResult<()> {
    if input.name.is_none() && input.min_points.is_none() && input.points_multiplier_bps.is_none()
    {
        return Err(ValidationError::Required {
            field: "name, minPoints or pointsMultiplierBps".to_string(),
        });
    }
    if let Some(name) = &input.name {
        validate_required("name", name, 50)?;
    }
    if let Some(points) = input.min_points {
        validate_min_points(points)?;
    }
    if let Some(bps) = input.points_multiplier_bps {
        validate_multiplier_bps(bps)?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
