//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  ├── DbError          - Database operation failures                    │
//! │  └── SettleError      - Rejected(CoreError) | Storage(DbError)         │
//! │                                                                         │
//! │  tally-server errors                                                   │
//! │  └── ApiError         - What the HTTP client sees                      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SettleError → ApiError → Client   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every `CoreError` is something the caller can fix. Storage failures never
//! appear here.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product does not exist or has been deactivated.
    #[error("Product not found: {0}")]
    ProductNotFound(i64),

    /// Customer referenced by a sale or adjustment does not exist.
    #[error("Customer not found: {0}")]
    CustomerNotFound(i64),

    /// Cashier on a sale does not exist or is inactive.
    #[error("Cashier not found: {0}")]
    CashierNotFound(i64),

    /// A settlement was requested with no line items.
    #[error("Cart is empty")]
    EmptyCart,

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Built-in templates cannot be removed.
    #[error("Permission template '{name}' is a system template and cannot be deleted")]
    SystemTemplateProtected { name: String },

    /// A template rule names a resource/action pair outside the known set.
    #[error("Unknown permission: {resource}:{action}")]
    UnknownPermission { resource: String, action: String },

    /// An adjustment would take the balance below zero.
    #[error("Adjustment of {delta} points would leave customer {customer_id} with a negative balance ({balance})")]
    NegativePointBalance {
        customer_id: i64,
        balance: i64,
        delta: i64,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Name of the field the caller should correct, when there is one.
    pub fn field(&self) -> Option<&str> {
        match self {
            CoreError::ProductNotFound(_) => Some("productId"),
            CoreError::CustomerNotFound(_) => Some("customerId"),
            CoreError::CashierNotFound(_) => Some("cashierId"),
            CoreError::EmptyCart | CoreError::CartTooLarge { .. } => Some("items"),
            CoreError::NegativePointBalance { .. } => Some("delta"),
            CoreError::Validation(e) => Some(e.field()),
            CoreError::SystemTemplateProtected { .. } | CoreError::UnknownPermission { .. } => None,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., bad email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., two active tiers at the same threshold).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

impl ValidationError {
    /// The offending field name.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::TooLong { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::MustBePositive { field }
            | ValidationError::InvalidFormat { field, .. }
            | ValidationError::NotAllowed { field, .. }
            | ValidationError::Duplicate { field, .. } => field,
        }
    }
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::ProductNotFound(42);
        assert_eq!(err.to_string(), "Product not found: 42");

        let err = CoreError::UnknownPermission {
            resource: "sales".to_string(),
            action: "teleport".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown permission: sales:teleport");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "name".to_string(),
        };
        assert_eq!(err.to_string(), "name is required");

        let err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity must be positive");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "sku".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.field(), Some("sku"));
    }

    #[test]
    fn test_field_for_reference_errors() {
        assert_eq!(CoreError::CustomerNotFound(7).field(), Some("customerId"));
        assert_eq!(CoreError::EmptyCart.field(), Some("items"));
    }
}
