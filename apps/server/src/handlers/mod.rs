//! # HTTP Handlers
//!
//! One module per resource. Each handler gates, calls one repository
//! operation, publishes if something observers care about committed, and
//! returns JSON.
//!
//! ## Handler Categories
//! - [`sales`] - Settlement and sale history
//! - [`customers`] - Registration, lookup, point adjustment
//! - [`products`] - Catalogue
//! - [`loyalty`] - Tier administration
//! - [`permissions`] - Checks, templates, assignment
//! - [`users`] - Staff accounts
//! - [`health`] - Liveness and database health

pub mod customers;
pub mod health;
pub mod loyalty;
pub mod permissions;
pub mod products;
pub mod sales;
pub mod users;

use serde::Deserialize;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

/// `?limit=` on list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

impl ListQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_is_clamped() {
        assert_eq!(ListQuery::default().limit(), DEFAULT_LIMIT);
        assert_eq!(ListQuery { limit: Some(0) }.limit(), 1);
        assert_eq!(ListQuery { limit: Some(10_000) }.limit(), MAX_LIMIT);
    }
}
