//! # Permission Module
//!
//! The closed set of permissions and the rule evaluation for templates.
//!
//! ## Evaluation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  is_allowed(user, resource, action, field?)                             │
//! │                                                                         │
//! │  (resource, action) known?  ── no ──► DENY (unknown pair)              │
//! │       │ yes                                                             │
//! │  user active with template? ── no ──► DENY (no template)               │
//! │       │ yes                                                             │
//! │  rule with same resource,                                               │
//! │  action and field?          ── no ──► DENY (no matching rule)          │
//! │       │ yes                                                             │
//! │       ▼                                                                 │
//! │  rule.allowed                                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Field matching is exact: a rule stored without a field only answers
//! checks made without a field, and vice versa.

use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::types::{TemplatePermission, UserRole};

// =============================================================================
// Resource / Action
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Resource {
    Sales,
    Customers,
    Products,
    LoyaltyTiers,
    PermissionTemplates,
    Users,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Sales => "sales",
            Resource::Customers => "customers",
            Resource::Products => "products",
            Resource::LoyaltyTiers => "loyalty_tiers",
            Resource::PermissionTemplates => "permission_templates",
            Resource::Users => "users",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Action {
    Create,
    Read,
    Update,
    AdjustPoints,
    Manage,
    Assign,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::AdjustPoints => "adjust_points",
            Action::Manage => "manage",
            Action::Assign => "assign",
        }
    }
}

// =============================================================================
// Permission
// =============================================================================

/// Every `(resource, action)` pair the system knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    SalesCreate,
    SalesRead,
    CustomersCreate,
    CustomersRead,
    CustomersAdjustPoints,
    ProductsCreate,
    ProductsRead,
    ProductsUpdate,
    LoyaltyTiersManage,
    PermissionTemplatesManage,
    PermissionTemplatesAssign,
    UsersCreate,
    UsersRead,
}

impl Permission {
    pub const ALL: [Permission; 13] = [
        Permission::SalesCreate,
        Permission::SalesRead,
        Permission::CustomersCreate,
        Permission::CustomersRead,
        Permission::CustomersAdjustPoints,
        Permission::ProductsCreate,
        Permission::ProductsRead,
        Permission::ProductsUpdate,
        Permission::LoyaltyTiersManage,
        Permission::PermissionTemplatesManage,
        Permission::PermissionTemplatesAssign,
        Permission::UsersCreate,
        Permission::UsersRead,
    ];

    pub fn resource(&self) -> Resource {
        match self {
            Permission::SalesCreate | Permission::SalesRead => Resource::Sales,
            Permission::CustomersCreate
            | Permission::CustomersRead
            | Permission::CustomersAdjustPoints => Resource::Customers,
            Permission::ProductsCreate | Permission::ProductsRead | Permission::ProductsUpdate => {
                Resource::Products
            }
            Permission::LoyaltyTiersManage => Resource::LoyaltyTiers,
            Permission::PermissionTemplatesManage | Permission::PermissionTemplatesAssign => {
                Resource::PermissionTemplates
            }
            Permission::UsersCreate | Permission::UsersRead => Resource::Users,
        }
    }

    pub fn action(&self) -> Action {
        match self {
            Permission::SalesCreate
            | Permission::CustomersCreate
            | Permission::ProductsCreate
            | Permission::UsersCreate => Action::Create,
            Permission::SalesRead
            | Permission::CustomersRead
            | Permission::ProductsRead
            | Permission::UsersRead => Action::Read,
            Permission::ProductsUpdate => Action::Update,
            Permission::CustomersAdjustPoints => Action::AdjustPoints,
            Permission::LoyaltyTiersManage | Permission::PermissionTemplatesManage => {
                Action::Manage
            }
            Permission::PermissionTemplatesAssign => Action::Assign,
        }
    }

    /// Looks up a pair by its wire names; `None` for anything not in [`Permission::ALL`].
    ///
    /// ```rust
    /// use tally_core::permission::Permission;
    ///
    /// assert_eq!(Permission::from_pair("sales", "create"), Some(Permission::SalesCreate));
    /// assert_eq!(Permission::from_pair("sales", "delete"), None);
    /// ```
    pub fn from_pair(resource: &str, action: &str) -> Option<Permission> {
        Permission::ALL
            .into_iter()
            .find(|p| p.resource().as_str() == resource && p.action().as_str() == action)
    }

    /// Like [`Permission::from_pair`] but reports the unknown pair.
    pub fn parse(resource: &str, action: &str) -> CoreResult<Permission> {
        Permission::from_pair(resource, action).ok_or_else(|| CoreError::UnknownPermission {
            resource: resource.to_string(),
            action: action.to_string(),
        })
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource().as_str(), self.action().as_str())
    }
}

impl UserRole {
    /// The permissions a role's built-in template grants.
    pub fn default_permissions(&self) -> Vec<Permission> {
        use Permission::*;
        match self {
            UserRole::Admin => Permission::ALL.to_vec(),
            UserRole::Manager => vec![
                SalesCreate,
                SalesRead,
                CustomersCreate,
                CustomersRead,
                CustomersAdjustPoints,
                ProductsCreate,
                ProductsRead,
                ProductsUpdate,
                LoyaltyTiersManage,
                UsersRead,
            ],
            UserRole::Cashier => vec![SalesCreate, SalesRead, CustomersCreate, CustomersRead, ProductsRead],
        }
    }
}

// =============================================================================
// Evaluation
// =============================================================================

/// Normalises an optional field to its stored form (empty = not field-scoped).
#[inline]
pub fn field_key(field: Option<&str>) -> &str {
    field.map(str::trim).unwrap_or("")
}

/// Decides a check against one template's rules. Default deny.
pub fn evaluate(permission: Permission, field: Option<&str>, rules: &[TemplatePermission]) -> bool {
    let field = field_key(field);
    rules
        .iter()
        .find(|r| {
            r.resource == permission.resource().as_str()
                && r.action == permission.action().as_str()
                && r.field == field
        })
        .map(|r| r.allowed)
        .unwrap_or(false)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(resource: &str, action: &str, field: &str, allowed: bool) -> TemplatePermission {
        TemplatePermission {
            id: 0,
            template_id: 1,
            resource: resource.to_string(),
            action: action.to_string(),
            field: field.to_string(),
            allowed,
        }
    }

    #[test]
    fn test_every_permission_round_trips_through_its_pair() {
        for p in Permission::ALL {
            assert_eq!(
                Permission::from_pair(p.resource().as_str(), p.action().as_str()),
                Some(p)
            );
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Permission::CustomersAdjustPoints.to_string(), "customers:adjust_points");
        assert_eq!(Permission::LoyaltyTiersManage.to_string(), "loyalty_tiers:manage");
    }

    #[test]
    fn test_unknown_pair_is_reported() {
        let err = Permission::parse("sales", "refund").unwrap_err();
        assert!(matches!(err, CoreError::UnknownPermission { .. }));
    }

    #[test]
    fn test_role_defaults_nest() {
        let admin = UserRole::Admin.default_permissions();
        let manager = UserRole::Manager.default_permissions();
        let cashier = UserRole::Cashier.default_permissions();

        assert_eq!(admin.len(), Permission::ALL.len());
        assert!(cashier.iter().all(|p| manager.contains(p)));
        assert!(!cashier.contains(&Permission::CustomersAdjustPoints));
        assert!(!manager.contains(&Permission::PermissionTemplatesManage));
    }

    #[test]
    fn test_no_rules_denies() {
        assert!(!evaluate(Permission::SalesCreate, None, &[]));
    }

    #[test]
    fn test_matching_rule_decides() {
        let rules = vec![
            rule("sales", "create", "", true),
            rule("sales", "read", "", false),
        ];
        assert!(evaluate(Permission::SalesCreate, None, &rules));
        assert!(!evaluate(Permission::SalesRead, None, &rules));
        assert!(!evaluate(Permission::UsersRead, None, &rules));
    }

    #[test]
    fn test_field_match_is_exact() {
        let rules = vec![rule("customers", "read", "email", true)];
        assert!(evaluate(Permission::CustomersRead, Some("email"), &rules));
        assert!(!evaluate(Permission::CustomersRead, None, &rules));
        assert!(!evaluate(Permission::CustomersRead, Some("phone"), &rules));

        let rules = vec![rule("customers", "read", "", true)];
        assert!(!evaluate(Permission::CustomersRead, Some("email"), &rules));
    }
}
