//! # Permission Repository
//!
//! Permission templates, their rules, and the permission check.
//!
//! ## Check Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  is_allowed(user_id, "sales", "create", None)                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Permission::from_pair  ── unknown ──► false (warn)                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  users.permission_template_id (active user) ── none ──► false          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  template_permissions WHERE resource/action                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  tally_core::permission::evaluate (exact field match, default deny)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult, RepoResult};
use tally_core::permission::{evaluate, field_key};
use tally_core::validation::validate_required;
use tally_core::{
    CoreError, NewPermissionTemplate, Permission, PermissionTemplate, PermissionTemplateWithRules,
    TemplatePermission, ValidationError,
};

#[derive(Debug, Clone)]
pub struct PermissionRepository {
    pool: SqlitePool,
}

impl PermissionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PermissionRepository { pool }
    }

    // =========================================================================
    // Checks
    // =========================================================================

    /// Answers a check made with wire names. Unknown pairs are denied.
    pub async fn is_allowed(
        &self,
        user_id: i64,
        resource: &str,
        action: &str,
        field: Option<&str>,
    ) -> DbResult<bool> {
        match Permission::from_pair(resource, action) {
            Some(permission) => self.is_permitted(user_id, permission, field).await,
            None => {
                warn!(user_id, resource, action, "Permission check for unknown pair denied");
                Ok(false)
            }
        }
    }

    /// Answers a check for a known permission.
    pub async fn is_permitted(
        &self,
        user_id: i64,
        permission: Permission,
        field: Option<&str>,
    ) -> DbResult<bool> {
        let template_id: Option<Option<i64>> = sqlx::query_scalar(
            "SELECT permission_template_id FROM users WHERE id = ?1 AND is_active = 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(template_id) = template_id.flatten() else {
            debug!(user_id, %permission, "No active user or no template; denied");
            return Ok(false);
        };

        let rules = sqlx::query_as::<_, TemplatePermission>(
            r#"
            SELECT * FROM template_permissions
            WHERE template_id = ?1 AND resource = ?2 AND action = ?3 AND field = ?4
            "#,
        )
        .bind(template_id)
        .bind(permission.resource().as_str())
        .bind(permission.action().as_str())
        .bind(field_key(field))
        .fetch_all(&self.pool)
        .await?;

        let allowed = evaluate(permission, field, &rules);
        debug!(user_id, template_id, %permission, field = ?field, allowed, "Permission checked");
        Ok(allowed)
    }

    // =========================================================================
    // Templates
    // =========================================================================

    pub async fn list_templates(&self) -> DbResult<Vec<PermissionTemplateWithRules>> {
        let templates =
            sqlx::query_as::<_, PermissionTemplate>("SELECT * FROM permission_templates ORDER BY name")
                .fetch_all(&self.pool)
                .await?;

        let rules = sqlx::query_as::<_, TemplatePermission>(
            "SELECT * FROM template_permissions ORDER BY template_id, resource, action, field",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(templates
            .into_iter()
            .map(|template| {
                let permissions = rules
                    .iter()
                    .filter(|r| r.template_id == template.id)
                    .cloned()
                    .collect();
                PermissionTemplateWithRules {
                    template,
                    permissions,
                }
            })
            .collect())
    }

    pub async fn get_template(&self, id: i64) -> DbResult<Option<PermissionTemplateWithRules>> {
        let mut conn = self.pool.acquire().await?;
        fetch_template(&mut conn, id).await
    }

    /// Creates a template and all of its rules in one transaction.
    ///
    /// Every rule must name a known permission. A default template replaces
    /// any earlier default for the same role.
    pub async fn create_template(
        &self,
        input: &NewPermissionTemplate,
    ) -> RepoResult<PermissionTemplateWithRules> {
        self.create_template_inner(input, false).await
    }

    /// Same as [`Self::create_template`] but marks the template as built in.
    pub async fn create_system_template(
        &self,
        input: &NewPermissionTemplate,
    ) -> RepoResult<PermissionTemplateWithRules> {
        self.create_template_inner(input, true).await
    }

    async fn create_template_inner(
        &self,
        input: &NewPermissionTemplate,
        is_system: bool,
    ) -> RepoResult<PermissionTemplateWithRules> {
        validate_required("name", &input.name, 100)?;
        if input.is_default && input.role.is_none() {
            return Err(ValidationError::Required {
                field: "role".to_string(),
            }
            .into());
        }
        for rule in &input.permissions {
            Permission::parse(rule.resource.trim(), rule.action.trim())?;
        }

        let mut tx = self.pool.begin().await?;

        if input.is_default {
            sqlx::query("UPDATE permission_templates SET is_default = 0 WHERE is_default = 1 AND role = ?1")
                .bind(input.role)
                .execute(&mut *tx)
                .await?;
        }

        let template_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO permission_templates (name, description, is_system, is_default, role, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING id
            "#,
        )
        .bind(input.name.trim())
        .bind(input.description.as_deref())
        .bind(is_system)
        .bind(input.is_default)
        .bind(input.role)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        for rule in &input.permissions {
            sqlx::query(
                r#"
                INSERT INTO template_permissions (template_id, resource, action, field, allowed)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(template_id)
            .bind(rule.resource.trim())
            .bind(rule.action.trim())
            .bind(field_key(rule.field.as_deref()))
            .bind(rule.allowed)
            .execute(&mut *tx)
            .await?;
        }

        let created = fetch_template(&mut tx, template_id)
            .await?
            .ok_or_else(|| DbError::not_found("PermissionTemplate", template_id))?;

        tx.commit().await?;
        info!(
            template_id,
            name = %created.template.name,
            rules = created.permissions.len(),
            "Permission template created"
        );

        Ok(created)
    }

    /// Deletes a non-system template. Users holding it end up with none.
    pub async fn delete_template(&self, id: i64) -> RepoResult<()> {
        let template = sqlx::query_as::<_, PermissionTemplate>(
            "SELECT * FROM permission_templates WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("PermissionTemplate", id))?;

        if template.is_system {
            return Err(CoreError::SystemTemplateProtected {
                name: template.name,
            }
            .into());
        }

        sqlx::query("DELETE FROM permission_templates WHERE id = ?1 AND is_system = 0")
            .bind(id)
            .execute(&self.pool)
            .await?;

        info!(template_id = id, name = %template.name, "Permission template deleted");
        Ok(())
    }
}

async fn fetch_template(
    conn: &mut SqliteConnection,
    id: i64,
) -> DbResult<Option<PermissionTemplateWithRules>> {
    let Some(template) = sqlx::query_as::<_, PermissionTemplate>(
        "SELECT * FROM permission_templates WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    else {
        return Ok(None);
    };

    let permissions = sqlx::query_as::<_, TemplatePermission>(
        "SELECT * FROM template_permissions WHERE template_id = ?1 ORDER BY resource, action, field",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(PermissionTemplateWithRules {
        template,
        permissions,
    }))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::error::RepoError;
    use crate::{Database, DbConfig};
    use tally_core::{
        CoreError, NewPermissionTemplate, NewTemplatePermission, NewUser, Permission, User,
        UserRole,
    };

    fn rule(resource: &str, action: &str, field: Option<&str>, allowed: bool) -> NewTemplatePermission {
        NewTemplatePermission {
            resource: resource.to_string(),
            action: action.to_string(),
            field: field.map(str::to_string),
            allowed,
        }
    }

    fn template(name: &str, permissions: Vec<NewTemplatePermission>) -> NewPermissionTemplate {
        NewPermissionTemplate {
            name: name.to_string(),
            description: None,
            is_default: false,
            role: None,
            permissions,
        }
    }

    async fn user(db: &Database, username: &str, template_id: Option<i64>) -> User {
        db.users()
            .create(&NewUser {
                username: username.to_string(),
                display_name: username.to_string(),
                role: UserRole::Cashier,
                permission_template_id: template_id,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_user_without_template_is_denied() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let u = user(&db, "nobody", None).await;

        assert!(!db.permissions().is_allowed(u.id, "sales", "create", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_rules_decide_and_default_deny() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.permissions();
        let t = repo
            .create_template(&template(
                "Cashier",
                vec![
                    rule("sales", "create", None, true),
                    rule("customers", "read", None, true),
                    rule("customers", "read", Some("email"), false),
                ],
            ))
            .await
            .unwrap();
        assert_eq!(t.permissions.len(), 3);

        let u = user(&db, "cash", Some(t.template.id)).await;

        assert!(repo.is_allowed(u.id, "sales", "create", None).await.unwrap());
        assert!(repo.is_allowed(u.id, "customers", "read", None).await.unwrap());
        assert!(!repo.is_allowed(u.id, "customers", "read", Some("email")).await.unwrap());
        assert!(!repo.is_allowed(u.id, "customers", "read", Some("phone")).await.unwrap());
        assert!(!repo.is_permitted(u.id, Permission::UsersCreate, None).await.unwrap());
        assert!(!repo.is_allowed(u.id, "sales", "teleport", None).await.unwrap());
        assert!(!repo.is_allowed(9_999, "sales", "create", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_rule_rejects_whole_template() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.permissions();

        let err = repo
            .create_template(&template(
                "Odd",
                vec![rule("sales", "create", None, true), rule("sales", "refund", None, true)],
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Rejected(CoreError::UnknownPermission { .. })));
        assert!(repo.list_templates().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_system_template_cannot_be_deleted() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.permissions();
        let sys = repo
            .create_system_template(&template("Administrator", vec![rule("users", "read", None, true)]))
            .await
            .unwrap();

        let err = repo.delete_template(sys.template.id).await.unwrap_err();
        assert!(matches!(err, RepoError::Rejected(CoreError::SystemTemplateProtected { .. })));
        assert!(repo.get_template(sys.template.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_deleting_template_leaves_users_without_one() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.permissions();
        let t = repo
            .create_template(&template("Temp", vec![rule("sales", "create", None, true)]))
            .await
            .unwrap();
        let u = user(&db, "temp", Some(t.template.id)).await;
        assert!(repo.is_allowed(u.id, "sales", "create", None).await.unwrap());

        repo.delete_template(t.template.id).await.unwrap();

        let u = db.users().get_by_id(u.id).await.unwrap().unwrap();
        assert_eq!(u.permission_template_id, None);
        assert!(!repo.is_allowed(u.id, "sales", "create", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_new_default_replaces_old_default() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.permissions();
        let mut input = template("Cashier v1", vec![]);
        input.is_default = true;
        input.role = Some(UserRole::Cashier);
        let first = repo.create_template(&input).await.unwrap();

        input.name = "Cashier v2".to_string();
        let second = repo.create_template(&input).await.unwrap();

        let first = repo.get_template(first.template.id).await.unwrap().unwrap();
        assert!(!first.template.is_default);
        assert!(second.template.is_default);
    }

    #[tokio::test]
    async fn test_default_without_role_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut input = template("Floating", vec![]);
        input.is_default = true;
        let err = db.permissions().create_template(&input).await.unwrap_err();
        assert!(matches!(err, RepoError::Rejected(CoreError::Validation(_))));
    }
}
