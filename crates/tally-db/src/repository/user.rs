//! # User Repository
//!
//! Staff accounts and their permission template assignment.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult, RepoResult};
use tally_core::validation::validate_new_user;
use tally_core::{CashierSummary, NewUser, User};

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<User>> {
        let mut conn = self.pool.acquire().await?;
        fetch_user(&mut conn, id).await
    }

    pub async fn list(&self) -> DbResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY username")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    /// Creates a user. Without an explicit template the user gets the
    /// default template for their role, if there is one.
    pub async fn create(&self, input: &NewUser) -> RepoResult<User> {
        validate_new_user(input)?;

        let mut tx = self.pool.begin().await?;

        let template_id = match input.permission_template_id {
            Some(id) => Some(id),
            None => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT id FROM permission_templates WHERE is_default = 1 AND role = ?1",
                )
                .bind(input.role)
                .fetch_optional(&mut *tx)
                .await?
            }
        };

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, display_name, role, permission_template_id, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, 1, ?5)
            RETURNING *
            "#,
        )
        .bind(input.username.trim().to_ascii_lowercase())
        .bind(input.display_name.trim())
        .bind(input.role)
        .bind(template_id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(user_id = user.id, username = %user.username, role = user.role.as_str(), template_id = ?template_id, "User created");

        Ok(user)
    }

    /// Assigns (or with `None`, removes) a user's permission template.
    pub async fn assign_template(&self, user_id: i64, template_id: Option<i64>) -> DbResult<User> {
        debug!(user_id, template_id = ?template_id, "Assigning permission template");

        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET permission_template_id = ?2 WHERE id = ?1 RETURNING *",
        )
        .bind(user_id)
        .bind(template_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("User", user_id))?;

        Ok(user)
    }
}

pub(crate) async fn fetch_user(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(user)
}

pub(crate) async fn fetch_cashier(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<CashierSummary>> {
    let cashier = sqlx::query_as::<_, CashierSummary>(
        "SELECT id, username, display_name FROM users WHERE id = ?1 AND is_active = 1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(cashier)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::error::{DbError, RepoError};
    use crate::{Database, DbConfig};
    use tally_core::{NewPermissionTemplate, NewUser, UserRole};

    fn new_user(username: &str, role: UserRole) -> NewUser {
        NewUser {
            username: username.to_string(),
            display_name: username.to_uppercase(),
            role,
            permission_template_id: None,
        }
    }

    #[tokio::test]
    async fn test_create_without_default_template() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = db.users().create(&new_user("Mia", UserRole::Cashier)).await.unwrap();

        assert_eq!(user.username, "mia");
        assert_eq!(user.permission_template_id, None);
        assert!(user.is_active);
    }

    #[tokio::test]
    async fn test_create_picks_role_default_template() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let template = db
            .permissions()
            .create_template(&NewPermissionTemplate {
                name: "Cashier".to_string(),
                description: None,
                is_default: true,
                role: Some(UserRole::Cashier),
                permissions: vec![],
            })
            .await
            .unwrap();

        let cashier = db.users().create(&new_user("tom", UserRole::Cashier)).await.unwrap();
        assert_eq!(cashier.permission_template_id, Some(template.template.id));

        let manager = db.users().create(&new_user("meg", UserRole::Manager)).await.unwrap();
        assert_eq!(manager.permission_template_id, None);
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.users().create(&new_user("sam", UserRole::Admin)).await.unwrap();
        let err = db.users().create(&new_user("SAM", UserRole::Cashier)).await.unwrap_err();
        assert!(matches!(err, RepoError::Storage(DbError::UniqueViolation { .. })));
    }

    #[tokio::test]
    async fn test_assign_unknown_template_is_fk_violation() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = db.users().create(&new_user("kim", UserRole::Manager)).await.unwrap();

        let err = db.users().assign_template(user.id, Some(42)).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));

        let err = db.users().assign_template(999, None).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
