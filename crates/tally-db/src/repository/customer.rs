//! # Customer Repository
//!
//! Registration, lookup and administrative point adjustment.
//!
//! Settlement accrual lives in [`crate::SaleRepository::settle`]. Every path
//! that changes `loyalty_points` ends with the tier sync from
//! [`super::loyalty_tier`] on the same transaction.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::loyalty_tier::sync_customer_tier;
use crate::error::{DbError, DbResult, RepoResult};
use tally_core::validation::{validate_new_customer, validate_points_delta, MAX_POINT_BALANCE};
use tally_core::{CoreError, Customer, NewCustomer, PointsAdjustment, ValidationError};

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        fetch_customer(&mut conn, id).await
    }

    /// Customers by name.
    pub async fn list(&self, limit: i64) -> DbResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(
            "SELECT * FROM customers ORDER BY name COLLATE NOCASE, id LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(customers)
    }

    /// Registers a customer with zero points and the tier that zero earns.
    pub async fn create(&self, input: &NewCustomer) -> RepoResult<Customer> {
        validate_new_customer(input)?;

        let now = Utc::now();
        let email = input
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_ascii_lowercase);
        let phone = input.phone.as_deref().map(str::trim).filter(|p| !p.is_empty());

        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO customers (name, email, phone, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            RETURNING id
            "#,
        )
        .bind(input.name.trim())
        .bind(email)
        .bind(phone)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        sync_customer_tier(&mut tx, id).await?;
        let customer = fetch_customer(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))?;

        tx.commit().await?;
        info!(customer_id = id, "Customer registered");

        Ok(customer)
    }

    /// Applies a signed change to a customer's points and re-syncs the tier.
    ///
    /// The balance must stay within `0..=MAX_POINT_BALANCE`. Spend and order
    /// counters are left alone; only settlement moves those.
    pub async fn adjust_points(&self, id: i64, adjustment: &PointsAdjustment) -> RepoResult<Customer> {
        validate_points_delta(adjustment.delta)?;
        debug!(customer_id = id, delta = adjustment.delta, reason = ?adjustment.reason, "Adjusting points");

        let mut tx = self.pool.begin().await?;

        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE customers
            SET loyalty_points = loyalty_points + ?2,
                updated_at = ?3
            WHERE id = ?1 AND loyalty_points + ?2 BETWEEN 0 AND ?4
            RETURNING loyalty_points
            "#,
        )
        .bind(id)
        .bind(adjustment.delta)
        .bind(Utc::now())
        .bind(MAX_POINT_BALANCE)
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_none() {
            let balance: Option<i64> =
                sqlx::query_scalar("SELECT loyalty_points FROM customers WHERE id = ?1")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
            return Err(match balance {
                None => CoreError::CustomerNotFound(id).into(),
                Some(balance)
                    if balance
                        .checked_add(adjustment.delta)
                        .map_or(true, |b| b > MAX_POINT_BALANCE) =>
                {
                    ValidationError::OutOfRange {
                        field: "delta".to_string(),
                        min: -balance,
                        max: MAX_POINT_BALANCE.saturating_sub(balance),
                    }
                    .into()
                }
                Some(balance) => CoreError::NegativePointBalance {
                    customer_id: id,
                    balance,
                    delta: adjustment.delta,
                }
                .into(),
            });
        }

        sync_customer_tier(&mut tx, id).await?;
        let customer = fetch_customer(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))?;

        tx.commit().await?;
        info!(
            customer_id = id,
            delta = adjustment.delta,
            points = customer.loyalty_points,
            tier = ?customer.loyalty_tier,
            "Points adjusted"
        );

        Ok(customer)
    }
}

pub(crate) async fn fetch_customer(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Customer>> {
    let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(customer)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::error::{DbError, RepoError};
    use crate::{Database, DbConfig};
    use tally_core::validation::{MAX_POINTS_ADJUSTMENT, MAX_POINT_BALANCE};
    use tally_core::{CoreError, NewCustomer, NewLoyaltyTier, PointsAdjustment, ValidationError};

    async fn setup() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        for (name, min_points, bps) in [("Bronze", 0, 10_000), ("Silver", 100, 12_500), ("Gold", 500, 15_000)] {
            db.loyalty_tiers()
                .create(&NewLoyaltyTier {
                    name: name.to_string(),
                    min_points,
                    points_multiplier_bps: bps,
                })
                .await
                .unwrap();
        }
        db
    }

    fn new_customer(name: &str, email: Option<&str>) -> NewCustomer {
        NewCustomer {
            name: name.to_string(),
            email: email.map(str::to_string),
            phone: None,
        }
    }

    fn adjust(delta: i64) -> PointsAdjustment {
        PointsAdjustment {
            delta,
            reason: Some("test".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_entry_tier() {
        let db = setup().await;
        let customer = db
            .customers()
            .create(&new_customer("Ana", Some("Ana@Example.com")))
            .await
            .unwrap();

        assert_eq!(customer.loyalty_points, 0);
        assert_eq!(customer.loyalty_tier.as_deref(), Some("Bronze"));
        assert_eq!(customer.email.as_deref(), Some("ana@example.com"));
        assert_eq!(customer.total_orders, 0);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let db = setup().await;
        let repo = db.customers();
        repo.create(&new_customer("Ana", Some("ana@example.com"))).await.unwrap();

        let err = repo
            .create(&new_customer("Other Ana", Some("ANA@example.com")))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Storage(DbError::UniqueViolation { .. })));
    }

    #[tokio::test]
    async fn test_adjust_points_resyncs_tier() {
        let db = setup().await;
        let repo = db.customers();
        let customer = repo.create(&new_customer("Ben", None)).await.unwrap();

        let c = repo.adjust_points(customer.id, &adjust(150)).await.unwrap();
        assert_eq!(c.loyalty_points, 150);
        assert_eq!(c.loyalty_tier.as_deref(), Some("Silver"));
        assert_eq!(c.points_multiplier_bps, 12_500);

        let c = repo.adjust_points(customer.id, &adjust(400)).await.unwrap();
        assert_eq!(c.loyalty_tier.as_deref(), Some("Gold"));

        let c = repo.adjust_points(customer.id, &adjust(-500)).await.unwrap();
        assert_eq!(c.loyalty_points, 50);
        assert_eq!(c.loyalty_tier.as_deref(), Some("Bronze"));
        assert_eq!(c.total_orders, 0);
    }

    #[tokio::test]
    async fn test_adjust_below_zero_rejected() {
        let db = setup().await;
        let repo = db.customers();
        let customer = repo.create(&new_customer("Cy", None)).await.unwrap();
        repo.adjust_points(customer.id, &adjust(10)).await.unwrap();

        let err = repo.adjust_points(customer.id, &adjust(-11)).await.unwrap_err();
        assert!(matches!(
            err,
            RepoError::Rejected(CoreError::NegativePointBalance { balance: 10, .. })
        ));

        let c = repo.get_by_id(customer.id).await.unwrap().unwrap();
        assert_eq!(c.loyalty_points, 10);
    }

    #[tokio::test]
    async fn test_oversized_delta_is_a_field_error() {
        let db = setup().await;
        let repo = db.customers();
        let customer = repo.create(&new_customer("Dee", None)).await.unwrap();
        repo.adjust_points(customer.id, &adjust(10)).await.unwrap();

        for delta in [i64::MAX, i64::MIN, MAX_POINTS_ADJUSTMENT + 1] {
            let err = repo.adjust_points(customer.id, &adjust(delta)).await.unwrap_err();
            match err {
                RepoError::Rejected(CoreError::Validation(e)) => assert_eq!(e.field(), "delta"),
                other => panic!("expected a delta rejection, got {:?}", other),
            }
        }

        let c = repo.get_by_id(customer.id).await.unwrap().unwrap();
        assert_eq!(c.loyalty_points, 10);
    }

    #[tokio::test]
    async fn test_balance_ceiling() {
        let db = setup().await;
        let repo = db.customers();
        let customer = repo.create(&new_customer("Eli", None)).await.unwrap();
        sqlx::query("UPDATE customers SET loyalty_points = ?2 WHERE id = ?1")
            .bind(customer.id)
            .bind(MAX_POINT_BALANCE - 5)
            .execute(db.pool())
            .await
            .unwrap();

        let err = repo.adjust_points(customer.id, &adjust(6)).await.unwrap_err();
        assert!(matches!(
            err,
            RepoError::Rejected(CoreError::Validation(ValidationError::OutOfRange { max: 5, .. }))
        ));

        let c = repo.adjust_points(customer.id, &adjust(5)).await.unwrap();
        assert_eq!(c.loyalty_points, MAX_POINT_BALANCE);
    }

    #[tokio::test]
    async fn test_adjust_unknown_customer() {
        let db = setup().await;
        let err = db.customers().adjust_points(404, &adjust(5)).await.unwrap_err();
        assert!(matches!(err, RepoError::Rejected(CoreError::CustomerNotFound(404))));
    }

    #[tokio::test]
    async fn test_list_orders_by_name() {
        let db = setup().await;
        let repo = db.customers();
        repo.create(&new_customer("zoe", None)).await.unwrap();
        repo.create(&new_customer("Adam", None)).await.unwrap();

        let names: Vec<String> = repo.list(10).await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Adam", "zoe"]);
    }
}
