//! # Loyalty Tier Repository
//!
//! Tier administration and the one code path that keeps every customer's
//! cached tier in step with their points.
//!
//! ## Tier Cache Sync
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Anything that changes points          Anything that changes tiers      │
//! │  (settle, register, adjust)            (create, update, deactivate)     │
//! │           │                                       │                     │
//! │           ▼                                       ▼                     │
//! │  sync_customer_tier(tx, id)           resync_all_customers(tx)          │
//! │           │                                       │                     │
//! │           └──────────────┬────────────────────────┘                     │
//! │                          ▼                                              │
//! │        resolve_tier(points, active tiers)   ← tally-core               │
//! │                          │                                              │
//! │                          ▼                                              │
//! │        write_assignment(tx, id, assignment)                            │
//! │                                                                         │
//! │  Always on the caller's transaction, so a reader never sees points     │
//! │  and tier that disagree.                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult, RepoResult};
use tally_core::loyalty::{resolve_tier, TierAssignment};
use tally_core::validation::{validate_new_tier, validate_tier_update};
use tally_core::{LoyaltyTier, LoyaltyTierUpdate, NewLoyaltyTier};

/// Repository for loyalty tier database operations.
#[derive(Debug, Clone)]
pub struct LoyaltyTierRepository {
    pool: SqlitePool,
}

impl LoyaltyTierRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LoyaltyTierRepository { pool }
    }

    /// Active tiers, lowest threshold first.
    pub async fn list_active(&self) -> DbResult<Vec<LoyaltyTier>> {
        let mut conn = self.pool.acquire().await?;
        active_tiers(&mut conn).await
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<LoyaltyTier>> {
        let tier = sqlx::query_as::<_, LoyaltyTier>("SELECT * FROM loyalty_tiers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tier)
    }

    /// Creates a tier and re-syncs every customer in the same transaction.
    pub async fn create(&self, input: &NewLoyaltyTier) -> RepoResult<LoyaltyTier> {
        validate_new_tier(input)?;
        debug!(name = %input.name, min_points = input.min_points, "Creating loyalty tier");

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let tier = sqlx::query_as::<_, LoyaltyTier>(
            r#"
            INSERT INTO loyalty_tiers (name, min_points, points_multiplier_bps, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, 1, ?4, ?4)
            RETURNING *
            "#,
        )
        .bind(input.name.trim())
        .bind(input.min_points)
        .bind(input.points_multiplier_bps)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        resync_all_customers(&mut tx).await?;
        tx.commit().await?;

        Ok(tier)
    }

    /// Applies a partial update and re-syncs every customer.
    pub async fn update(&self, id: i64, input: &LoyaltyTierUpdate) -> RepoResult<LoyaltyTier> {
        validate_tier_update(input)?;
        debug!(id, "Updating loyalty tier");

        let mut tx = self.pool.begin().await?;

        let tier = sqlx::query_as::<_, LoyaltyTier>(
            r#"
            UPDATE loyalty_tiers
            SET name = COALESCE(?2, name),
                min_points = COALESCE(?3, min_points),
                points_multiplier_bps = COALESCE(?4, points_multiplier_bps),
                updated_at = ?5
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.min_points)
        .bind(input.points_multiplier_bps)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("LoyaltyTier", id))?;

        resync_all_customers(&mut tx).await?;
        tx.commit().await?;

        Ok(tier)
    }

    /// Soft-deletes a tier; customers holding it fall to the next one down.
    pub async fn deactivate(&self, id: i64) -> DbResult<()> {
        debug!(id, "Deactivating loyalty tier");

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE loyalty_tiers SET is_active = 0, updated_at = ?2 WHERE id = ?1 AND is_active = 1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("LoyaltyTier", id));
        }

        resync_all_customers(&mut tx).await?;
        tx.commit().await?;

        Ok(())
    }
}

// =============================================================================
// Tier Cache Sync
// =============================================================================

pub(crate) async fn active_tiers(conn: &mut SqliteConnection) -> DbResult<Vec<LoyaltyTier>> {
    let tiers = sqlx::query_as::<_, LoyaltyTier>(
        "SELECT * FROM loyalty_tiers WHERE is_active = 1 ORDER BY min_points",
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(tiers)
}

async fn write_assignment(
    conn: &mut SqliteConnection,
    customer_id: i64,
    assignment: &TierAssignment,
) -> DbResult<()> {
    sqlx::query(
        "UPDATE customers SET loyalty_tier = ?2, points_multiplier_bps = ?3 WHERE id = ?1",
    )
    .bind(customer_id)
    .bind(assignment.tier.as_deref())
    .bind(assignment.multiplier.bps() as i64)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Re-resolves one customer's tier from the points balance as seen by
/// `conn` and writes it back. Call on the transaction that changed points.
pub(crate) async fn sync_customer_tier(
    conn: &mut SqliteConnection,
    customer_id: i64,
) -> DbResult<TierAssignment> {
    let points: i64 = sqlx::query_scalar("SELECT loyalty_points FROM customers WHERE id = ?1")
        .bind(customer_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Customer", customer_id))?;

    let tiers = active_tiers(conn).await?;
    let assignment = resolve_tier(points, &tiers);

    write_assignment(conn, customer_id, &assignment).await?;
    debug!(customer_id, points, tier = ?assignment.tier, "Customer tier synced");

    Ok(assignment)
}

/// Re-resolves every customer after the tier table changed.
pub(crate) async fn resync_all_customers(conn: &mut SqliteConnection) -> DbResult<u64> {
    let tiers = active_tiers(conn).await?;

    let rows: Vec<(i64, i64, Option<String>, i64)> = sqlx::query_as(
        "SELECT id, loyalty_points, loyalty_tier, points_multiplier_bps FROM customers",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut changed = 0;
    for (id, points, cached_tier, cached_bps) in rows {
        let assignment = resolve_tier(points, &tiers);
        if assignment.tier == cached_tier && assignment.multiplier.bps() as i64 == cached_bps {
            continue;
        }
        write_assignment(conn, id, &assignment).await?;
        changed += 1;
    }

    debug!(changed, "Customer tiers re-synced");
    Ok(changed)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::error::{DbError, RepoError};
    use crate::{Database, DbConfig};
    use tally_core::{LoyaltyTierUpdate, NewCustomer, NewLoyaltyTier};

    fn tier(name: &str, min_points: i64, bps: i64) -> NewLoyaltyTier {
        NewLoyaltyTier {
            name: name.to_string(),
            min_points,
            points_multiplier_bps: bps,
        }
    }

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_list_active_is_ordered_by_threshold() {
        let db = setup().await;
        let repo = db.loyalty_tiers();
        repo.create(&tier("Gold", 500, 15_000)).await.unwrap();
        repo.create(&tier("Bronze", 0, 10_000)).await.unwrap();
        repo.create(&tier("Silver", 100, 12_500)).await.unwrap();

        let names: Vec<String> = repo
            .list_active()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["Bronze", "Silver", "Gold"]);
    }

    #[tokio::test]
    async fn test_duplicate_active_threshold_rejected() {
        let db = setup().await;
        let repo = db.loyalty_tiers();
        repo.create(&tier("Silver", 100, 12_500)).await.unwrap();

        let err = repo.create(&tier("Silver Plus", 100, 13_000)).await.unwrap_err();
        assert!(matches!(
            err,
            RepoError::Storage(DbError::UniqueViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_tier_rejected_before_storage() {
        let db = setup().await;
        let err = db
            .loyalty_tiers()
            .create(&tier("Broken", 0, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_tier_changes_resync_customers() {
        let db = setup().await;
        let tiers = db.loyalty_tiers();
        let customers = db.customers();

        let customer = customers
            .create(&NewCustomer {
                name: "Ana".to_string(),
                email: None,
                phone: None,
            })
            .await
            .unwrap();
        assert_eq!(customer.loyalty_tier, None);
        assert_eq!(customer.points_multiplier_bps, 10_000);

        // A zero-threshold tier applies to everyone immediately.
        let bronze = tiers.create(&tier("Bronze", 0, 11_000)).await.unwrap();
        let c = customers.get_by_id(customer.id).await.unwrap().unwrap();
        assert_eq!(c.loyalty_tier.as_deref(), Some("Bronze"));
        assert_eq!(c.points_multiplier_bps, 11_000);

        tiers
            .update(
                bronze.id,
                &LoyaltyTierUpdate {
                    points_multiplier_bps: Some(10_500),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let c = customers.get_by_id(customer.id).await.unwrap().unwrap();
        assert_eq!(c.points_multiplier_bps, 10_500);

        tiers.deactivate(bronze.id).await.unwrap();
        let c = customers.get_by_id(customer.id).await.unwrap().unwrap();
        assert_eq!(c.loyalty_tier, None);
        assert_eq!(c.points_multiplier_bps, 10_000);
        assert!(tiers.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_tier() {
        let db = setup().await;
        let err = db
            .loyalty_tiers()
            .update(
                99,
                &LoyaltyTierUpdate {
                    name: Some("Ghost".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Storage(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_deactivated_threshold_can_be_reused() {
        let db = setup().await;
        let repo = db.loyalty_tiers();
        let old = repo.create(&tier("Silver", 100, 12_500)).await.unwrap();
        repo.deactivate(old.id).await.unwrap();
        assert!(repo.create(&tier("Silver II", 100, 13_000)).await.is_ok());
    }
}
