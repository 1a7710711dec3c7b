//! # Sale Repository
//!
//! The settlement transaction and sale history reads.
//!
//! ## Settlement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       settle(request, policy)                           │
//! │                                                                         │
//! │  OUTSIDE the transaction (reads only)                                  │
//! │     validate_request ─► load products ─► load cashier ─► plan          │
//! │     Anything missing here is a Rejected error; nothing was written.    │
//! │                                                                         │
//! │  BEGIN                                                                 │
//! │  │ 1. customer? UPDATE customers                                       │
//! │  │       loyalty_points    += base × multiplier_bps / 10000            │
//! │  │       total_spent_cents += subtotal                                 │
//! │  │       total_orders      += 1                                        │
//! │  │       last_visit         = now                                      │
//! │  │    RETURNING multiplier    (no row → CustomerNotFound, ROLLBACK)    │
//! │  │ 2. INSERT sale (receipt YYYYMMDD-NNNNNN from the daily count)       │
//! │  │ 3. INSERT items in cart order                                       │
//! │  │ 4. customer? sync_customer_tier (resolver over the new balance)     │
//! │  COMMIT                                                                │
//! │                                                                         │
//! │  The first statement inside the transaction is a write, so SQLite      │
//! │  takes the write lock before anything is read. Point increments are    │
//! │  done by the database, never read-modify-write in Rust, so two sales   │
//! │  for one customer cannot lose an update.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::customer::fetch_customer;
use super::loyalty_tier::sync_customer_tier;
use super::product::fetch_by_ids;
use super::user::fetch_cashier;
use crate::error::{DbError, DbResult, SettleError};
use tally_core::money::{Multiplier, BPS_SCALE};
use tally_core::settlement::{plan_settlement, validate_request, SettlementPlan, SettlementPolicy};
use tally_core::{CoreError, Sale, SaleItem, SaleWithRelations, SettleRequest};

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Settles a cart atomically.
    ///
    /// On success the sale, its items and the customer's updated aggregates
    /// and tier are all committed. On any error none of them are.
    pub async fn settle(
        &self,
        request: &SettleRequest,
        policy: &SettlementPolicy,
    ) -> Result<SaleWithRelations, SettleError> {
        validate_request(request)?;

        let mut product_ids: Vec<i64> = request.items.iter().map(|l| l.product_id).collect();
        product_ids.sort_unstable();
        product_ids.dedup();

        let (products, cashier) = {
            let mut conn = self.pool.acquire().await?;
            let products = fetch_by_ids(&mut conn, &product_ids).await?;
            let cashier = fetch_cashier(&mut conn, request.cashier_id).await?;
            (products, cashier)
        };
        let cashier = cashier.ok_or(CoreError::CashierNotFound(request.cashier_id))?;
        let plan = plan_settlement(request, &products, policy)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let points_earned = match request.customer_id {
            Some(customer_id) => accrue(&mut tx, customer_id, &plan, now).await?,
            None => 0,
        };

        let sale = insert_sale(&mut tx, request, &plan, points_earned, now).await?;
        let items = insert_items(&mut tx, sale.id, &plan).await?;

        let customer = match request.customer_id {
            Some(customer_id) => {
                sync_customer_tier(&mut tx, customer_id).await?;
                fetch_customer(&mut tx, customer_id).await?
            }
            None => None,
        };

        tx.commit().await?;

        info!(
            sale_id = sale.id,
            receipt = %sale.receipt_number,
            total_cents = sale.total_cents,
            customer_id = ?sale.customer_id,
            points_earned,
            "Sale settled"
        );

        Ok(SaleWithRelations {
            sale,
            items,
            customer,
            cashier,
        })
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(sale)
    }

    /// The sale with its items, current customer record and cashier.
    pub async fn get_with_relations(&self, id: i64) -> DbResult<Option<SaleWithRelations>> {
        let mut conn = self.pool.acquire().await?;

        let Some(sale) = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
        else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, SaleItem>(
            "SELECT * FROM sale_items WHERE sale_id = ?1 ORDER BY line_no",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        let customer = match sale.customer_id {
            Some(customer_id) => fetch_customer(&mut conn, customer_id).await?,
            None => None,
        };

        // Inactive cashiers still own their past sales.
        let cashier = sqlx::query_as::<_, tally_core::CashierSummary>(
            "SELECT id, username, display_name FROM users WHERE id = ?1",
        )
        .bind(sale.cashier_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(Some(SaleWithRelations {
            sale,
            items,
            customer,
            cashier,
        }))
    }

    /// Most recent sales first.
    pub async fn list_recent(&self, limit: i64) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>("SELECT * FROM sales ORDER BY id DESC LIMIT ?1")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(sales)
    }

    /// A customer's purchase history, most recent first.
    pub async fn list_for_customer(&self, customer_id: i64, limit: i64) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(
            "SELECT * FROM sales WHERE customer_id = ?1 ORDER BY id DESC LIMIT ?2",
        )
        .bind(customer_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(sales)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Transaction Steps
// =============================================================================

/// Atomically adds this sale to the customer's aggregates and returns the
/// points earned at the multiplier the customer held before the sale.
async fn accrue(
    conn: &mut SqliteConnection,
    customer_id: i64,
    plan: &SettlementPlan,
    now: DateTime<Utc>,
) -> Result<i64, SettleError> {
    let base_points = plan.points_earned(Multiplier::ONE);

    // The multiplier column is not touched by this statement, so RETURNING
    // yields the value the increment was computed with.
    let multiplier_bps: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE customers
        SET loyalty_points = loyalty_points + (?2 * points_multiplier_bps / ?3),
            total_spent_cents = total_spent_cents + ?4,
            total_orders = total_orders + 1,
            last_visit = ?5,
            updated_at = ?5
        WHERE id = ?1
        RETURNING points_multiplier_bps
        "#,
    )
    .bind(customer_id)
    .bind(base_points)
    .bind(BPS_SCALE as i64)
    .bind(plan.subtotal.cents())
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;

    let multiplier_bps = multiplier_bps.ok_or(CoreError::CustomerNotFound(customer_id))?;
    let multiplier = u32::try_from(multiplier_bps)
        .map(Multiplier::from_bps)
        .unwrap_or(Multiplier::ONE);
    let earned = plan.points_earned(multiplier);

    debug!(customer_id, base_points, multiplier_bps, earned, "Points accrued");
    Ok(earned)
}

async fn insert_sale(
    conn: &mut SqliteConnection,
    request: &SettleRequest,
    plan: &SettlementPlan,
    points_earned: i64,
    now: DateTime<Utc>,
) -> DbResult<Sale> {
    let day = now.format("%Y%m%d").to_string();

    let sale = sqlx::query_as::<_, Sale>(
        r#"
        INSERT INTO sales (
            receipt_number, cashier_id, customer_id, payment_type,
            subtotal_cents, tax_rate_bps, tax_cents, total_cents,
            points_earned, created_at
        ) VALUES (
            ?1 || '-' || printf('%06d',
                (SELECT COUNT(*) FROM sales WHERE substr(receipt_number, 1, 8) = ?1) + 1),
            ?2, ?3, ?4,
            ?5, ?6, ?7, ?8,
            ?9, ?10
        )
        RETURNING *
        "#,
    )
    .bind(&day)
    .bind(request.cashier_id)
    .bind(request.customer_id)
    .bind(plan.payment_type)
    .bind(plan.subtotal.cents())
    .bind(plan.tax_rate.bps() as i64)
    .bind(plan.tax.cents())
    .bind(plan.total.cents())
    .bind(points_earned)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    debug!(sale_id = sale.id, receipt = %sale.receipt_number, "Sale inserted");
    Ok(sale)
}

async fn insert_items(
    conn: &mut SqliteConnection,
    sale_id: i64,
    plan: &SettlementPlan,
) -> DbResult<Vec<SaleItem>> {
    let mut items = Vec::with_capacity(plan.lines.len());

    for line in &plan.lines {
        let item = sqlx::query_as::<_, SaleItem>(
            r#"
            INSERT INTO sale_items (
                sale_id, line_no, product_id, name_snapshot,
                quantity, unit_price_cents, total_price_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            RETURNING *
            "#,
        )
        .bind(sale_id)
        .bind(line.line_no)
        .bind(line.product_id)
        .bind(&line.name_snapshot)
        .bind(line.quantity)
        .bind(line.unit_price.cents())
        .bind(line.total_price.cents())
        .fetch_one(&mut *conn)
        .await?;
        items.push(item);
    }

    if items.is_empty() {
        return Err(DbError::Internal("sale without items".to_string()));
    }

    Ok(items)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RepoError;
    use crate::{Database, DbConfig};
    use tally_core::loyalty::resolve_tier;
    use tally_core::money::{Money, TaxRate};
    use tally_core::{
        Customer, NewCustomer, NewLoyaltyTier, NewProduct, NewUser, PaymentType, PointsAdjustment,
        Product, SettleLine, User, UserRole,
    };

    struct Fixture {
        db: Database,
        cashier: User,
        customer: Customer,
        widget: Product,
        lunch: Product,
    }

    async fn setup() -> Fixture {
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

        let cashier = db
            .users()
            .create(&NewUser {
                username: "till1".to_string(),
                display_name: "Till One".to_string(),
                role: UserRole::Cashier,
                permission_template_id: None,
            })
            .await
            .unwrap();

        let customer = db
            .customers()
            .create(&NewCustomer {
                name: "Ana".to_string(),
                email: None,
                phone: None,
            })
            .await
            .unwrap();

        let widget = db
            .products()
            .create(&NewProduct {
                sku: "WIDGET".to_string(),
                name: "Widget".to_string(),
                price_cents: 2500,
            })
            .await
            .unwrap();

        let lunch = db
            .products()
            .create(&NewProduct {
                sku: "LUNCH".to_string(),
                name: "Lunch Special".to_string(),
                price_cents: 2350,
            })
            .await
            .unwrap();

        Fixture {
            db,
            cashier,
            customer,
            widget,
            lunch,
        }
    }

    fn request(f: &Fixture, customer: bool, items: Vec<(i64, i64)>) -> SettleRequest {
        SettleRequest {
            customer_id: customer.then_some(f.customer.id),
            cashier_id: f.cashier.id,
            payment_type: "cash".to_string(),
            items: items
                .into_iter()
                .map(|(product_id, quantity)| SettleLine {
                    product_id,
                    quantity,
                    unit_price: None,
                })
                .collect(),
        }
    }

    async fn count(db: &Database, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_settle_hundred_dollars_at_ten_percent() {
        let f = setup().await;
        let sale = f
            .db
            .sales()
            .settle(&request(&f, true, vec![(f.widget.id, 4)]), &SettlementPolicy::default())
            .await
            .unwrap();

        assert_eq!(sale.sale.subtotal_cents, 10_000);
        assert_eq!(sale.sale.tax_cents, 1_000);
        assert_eq!(sale.sale.total_cents, 11_000);
        assert_eq!(sale.sale.payment_type, PaymentType::Cash);
        assert_eq!(sale.items.len(), 1);
        assert_eq!(sale.items[0].total_price_cents, 10_000);
        assert_eq!(sale.cashier.display_name, "Till One");

        // $100 at 1.0x = 10 points; 10 < 100 keeps Bronze
        let customer = sale.customer.unwrap();
        assert_eq!(sale.sale.points_earned, 10);
        assert_eq!(customer.loyalty_points, 10);
        assert_eq!(customer.total_spent_cents, 10_000);
        assert_eq!(customer.total_orders, 1);
        assert!(customer.last_visit.is_some());
        assert_eq!(customer.loyalty_tier.as_deref(), Some("Bronze"));
    }

    #[tokio::test]
    async fn test_accrual_uses_multiplier_held_before_sale() {
        let f = setup().await;
        f.db.customers()
            .adjust_points(
                f.customer.id,
                &PointsAdjustment {
                    delta: 100,
                    reason: None,
                },
            )
            .await
            .unwrap();

        // $23.50 at Silver 1.25x → floor(floor(2.35) × 1.25) = 2
        let sale = f
            .db
            .sales()
            .settle(&request(&f, true, vec![(f.lunch.id, 1)]), &SettlementPolicy::default())
            .await
            .unwrap();

        assert_eq!(sale.sale.points_earned, 2);
        assert_eq!(sale.customer.unwrap().loyalty_points, 102);
    }

    #[tokio::test]
    async fn test_crossing_threshold_promotes_for_next_sale() {
        let f = setup().await;
        let policy = SettlementPolicy::default();

        // 40 × $25 = $1000 → 100 points at 1.0x, lands exactly on Silver
        let sale = f
            .db
            .sales()
            .settle(&request(&f, true, vec![(f.widget.id, 40)]), &policy)
            .await
            .unwrap();
        assert_eq!(sale.sale.points_earned, 100);
        let customer = sale.customer.unwrap();
        assert_eq!(customer.loyalty_tier.as_deref(), Some("Silver"));
        assert_eq!(customer.points_multiplier_bps, 12_500);

        // Next $100 earns 10 × 1.25 = 12
        let sale = f
            .db
            .sales()
            .settle(&request(&f, true, vec![(f.widget.id, 4)]), &policy)
            .await
            .unwrap();
        assert_eq!(sale.sale.points_earned, 12);
    }

    #[tokio::test]
    async fn test_cache_matches_resolver_after_settlement() {
        let f = setup().await;
        let policy = SettlementPolicy::default();
        for qty in [3, 17, 40, 200] {
            f.db.sales()
                .settle(&request(&f, true, vec![(f.widget.id, qty)]), &policy)
                .await
                .unwrap();

            let customer = f.db.customers().get_by_id(f.customer.id).await.unwrap().unwrap();
            let tiers = f.db.loyalty_tiers().list_active().await.unwrap();
            assert_eq!(
                customer.cached_assignment(),
                resolve_tier(customer.loyalty_points, &tiers)
            );
        }
    }

    #[tokio::test]
    async fn test_same_cart_twice_makes_two_sales() {
        let f = setup().await;
        let req = request(&f, false, vec![(f.widget.id, 2), (f.lunch.id, 1)]);
        let a = f.db.sales().settle(&req, &SettlementPolicy::default()).await.unwrap();
        let b = f.db.sales().settle(&req, &SettlementPolicy::default()).await.unwrap();

        assert_ne!(a.sale.id, b.sale.id);
        assert_ne!(a.sale.receipt_number, b.sale.receipt_number);
        assert_eq!(a.sale.total_cents, b.sale.total_cents);
        assert!(a.sale.receipt_number.ends_with("-000001"));
        assert!(b.sale.receipt_number.ends_with("-000002"));
        assert_eq!(a.sale.receipt_number.len(), "YYYYMMDD-NNNNNN".len());
    }

    #[tokio::test]
    async fn test_totals_invariants_and_item_order() {
        let f = setup().await;
        let sale = f
            .db
            .sales()
            .settle(
                &request(&f, false, vec![(f.lunch.id, 3), (f.widget.id, 1), (f.lunch.id, 1)]),
                &SettlementPolicy::default(),
            )
            .await
            .unwrap();

        let sum: i64 = sale.items.iter().map(|i| i.total_price_cents).sum();
        assert_eq!(sale.sale.subtotal_cents, sum);
        assert_eq!(sale.sale.total_cents, sale.sale.subtotal_cents + sale.sale.tax_cents);
        let order: Vec<i64> = sale.items.iter().map(|i| i.line_no).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(sale.items[1].name_snapshot, "Widget");
        assert!(sale.customer.is_none());
    }

    #[tokio::test]
    async fn test_price_override_and_snapshot() {
        let f = setup().await;
        let mut req = request(&f, false, vec![(f.widget.id, 2)]);
        req.items[0].unit_price = Some("20.00".parse().unwrap());

        let sale = f.db.sales().settle(&req, &SettlementPolicy::default()).await.unwrap();
        assert_eq!(sale.items[0].unit_price_cents, 2000);

        f.db.products().update_price(f.widget.id, 9999).await.unwrap();
        let reread = f.db.sales().get_with_relations(sale.sale.id).await.unwrap().unwrap();
        assert_eq!(reread.items[0].unit_price_cents, 2000);
        assert_eq!(reread.sale, sale.sale);
    }

    #[tokio::test]
    async fn test_policy_is_applied() {
        let f = setup().await;
        let policy = SettlementPolicy {
            tax_rate: TaxRate::from_bps(825),
            points_unit: Money::from_cents(500),
        };
        let sale = f
            .db
            .sales()
            .settle(&request(&f, true, vec![(f.widget.id, 4)]), &policy)
            .await
            .unwrap();

        assert_eq!(sale.sale.tax_rate_bps, 825);
        assert_eq!(sale.sale.tax_cents, 825);
        assert_eq!(sale.sale.points_earned, 20);
    }

    #[tokio::test]
    async fn test_rejections_write_nothing() {
        let f = setup().await;
        let policy = SettlementPolicy::default();
        let sales = f.db.sales();

        let err = sales.settle(&request(&f, true, vec![]), &policy).await.unwrap_err();
        assert!(matches!(err, RepoError::Rejected(CoreError::EmptyCart)));

        let err = sales
            .settle(&request(&f, true, vec![(9_999, 1)]), &policy)
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Rejected(CoreError::ProductNotFound(9_999))));

        f.db.products().deactivate(f.lunch.id).await.unwrap();
        let err = sales
            .settle(&request(&f, true, vec![(f.lunch.id, 1)]), &policy)
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Rejected(CoreError::ProductNotFound(_))));

        let mut req = request(&f, true, vec![(f.widget.id, 1)]);
        req.cashier_id = 777;
        let err = sales.settle(&req, &policy).await.unwrap_err();
        assert!(matches!(err, RepoError::Rejected(CoreError::CashierNotFound(777))));

        let mut req = request(&f, true, vec![(f.widget.id, 1)]);
        req.customer_id = Some(888);
        let err = sales.settle(&req, &policy).await.unwrap_err();
        assert!(matches!(err, RepoError::Rejected(CoreError::CustomerNotFound(888))));

        let mut req = request(&f, true, vec![(f.widget.id, 1)]);
        req.payment_type = "iou".to_string();
        let err = sales.settle(&req, &policy).await.unwrap_err();
        assert!(matches!(err, RepoError::Rejected(CoreError::Validation(_))));

        assert_eq!(count(&f.db, "sales").await, 0);
        assert_eq!(count(&f.db, "sale_items").await, 0);
        let customer = f.db.customers().get_by_id(f.customer.id).await.unwrap().unwrap();
        assert_eq!(customer.total_orders, 0);
    }

    #[tokio::test]
    async fn test_storage_failure_rolls_back_everything() {
        let f = setup().await;

        // Fail the tier-cache write that happens after the sale and items
        // are inserted.
        sqlx::query(
            r#"
            CREATE TRIGGER fail_tier_sync BEFORE UPDATE OF loyalty_tier ON customers
            BEGIN
                SELECT RAISE(ABORT, 'tier sync failed');
            END
            "#,
        )
        .execute(f.db.pool())
        .await
        .unwrap();

        let err = f
            .db
            .sales()
            .settle(&request(&f, true, vec![(f.widget.id, 4)]), &SettlementPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Storage(_)));

        assert_eq!(count(&f.db, "sales").await, 0);
        assert_eq!(count(&f.db, "sale_items").await, 0);
        let customer = f.db.customers().get_by_id(f.customer.id).await.unwrap().unwrap();
        assert_eq!(customer.loyalty_points, 0);
        assert_eq!(customer.total_spent_cents, 0);
        assert_eq!(customer.total_orders, 0);
    }

    #[tokio::test]
    async fn test_history_reads() {
        let f = setup().await;
        let policy = SettlementPolicy::default();
        let first = f
            .db
            .sales()
            .settle(&request(&f, true, vec![(f.widget.id, 1)]), &policy)
            .await
            .unwrap();
        let second = f
            .db
            .sales()
            .settle(&request(&f, false, vec![(f.lunch.id, 1)]), &policy)
            .await
            .unwrap();

        let recent = f.db.sales().list_recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, second.sale.id);

        let history = f.db.sales().list_for_customer(f.customer.id, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, first.sale.id);

        assert!(f.db.sales().get_with_relations(12345).await.unwrap().is_none());
        assert_eq!(f.db.sales().count().await.unwrap(), 2);
    }
}
