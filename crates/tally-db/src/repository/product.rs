//! # Product Repository
//!
//! Database operations for the catalogue.
//!
//! ## Key Operations
//! - Create, price update, soft delete
//! - Name/SKU search over active products
//! - Batch lookup used by settlement
//!
//! Deactivated products stay in the table so old sale items keep their
//! foreign key; they are invisible to search and cannot be sold.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult, RepoResult};
use tally_core::validation::{validate_new_product, validate_price_cents};
use tally_core::{NewProduct, Product};

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let results = repo.search("coke", 20).await?;
/// let product = repo.get_by_id(42).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Active products whose name or SKU contains `query`, by name.
    ///
    /// An empty query lists the catalogue.
    pub async fn search(&self, query: &str, limit: i64) -> DbResult<Vec<Product>> {
        let pattern = format!("%{}%", query.trim());
        debug!(query = %query, limit, "Searching products");

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE is_active = 1 AND (name LIKE ?1 OR sku LIKE ?1)
            ORDER BY name COLLATE NOCASE
            LIMIT ?2
            "#,
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Gets a product by ID, active or not.
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE sku = ?1")
            .bind(sku.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    pub async fn create(&self, input: &NewProduct) -> RepoResult<Product> {
        validate_new_product(input)?;
        debug!(sku = %input.sku, "Creating product");

        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (sku, name, price_cents, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, 1, ?4, ?4)
            RETURNING *
            "#,
        )
        .bind(input.sku.trim())
        .bind(input.name.trim())
        .bind(input.price_cents)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(product)
    }

    /// Changes the catalogue price. Past sale items keep their snapshot.
    pub async fn update_price(&self, id: i64, price_cents: i64) -> RepoResult<Product> {
        validate_price_cents(price_cents)?;
        debug!(id, price_cents, "Updating product price");

        let product = sqlx::query_as::<_, Product>(
            "UPDATE products SET price_cents = ?2, updated_at = ?3 WHERE id = ?1 RETURNING *",
        )
        .bind(id)
        .bind(price_cents)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Product", id))?;

        Ok(product)
    }

    /// Soft delete.
    pub async fn deactivate(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1 AND is_active = 1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        debug!(id, "Product deactivated");
        Ok(())
    }
}

/// Loads the given products in one query. Missing ids are simply absent.
pub(crate) async fn fetch_by_ids(conn: &mut SqliteConnection, ids: &[i64]) -> DbResult<Vec<Product>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM products WHERE id IN (");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    let products = builder
        .build_query_as::<Product>()
        .fetch_all(&mut *conn)
        .await?;

    Ok(products)
}

// =============================================================================
// Unit Tests
// =============================================================================
