//! # Catalog Repository
//!
//! Read access to products, their price tiers and deposits, plus the few
//! writes the ledger needs to exist at all (seeding and tier edits).
//!
//! ## Product Loading
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  product_by_id("p-1")                                                   │
//! │       │                                                                 │
//! │       ├──► SELECT … FROM products     WHERE id = ?                     │
//! │       │                                                                 │
//! │       └──► SELECT … FROM price_tiers  WHERE product_id = ?             │
//! │                                       ORDER BY position                │
//! │                                                                         │
//! │  Always two fresh queries. Nothing here is cached: an admin may edit   │
//! │  tiers between two cart mutations and the next read must see it.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `*_in` functions take a connection so orchestrators can read the
//! catalog inside their own write transaction.

use chrono::Utc;
use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use scanix_core::pricing::diagnose_tiers;
use scanix_core::validation::{validate_name, validate_price, validate_sku};
use scanix_core::{Deposit, Money, Product, Tier, TierReport, ValidationError};

use crate::error::{DbResult, StockError, StockResult};

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    sku: String,
    name: String,
    base_price_cents: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct TierRow {
    min_qty: i64,
    max_qty: Option<i64>,
    unit_price_cents: i64,
}

impl From<TierRow> for Tier {
    fn from(row: TierRow) -> Self {
        Tier::new(row.min_qty, row.max_qty, Money::from_cents(row.unit_price_cents))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DepositRow {
    id: String,
    name: String,
    address: Option<String>,
    active: bool,
}

impl From<DepositRow> for Deposit {
    fn from(row: DepositRow) -> Self {
        Deposit {
            id: row.id,
            name: row.name,
            address: row.address,
            active: row.active,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog reads and tier edits.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Gets a product with its tiers by ID.
    pub async fn product_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        product_by_id_in(&mut conn, id).await
    }

    /// Gets a product with its tiers by SKU.
    pub async fn product_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, sku, name, base_price_cents FROM products WHERE sku = ?1",
        )
        .bind(sku.trim())
        .fetch_optional(&mut *conn)
        .await?;

        with_tiers(&mut conn, row).await
    }

    /// Gets a product by exact name, ignoring ASCII case.
    pub async fn product_by_name(&self, name: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, sku, name, base_price_cents
            FROM products
            WHERE name = ?1 COLLATE NOCASE
            ORDER BY sku
            LIMIT 1
            "#,
        )
        .bind(name.trim())
        .fetch_optional(&mut *conn)
        .await?;

        with_tiers(&mut conn, row).await
    }

    /// Lists all products ordered by SKU.
    pub async fn list_products(&self) -> DbResult<Vec<Product>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT id, sku, name, base_price_cents FROM products ORDER BY sku",
        )
        .fetch_all(&mut *conn)
        .await?;

        let mut products = Vec::with_capacity(rows.len());
        for row in rows {
            let tiers = load_tiers(&mut conn, &row.id).await?;
            products.push(assemble(row, tiers));
        }

        Ok(products)
    }

    /// Gets a deposit by ID.
    pub async fn deposit_by_id(&self, id: &str) -> DbResult<Option<Deposit>> {
        let mut conn = self.pool.acquire().await?;
        deposit_by_id_in(&mut conn, id).await
    }

    /// Lists all deposits, active or not.
    pub async fn list_deposits(&self) -> DbResult<Vec<Deposit>> {
        let rows = sqlx::query_as::<_, DepositRow>(
            "SELECT id, name, address, active FROM deposits ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Deposit::from).collect())
    }

    /// Inserts a product together with its tiers.
    ///
    /// ## Returns
    /// * `Ok(TierReport)` - advisory warnings about the tier set
    /// * `Err(Validation)` - bad sku/name/price or malformed tiers
    /// * `Err(Persistence(UniqueViolation))` - SKU already exists
    pub async fn insert_product(&self, product: &Product) -> StockResult<TierReport> {
        validate_sku(&product.sku)?;
        validate_name("name", &product.name)?;
        validate_price(product.base_price)?;
        let report = check_tiers(&product.sku, &product.tiers)?;

        debug!(sku = %product.sku, tiers = product.tiers.len(), "Inserting product");

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, base_price_cents, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
        )
        .bind(&product.id)
        .bind(product.sku.trim())
        .bind(product.name.trim())
        .bind(product.base_price.cents())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        write_tiers(&mut tx, &product.id, &product.tiers).await?;
        tx.commit().await?;

        Ok(report)
    }

    /// Inserts a deposit.
    pub async fn insert_deposit(&self, deposit: &Deposit) -> StockResult<()> {
        validate_name("name", &deposit.name)?;

        debug!(id = %deposit.id, active = deposit.active, "Inserting deposit");

        sqlx::query(
            r#"
            INSERT INTO deposits (id, name, address, active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&deposit.id)
        .bind(deposit.name.trim())
        .bind(&deposit.address)
        .bind(deposit.active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Replaces the tier list of a product.
    ///
    /// ## Tier Edit Flow
    /// ```text
    /// replace_tiers(p, tiers)
    ///      │
    ///      ▼
    /// diagnose_tiers ──► errors?   → Err(Validation), nothing written
    ///      │
    ///      ├──► warnings? → warn! (overlap, gap, bounded last tier)
    ///      ▼
    /// DELETE old tiers + INSERT new ones (one transaction)
    ///      │
    ///      ▼
    /// Ok(TierReport) ← caller shows the warnings to the editor
    /// ```
    ///
    /// Carts priced earlier pick up the new tiers on their next mutation.
    pub async fn replace_tiers(&self, product_id: &str, tiers: &[Tier]) -> StockResult<TierReport> {
        let mut tx = self.pool.begin().await?;

        let sku: Option<String> = sqlx::query_scalar("SELECT sku FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?;
        let sku = sku.ok_or_else(|| StockError::not_found("Product", product_id))?;

        let report = check_tiers(&sku, tiers)?;

        sqlx::query("DELETE FROM price_tiers WHERE product_id = ?1")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        write_tiers(&mut tx, product_id, tiers).await?;

        sqlx::query("UPDATE products SET updated_at = ?2 WHERE id = ?1")
            .bind(product_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(sku = %sku, tiers = tiers.len(), warnings = report.warnings.len(), "Tiers replaced");
        Ok(report)
    }
}

// =============================================================================
// Connection-level Reads
// =============================================================================

/// Loads a product and its tiers on the given connection.
pub async fn product_by_id_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let row = sqlx::query_as::<_, ProductRow>(
        "SELECT id, sku, name, base_price_cents FROM products WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    with_tiers(conn, row).await
}

/// Loads a deposit on the given connection.
pub async fn deposit_by_id_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Deposit>> {
    let row = sqlx::query_as::<_, DepositRow>(
        "SELECT id, name, address, active FROM deposits WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Deposit::from))
}

async fn with_tiers(
    conn: &mut SqliteConnection,
    row: Option<ProductRow>,
) -> DbResult<Option<Product>> {
    match row {
        Some(row) => {
            let tiers = load_tiers(conn, &row.id).await?;
            Ok(Some(assemble(row, tiers)))
        }
        None => Ok(None),
    }
}

async fn load_tiers(conn: &mut SqliteConnection, product_id: &str) -> DbResult<Vec<Tier>> {
    let rows = sqlx::query_as::<_, TierRow>(
        r#"
        SELECT min_qty, max_qty, unit_price_cents
        FROM price_tiers
        WHERE product_id = ?1
        ORDER BY position
        "#,
    )
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(Tier::from).collect())
}

async fn write_tiers(conn: &mut SqliteConnection, product_id: &str, tiers: &[Tier]) -> DbResult<()> {
    for (position, tier) in tiers.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO price_tiers (product_id, position, min_qty, max_qty, unit_price_cents)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(product_id)
        .bind(position as i64)
        .bind(tier.min_qty)
        .bind(tier.max_qty)
        .bind(tier.unit_price.cents())
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

fn assemble(row: ProductRow, tiers: Vec<Tier>) -> Product {
    Product {
        id: row.id,
        sku: row.sku,
        name: row.name,
        base_price: Money::from_cents(row.base_price_cents),
        tiers,
    }
}

/// Malformed tiers are rejected; overlaps and gaps are only logged.
fn check_tiers(sku: &str, tiers: &[Tier]) -> StockResult<TierReport> {
    let report = diagnose_tiers(tiers);

    if !report.is_valid() {
        return Err(ValidationError::InvalidFormat {
            field: "tiers".to_string(),
            reason: format!("{:?}", report.errors),
        }
        .into());
    }

    for warning in &report.warnings {
        warn!(sku = %sku, ?warning, "Tier set diagnostic");
    }

    Ok(report)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture, tier};
    use scanix_core::TierDiagnostic;

    #[tokio::test]
    async fn test_product_round_trip_keeps_tier_order() {
        let fx = fixture().await;
        let catalog = fx.db.catalog();

        let by_id = catalog.product_by_id(&fx.product.id).await.unwrap().unwrap();
        assert_eq!(by_id, fx.product);

        let by_sku = catalog.product_by_sku("P").await.unwrap().unwrap();
        assert_eq!(by_sku.id, fx.product.id);

        let by_name = catalog.product_by_name("yerba 1KG").await.unwrap().unwrap();
        assert_eq!(by_name.id, fx.product.id);

        assert!(catalog.product_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deposits() {
        let fx = fixture().await;
        let catalog = fx.db.catalog();

        let d1 = catalog.deposit_by_id("D1").await.unwrap().unwrap();
        assert!(d1.active);
        assert_eq!(catalog.list_deposits().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_sku_is_unique_violation() {
        let fx = fixture().await;
        let mut copy = fx.product.clone();
        copy.id = "p-copy".to_string();

        let err = fx.db.catalog().insert_product(&copy).await.unwrap_err();
        assert!(matches!(
            err,
            StockError::Persistence(crate::DbError::UniqueViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_replace_tiers_reports_overlap_and_is_visible_immediately() {
        let fx = fixture().await;
        let catalog = fx.db.catalog();

        let report = catalog
            .replace_tiers(&fx.product.id, &[tier(1, Some(10), 5_000), tier(5, Some(20), 4_000)])
            .await
            .unwrap();
        assert!(report
            .warnings
            .contains(&TierDiagnostic::Overlap { first: 0, second: 1 }));

        let product = catalog.product_by_id(&fx.product.id).await.unwrap().unwrap();
        assert_eq!(product.unit_price_for(7).cents(), 5_000);
    }

    #[tokio::test]
    async fn test_replace_tiers_rejects_malformed_set() {
        let fx = fixture().await;
        let catalog = fx.db.catalog();

        let err = catalog
            .replace_tiers(&fx.product.id, &[tier(0, Some(5), 100)])
            .await
            .unwrap_err();
        assert!(err.is_validation());

        // previous tiers untouched
        let product = catalog.product_by_id(&fx.product.id).await.unwrap().unwrap();
        assert_eq!(product.tiers, fx.product.tiers);

        let err = catalog.replace_tiers("missing", &[]).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
