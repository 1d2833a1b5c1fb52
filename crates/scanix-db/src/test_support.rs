//! Shared fixtures for the crate's tests.

use std::path::PathBuf;

use scanix_core::{Deposit, LedgerChange, Money, MovementKind, Product, Tier};
use uuid::Uuid;

use crate::pool::{Database, DbConfig};
use crate::repository::stock::MovementRequest;

/// A seeded database.
///
/// - `product`: SKU `P`, base $100, tiers 1-5 $100 / 6-12 $93 / 13+ $85
/// - `other`: SKU `AZ-1`, base $12.50, no tiers
/// - deposits `D1`, `D2` (active) and `D3` (inactive)
pub struct Fixture {
    pub db: Database,
    pub product: Product,
    pub other: Product,
    path: Option<PathBuf>,
}

impl Fixture {
    /// Puts `qty` units of a product into a deposit through the ledger.
    pub async fn stock(&self, product_id: &str, deposit_id: &str, qty: i64) {
        self.db
            .ledger()
            .record_movement(movement(
                product_id,
                deposit_id,
                MovementKind::Inbound,
                LedgerChange::Delta(qty),
            ))
            .await
            .unwrap();
    }

    pub async fn quantity(&self, product_id: &str, deposit_id: &str) -> i64 {
        self.db
            .ledger()
            .current_quantity(product_id, deposit_id)
            .await
            .unwrap()
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(self.db.pool())
            .await
            .unwrap()
    }

    /// Makes every later movement insert for `product_id` fail with a
    /// storage error.
    pub async fn fail_movements_of(&self, product_id: &str) {
        sqlx::query(&format!(
            "CREATE TRIGGER fail_movements BEFORE INSERT ON stock_movements \
             WHEN NEW.product_id = '{}' \
             BEGIN SELECT RAISE(ABORT, 'movement write failed'); END",
            product_id
        ))
        .execute(self.db.pool())
        .await
        .unwrap();
    }

    /// Closes the pool and removes a file-backed database.
    pub async fn cleanup(self) {
        self.db.close().await;
        if let Some(path) = self.path {
            for suffix in ["", "-wal", "-shm"] {
                let mut file = path.clone().into_os_string();
                file.push(suffix);
                let _ = std::fs::remove_file(file);
            }
        }
    }
}

pub fn tier(min_qty: i64, max_qty: Option<i64>, cents: i64) -> Tier {
    Tier::new(min_qty, max_qty, Money::from_cents(cents))
}

pub fn movement(
    product_id: &str,
    deposit_id: &str,
    kind: MovementKind,
    change: LedgerChange,
) -> MovementRequest {
    MovementRequest {
        deposit_id: deposit_id.to_string(),
        product_id: product_id.to_string(),
        kind,
        change,
        reason: "test".to_string(),
        reference: None,
        actor: None,
    }
}

/// In-memory database (single connection).
pub async fn fixture() -> Fixture {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    seed(db, None).await
}

/// File-backed database with several pooled connections.
pub async fn file_fixture() -> Fixture {
    let path = std::env::temp_dir().join(format!("scanix-test-{}.db", Uuid::new_v4()));
    let config = DbConfig::new(path.clone())
        .max_connections(5)
        .busy_timeout(std::time::Duration::from_secs(10));
    let db = Database::new(config).await.unwrap();
    seed(db, Some(path)).await
}

async fn seed(db: Database, path: Option<PathBuf>) -> Fixture {
    let product = Product {
        id: "p-yerba".to_string(),
        sku: "P".to_string(),
        name: "Yerba 1kg".to_string(),
        base_price: Money::from_cents(10_000),
        tiers: vec![
            tier(1, Some(5), 10_000),
            tier(6, Some(12), 9_300),
            tier(13, None, 8_500),
        ],
    };
    let other = Product {
        id: "p-azucar".to_string(),
        sku: "AZ-1".to_string(),
        name: "Azucar 1kg".to_string(),
        base_price: Money::from_cents(1_250),
        tiers: Vec::new(),
    };

    let catalog = db.catalog();
    catalog.insert_product(&product).await.unwrap();
    catalog.insert_product(&other).await.unwrap();

    for (id, name, active) in [
        ("D1", "Central", true),
        ("D2", "Sucursal Norte", true),
        ("D3", "Deposito Cerrado", false),
    ] {
        catalog
            .insert_deposit(&Deposit {
                id: id.to_string(),
                name: name.to_string(),
                address: None,
                active,
            })
            .await
            .unwrap();
    }

    Fixture {
        db,
        product,
        other,
        path,
    }
}
