//! # Transfer Orchestrator
//!
//! Moves stock between two deposits under a remito (shipping receipt).
//!
//! ## Transfer Flow
//! ```text
//! create_transfer(D1 → D2, [P × 5])
//!      │
//!      ├── D1 ≠ D2, items non-empty, qty ≥ 1
//!      ▼
//! WriteTx
//!      ├── both deposits exist and are active
//!      ├── every product exists
//!      ├── stock at D1 covers each product   ← ALL shortfalls reported
//!      ├── remito = R-{MAX(seq)+1}
//!      ├── INSERT transfer + lines
//!      └── per product:
//!            transferencia  −5 @ D1  "Transferencia R-000001 - Salida"
//!            transferencia  +5 @ D2  "Transferencia R-000001 - Entrada"
//!      ▼
//! COMMIT
//! ```
//! Both movements of a pair carry the transfer id as reference, and the
//! per-product total across deposits is unchanged.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use scanix_core::validation::{
    validate_deposit_active, validate_movement_quantity, validate_not_empty,
    validate_transfer_route,
};
use scanix_core::{
    CoreError, LedgerChange, MovementKind, Product, StockShortfall, Transfer, TransferLine,
    ValidationError,
};

use crate::error::{DbResult, StockError, StockResult};
use crate::pool::WriteGate;
use crate::repository::catalog::{deposit_by_id_in, product_by_id_in};
use crate::repository::stock::{quantity_in, record_movement_in, MovementRequest};
use crate::repository::transfer::{insert_transfer_in, next_remito_in, TransferRepository};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferItem {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub source_deposit_id: String,
    pub destination_deposit_id: String,
    pub items: Vec<TransferItem>,
    #[serde(default)]
    pub actor: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TransferService {
    pool: SqlitePool,
    gate: WriteGate,
}

impl TransferService {
    pub fn new(pool: SqlitePool, gate: WriteGate) -> Self {
        TransferService { pool, gate }
    }

    /// Creates a transfer and its paired movements atomically.
    ///
    /// ## Errors
    /// - `Validation` - same deposit, no items, qty < 1, inactive deposit
    /// - `NotFound` - unknown deposit or product
    /// - `StockShortfalls` - every item the source cannot cover
    pub async fn create_transfer(&self, request: TransferRequest) -> StockResult<Transfer> {
        validate_transfer_route(&request.source_deposit_id, &request.destination_deposit_id)?;
        validate_not_empty("items", &request.items)?;
        for item in &request.items {
            validate_movement_quantity(item.quantity)?;
        }

        let mut demand: Vec<(String, i64)> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        for item in &request.items {
            match index.get(item.product_id.as_str()) {
                Some(&i) => {
                    demand[i].1 = demand[i].1.checked_add(item.quantity).ok_or_else(|| {
                        ValidationError::OutOfRange {
                            field: "quantity".to_string(),
                            min: 1,
                            max: i64::MAX,
                        }
                    })?;
                }
                None => {
                    index.insert(item.product_id.as_str(), demand.len());
                    demand.push((item.product_id.clone(), item.quantity));
                }
            }
        }

        let mut tx = self.gate.begin(&self.pool).await?;

        for deposit_id in [&request.source_deposit_id, &request.destination_deposit_id] {
            let deposit = deposit_by_id_in(tx.conn(), deposit_id)
                .await?
                .ok_or_else(|| StockError::not_found("Deposit", deposit_id.as_str()))?;
            validate_deposit_active(&deposit)?;
        }

        let mut products: Vec<Product> = Vec::with_capacity(demand.len());
        for (product_id, _) in &demand {
            let product = product_by_id_in(tx.conn(), product_id)
                .await?
                .ok_or_else(|| StockError::not_found("Product", product_id.as_str()))?;
            products.push(product);
        }

        let mut shortfalls = Vec::new();
        for (product, (_, requested)) in products.iter().zip(&demand) {
            let available = quantity_in(tx.conn(), &product.id, &request.source_deposit_id).await?;
            if available < *requested {
                shortfalls.push(StockShortfall {
                    product_id: product.id.clone(),
                    sku: product.sku.clone(),
                    available,
                    requested: *requested,
                });
            }
        }
        if !shortfalls.is_empty() {
            debug!(shortfalls = shortfalls.len(), "Transfer rejected");
            return Err(CoreError::StockShortfalls(shortfalls).into());
        }

        let (remito_seq, remito_number) = next_remito_in(tx.conn()).await?;

        let transfer = Transfer {
            id: Uuid::new_v4().to_string(),
            remito_number,
            created_at: Utc::now(),
            source_deposit_id: request.source_deposit_id.clone(),
            destination_deposit_id: request.destination_deposit_id.clone(),
            lines: products
                .iter()
                .zip(&demand)
                .map(|(product, (_, quantity))| TransferLine {
                    product_id: product.id.clone(),
                    sku: product.sku.clone(),
                    name: product.name.clone(),
                    quantity: *quantity,
                })
                .collect(),
        };

        insert_transfer_in(tx.conn(), &transfer, remito_seq).await?;

        for line in &transfer.lines {
            let legs = [
                (&transfer.source_deposit_id, -line.quantity, "Salida"),
                (&transfer.destination_deposit_id, line.quantity, "Entrada"),
            ];
            for (deposit_id, delta, leg) in legs {
                record_movement_in(
                    tx.conn(),
                    &MovementRequest {
                        deposit_id: deposit_id.clone(),
                        product_id: line.product_id.clone(),
                        kind: MovementKind::Transfer,
                        change: LedgerChange::Delta(delta),
                        reason: format!("Transferencia {} - {}", transfer.remito_number, leg),
                        reference: Some(transfer.id.clone()),
                        actor: request.actor.clone(),
                    },
                )
                .await?;
            }
        }

        tx.commit().await?;

        info!(
            transfer_id = %transfer.id,
            remito = %transfer.remito_number,
            source = %transfer.source_deposit_id,
            destination = %transfer.destination_deposit_id,
            lines = transfer.lines.len(),
            "Transfer committed"
        );
        Ok(transfer)
    }

    pub async fn get_transfer(&self, id: &str) -> DbResult<Option<Transfer>> {
        TransferRepository::new(self.pool.clone()).get(id).await
    }

    pub async fn get_by_remito(&self, remito_number: &str) -> DbResult<Option<Transfer>> {
        TransferRepository::new(self.pool.clone())
            .by_remito(remito_number)
            .await
    }

    /// Most recent transfers first.
    pub async fn list_transfers(&self, limit: u32) -> DbResult<Vec<Transfer>> {
        TransferRepository::new(self.pool.clone()).list(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixture;

    fn item(product: &Product, quantity: i64) -> TransferItem {
        TransferItem {
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            quantity,
        }
    }

    fn request(source: &str, destination: &str, items: Vec<TransferItem>) -> TransferRequest {
        TransferRequest {
            source_deposit_id: source.to_string(),
            destination_deposit_id: destination.to_string(),
            items,
            actor: Some("encargado".to_string()),
        }
    }

    #[tokio::test]
    async fn test_transfer_moves_stock_with_paired_movements() {
        let fx = fixture().await;
        fx.stock(&fx.product.id, "D1", 10).await;

        let transfer = fx
            .db
            .transfers()
            .create_transfer(request("D1", "D2", vec![item(&fx.product, 5)]))
            .await
            .unwrap();

        assert_eq!(transfer.remito_number, "R-000001");
        assert_eq!(fx.quantity(&fx.product.id, "D1").await, 5);
        assert_eq!(fx.quantity(&fx.product.id, "D2").await, 5);

        let movements = fx.db.ledger().movements_by_reference(&transfer.id).await.unwrap();
        assert_eq!(
            movements.iter().map(|m| (m.deposit_id.as_str(), m.delta)).collect::<Vec<_>>(),
            vec![("D1", -5), ("D2", 5)]
        );
        assert!(movements.iter().all(|m| m.kind == MovementKind::Transfer));
        assert_eq!(movements[0].reason, "Transferencia R-000001 - Salida");
        assert_eq!(movements[1].actor.as_deref(), Some("encargado"));

        assert_eq!(
            fx.db.ledger().total_across_deposits(&fx.product.id).await.unwrap(),
            10
        );

        let stored = fx.db.transfers().get_transfer(&transfer.id).await.unwrap().unwrap();
        assert_eq!(stored, transfer);
    }

    #[tokio::test]
    async fn test_all_shortfalls_reported_and_nothing_written() {
        let fx = fixture().await;
        fx.stock(&fx.product.id, "D1", 3).await;

        let err = fx
            .db
            .transfers()
            .create_transfer(request(
                "D1",
                "D2",
                vec![item(&fx.product, 5), item(&fx.other, 1)],
            ))
            .await
            .unwrap_err();

        match err {
            StockError::Domain(CoreError::StockShortfalls(shortfalls)) => {
                assert_eq!(
                    shortfalls
                        .iter()
                        .map(|s| (s.sku.as_str(), s.available, s.requested))
                        .collect::<Vec<_>>(),
                    vec![("P", 3, 5), ("AZ-1", 0, 1)]
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(fx.count("transfers").await, 0);
        assert_eq!(fx.count("stock_movements").await, 1);
        assert_eq!(fx.quantity(&fx.product.id, "D1").await, 3);
    }

    #[tokio::test]
    async fn test_route_and_shape_validation() {
        let fx = fixture().await;
        fx.stock(&fx.product.id, "D1", 10).await;
        let transfers = fx.db.transfers();

        for bad in [
            request("D1", "D1", vec![item(&fx.product, 1)]),
            request("D1", "D2", vec![]),
            request("D1", "D2", vec![item(&fx.product, 0)]),
            request("D1", "D3", vec![item(&fx.product, 1)]),
        ] {
            assert!(transfers.create_transfer(bad).await.unwrap_err().is_validation());
        }

        assert!(transfers
            .create_transfer(request("D1", "D9", vec![item(&fx.product, 1)]))
            .await
            .unwrap_err()
            .is_not_found());

        assert_eq!(fx.count("transfers").await, 0);
    }

    #[tokio::test]
    async fn test_overflowing_merged_quantity_is_a_validation_error() {
        let fx = fixture().await;
        fx.stock(&fx.product.id, "D2", 10).await;

        let err = fx
            .db
            .transfers()
            .create_transfer(request(
                "D1",
                "D2",
                vec![item(&fx.product, i64::MAX), item(&fx.product, i64::MAX)],
            ))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StockError::Domain(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));

        assert_eq!(fx.count("transfers").await, 0);
        assert_eq!(fx.quantity(&fx.product.id, "D1").await, 0);
        assert_eq!(fx.quantity(&fx.product.id, "D2").await, 10);
    }

    #[tokio::test]
    async fn test_storage_failure_mid_transfer_rolls_back_everything() {
        let fx = fixture().await;
        fx.stock(&fx.product.id, "D1", 10).await;
        fx.stock(&fx.other.id, "D1", 10).await;
        fx.fail_movements_of(&fx.other.id).await;

        // header, lines and both legs of P are written before AZ-1 fails
        let err = fx
            .db
            .transfers()
            .create_transfer(request(
                "D1",
                "D2",
                vec![item(&fx.product, 4), item(&fx.other, 2)],
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::Persistence(_)));

        assert_eq!(fx.count("transfers").await, 0);
        assert_eq!(fx.count("transfer_lines").await, 0);
        assert_eq!(fx.count("stock_movements").await, 2);
        assert_eq!(fx.quantity(&fx.product.id, "D1").await, 10);
        assert_eq!(fx.quantity(&fx.product.id, "D2").await, 0);
        assert!(fx.db.ledger().verify_projection().await.unwrap().is_consistent());

        // the next transfer still gets the first remito number
        sqlx::query("DROP TRIGGER fail_movements")
            .execute(fx.db.pool())
            .await
            .unwrap();
        let transfer = fx
            .db
            .transfers()
            .create_transfer(request("D1", "D2", vec![item(&fx.other, 2)]))
            .await
            .unwrap();
        assert_eq!(transfer.remito_number, "R-000001");
    }

    #[tokio::test]
    async fn test_remito_numbers_are_sequential() {
        let fx = fixture().await;
        fx.stock(&fx.product.id, "D1", 10).await;
        let transfers = fx.db.transfers();

        let mut numbers = Vec::new();
        for _ in 0..3 {
            let t = transfers
                .create_transfer(request("D1", "D2", vec![item(&fx.product, 1)]))
                .await
                .unwrap();
            numbers.push(t.remito_number);
        }
        assert_eq!(numbers, vec!["R-000001", "R-000002", "R-000003"]);

        let listed = transfers.list_transfers(2).await.unwrap();
        assert_eq!(listed[0].remito_number, "R-000003");
        assert_eq!(listed.len(), 2);

        let found = transfers.get_by_remito("R-000002").await.unwrap().unwrap();
        assert_eq!(found.lines[0].quantity, 1);
    }
}
