//! # Checkout Orchestrator
//!
//! Converts cart lines into a ticket and the matching `venta` movements as
//! one atomic operation.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         checkout(request)                               │
//! │                                                                         │
//! │  lines non-empty, 1 ≤ qty ≤ 999           ← before any storage access  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  WriteTx ─┬─ deposit exists and is active                              │
//! │           ├─ every product exists                                      │
//! │           ├─ demand aggregated per product ≤ stock at deposit          │
//! │           │     first shortfall → InsufficientStock, nothing written   │
//! │           ├─ unit prices recomputed from current tiers                 │
//! │           │     declared prices that differ → warn!, ignored           │
//! │           ├─ INSERT ticket + lines                                     │
//! │           └─ venta movement per line (delta = −qty, ref = ticket id)  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT → Ticket                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lines of the same product are merged into one ticket line and priced on
//! the merged quantity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use scanix_core::pricing::{compute_subtotal, compute_total};
use scanix_core::validation::{validate_deposit_active, validate_not_empty, validate_quantity};
use scanix_core::{
    Cart, CoreError, LedgerChange, Money, MovementKind, Product, Ticket, TicketLine,
    ValidationError, MAX_CART_ITEMS,
};

use crate::error::{DbResult, StockError, StockResult};
use crate::pool::WriteGate;
use crate::repository::catalog::{deposit_by_id_in, product_by_id_in};
use crate::repository::stock::{quantity_in, record_movement_in, MovementRequest};
use crate::repository::ticket::{insert_ticket_in, TicketRepository};

// =============================================================================
// Request Types
// =============================================================================

/// A line as the client sees it, including the price it displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutLine {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub subtotal: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub deposit_id: String,
    pub lines: Vec<CheckoutLine>,
    /// Recorded on every movement of the sale.
    #[serde(default)]
    pub actor: Option<String>,
}

impl From<&Cart> for CheckoutRequest {
    fn from(cart: &Cart) -> Self {
        CheckoutRequest {
            deposit_id: cart.deposit_id.clone(),
            lines: cart
                .lines
                .iter()
                .map(|l| CheckoutLine {
                    product_id: l.product_id.clone(),
                    sku: l.sku.clone(),
                    name: l.name.clone(),
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                    subtotal: l.subtotal,
                })
                .collect(),
            actor: None,
        }
    }
}

// =============================================================================
// Checkout Service
// =============================================================================

#[derive(Debug, Clone)]
pub struct CheckoutService {
    pool: SqlitePool,
    gate: WriteGate,
}

impl CheckoutService {
    pub fn new(pool: SqlitePool, gate: WriteGate) -> Self {
        CheckoutService { pool, gate }
    }

    /// Checks out a cart. The cart is left untouched; clear it on success.
    pub async fn checkout_cart(&self, cart: &Cart) -> StockResult<Ticket> {
        self.checkout(CheckoutRequest::from(cart)).await
    }

    /// Sells the requested lines from one deposit.
    ///
    /// ## Errors
    /// - `Validation` - no lines, bad quantity, inactive deposit
    /// - `NotFound` - unknown deposit or product
    /// - `InsufficientStock` - first product whose demand exceeds stock
    /// - `Persistence` - storage failed, nothing was written
    pub async fn checkout(&self, request: CheckoutRequest) -> StockResult<Ticket> {
        validate_not_empty("lines", &request.lines)?;
        if request.lines.len() > MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_ITEMS,
            }
            .into());
        }
        for line in &request.lines {
            validate_quantity(line.quantity)?;
        }

        // Merge per product, keeping first-seen order
        let mut demand: Vec<(String, i64)> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        for line in &request.lines {
            match index.get(line.product_id.as_str()) {
                Some(&i) => demand[i].1 += line.quantity,
                None => {
                    index.insert(line.product_id.as_str(), demand.len());
                    demand.push((line.product_id.clone(), line.quantity));
                }
            }
        }
        for (_, quantity) in &demand {
            validate_quantity(*quantity)?;
        }

        debug!(
            deposit_id = %request.deposit_id,
            lines = demand.len(),
            "Starting checkout"
        );

        let mut tx = self.gate.begin(&self.pool).await?;

        let deposit = deposit_by_id_in(tx.conn(), &request.deposit_id)
            .await?
            .ok_or_else(|| StockError::not_found("Deposit", request.deposit_id.as_str()))?;
        validate_deposit_active(&deposit)?;

        let mut products: Vec<Product> = Vec::with_capacity(demand.len());
        for (product_id, _) in &demand {
            let product = product_by_id_in(tx.conn(), product_id)
                .await?
                .ok_or_else(|| StockError::not_found("Product", product_id.as_str()))?;
            products.push(product);
        }

        for (product, (_, requested)) in products.iter().zip(&demand) {
            let available = quantity_in(tx.conn(), &product.id, &deposit.id).await?;
            if available < *requested {
                debug!(sku = %product.sku, available, requested, "Checkout rejected");
                return Err(CoreError::InsufficientStock {
                    sku: product.sku.clone(),
                    available,
                    requested: *requested,
                }
                .into());
            }
        }

        let lines: Vec<TicketLine> = products
            .iter()
            .zip(&demand)
            .map(|(product, (_, quantity))| {
                let unit_price = product.unit_price_for(*quantity);
                TicketLine {
                    product_id: product.id.clone(),
                    sku: product.sku.clone(),
                    name: product.name.clone(),
                    quantity: *quantity,
                    unit_price,
                    subtotal: compute_subtotal(unit_price, *quantity),
                }
            })
            .collect();

        warn_on_price_drift(&request.lines, &lines);

        let ticket = Ticket {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            deposit_id: deposit.id.clone(),
            total: compute_total(lines.iter().map(|l| &l.subtotal)),
            lines,
        };

        insert_ticket_in(tx.conn(), &ticket).await?;

        let reason = format!("Venta ticket {}", ticket.id);
        for line in &ticket.lines {
            record_movement_in(
                tx.conn(),
                &MovementRequest {
                    deposit_id: ticket.deposit_id.clone(),
                    product_id: line.product_id.clone(),
                    kind: MovementKind::Sale,
                    change: LedgerChange::Delta(-line.quantity),
                    reason: reason.clone(),
                    reference: Some(ticket.id.clone()),
                    actor: request.actor.clone(),
                },
            )
            .await?;
        }

        tx.commit().await?;

        info!(
            ticket_id = %ticket.id,
            deposit_id = %ticket.deposit_id,
            lines = ticket.lines.len(),
            total = %ticket.total,
            "Checkout committed"
        );
        Ok(ticket)
    }

    pub async fn get_ticket(&self, id: &str) -> DbResult<Option<Ticket>> {
        TicketRepository::new(self.pool.clone()).get(id).await
    }

    /// Most recent tickets first.
    pub async fn list_tickets(&self, limit: u32) -> DbResult<Vec<Ticket>> {
        TicketRepository::new(self.pool.clone()).list(limit).await
    }

    /// Tickets created between `from` and `to` (inclusive), optionally for
    /// one deposit, newest first.
    pub async fn tickets_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        deposit_id: Option<&str>,
    ) -> StockResult<Vec<Ticket>> {
        if from > to {
            return Err(ValidationError::InvalidFormat {
                field: "from".to_string(),
                reason: "must not be after 'to'".to_string(),
            }
            .into());
        }

        let tickets = TicketRepository::new(self.pool.clone())
            .between(from, to, deposit_id)
            .await?;
        Ok(tickets)
    }
}

/// Logs every declared price that differs from the recomputed one.
fn warn_on_price_drift(declared: &[CheckoutLine], computed: &[TicketLine]) {
    for line in declared {
        let Some(actual) = computed.iter().find(|l| l.product_id == line.product_id) else {
            continue;
        };
        if line.unit_price != actual.unit_price {
            warn!(
                sku = %actual.sku,
                declared = %line.unit_price,
                charged = %actual.unit_price,
                "Client price differs from current tier price; using current price"
            );
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixture;
    use chrono::{Duration, TimeZone};

    fn line(product: &Product, quantity: i64, unit_cents: i64) -> CheckoutLine {
        CheckoutLine {
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            quantity,
            unit_price: Money::from_cents(unit_cents),
            subtotal: Money::from_cents(unit_cents * quantity),
        }
    }

    fn request(deposit_id: &str, lines: Vec<CheckoutLine>) -> CheckoutRequest {
        CheckoutRequest {
            deposit_id: deposit_id.to_string(),
            lines,
            actor: None,
        }
    }

    #[tokio::test]
    async fn test_checkout_cart_writes_ticket_and_movements() {
        let fx = fixture().await;
        fx.stock(&fx.product.id, "D1", 20).await;
        fx.stock(&fx.other.id, "D1", 5).await;

        let mut cart = Cart::new("D1");
        let service = fx.db.cart();
        service.add_to_cart(&mut cart, &fx.product.id, 6).await.unwrap();
        service.add_to_cart(&mut cart, &fx.other.id, 2).await.unwrap();

        let ticket = fx.db.checkout().checkout_cart(&cart).await.unwrap();
        assert_eq!(ticket.lines.len(), 2);
        assert_eq!(ticket.lines[0].subtotal.cents(), 55_800);
        assert_eq!(ticket.total.cents(), 55_800 + 2_500);

        assert_eq!(fx.quantity(&fx.product.id, "D1").await, 14);
        assert_eq!(fx.quantity(&fx.other.id, "D1").await, 3);

        let movements = fx.db.ledger().movements_by_reference(&ticket.id).await.unwrap();
        assert_eq!(movements.len(), 2);
        assert!(movements.iter().all(|m| m.kind == MovementKind::Sale));
        assert_eq!(movements[0].delta, -6);
        assert_eq!(movements[0].reason, format!("Venta ticket {}", ticket.id));

        let stored = fx.db.checkout().get_ticket(&ticket.id).await.unwrap().unwrap();
        assert_eq!(stored, ticket);
    }

    #[tokio::test]
    async fn test_insufficient_stock_writes_nothing() {
        let fx = fixture().await;
        fx.stock(&fx.product.id, "D1", 10).await;
        fx.stock(&fx.other.id, "D1", 10).await;

        let err = fx
            .db
            .checkout()
            .checkout(request(
                "D1",
                vec![line(&fx.other, 1, 1_250), line(&fx.product, 12, 9_300)],
            ))
            .await
            .unwrap_err();

        match err {
            StockError::Domain(CoreError::InsufficientStock {
                sku,
                available,
                requested,
            }) => {
                assert_eq!(sku, "P");
                assert_eq!(available, 10);
                assert_eq!(requested, 12);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(fx.quantity(&fx.product.id, "D1").await, 10);
        assert_eq!(fx.quantity(&fx.other.id, "D1").await, 10);
        assert_eq!(fx.count("tickets").await, 0);
        assert_eq!(fx.count("ticket_lines").await, 0);
        assert_eq!(fx.count("stock_movements").await, 2);
    }

    #[tokio::test]
    async fn test_split_lines_are_aggregated_for_availability() {
        let fx = fixture().await;
        fx.stock(&fx.product.id, "D1", 10).await;

        let err = fx
            .db
            .checkout()
            .checkout(request(
                "D1",
                vec![line(&fx.product, 6, 9_300), line(&fx.product, 6, 9_300)],
            ))
            .await
            .unwrap_err();
        assert!(err.is_insufficient_stock());

        fx.stock(&fx.product.id, "D1", 2).await;
        let ticket = fx
            .db
            .checkout()
            .checkout(request(
                "D1",
                vec![line(&fx.product, 6, 9_300), line(&fx.product, 6, 9_300)],
            ))
            .await
            .unwrap();
        assert_eq!(ticket.lines.len(), 1);
        assert_eq!(ticket.lines[0].quantity, 12);
        assert_eq!(fx.quantity(&fx.product.id, "D1").await, 0);
    }

    #[tokio::test]
    async fn test_declared_prices_are_recomputed() {
        let fx = fixture().await;
        fx.stock(&fx.product.id, "D1", 10).await;

        // client claims $1.00 per unit
        let ticket = fx
            .db
            .checkout()
            .checkout(request("D1", vec![line(&fx.product, 3, 100)]))
            .await
            .unwrap();

        assert_eq!(ticket.lines[0].unit_price.cents(), 10_000);
        assert_eq!(ticket.total.cents(), 30_000);
    }

    #[tokio::test]
    async fn test_rejects_bad_requests() {
        let fx = fixture().await;
        fx.stock(&fx.product.id, "D1", 10).await;
        let checkout = fx.db.checkout();

        assert!(checkout.checkout(request("D1", vec![])).await.unwrap_err().is_validation());
        assert!(checkout
            .checkout(request("D1", vec![line(&fx.product, 0, 10_000)]))
            .await
            .unwrap_err()
            .is_validation());
        assert!(checkout
            .checkout(request("D3", vec![line(&fx.product, 1, 10_000)]))
            .await
            .unwrap_err()
            .is_validation());
        assert!(checkout
            .checkout(request("D9", vec![line(&fx.product, 1, 10_000)]))
            .await
            .unwrap_err()
            .is_not_found());

        let mut ghost = fx.product.clone();
        ghost.id = "ghost".to_string();
        assert!(checkout
            .checkout(request("D1", vec![line(&ghost, 1, 10_000)]))
            .await
            .unwrap_err()
            .is_not_found());

        assert_eq!(fx.count("tickets").await, 0);
        assert_eq!(fx.quantity(&fx.product.id, "D1").await, 10);
    }

    #[tokio::test]
    async fn test_storage_failure_mid_checkout_rolls_back_everything() {
        let fx = fixture().await;
        fx.stock(&fx.product.id, "D1", 10).await;
        fx.stock(&fx.other.id, "D1", 10).await;
        fx.fail_movements_of(&fx.other.id).await;

        // ticket, lines and the P movement are written before AZ-1 fails
        let err = fx
            .db
            .checkout()
            .checkout(request(
                "D1",
                vec![line(&fx.product, 3, 10_000), line(&fx.other, 1, 1_250)],
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::Persistence(_)));

        assert_eq!(fx.count("tickets").await, 0);
        assert_eq!(fx.count("ticket_lines").await, 0);
        assert_eq!(fx.count("stock_movements").await, 2);
        assert_eq!(fx.quantity(&fx.product.id, "D1").await, 10);
        assert_eq!(fx.quantity(&fx.other.id, "D1").await, 10);
        assert!(fx.db.ledger().verify_projection().await.unwrap().is_consistent());
    }

    #[tokio::test]
    async fn test_tickets_between_filters_by_date_and_deposit() {
        let fx = fixture().await;
        fx.stock(&fx.product.id, "D1", 10).await;
        fx.stock(&fx.product.id, "D2", 10).await;
        let checkout = fx.db.checkout();
        let day = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();

        let mut ids = Vec::new();
        for (deposit_id, at) in [
            ("D1", day),
            ("D2", day + Duration::hours(2)),
            ("D1", day + Duration::days(1)),
        ] {
            let ticket = checkout
                .checkout(request(deposit_id, vec![line(&fx.product, 1, 10_000)]))
                .await
                .unwrap();
            sqlx::query("UPDATE tickets SET created_at = ?1 WHERE id = ?2")
                .bind(at)
                .bind(&ticket.id)
                .execute(fx.db.pool())
                .await
                .unwrap();
            ids.push(ticket.id);
        }

        let ids_of = |tickets: Vec<Ticket>| tickets.into_iter().map(|t| t.id).collect::<Vec<_>>();

        let first_day = checkout
            .tickets_between(day, day + Duration::hours(23), None)
            .await
            .unwrap();
        assert_eq!(first_day[0].lines.len(), 1);
        assert_eq!(ids_of(first_day), vec![ids[1].clone(), ids[0].clone()]);

        let d1 = checkout
            .tickets_between(day, day + Duration::days(1), Some("D1"))
            .await
            .unwrap();
        assert_eq!(ids_of(d1), vec![ids[2].clone(), ids[0].clone()]);

        assert!(checkout
            .tickets_between(day + Duration::days(2), day + Duration::days(3), None)
            .await
            .unwrap()
            .is_empty());
        assert!(checkout
            .tickets_between(day + Duration::days(1), day, None)
            .await
            .unwrap_err()
            .is_validation());
    }

    #[tokio::test]
    async fn test_list_tickets_newest_first() {
        let fx = fixture().await;
        fx.stock(&fx.product.id, "D1", 10).await;
        let checkout = fx.db.checkout();

        let first = checkout
            .checkout(request("D1", vec![line(&fx.product, 1, 10_000)]))
            .await
            .unwrap();
        let second = checkout
            .checkout(request("D1", vec![line(&fx.product, 2, 10_000)]))
            .await
            .unwrap();

        let tickets = checkout.list_tickets(10).await.unwrap();
        assert_eq!(
            tickets.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
            vec![second.id.as_str(), first.id.as_str()]
        );
        assert_eq!(tickets[0].lines.len(), 1);
    }
}
