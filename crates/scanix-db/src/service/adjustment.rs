//! # Stock Adjustment
//!
//! Manual corrections (`ajuste`) plus goods received (`entrada`) and
//! withdrawn (`salida`) outside of sales and transfers.
//!
//! ```text
//! Delta(-3)      → before 10, delta -3, after 7
//! Absolute(4)    → before 10, delta -6, after 4   (delta from the live row)
//! Absolute(10)   → rejected: no change
//! Delta(-11)     → rejected: NegativeStock
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use scanix_core::validation::{validate_movement_quantity, validate_reason, validate_stock_target};
use scanix_core::{LedgerChange, MovementKind, StockMovement};

use crate::error::StockResult;
use crate::repository::stock::{MovementRequest, StockLedger};

/// How an adjustment changes the quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum AdjustmentChange {
    /// Relative change, positive or negative.
    Delta(i64),
    /// Target quantity after the adjustment.
    Absolute(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentRequest {
    pub deposit_id: String,
    pub product_id: String,
    pub change: AdjustmentChange,
    pub reason: String,
    #[serde(default)]
    pub actor: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AdjustmentService {
    ledger: StockLedger,
}

impl AdjustmentService {
    pub fn new(ledger: StockLedger) -> Self {
        AdjustmentService { ledger }
    }

    /// Records an `ajuste` movement.
    pub async fn adjust_stock(&self, request: AdjustmentRequest) -> StockResult<StockMovement> {
        let reason = validate_reason(&request.reason)?;
        let change = match request.change {
            AdjustmentChange::Delta(delta) => LedgerChange::Delta(delta),
            AdjustmentChange::Absolute(target) => {
                validate_stock_target(target)?;
                LedgerChange::SetTo(target)
            }
        };

        debug!(
            product_id = %request.product_id,
            deposit_id = %request.deposit_id,
            change = ?request.change,
            "Adjusting stock"
        );

        self.ledger
            .record_movement(MovementRequest {
                deposit_id: request.deposit_id,
                product_id: request.product_id,
                kind: MovementKind::Adjustment,
                change,
                reason,
                reference: None,
                actor: request.actor,
            })
            .await
    }

    /// Records goods received at a deposit (`entrada`, +quantity).
    pub async fn receive_stock(
        &self,
        deposit_id: &str,
        product_id: &str,
        quantity: i64,
        reason: &str,
        actor: Option<&str>,
    ) -> StockResult<StockMovement> {
        self.simple(deposit_id, product_id, MovementKind::Inbound, quantity, reason, actor)
            .await
    }

    /// Records goods leaving a deposit (`salida`, −quantity).
    pub async fn withdraw_stock(
        &self,
        deposit_id: &str,
        product_id: &str,
        quantity: i64,
        reason: &str,
        actor: Option<&str>,
    ) -> StockResult<StockMovement> {
        self.simple(deposit_id, product_id, MovementKind::Outbound, quantity, reason, actor)
            .await
    }

    async fn simple(
        &self,
        deposit_id: &str,
        product_id: &str,
        kind: MovementKind,
        quantity: i64,
        reason: &str,
        actor: Option<&str>,
    ) -> StockResult<StockMovement> {
        validate_movement_quantity(quantity)?;
        let reason = validate_reason(reason)?;
        let delta = if kind == MovementKind::Outbound {
            -quantity
        } else {
            quantity
        };

        self.ledger
            .record_movement(MovementRequest {
                deposit_id: deposit_id.to_string(),
                product_id: product_id.to_string(),
                kind,
                change: LedgerChange::Delta(delta),
                reason,
                reference: None,
                actor: actor.map(str::to_string),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StockError;
    use crate::test_support::fixture;
    use scanix_core::CoreError;

    fn adjust(product_id: &str, change: AdjustmentChange, reason: &str) -> AdjustmentRequest {
        AdjustmentRequest {
            deposit_id: "D1".to_string(),
            product_id: product_id.to_string(),
            change,
            reason: reason.to_string(),
            actor: Some("admin".to_string()),
        }
    }

    #[tokio::test]
    async fn test_relative_and_absolute_adjustments() {
        let fx = fixture().await;
        fx.stock(&fx.product.id, "D1", 10).await;
        let service = fx.db.adjustments();

        let m = service
            .adjust_stock(adjust(&fx.product.id, AdjustmentChange::Delta(-3), "rotura"))
            .await
            .unwrap();
        assert_eq!((m.quantity_before, m.delta, m.quantity_after), (10, -3, 7));
        assert_eq!(m.kind, MovementKind::Adjustment);
        assert_eq!(m.actor.as_deref(), Some("admin"));

        let m = service
            .adjust_stock(adjust(&fx.product.id, AdjustmentChange::Absolute(4), "  conteo  "))
            .await
            .unwrap();
        assert_eq!(m.delta, -3);
        assert_eq!(m.reason, "conteo");
        assert_eq!(fx.quantity(&fx.product.id, "D1").await, 4);
    }

    #[tokio::test]
    async fn test_rejections_leave_stock_untouched() {
        let fx = fixture().await;
        fx.stock(&fx.product.id, "D1", 10).await;
        let service = fx.db.adjustments();

        let err = service
            .adjust_stock(adjust(&fx.product.id, AdjustmentChange::Delta(-11), "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::Domain(CoreError::NegativeStock { .. })));

        for bad in [
            adjust(&fx.product.id, AdjustmentChange::Delta(-1), "   "),
            adjust(&fx.product.id, AdjustmentChange::Absolute(-2), "x"),
            adjust(&fx.product.id, AdjustmentChange::Absolute(10), "x"),
            adjust(&fx.product.id, AdjustmentChange::Delta(0), "x"),
        ] {
            assert!(service.adjust_stock(bad).await.unwrap_err().is_validation());
        }

        assert_eq!(fx.quantity(&fx.product.id, "D1").await, 10);
        assert_eq!(fx.count("stock_movements").await, 1);
    }

    #[tokio::test]
    async fn test_receive_and_withdraw() {
        let fx = fixture().await;
        let service = fx.db.adjustments();

        let m = service
            .receive_stock("D2", &fx.other.id, 12, "Remito proveedor", None)
            .await
            .unwrap();
        assert_eq!(m.kind, MovementKind::Inbound);

        let m = service
            .withdraw_stock("D2", &fx.other.id, 5, "Muestra", Some("caja1"))
            .await
            .unwrap();
        assert_eq!((m.kind, m.delta, m.quantity_after), (MovementKind::Outbound, -5, 7));

        let err = service
            .withdraw_stock("D2", &fx.other.id, 8, "Muestra", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StockError::Domain(CoreError::NegativeStock { .. })));
        assert!(service
            .receive_stock("D2", &fx.other.id, 0, "x", None)
            .await
            .unwrap_err()
            .is_validation());
        assert_eq!(fx.quantity(&fx.other.id, "D2").await, 7);
    }
}
