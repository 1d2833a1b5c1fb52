//! # Domain Types
//!
//! Core domain types used throughout the Scanix stock ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │    Deposit      │   │   StockEntry    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id, sku        │   │  id, name       │   │  (product,      │       │
//! │  │  base_price     │   │  address        │   │   deposit) →    │       │
//! │  │  tiers: [Tier]  │   │  active         │   │  quantity ≥ 0   │       │
//! │  └─────────────────┘   └─────────────────┘   └────────▲────────┘       │
//! │                                                       │ projection     │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌────────┴────────┐       │
//! │  │     Ticket      │   │    Transfer     │   │  StockMovement  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  lines (frozen) │   │  remito_number  │   │  kind, delta    │       │
//! │  │  total          │   │  source → dest  │   │  before/after   │       │
//! │  └─────────────────┘   └─────────────────┘   │  (append-only)  │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Tier
// =============================================================================

/// A quantity range with its unit price (volume discount).
///
/// `max_qty = None` means the tier is unbounded above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Tier {
    pub min_qty: i64,
    pub max_qty: Option<i64>,
    pub unit_price: Money,
}

impl Tier {
    pub fn new(min_qty: i64, max_qty: Option<i64>, unit_price: Money) -> Self {
        Tier {
            min_qty,
            max_qty,
            unit_price,
        }
    }

    /// Checks whether `qty` falls inside `[min_qty, max_qty]`.
    #[inline]
    pub fn contains(&self, qty: i64) -> bool {
        qty >= self.min_qty && self.max_qty.map_or(true, |max| qty <= max)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog product, read from the product catalog on every use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Unique identifier.
    pub id: String,

    /// Stock Keeping Unit - unique business identifier.
    pub sku: String,

    /// Display name shown on cart lines and tickets.
    pub name: String,

    /// Unit price used when no tier matches.
    pub base_price: Money,

    /// Volume tiers as stored. Order is NOT trusted by the resolver.
    pub tiers: Vec<Tier>,
}

impl Product {
    /// Resolves the unit price for `qty` against this product's tiers.
    pub fn unit_price_for(&self, qty: i64) -> Money {
        crate::pricing::resolve_price(self.base_price, &self.tiers, qty)
    }
}

// =============================================================================
// Deposit
// =============================================================================

/// A physical or logical inventory location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Deposit {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub active: bool,
}

// =============================================================================
// Stock Entry
// =============================================================================

/// Current quantity of a product at a deposit.
///
/// This is a projection of the movement log: it can always be rebuilt by
/// summing the deltas of every movement for the same key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockEntry {
    pub product_id: String,
    pub deposit_id: String,
    pub quantity: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Movement Kind
// =============================================================================

/// Why a stock quantity changed. Stored and serialized with the
/// ledger's historical Spanish names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum MovementKind {
    /// Goods received into a deposit.
    #[serde(rename = "entrada")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "entrada"))]
    Inbound,
    /// Goods removed from a deposit outside of a sale.
    #[serde(rename = "salida")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "salida"))]
    Outbound,
    /// Manual correction (relative or absolute).
    #[serde(rename = "ajuste")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "ajuste"))]
    Adjustment,
    /// One half of an inter-deposit transfer.
    #[serde(rename = "transferencia")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "transferencia"))]
    Transfer,
    /// Stock consumed by a ticket.
    #[serde(rename = "venta")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "venta"))]
    Sale,
}

impl MovementKind {
    /// The stored name of this kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Inbound => "entrada",
            MovementKind::Outbound => "salida",
            MovementKind::Adjustment => "ajuste",
            MovementKind::Transfer => "transferencia",
            MovementKind::Sale => "venta",
        }
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Stock Movement
// =============================================================================

/// An immutable, timestamped record of a stock quantity change.
///
/// ## Invariant
/// `quantity_after == quantity_before + delta`, and `quantity_after` equals
/// the live StockEntry at the moment the movement was committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub deposit_id: String,
    pub product_id: String,
    pub kind: MovementKind,
    pub delta: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub reason: String,
    /// Ticket or transfer id this movement belongs to.
    pub reference: Option<String>,
    /// Who performed the change, when known.
    pub actor: Option<String>,
}

// =============================================================================
// Ticket
// =============================================================================

/// A line of a completed sale. Uses the snapshot pattern: sku, name and
/// price are frozen at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TicketLine {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub subtotal: Money,
}

/// A completed sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub deposit_id: String,
    pub lines: Vec<TicketLine>,
    /// Always the exact sum of line subtotals.
    pub total: Money,
}

// =============================================================================
// Transfer
// =============================================================================

/// A line of an inter-deposit transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TransferLine {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
}

/// Stock moved between two deposits as one logical operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub id: String,
    /// Shipping receipt identifier, e.g. `R-000042`.
    pub remito_number: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub source_deposit_id: String,
    pub destination_deposit_id: String,
    pub lines: Vec<TransferLine>,
}

// =============================================================================
// Recognition Candidate
// =============================================================================

/// A product suggested by the recognition service.
///
/// The service is an opaque oracle; candidates are only ever used as
/// cart-add suggestions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionCandidate {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub suggested_qty: i64,
    /// 0.0 ..= 1.0
    pub confidence: f64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_contains_bounds() {
        let tier = Tier::new(6, Some(12), Money::from_cents(9_300));
        assert!(!tier.contains(5));
        assert!(tier.contains(6));
        assert!(tier.contains(12));
        assert!(!tier.contains(13));

        let open = Tier::new(13, None, Money::from_cents(8_500));
        assert!(open.contains(13));
        assert!(open.contains(i64::MAX));
    }

    #[test]
    fn test_movement_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&MovementKind::Sale).unwrap(),
            "\"venta\""
        );
        assert_eq!(
            serde_json::from_str::<MovementKind>("\"transferencia\"").unwrap(),
            MovementKind::Transfer
        );
        assert_eq!(MovementKind::Adjustment.to_string(), "ajuste");
    }
}
