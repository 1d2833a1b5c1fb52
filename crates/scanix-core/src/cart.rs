//! # Cart Accumulator
//!
//! Per-session line-item state for one target deposit.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Caller Action            Operation              Line Change            │
//! │  ─────────────            ─────────              ───────────            │
//! │                                                                         │
//! │  Scan / pick product ───► add(p, n) ───────────► qty = min(q+n, 999)   │
//! │                                                  price re-resolved      │
//! │                                                                         │
//! │  Change quantity ───────► set_quantity(p, n) ──► n ≤ 0 removes line    │
//! │                                                  price re-resolved      │
//! │                                                                         │
//! │  Tier edited elsewhere ─► reprice(p) ──────────► price re-resolved      │
//! │                                                                         │
//! │  Click remove ──────────► remove(sku) ─────────► line dropped          │
//! │                                                                         │
//! │  NOTE: every mutation takes the Product it prices against. The caller  │
//! │        must pass a freshly read product; this type never caches tiers. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::pricing::{compute_subtotal, compute_total};
use crate::types::Product;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

// =============================================================================
// Cart Line
// =============================================================================

/// One product in the cart with its currently applied tier price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub subtotal: Money,
}

impl CartLine {
    fn priced(product: &Product, quantity: i64) -> Self {
        let unit_price = product.unit_price_for(quantity);
        CartLine {
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            quantity,
            unit_price,
            subtotal: compute_subtotal(unit_price, quantity),
        }
    }

    /// Re-resolves price and subtotal, refreshing the display fields too.
    fn reprice(&mut self, product: &Product) {
        *self = CartLine::priced(product, self.quantity);
    }
}

// =============================================================================
// Cart
// =============================================================================

/// The shopping cart.
///
/// ## Invariants
/// - Lines are unique by SKU (adding the same product merges quantities)
/// - Every line has `1 ..= MAX_ITEM_QUANTITY` units
/// - At most `MAX_CART_ITEMS` lines
/// - `subtotal == unit_price × quantity` for every line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    /// Deposit the sale will draw stock from.
    pub deposit_id: String,

    /// Lines in insertion order.
    pub lines: Vec<CartLine>,

    /// When the cart was created/last cleared
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(deposit_id: impl Into<String>) -> Self {
        Cart {
            deposit_id: deposit_id.into(),
            lines: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Adds `requested` units of a product, merging into an existing line.
    ///
    /// ## Behavior
    /// - Existing line: quantity becomes `min(existing + requested, 999)`
    /// - New line: quantity is `min(requested, 999)`
    /// - Price is always re-resolved against `product.tiers`
    ///
    /// ## Errors
    /// - `requested < 1` → `ValidationError::MustBePositive`
    /// - cart already holds `MAX_CART_ITEMS` lines → `CartTooLarge`
    pub fn add(&mut self, product: &Product, requested: i64) -> CoreResult<CartLine> {
        if requested < 1 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }

        if let Some(line) = self.lines.iter_mut().find(|l| l.sku == product.sku) {
            let merged = line
                .quantity
                .saturating_add(requested)
                .min(MAX_ITEM_QUANTITY);
            *line = CartLine::priced(product, merged);
            return Ok(line.clone());
        }

        if self.lines.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_ITEMS,
            });
        }

        let line = CartLine::priced(product, requested.min(MAX_ITEM_QUANTITY));
        self.lines.push(line.clone());
        Ok(line)
    }

    /// Sets the quantity of the product's line.
    ///
    /// Returns `None` when the line was removed (`qty ≤ 0`).
    pub fn set_quantity(&mut self, product: &Product, qty: i64) -> CoreResult<Option<CartLine>> {
        if qty <= 0 {
            self.remove(&product.sku)?;
            return Ok(None);
        }

        if qty > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: qty,
                max: MAX_ITEM_QUANTITY,
            });
        }

        let line = self
            .lines
            .iter_mut()
            .find(|l| l.sku == product.sku)
            .ok_or_else(|| CoreError::not_found("Cart line", product.sku.as_str()))?;

        *line = CartLine::priced(product, qty);
        Ok(Some(line.clone()))
    }

    /// Removes a line by SKU, returning it.
    pub fn remove(&mut self, sku: &str) -> CoreResult<CartLine> {
        let index = self
            .lines
            .iter()
            .position(|l| l.sku == sku)
            .ok_or_else(|| CoreError::not_found("Cart line", sku))?;

        Ok(self.lines.remove(index))
    }

    /// Re-resolves the product's line against fresh tiers.
    ///
    /// Returns `false` if the product is not in the cart.
    pub fn reprice(&mut self, product: &Product) -> bool {
        match self.lines.iter_mut().find(|l| l.product_id == product.id) {
            Some(line) => {
                line.reprice(product);
                true
            }
            None => false,
        }
    }

    /// Clears all lines from the cart.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.created_at = Utc::now();
    }

    /// Sum of line subtotals.
    pub fn total(&self) -> Money {
        compute_total(self.lines.iter().map(|l| &l.subtotal))
    }

    pub fn line(&self, sku: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.sku == sku)
    }

    /// Returns the number of unique lines in the cart.
    pub fn item_count(&self) -> usize {
        self.lines.len()
    }

    /// Returns the total quantity of all lines.
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Tier;

    fn tiered_product() -> Product {
        Product {
            id: "p-1".to_string(),
            sku: "P".to_string(),
            name: "Yerba 1kg".to_string(),
            base_price: Money::from_cents(10_000),
            tiers: vec![
                Tier::new(1, Some(5), Money::from_cents(10_000)),
                Tier::new(6, Some(12), Money::from_cents(9_300)),
                Tier::new(13, None, Money::from_cents(8_500)),
            ],
        }
    }

    fn plain_product(n: usize) -> Product {
        Product {
            id: format!("p-{}", n),
            sku: format!("SKU-{}", n),
            name: format!("Product {}", n),
            base_price: Money::from_cents(100),
            tiers: Vec::new(),
        }
    }

    #[test]
    fn test_add_resolves_tier_price() {
        let mut cart = Cart::new("D1");
        let line = cart.add(&tiered_product(), 6).unwrap();

        assert_eq!(line.unit_price.cents(), 9_300);
        assert_eq!(line.subtotal.cents(), 55_800);
        assert_eq!(cart.total().cents(), 55_800);
    }

    #[test]
    fn test_merge_moves_line_across_tiers() {
        let mut cart = Cart::new("D1");
        let product = tiered_product();

        cart.add(&product, 4).unwrap();
        assert_eq!(cart.line("P").unwrap().unit_price.cents(), 10_000);

        let line = cart.add(&product, 10).unwrap();
        assert_eq!(cart.item_count(), 1);
        assert_eq!(line.quantity, 14);
        assert_eq!(line.unit_price.cents(), 8_500);
    }

    #[test]
    fn test_merge_clamps_at_max_quantity() {
        let mut cart = Cart::new("D1");
        let product = tiered_product();

        cart.add(&product, 990).unwrap();
        let line = cart.add(&product, 50).unwrap();
        assert_eq!(line.quantity, MAX_ITEM_QUANTITY);

        let mut fresh = Cart::new("D1");
        assert_eq!(fresh.add(&product, 5_000).unwrap().quantity, MAX_ITEM_QUANTITY);
    }

    #[test]
    fn test_add_rejects_non_positive() {
        let mut cart = Cart::new("D1");
        let err = cart.add(&tiered_product(), 0).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_add_respects_line_limit() {
        let mut cart = Cart::new("D1");
        for n in 0..MAX_CART_ITEMS {
            cart.add(&plain_product(n), 1).unwrap();
        }

        let err = cart.add(&plain_product(MAX_CART_ITEMS), 1).unwrap_err();
        assert!(matches!(err, CoreError::CartTooLarge { .. }));

        // merging into an existing line still works at the limit
        assert!(cart.add(&plain_product(0), 1).is_ok());
    }

    #[test]
    fn test_set_quantity_reprices_and_removes() {
        let mut cart = Cart::new("D1");
        let product = tiered_product();
        cart.add(&product, 2).unwrap();

        let line = cart.set_quantity(&product, 13).unwrap().unwrap();
        assert_eq!(line.unit_price.cents(), 8_500);
        assert_eq!(line.subtotal.cents(), 110_500);

        assert!(cart.set_quantity(&product, 0).unwrap().is_none());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_errors() {
        let mut cart = Cart::new("D1");
        let product = tiered_product();

        assert!(matches!(
            cart.set_quantity(&product, 3),
            Err(CoreError::NotFound { .. })
        ));

        cart.add(&product, 1).unwrap();
        assert!(matches!(
            cart.set_quantity(&product, 1_000),
            Err(CoreError::QuantityTooLarge { .. })
        ));
        assert_eq!(cart.line("P").unwrap().quantity, 1);
    }

    #[test]
    fn test_reprice_picks_up_edited_tiers() {
        let mut cart = Cart::new("D1");
        let mut product = tiered_product();
        cart.add(&product, 6).unwrap();

        product.tiers[1].unit_price = Money::from_cents(9_000);
        assert!(cart.reprice(&product));
        assert_eq!(cart.total().cents(), 54_000);

        assert!(!cart.reprice(&plain_product(7)));
    }

    #[test]
    fn test_overlapping_tiers_first_match() {
        let product = Product {
            tiers: vec![
                Tier::new(1, Some(10), Money::from_cents(5_000)),
                Tier::new(5, Some(20), Money::from_cents(4_000)),
            ],
            ..tiered_product()
        };
        let mut cart = Cart::new("D1");

        assert_eq!(cart.add(&product, 7).unwrap().unit_price.cents(), 5_000);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cart = Cart::new("D1");
        cart.add(&plain_product(1), 2).unwrap();
        cart.add(&plain_product(2), 3).unwrap();
        assert_eq!(cart.total_quantity(), 5);

        let removed = cart.remove("SKU-1").unwrap();
        assert_eq!(removed.quantity, 2);
        assert!(cart.remove("SKU-1").is_err());

        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.total(), Money::zero());
    }
}
