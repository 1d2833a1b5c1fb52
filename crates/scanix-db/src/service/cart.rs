//! # Cart Service
//!
//! Applies [`Cart`] mutations against products read fresh from the catalog.
//!
//! ## Re-fetch on Use
//! ```text
//! add_to_cart(cart, "p-yerba", 6)
//!      │
//!      ▼
//! catalog.product_by_id  ← tiers read now, never cached
//!      │
//!      ▼
//! cart.add(&product, 6)  → unit $93, subtotal $558
//! ```
//! A tier edit made between two calls is picked up by the next one.
//! `cart_total` re-reads every product in the cart before summing.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, warn};

use scanix_core::validation::validate_confidence;
use scanix_core::{
    Cart, CartLine, CoreError, Money, Product, RecognitionCandidate, ValidationError,
};

use crate::error::{StockError, StockResult};
use crate::repository::catalog::CatalogRepository;

/// Why a recognition candidate was not added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    LowConfidence,
    UnknownProduct,
    CartFull,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedSuggestion {
    pub candidate: RecognitionCandidate,
    pub reason: SkipReason,
}

/// Result of [`CartService::add_suggestions`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionOutcome {
    pub added: Vec<CartLine>,
    pub skipped: Vec<SkippedSuggestion>,
}

/// Cart operations backed by the product catalog.
#[derive(Debug, Clone)]
pub struct CartService {
    catalog: CatalogRepository,
    min_confidence: f64,
}

impl CartService {
    pub fn new(pool: SqlitePool, min_confidence: f64) -> Self {
        CartService {
            catalog: CatalogRepository::new(pool),
            min_confidence,
        }
    }

    async fn fetch(&self, product_id: &str) -> StockResult<Product> {
        self.catalog
            .product_by_id(product_id)
            .await?
            .ok_or_else(|| StockError::not_found("Product", product_id))
    }

    /// Adds `quantity` units, merging into an existing line.
    pub async fn add_to_cart(
        &self,
        cart: &mut Cart,
        product_id: &str,
        quantity: i64,
    ) -> StockResult<CartLine> {
        let product = self.fetch(product_id).await?;
        let line = cart.add(&product, quantity)?;

        debug!(sku = %line.sku, quantity = line.quantity, unit_price = %line.unit_price, "Cart line added");
        Ok(line)
    }

    /// Sets a line's quantity; `quantity <= 0` removes it.
    ///
    /// Returns `None` when the line was removed.
    pub async fn set_cart_quantity(
        &self,
        cart: &mut Cart,
        sku: &str,
        quantity: i64,
    ) -> StockResult<Option<CartLine>> {
        let product_id = cart
            .line(sku)
            .map(|l| l.product_id.clone())
            .ok_or_else(|| StockError::not_found("Cart line", sku))?;

        if quantity <= 0 {
            cart.remove(sku)?;
            debug!(sku = %sku, "Cart line removed");
            return Ok(None);
        }

        let product = self.fetch(&product_id).await?;
        let line = cart.set_quantity(&product, quantity)?;

        debug!(sku = %sku, quantity = quantity, "Cart quantity set");
        Ok(line)
    }

    pub async fn remove_from_cart(&self, cart: &mut Cart, sku: &str) -> StockResult<CartLine> {
        let line = cart.remove(sku)?;
        debug!(sku = %sku, "Cart line removed");
        Ok(line)
    }

    /// Re-resolves every line against current tiers.
    ///
    /// Returns the lines whose unit price changed. Lines whose product has
    /// left the catalog keep their last price and are logged.
    pub async fn refresh_pricing(&self, cart: &mut Cart) -> StockResult<Vec<CartLine>> {
        let mut changed = Vec::new();
        let product_ids: Vec<String> = cart.lines.iter().map(|l| l.product_id.clone()).collect();

        for product_id in product_ids {
            let Some(product) = self.catalog.product_by_id(&product_id).await? else {
                warn!(product_id = %product_id, "Cart line refers to a product no longer in the catalog");
                continue;
            };

            let before = cart.line(&product.sku).map(|l| l.unit_price);
            cart.reprice(&product);

            if let Some(line) = cart.line(&product.sku) {
                if before != Some(line.unit_price) {
                    changed.push(line.clone());
                }
            }
        }

        Ok(changed)
    }

    /// Cart total after re-reading every product's tiers.
    pub async fn cart_total(&self, cart: &mut Cart) -> StockResult<Money> {
        self.refresh_pricing(cart).await?;
        Ok(cart.total())
    }

    /// Adds recognition candidates at or above the confidence threshold.
    ///
    /// Unknown products and low-confidence candidates are reported, not
    /// errors. Candidates suggesting fewer than one unit add one.
    pub async fn add_suggestions(
        &self,
        cart: &mut Cart,
        candidates: &[RecognitionCandidate],
    ) -> StockResult<SuggestionOutcome> {
        let mut outcome = SuggestionOutcome::default();

        for candidate in candidates {
            let skip = |reason| SkippedSuggestion {
                candidate: candidate.clone(),
                reason,
            };

            if validate_confidence(candidate.confidence).is_err()
                || candidate.confidence < self.min_confidence
            {
                outcome.skipped.push(skip(SkipReason::LowConfidence));
                continue;
            }

            let product = match self.catalog.product_by_id(&candidate.product_id).await? {
                Some(p) => Some(p),
                None => self.catalog.product_by_sku(&candidate.sku).await?,
            };
            let Some(product) = product else {
                outcome.skipped.push(skip(SkipReason::UnknownProduct));
                continue;
            };

            match cart.add(&product, candidate.suggested_qty.max(1)) {
                Ok(line) => outcome.added.push(line),
                Err(CoreError::CartTooLarge { .. }) => {
                    outcome.skipped.push(skip(SkipReason::CartFull))
                }
                Err(e) => return Err(e.into()),
            }
        }

        debug!(
            added = outcome.added.len(),
            skipped = outcome.skipped.len(),
            "Recognition suggestions applied"
        );
        Ok(outcome)
    }

    /// Adds one unit of the product matching `input` by SKU, then by name.
    ///
    /// Returns `None` if nothing matches.
    pub async fn add_manual(&self, cart: &mut Cart, input: &str) -> StockResult<Option<CartLine>> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ValidationError::Required {
                field: "product".to_string(),
            }
            .into());
        }

        let product = match self.catalog.product_by_sku(input).await? {
            Some(p) => Some(p),
            None => self.catalog.product_by_name(input).await?,
        };

        match product {
            Some(product) => Ok(Some(cart.add(&product, 1)?)),
            None => {
                debug!(input = %input, "No product matches manual entry");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture, tier};

    fn candidate(product_id: &str, sku: &str, qty: i64, confidence: f64) -> RecognitionCandidate {
        RecognitionCandidate {
            product_id: product_id.to_string(),
            sku: sku.to_string(),
            name: String::new(),
            suggested_qty: qty,
            confidence,
        }
    }

    #[tokio::test]
    async fn test_add_uses_tier_price() {
        let fx = fixture().await;
        let service = fx.db.cart();
        let mut cart = Cart::new("D1");

        let line = service.add_to_cart(&mut cart, &fx.product.id, 6).await.unwrap();
        assert_eq!(line.unit_price.cents(), 9_300);
        assert_eq!(line.subtotal.cents(), 55_800);

        let line = service.add_to_cart(&mut cart, &fx.product.id, 7).await.unwrap();
        assert_eq!(line.quantity, 13);
        assert_eq!(line.unit_price.cents(), 8_500);
        assert_eq!(cart.item_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let fx = fixture().await;
        let mut cart = Cart::new("D1");

        let err = fx.db.cart().add_to_cart(&mut cart, "missing", 1).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_tier_edit_is_seen_on_next_mutation() {
        let fx = fixture().await;
        let service = fx.db.cart();
        let mut cart = Cart::new("D1");
        service.add_to_cart(&mut cart, &fx.product.id, 6).await.unwrap();

        fx.db
            .catalog()
            .replace_tiers(&fx.product.id, &[tier(1, Some(5), 10_000), tier(6, None, 9_000)])
            .await
            .unwrap();

        let total = service.cart_total(&mut cart).await.unwrap();
        assert_eq!(total.cents(), 54_000);

        let line = service.set_cart_quantity(&mut cart, "P", 2).await.unwrap().unwrap();
        assert_eq!(line.unit_price.cents(), 10_000);
    }

    #[tokio::test]
    async fn test_set_zero_removes_and_remove_unknown_fails() {
        let fx = fixture().await;
        let service = fx.db.cart();
        let mut cart = Cart::new("D1");
        service.add_to_cart(&mut cart, &fx.other.id, 3).await.unwrap();

        assert!(service.set_cart_quantity(&mut cart, "AZ-1", 0).await.unwrap().is_none());
        assert!(cart.is_empty());

        let err = service.remove_from_cart(&mut cart, "AZ-1").await.unwrap_err();
        assert!(err.is_not_found());

        let err = service.set_cart_quantity(&mut cart, "AZ-1", 2).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_suggestions_filter_by_confidence_and_catalog() {
        let fx = fixture().await;
        let service = fx.db.cart();
        let mut cart = Cart::new("D1");

        let outcome = service
            .add_suggestions(
                &mut cart,
                &[
                    candidate(&fx.product.id, "P", 2, 0.9),
                    candidate(&fx.other.id, "AZ-1", 1, 0.2),
                    candidate("ghost", "GHOST", 1, 0.95),
                    candidate("stale-id", "AZ-1", 0, 0.6),
                ],
            )
            .await
            .unwrap();

        assert_eq!(outcome.added.len(), 2);
        assert_eq!(
            outcome.skipped.iter().map(|s| s.reason).collect::<Vec<_>>(),
            vec![SkipReason::LowConfidence, SkipReason::UnknownProduct]
        );
        assert_eq!(cart.line("P").unwrap().quantity, 2);
        // found by SKU, at least one unit
        assert_eq!(cart.line("AZ-1").unwrap().quantity, 1);
    }

    #[tokio::test]
    async fn test_manual_entry_by_sku_then_name() {
        let fx = fixture().await;
        let service = fx.db.cart();
        let mut cart = Cart::new("D1");

        service.add_manual(&mut cart, "P").await.unwrap().unwrap();
        let line = service.add_manual(&mut cart, " yerba 1kg ").await.unwrap().unwrap();
        assert_eq!(line.quantity, 2);

        assert!(service.add_manual(&mut cart, "nothing").await.unwrap().is_none());
        assert!(service.add_manual(&mut cart, "  ").await.unwrap_err().is_validation());
    }
}
