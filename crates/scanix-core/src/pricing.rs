//! # Tier Resolver
//!
//! Maps (base price, tiers, quantity) to a unit price, and reports on the
//! shape of a tier set.
//!
//! ## Resolution Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  resolve_price(base, tiers, qty)                                        │
//! │                                                                         │
//! │   1. sort tiers by min_qty (stable, stored order is NOT trusted)        │
//! │   2. first tier with  min_qty ≤ qty ≤ max_qty  wins                     │
//! │      (max_qty = None is unbounded)                                      │
//! │   3. nothing matched → base price                                       │
//! │                                                                         │
//! │   tiers: [1-5 $100] [6-12 $93] [13+ $85]                                │
//! │                                                                         │
//! │   qty  1..=5  → $100                                                    │
//! │   qty  6..=12 → $93                                                     │
//! │   qty 13..    → $85                                                     │
//! │                                                                         │
//! │   overlapping [1-10 $50] [5-20 $40], qty 7 → $50 (lowest min wins)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Overlaps and gaps never make resolution fail. [`diagnose_tiers`] reports
//! them so that catalog editors can fix the data.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::Tier;

// =============================================================================
// Resolution
// =============================================================================

/// Returns the unit price for `qty` units.
///
/// Quantities below 1 never match a well-formed tier and therefore resolve
/// to the base price.
///
/// ```rust
/// use scanix_core::money::Money;
/// use scanix_core::pricing::resolve_price;
/// use scanix_core::types::Tier;
///
/// let base = Money::from_cents(10_000);
/// assert_eq!(resolve_price(base, &[], 3), base);
///
/// let tiers = [Tier::new(13, None, Money::from_cents(8_500))];
/// assert_eq!(resolve_price(base, &tiers, 20).cents(), 8_500);
/// ```
pub fn resolve_price(base: Money, tiers: &[Tier], qty: i64) -> Money {
    let mut sorted: Vec<&Tier> = tiers.iter().collect();
    // sort_by_key is stable: equal min_qty keeps stored order
    sorted.sort_by_key(|t| t.min_qty);

    sorted
        .into_iter()
        .find(|t| t.contains(qty))
        .map(|t| t.unit_price)
        .unwrap_or(base)
}

/// Unit price times quantity.
#[inline]
pub fn compute_subtotal(unit_price: Money, qty: i64) -> Money {
    unit_price.multiply_quantity(qty)
}

/// Sum of subtotals. Exact, since money is integer cents.
pub fn compute_total<'a, I>(subtotals: I) -> Money
where
    I: IntoIterator<Item = &'a Money>,
{
    subtotals.into_iter().sum()
}

// =============================================================================
// Diagnostics
// =============================================================================

/// A single finding about a tier set. `index` refers to the position in
/// the list sorted by `min_qty`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TierDiagnostic {
    /// `min_qty` is below 1.
    MinBelowOne { index: usize, min_qty: i64 },
    /// Unit price is zero or negative.
    NonPositivePrice { index: usize },
    /// `max_qty` is lower than `min_qty`, the tier can never match.
    MaxBelowMin { index: usize, min_qty: i64, max_qty: i64 },
    /// Two tiers cover the same quantity. The lower `min_qty` wins.
    Overlap { first: usize, second: usize },
    /// Quantities between two tiers fall back to the base price.
    Gap { from_qty: i64, to_qty: i64 },
    /// The highest tier has an upper bound; larger orders use the base price.
    BoundedLastTier { max_qty: i64 },
}

/// Result of [`diagnose_tiers`].
///
/// `errors` mark tiers that are malformed; `warnings` are advisory only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TierReport {
    pub errors: Vec<TierDiagnostic>,
    pub warnings: Vec<TierDiagnostic>,
}

impl TierReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// Inspects a tier set without changing resolution behaviour.
pub fn diagnose_tiers(tiers: &[Tier]) -> TierReport {
    let mut sorted: Vec<&Tier> = tiers.iter().collect();
    sorted.sort_by_key(|t| t.min_qty);

    let mut report = TierReport::default();

    for (index, tier) in sorted.iter().enumerate() {
        if tier.min_qty < 1 {
            report.errors.push(TierDiagnostic::MinBelowOne {
                index,
                min_qty: tier.min_qty,
            });
        }
        if !tier.unit_price.is_positive() {
            report.errors.push(TierDiagnostic::NonPositivePrice { index });
        }
        if let Some(max_qty) = tier.max_qty {
            if max_qty < tier.min_qty {
                report.errors.push(TierDiagnostic::MaxBelowMin {
                    index,
                    min_qty: tier.min_qty,
                    max_qty,
                });
            }
        }
    }

    for (index, pair) in sorted.windows(2).enumerate() {
        let (current, next) = (pair[0], pair[1]);
        match current.max_qty {
            // unbounded tier swallows everything after it
            None => report.warnings.push(TierDiagnostic::Overlap {
                first: index,
                second: index + 1,
            }),
            Some(max_qty) if next.min_qty <= max_qty => {
                report.warnings.push(TierDiagnostic::Overlap {
                    first: index,
                    second: index + 1,
                })
            }
            Some(max_qty) if next.min_qty > max_qty + 1 => {
                report.warnings.push(TierDiagnostic::Gap {
                    from_qty: max_qty + 1,
                    to_qty: next.min_qty - 1,
                })
            }
            Some(_) => {}
        }
    }

    if let Some(max_qty) = sorted.last().and_then(|t| t.max_qty) {
        report
            .warnings
            .push(TierDiagnostic::BoundedLastTier { max_qty });
    }

    report
}

// =============================================================================
// Unit Tests
// =============================================================================
