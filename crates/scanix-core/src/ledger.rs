//! # Ledger Arithmetic
//!
//! The single rule every stock movement goes through:
//!
//! ```text
//!   before ──► apply_change(before, change) ──► (delta, after)
//!
//!   Delta(d)   : after = before + d       (relative, sales/transfers/ajuste)
//!   SetTo(q)   : after = q, d = q - before (absolute ajuste)
//!
//!   after < 0  ──► NegativeStock, nothing is written
//! ```
//!
//! The persistence layer reads `before` from the live stock row inside its
//! write transaction, so `delta` for an absolute set is always derived from
//! the committed value.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

/// How a movement changes the stored quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum LedgerChange {
    /// Relative change, may be negative.
    Delta(i64),
    /// Absolute target quantity.
    SetTo(i64),
}

/// Outcome of applying a change to a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub before: i64,
    pub delta: i64,
    pub after: i64,
}

/// Computes the delta and resulting quantity for `change` applied on
/// `before`. The ids are only used to build the error.
pub fn apply_change(
    product_id: &str,
    deposit_id: &str,
    before: i64,
    change: LedgerChange,
) -> CoreResult<Applied> {
    let (delta, after) = match change {
        LedgerChange::Delta(delta) => (delta, before.checked_add(delta)),
        LedgerChange::SetTo(target) => (target.wrapping_sub(before), Some(target)),
    };

    match after {
        Some(after) if after >= 0 => Ok(Applied {
            before,
            delta,
            after,
        }),
        _ => Err(CoreError::NegativeStock {
            product_id: product_id.to_string(),
            deposit_id: deposit_id.to_string(),
            current: before,
            delta,
        }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_relative_change() {
        let applied = apply_change("p", "d", 10, LedgerChange::Delta(-4)).unwrap();
        assert_eq!(
            applied,
            Applied {
                before: 10,
                delta: -4,
                after: 6
            }
        );
    }

    #[test]
    fn test_absolute_change_derives_delta() {
        let applied = apply_change("p", "d", 10, LedgerChange::SetTo(3)).unwrap();
        assert_eq!(applied.delta, -7);
        assert_eq!(applied.after, 3);

        let applied = apply_change("p", "d", 0, LedgerChange::SetTo(25)).unwrap();
        assert_eq!(applied.delta, 25);
    }

    #[test]
    fn test_rejects_negative_result() {
        let err = apply_change("p", "d", 2, LedgerChange::Delta(-5)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::NegativeStock {
                current: 2,
                delta: -5,
                ..
            }
        ));
        assert!(apply_change("p", "d", 2, LedgerChange::SetTo(-1)).is_err());
    }

    #[test]
    fn test_overflow_is_rejected() {
        assert!(apply_change("p", "d", i64::MAX, LedgerChange::Delta(1)).is_err());
    }

    proptest! {
        /// Replaying any sequence keeps quantity ≥ 0 and equal to
        /// initial + Σ accepted deltas.
        #[test]
        fn prop_sequence_never_goes_negative(
            initial in 0i64..100,
            deltas in prop::collection::vec(-30i64..30, 0..40),
        ) {
            let mut qty = initial;
            let mut accepted = 0i64;

            for d in deltas {
                match apply_change("p", "d", qty, LedgerChange::Delta(d)) {
                    Ok(applied) => {
                        prop_assert_eq!(applied.after, applied.before + applied.delta);
                        qty = applied.after;
                        accepted += d;
                    }
                    Err(_) => prop_assert!(qty + d < 0),
                }
                prop_assert!(qty >= 0);
            }

            prop_assert_eq!(qty, initial + accepted);
        }
    }
}
