//! # Error Types
//!
//! Domain-specific error types for scanix-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  scanix-core errors (this file)                                        │
//! │  ├── CoreError        - Domain rule violations (stock, not found)      │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  scanix-db errors (separate crate)                                     │
//! │  ├── DbError          - Persistence failures (rollback triggered)      │
//! │  └── StockError       - CoreError | DbError, returned by orchestrators │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → StockError → API layer            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Tier overlaps and gaps are NOT errors. They are advisory diagnostics, see
//! [`crate::pricing::TierReport`].

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Every variant is raised before any write is attempted. Callers can rely
/// on "error ⇒ nothing was persisted".
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product, deposit, ticket, transfer or cart line cannot be found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Insufficient stock to complete a sale.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout (P × 12) at D1
    ///      │
    ///      ▼
    /// Check stock: available=10
    ///      │
    ///      ▼
    /// InsufficientStock { sku: "P", available: 10, requested: 12 }
    ///      │
    ///      ▼
    /// UI shows: "Only 10 P in stock"; no ticket, no movements
    /// ```
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// Several lines are short at once (transfers report every shortfall).
    #[error("Insufficient stock for {} item(s): {}", .0.len(), describe_shortfalls(.0))]
    StockShortfalls(Vec<StockShortfall>),

    /// A ledger change would drive a stock entry below zero.
    #[error("Stock for product {product_id} at deposit {deposit_id} would go negative: {current} {delta:+}")]
    NegativeStock {
        product_id: String,
        deposit_id: String,
        current: i64,
        delta: i64,
    },

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Line quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Returns true for the two insufficient-stock variants.
    pub fn is_insufficient_stock(&self) -> bool {
        matches!(
            self,
            CoreError::InsufficientStock { .. } | CoreError::StockShortfalls(_)
        )
    }
}

// =============================================================================
// Stock Shortfall
// =============================================================================

/// One line that cannot be served from the available stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockShortfall {
    pub product_id: String,
    pub sku: String,
    pub available: i64,
    pub requested: i64,
}

fn describe_shortfalls(shortfalls: &[StockShortfall]) -> String {
    shortfalls
        .iter()
        .map(|s| format!("{} (available {}, requested {})", s.sku, s.available, s.requested))
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Raised before any storage access.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A collection that needs at least one element is empty.
    #[error("{field} must contain at least one item")]
    Empty { field: String },

    /// Transfer source and destination are the same deposit.
    #[error("Source and destination deposit must differ (both are {deposit_id})")]
    SameDeposit { deposit_id: String },

    /// Deposit exists but is not active.
    #[error("Deposit {deposit_id} is inactive")]
    InactiveDeposit { deposit_id: String },

    /// An operation would have no effect.
    #[error("{field} produces no change")]
    NoChange { field: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
