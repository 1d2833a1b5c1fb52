//! # Validation Module
//!
//! Input validation for ledger and pricing operations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Orchestrator entry (scanix-db services)                      │
//! │  ├── THIS MODULE: shape checks (quantities, reasons, deposits)         │
//! │  └── Runs before the write transaction begins                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Inside the write transaction                                 │
//! │  ├── Deposit active, product exists, stock available                   │
//! │  └── ledger::apply_change rejects negative results                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (quantity >= 0), CHECK (kind IN (...))                      │
//! │  ├── UNIQUE (product_id, deposit_id), UNIQUE remito_number             │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use scanix_core::validation::{validate_sku, validate_quantity};
//!
//! validate_sku("YERBA-1KG").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::Deposit;
use crate::MAX_ITEM_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted movement reason.
pub const MAX_REASON_LEN: usize = 500;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - Must be between 1 and 50 characters
/// - Should contain only alphanumeric characters, hyphens, underscores
///
/// ## Example
/// ```rust
/// use scanix_core::validation::validate_sku;
///
/// assert!(validate_sku("COKE-330").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("A".repeat(100).as_str()).is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a product or deposit name (1-200 characters after trimming).
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates the free-text reason attached to an adjustment.
///
/// Returns the trimmed reason.
pub fn validate_reason(reason: &str) -> ValidationResult<String> {
    let reason = reason.trim();

    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }

    if reason.len() > MAX_REASON_LEN {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: MAX_REASON_LEN,
        });
    }

    Ok(reason.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Checkout / Transfer line                                               │
/// │                                                                         │
/// │  Line arrives with quantity: 5                                          │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(5) ← THIS FUNCTION                                  │
/// │       │                                                                 │
/// │       ├── qty <= 0? → Error: "quantity must be positive"               │
/// │       │                                                                 │
/// │       ├── qty > 999? → Error: "quantity must be between 1 and 999"     │
/// │       │                                                                 │
/// │       └── OK → availability check                                      │
/// │                                                                         │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a quantity moved in or out of a deposit outside the cart.
/// Only positivity is required; receipts can exceed the cart line cap.
pub fn validate_movement_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    Ok(())
}

/// Validates an absolute stock target (must be ≥ 0).
pub fn validate_stock_target(target: i64) -> ValidationResult<()> {
    if target < 0 {
        return Err(ValidationError::OutOfRange {
            field: "target quantity".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a base or tier price. Prices must be strictly positive.
///
/// ## Example
/// ```rust
/// use scanix_core::money::Money;
/// use scanix_core::validation::validate_price;
///
/// assert!(validate_price(Money::from_cents(1099)).is_ok());
/// assert!(validate_price(Money::zero()).is_err());
/// ```
pub fn validate_price(price: Money) -> ValidationResult<()> {
    if !price.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "price".to_string(),
        });
    }

    Ok(())
}

/// Validates a recognition confidence threshold.
pub fn validate_confidence(confidence: f64) -> ValidationResult<()> {
    if !(0.0..=1.0).contains(&confidence) {
        return Err(ValidationError::InvalidFormat {
            field: "confidence".to_string(),
            reason: "must be between 0.0 and 1.0".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Rejects empty line lists.
pub fn validate_not_empty<T>(field: &str, items: &[T]) -> ValidationResult<()> {
    if items.is_empty() {
        return Err(ValidationError::Empty {
            field: field.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Deposit Validators
// =============================================================================

/// Source and destination of a transfer must differ.
pub fn validate_transfer_route(source: &str, destination: &str) -> ValidationResult<()> {
    if source.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "source deposit".to_string(),
        });
    }

    if destination.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "destination deposit".to_string(),
        });
    }

    if source == destination {
        return Err(ValidationError::SameDeposit {
            deposit_id: source.to_string(),
        });
    }

    Ok(())
}

/// Stock can only move through active deposits.
pub fn validate_deposit_active(deposit: &Deposit) -> ValidationResult<()> {
    if !deposit.active {
        return Err(ValidationError::InactiveDeposit {
            deposit_id: deposit.id.clone(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
