//! # scanix-core: Pure Business Logic for the Scanix Stock Ledger
//!
//! This crate holds the pricing, cart and ledger rules as pure functions with
//! zero I/O dependencies. `scanix-db` wraps them with SQLite persistence.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Scanix Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              API / UI layer (outside this workspace)            │   │
//! │  │    add_to_cart, checkout, create_transfer, adjust_stock         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ scanix-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  pricing  │  │   cart    │  │  ledger   │  │ validation│  │   │
//! │  │   │  Tiers    │─►│  Cart     │  │  Delta    │  │   rules   │  │   │
//! │  │   │ Resolver  │  │ CartLine  │  │  SetTo    │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          scanix-db (Stock Ledger + Orchestrators)               │   │
//! │  │     SQLite transactions, movements, tickets, transfers          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Tier, Deposit, Ticket, Transfer, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`pricing`] - Tier Resolver and tier diagnostics
//! - [`cart`] - Cart Accumulator
//! - [`ledger`] - Stock arithmetic shared by every movement
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use scanix_core::money::Money;
//! use scanix_core::pricing::resolve_price;
//! use scanix_core::types::Tier;
//!
//! let tiers = vec![
//!     Tier::new(1, Some(5), Money::from_cents(10_000)),
//!     Tier::new(6, Some(12), Money::from_cents(9_300)),
//!     Tier::new(13, None, Money::from_cents(8_500)),
//! ];
//!
//! // 6 units fall in the second tier
//! let price = resolve_price(Money::from_cents(10_000), &tiers, 6);
//! assert_eq!(price.cents(), 9_300);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod ledger;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLine};
pub use error::{CoreError, CoreResult, StockShortfall, ValidationError};
pub use ledger::LedgerChange;
pub use money::Money;
pub use pricing::{TierDiagnostic, TierReport};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line in cart.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
/// Merging more units into a line clamps at this value instead of failing.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Default minimum recognition confidence for cart suggestions.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;
