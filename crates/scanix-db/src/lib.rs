//! # scanix-db: Stock Ledger Persistence for Scanix
//!
//! This crate stores the product catalog, the per-deposit stock ledger,
//! tickets and transfers in SQLite (via sqlx), and hosts the services that
//! orchestrate them.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Scanix Data Flow                                 │
//! │                                                                         │
//! │  API layer (out of this workspace)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     scanix-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Services    │    │  Repositories │    │  Database    │  │   │
//! │  │   │               │    │               │    │  (pool.rs)   │  │   │
//! │  │   │ CartService   │───►│ Catalog       │───►│ SqlitePool   │  │   │
//! │  │   │ Checkout      │    │ StockLedger   │    │ WriteGate    │  │   │
//! │  │   │ Transfer      │    │ Ticket        │    │ Migrations   │  │   │
//! │  │   │ Adjustment    │    │ Transfer      │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │            │                                                    │   │
//! │  │            ▼                                                    │   │
//! │  │   scanix-core (pricing, cart, ledger arithmetic, validation)   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - `ledger.toml` + `SCANIX_*` environment configuration
//! - [`pool`] - Connection pool, write gate, handle accessors
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - `DbError` and `StockError`
//! - [`repository`] - Catalog, stock ledger, tickets, transfers
//! - [`service`] - Cart, checkout, transfer and adjustment operations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scanix_db::{Database, LedgerConfig};
//!
//! let config = LedgerConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?;
//!
//! let mut cart = Cart::new("D1");
//! db.cart().add_to_cart(&mut cart, "p-yerba", 6).await?;
//! let ticket = db.checkout().checkout_cart(&cart).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::LedgerConfig;
pub use error::{DbError, DbResult, StockError, StockResult};
pub use pool::{Database, DbConfig, WriteGate, WriteTx};

// Repository re-exports for convenience
pub use repository::catalog::CatalogRepository;
pub use repository::stock::{MovementFilter, MovementRequest, ProjectionReport, StockLedger};
pub use repository::ticket::TicketRepository;
pub use repository::transfer::TransferRepository;

pub use service::adjustment::{AdjustmentChange, AdjustmentRequest, AdjustmentService};
pub use service::cart::{CartService, SuggestionOutcome};
pub use service::checkout::{CheckoutLine, CheckoutRequest, CheckoutService};
pub use service::transfer::{TransferItem, TransferRequest, TransferService};
