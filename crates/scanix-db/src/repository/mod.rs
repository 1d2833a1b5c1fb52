//! # Repository Module
//!
//! SQL access for the Scanix ledger, one module per aggregate.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Repositories                                     │
//! │                                                                         │
//! │  Services (cart, checkout, transfer, adjustment)                       │
//! │       │                                                                 │
//! │       ├── catalog   products, price tiers, deposits     (read-mostly)  │
//! │       ├── stock     StockLedger: movements + projection (sole writer)  │
//! │       ├── ticket    tickets + frozen lines              (insert-once)  │
//! │       └── transfer  transfers + remito sequence         (insert-once)  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Functions ending in `_in` take `&mut SqliteConnection` and run on     │
//! │  the caller's WriteTx. Repository methods use the pool directly.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CatalogRepository`] - Products, tiers and deposits
//! - [`StockLedger`] - Movement log and stock projection
//! - [`TicketRepository`] - Sale tickets
//! - [`TransferRepository`] - Transfers and remitos

pub mod catalog;
pub mod stock;
pub mod ticket;
pub mod transfer;

pub use catalog::CatalogRepository;
pub use stock::{
    ChainBreak, MovementFilter, MovementRequest, ProjectionMismatch, ProjectionReport, StockLedger,
};
pub use ticket::TicketRepository;
pub use transfer::TransferRepository;
