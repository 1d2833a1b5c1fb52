//! # Service Module
//!
//! Operations that combine catalog reads, domain rules and ledger writes.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Orchestrated Writes                                  │
//! │                                                                         │
//! │  checkout / create_transfer / adjust_stock                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate input shape          (no storage touched yet)                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  WriteGate::begin ──► WriteTx                                          │
//! │       │                                                                 │
//! │       ├── deposits active? products exist?                             │
//! │       ├── availability (aggregated per product)                        │
//! │       ├── header rows (ticket / transfer)                              │
//! │       └── stock::record_movement_in  × N                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  commit  (any error before this drops the WriteTx → rollback)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The cart service never writes: it re-reads products and tiers from the
//! catalog on every call.

pub mod adjustment;
pub mod cart;
pub mod checkout;
pub mod transfer;

pub use adjustment::{AdjustmentChange, AdjustmentRequest, AdjustmentService};
pub use cart::{CartService, SkipReason, SkippedSuggestion, SuggestionOutcome};
pub use checkout::{CheckoutLine, CheckoutRequest, CheckoutService};
pub use transfer::{TransferItem, TransferRequest, TransferService};
