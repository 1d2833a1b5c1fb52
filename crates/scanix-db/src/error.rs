//! # Database Error Types
//!
//! Error types for persistence and for the operations that combine domain
//! rules with persistence.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          Domain rule (scanix_core)         │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  DbError (this module)               CoreError                         │
//! │       │                                   │                             │
//! │       └───────────────┬───────────────────┘                             │
//! │                       ▼                                                 │
//! │                  StockError ← returned by ledger and orchestrators     │
//! │                       │                                                 │
//! │                       ▼                                                 │
//! │             API layer maps to user-visible messages                    │
//! │                                                                         │
//! │  Any StockError raised after `begin()` drops the open transaction,     │
//! │  which rolls back every write of the operation.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use scanix_core::{CoreError, ValidationError};
use thiserror::Error;

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - `fetch_one` returns no rows
    /// - ID doesn't exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting duplicate SKU
    /// - Duplicate remito number
    /// - Any UNIQUE index violation
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Movement referencing non-existent product_id or deposit_id
    /// - Tier referencing non-existent product
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation.
    ///
    /// ## When This Occurs
    /// - A stock row would go below zero (last line of defence after
    ///   `ledger::apply_change`)
    /// - Unknown movement kind
    #[error("Check constraint violation: {message}")]
    CheckViolation { message: String },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file doesn't exist and can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    ///
    /// ## When This Occurs
    /// - Runtime SQL error
    /// - `database is locked` after the busy timeout expired
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite constraint messages:
                //   "UNIQUE constraint failed: <table>.<column>"
                //   "FOREIGN KEY constraint failed"
                //   "CHECK constraint failed: <expr>"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Stock Error
// =============================================================================

/// Error returned by the ledger and every orchestrated operation.
///
/// `Domain` errors are raised before anything is written (or inside a
/// transaction that is then dropped). `Persistence` errors mean storage
/// failed; the open transaction was rolled back.
#[derive(Debug, Error)]
pub enum StockError {
    #[error(transparent)]
    Domain(#[from] CoreError),

    #[error(transparent)]
    Persistence(#[from] DbError),
}

impl StockError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        StockError::Domain(CoreError::not_found(entity, id))
    }

    /// The domain error, if this is one.
    pub fn as_domain(&self) -> Option<&CoreError> {
        match self {
            StockError::Domain(err) => Some(err),
            StockError::Persistence(_) => None,
        }
    }

    pub fn is_insufficient_stock(&self) -> bool {
        self.as_domain()
            .map_or(false, CoreError::is_insufficient_stock)
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, StockError::Domain(CoreError::Validation(_)))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StockError::Domain(CoreError::NotFound { .. }))
    }
}

impl From<ValidationError> for StockError {
    fn from(err: ValidationError) -> Self {
        StockError::Domain(CoreError::Validation(err))
    }
}

impl From<sqlx::Error> for StockError {
    fn from(err: sqlx::Error) -> Self {
        StockError::Persistence(DbError::from(err))
    }
}

/// Result type for ledger and orchestrator operations.
pub type StockResult<T> = Result<T, StockError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[test]
    fn test_stock_error_classification() {
        let err: StockError = ValidationError::Empty {
            field: "lines".to_string(),
        }
        .into();
        assert!(err.is_validation());
        assert!(!err.is_insufficient_stock());

        let err = StockError::not_found("Deposit", "D9");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Deposit not found: D9");

        let err: StockError = DbError::PoolExhausted.into();
        assert!(err.as_domain().is_none());
    }
}
