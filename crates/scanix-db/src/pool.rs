//! # Database Pool Management
//!
//! Connection pool creation, configuration, and the write gate that
//! serializes every ledger write.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  LedgerConfig::load() ──► DbConfig ← Configure pool settings           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │                           │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │                           │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │  (max_connections)        │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │       ├── Reads (catalog, stock, tickets) ──► any free connection      │
//! │       │                                                                 │
//! │       └── Writes ──► WriteGate (one at a time) ──► BEGIN … COMMIT      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! SQLite WAL (Write-Ahead Logging) mode is enabled for:
//! - Better concurrent read performance
//! - Readers don't block writers
//! - Writers don't block readers
//! - Better crash recovery
//!
//! ## Write Serialization
//! SQLite allows a single writer per database file. A deferred transaction
//! that reads a stock row and later upgrades to a write lock can fail with
//! `SQLITE_BUSY` if another connection wrote in between. [`WriteGate`] makes
//! every ledger write in this process wait its turn before `BEGIN`, so the
//! read-modify-write of a stock row never races within the process. Across
//! processes the busy timeout applies and a failed upgrade surfaces as a
//! persistence error with the whole transaction rolled back.

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions,
    SqliteSynchronous,
};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use scanix_core::DEFAULT_MIN_CONFIDENCE;

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::catalog::CatalogRepository;
use crate::repository::stock::StockLedger;
use crate::service::adjustment::AdjustmentService;
use crate::service::cart::CartService;
use crate::service::checkout::CheckoutService;
use crate::service::transfer::TransferService;

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/scanix.db")
///     .max_connections(5)
///     .busy_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Connection timeout duration.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// How long SQLite waits on a locked database.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,

    /// Confidence threshold handed to the cart service.
    pub min_confidence: f64,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// ## Arguments
    /// * `path` - Path to the SQLite database file. Will be created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the SQLite busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Sets the recognition confidence threshold.
    pub fn min_confidence(mut self, confidence: f64) -> Self {
        self.min_confidence = confidence;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let config = DbConfig::in_memory();
    /// let db = Database::new(config).await?;
    /// // Database is isolated, perfect for tests
    /// ```
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1, // In-memory requires single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

// =============================================================================
// Write Gate
// =============================================================================

/// Process-wide lock taken before any ledger write transaction begins.
///
/// Cloning shares the same lock.
#[derive(Debug, Clone, Default)]
pub struct WriteGate(Arc<Mutex<()>>);

impl WriteGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for the gate, then opens a transaction.
    pub async fn begin(&self, pool: &SqlitePool) -> DbResult<WriteTx> {
        let guard = self.0.clone().lock_owned().await;
        let tx = pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(WriteTx { tx, _guard: guard })
    }
}

/// An open write transaction holding the [`WriteGate`].
///
/// Dropping it without [`WriteTx::commit`] rolls back every statement and
/// then releases the gate.
pub struct WriteTx {
    // Field order matters: the transaction must roll back before the
    // gate is released.
    tx: Transaction<'static, Sqlite>,
    _guard: OwnedMutexGuard<()>,
}

impl WriteTx {
    /// The connection all reads and writes of the operation must use.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> DbResult<()> {
        let WriteTx { tx, _guard } = self;
        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))
    }
}

impl std::fmt::Debug for WriteTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteTx").finish_non_exhaustive()
    }
}

// =============================================================================
// Database
// =============================================================================

/// Main database handle providing repository and service access.
///
/// ## Handles
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  db.catalog()      → CatalogRepository   products, tiers, deposits     │
/// │  db.ledger()       → StockLedger         movements + stock projection  │
/// │  db.cart()         → CartService         re-fetch-on-use pricing       │
/// │  db.checkout()     → CheckoutService     tickets + venta movements     │
/// │  db.transfers()    → TransferService     remitos + paired movements    │
/// │  db.adjustments()  → AdjustmentService   ajuste / entrada / salida     │
/// │                                                                         │
/// │  Every handle shares the same pool and the same WriteGate.             │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    /// The SQLite connection pool.
    pool: SqlitePool,

    gate: WriteGate,

    min_confidence: f64,
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// ## What This Does
    /// 1. Creates the database file if it doesn't exist
    /// 2. Configures SQLite:
    ///    - WAL mode for concurrent reads
    ///    - NORMAL synchronous (balance of safety/speed)
    ///    - Foreign keys enabled
    ///    - Busy timeout for cross-process writers
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing database connection"
        );

        // sqlite://path creates file if not exists
        let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());

        let connect_options = SqliteConnectOptions::from_str(&connect_url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // SQLite has them disabled by default
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout)
            .create_if_missing(true);

        debug!("Connection options configured");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database {
            pool,
            gate: WriteGate::new(),
            min_confidence: config.min_confidence,
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Runs database migrations.
    ///
    /// - Automatically called by `new()` if `run_migrations` is true
    /// - Idempotent: safe to run multiple times
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the write gate shared by all services of this database.
    pub fn gate(&self) -> &WriteGate {
        &self.gate
    }

    /// Returns the catalog repository.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let product = db.catalog().product_by_sku("YERBA-1KG").await?;
    /// ```
    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.pool.clone())
    }

    /// Returns the stock ledger.
    pub fn ledger(&self) -> StockLedger {
        StockLedger::new(self.pool.clone(), self.gate.clone())
    }

    /// Returns the cart service.
    pub fn cart(&self) -> CartService {
        CartService::new(self.pool.clone(), self.min_confidence)
    }

    /// Returns the checkout orchestrator.
    pub fn checkout(&self) -> CheckoutService {
        CheckoutService::new(self.pool.clone(), self.gate.clone())
    }

    /// Returns the transfer orchestrator.
    pub fn transfers(&self) -> TransferService {
        TransferService::new(self.pool.clone(), self.gate.clone())
    }

    /// Returns the stock adjustment service.
    pub fn adjustments(&self) -> AdjustmentService {
        AdjustmentService::new(self.ledger())
    }

    /// Closes the database connection pool.
    ///
    /// ## Note
    /// After calling close, all repository operations will fail.
    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }

    /// Checks if the database is healthy (can execute queries).
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let config = DbConfig::in_memory();
        let db = Database::new(config).await.unwrap();

        assert!(db.health_check().await);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2)
            .busy_timeout(Duration::from_millis(250));

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_dropped_write_tx_rolls_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        {
            let mut tx = db.gate().begin(db.pool()).await.unwrap();
            sqlx::query("INSERT INTO deposits (id, name, address, active, created_at) VALUES ('D1', 'Central', NULL, 1, '2026-01-01T00:00:00Z')")
                .execute(tx.conn())
                .await
                .unwrap();
            // dropped without commit
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deposits")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
