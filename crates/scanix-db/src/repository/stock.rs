//! # Stock Ledger
//!
//! Append-only movement log plus the `stock_entries` projection.
//!
//! ## Recording a Movement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 record_movement (one write transaction)                 │
//! │                                                                         │
//! │  WriteGate ──► BEGIN                                                   │
//! │                  │                                                      │
//! │                  ▼                                                      │
//! │  SELECT quantity FROM stock_entries        before (0 if no row)        │
//! │                  │                                                      │
//! │                  ▼                                                      │
//! │  ledger::apply_change(before, change)      after < 0 → NegativeStock   │
//! │                  │                                                      │
//! │                  ▼                                                      │
//! │  UPSERT stock_entries                      guarded: row must still     │
//! │    SET quantity = after                    hold `before`               │
//! │                  │                                                      │
//! │                  ▼                                                      │
//! │  INSERT stock_movements                    before, delta, after        │
//! │                  │                                                      │
//! │                  ▼                                                      │
//! │  COMMIT ──► release WriteGate                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Orchestrators that touch several keys call [`record_movement_in`] on
//! their own [`WriteTx`](crate::pool::WriteTx) so every movement of the
//! operation commits or rolls back together.
//!
//! ## Event-sourced Projection
//! `stock_movements` is authoritative. [`StockLedger::verify_projection`]
//! replays the log and compares it with `stock_entries`;
//! [`StockLedger::rebuild_projection`] recomputes `stock_entries` from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use scanix_core::ledger::apply_change;
use scanix_core::validation::validate_deposit_active;
use scanix_core::{
    LedgerChange, MovementKind, StockEntry, StockMovement, ValidationError,
};

use crate::error::{DbError, DbResult, StockError, StockResult};
use crate::pool::WriteGate;
use crate::repository::catalog::{deposit_by_id_in, product_by_id_in};

// =============================================================================
// Request / Report Types
// =============================================================================

/// A single stock change to record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementRequest {
    pub deposit_id: String,
    pub product_id: String,
    pub kind: MovementKind,
    pub change: LedgerChange,
    pub reason: String,
    pub reference: Option<String>,
    pub actor: Option<String>,
}

/// Audit query over the movement log. Every field is optional; `from` and
/// `to` are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementFilter {
    pub deposit_id: Option<String>,
    pub product_id: Option<String>,
    pub kind: Option<MovementKind>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// `stock_entries` disagrees with the sum of the movement log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionMismatch {
    pub product_id: String,
    pub deposit_id: String,
    pub stored: i64,
    pub replayed: i64,
}

/// A movement whose `quantity_before` is not the previous movement's
/// `quantity_after` for the same key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainBreak {
    pub movement_id: String,
    pub expected_before: i64,
    pub actual_before: i64,
}

/// Result of [`StockLedger::verify_projection`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionReport {
    pub keys_checked: usize,
    pub mismatches: Vec<ProjectionMismatch>,
    pub chain_breaks: Vec<ChainBreak>,
}

impl ProjectionReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty() && self.chain_breaks.is_empty()
    }
}

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct MovementRow {
    id: String,
    created_at: DateTime<Utc>,
    deposit_id: String,
    product_id: String,
    kind: MovementKind,
    delta: i64,
    quantity_before: i64,
    quantity_after: i64,
    reason: String,
    reference: Option<String>,
    actor: Option<String>,
}

impl From<MovementRow> for StockMovement {
    fn from(row: MovementRow) -> Self {
        StockMovement {
            id: row.id,
            created_at: row.created_at,
            deposit_id: row.deposit_id,
            product_id: row.product_id,
            kind: row.kind,
            delta: row.delta,
            quantity_before: row.quantity_before,
            quantity_after: row.quantity_after,
            reason: row.reason,
            reference: row.reference,
            actor: row.actor,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EntryRow {
    product_id: String,
    deposit_id: String,
    quantity: i64,
    updated_at: DateTime<Utc>,
}

impl From<EntryRow> for StockEntry {
    fn from(row: EntryRow) -> Self {
        StockEntry {
            product_id: row.product_id,
            deposit_id: row.deposit_id,
            quantity: row.quantity,
            updated_at: row.updated_at,
        }
    }
}

const MOVEMENT_COLUMNS: &str = "id, created_at, deposit_id, product_id, kind, delta, \
     quantity_before, quantity_after, reason, reference, actor";

// =============================================================================
// Stock Ledger
// =============================================================================

/// The single writer of `stock_entries` and `stock_movements`.
#[derive(Debug, Clone)]
pub struct StockLedger {
    pool: SqlitePool,
    gate: WriteGate,
}

impl StockLedger {
    pub fn new(pool: SqlitePool, gate: WriteGate) -> Self {
        StockLedger { pool, gate }
    }

    /// Current quantity of a product at a deposit (0 if never stocked).
    pub async fn current_quantity(&self, product_id: &str, deposit_id: &str) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        quantity_in(&mut conn, product_id, deposit_id).await
    }

    /// Records one movement in its own write transaction.
    ///
    /// Checks that the product exists and the deposit exists and is active.
    pub async fn record_movement(&self, request: MovementRequest) -> StockResult<StockMovement> {
        let mut tx = self.gate.begin(&self.pool).await?;

        let deposit = deposit_by_id_in(tx.conn(), &request.deposit_id)
            .await?
            .ok_or_else(|| StockError::not_found("Deposit", request.deposit_id.as_str()))?;
        validate_deposit_active(&deposit)?;

        if product_by_id_in(tx.conn(), &request.product_id)
            .await?
            .is_none()
        {
            return Err(StockError::not_found("Product", request.product_id.as_str()));
        }

        let movement = record_movement_in(tx.conn(), &request).await?;
        tx.commit().await?;

        info!(
            movement_id = %movement.id,
            kind = %movement.kind,
            product_id = %movement.product_id,
            deposit_id = %movement.deposit_id,
            delta = movement.delta,
            after = movement.quantity_after,
            "Stock movement committed"
        );
        Ok(movement)
    }

    /// Movements of one key, oldest first.
    pub async fn movements_for(
        &self,
        product_id: &str,
        deposit_id: &str,
    ) -> DbResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {} FROM stock_movements WHERE product_id = ?1 AND deposit_id = ?2 ORDER BY seq",
            MOVEMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, MovementRow>(&sql)
            .bind(product_id)
            .bind(deposit_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(StockMovement::from).collect())
    }

    /// Every movement written by a ticket or transfer, oldest first.
    pub async fn movements_by_reference(&self, reference: &str) -> DbResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {} FROM stock_movements WHERE reference = ?1 ORDER BY seq",
            MOVEMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, MovementRow>(&sql)
            .bind(reference)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(StockMovement::from).collect())
    }

    /// Movements matching `filter`, newest first.
    ///
    /// Timestamps are compared as stored text; sqlx always writes
    /// `DateTime<Utc>` as RFC 3339 with a `+00:00` offset and 0, 3, 6 or 9
    /// fractional digits, which sorts chronologically.
    pub async fn movements(&self, filter: &MovementFilter) -> StockResult<Vec<StockMovement>> {
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from > to {
                return Err(ValidationError::InvalidFormat {
                    field: "from".to_string(),
                    reason: "must not be after 'to'".to_string(),
                }
                .into());
            }
        }

        debug!(filter = ?filter, "Querying movement log");

        let sql = format!(
            r#"
            SELECT {}
            FROM stock_movements
            WHERE (?1 IS NULL OR deposit_id = ?1)
              AND (?2 IS NULL OR product_id = ?2)
              AND (?3 IS NULL OR kind = ?3)
              AND (?4 IS NULL OR created_at >= ?4)
              AND (?5 IS NULL OR created_at <= ?5)
            ORDER BY seq DESC
            "#,
            MOVEMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, MovementRow>(&sql)
            .bind(filter.deposit_id.as_deref())
            .bind(filter.product_id.as_deref())
            .bind(filter.kind)
            .bind(filter.from)
            .bind(filter.to)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(StockMovement::from).collect())
    }

    /// Stock entries of a deposit, including zero-quantity rows.
    pub async fn stock_for_deposit(&self, deposit_id: &str) -> DbResult<Vec<StockEntry>> {
        let rows = sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT product_id, deposit_id, quantity, updated_at
            FROM stock_entries
            WHERE deposit_id = ?1
            ORDER BY product_id
            "#,
        )
        .bind(deposit_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(StockEntry::from).collect())
    }

    /// Sum of a product's quantity over every deposit.
    pub async fn total_across_deposits(&self, product_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0) FROM stock_entries WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    /// Replays the movement log and compares it with `stock_entries`.
    pub async fn verify_projection(&self) -> DbResult<ProjectionReport> {
        let mut conn = self.pool.acquire().await?;
        let report = verify_in(&mut conn).await?;

        if report.is_consistent() {
            debug!(keys = report.keys_checked, "Stock projection consistent");
        } else {
            warn!(
                mismatches = report.mismatches.len(),
                chain_breaks = report.chain_breaks.len(),
                "Stock projection inconsistent with movement log"
            );
        }

        Ok(report)
    }

    /// Recomputes `stock_entries` from the movement log.
    ///
    /// Runs under the write gate; returns the number of entries written.
    pub async fn rebuild_projection(&self) -> StockResult<u64> {
        let mut tx = self.gate.begin(&self.pool).await?;

        sqlx::query("DELETE FROM stock_entries")
            .execute(tx.conn())
            .await?;

        // updated_at comes from the last movement in log order, not from
        // comparing timestamp text
        let result = sqlx::query(
            r#"
            INSERT INTO stock_entries (product_id, deposit_id, quantity, updated_at)
            SELECT m.product_id, m.deposit_id, k.total, m.created_at
            FROM (
                SELECT SUM(delta) AS total, MAX(seq) AS last_seq
                FROM stock_movements
                GROUP BY product_id, deposit_id
            ) k
            JOIN stock_movements m ON m.seq = k.last_seq
            "#,
        )
        .execute(tx.conn())
        .await?;

        tx.commit().await?;

        info!(entries = result.rows_affected(), "Stock projection rebuilt from movement log");
        Ok(result.rows_affected())
    }
}

// =============================================================================
// Connection-level Operations
// =============================================================================

/// Reads the live quantity on the given connection.
pub async fn quantity_in(
    conn: &mut SqliteConnection,
    product_id: &str,
    deposit_id: &str,
) -> DbResult<i64> {
    let quantity: Option<i64> = sqlx::query_scalar(
        "SELECT quantity FROM stock_entries WHERE product_id = ?1 AND deposit_id = ?2",
    )
    .bind(product_id)
    .bind(deposit_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(quantity.unwrap_or(0))
}

/// Records a movement inside the caller's write transaction.
///
/// Existence and activity checks are the caller's job; this function
/// enforces the arithmetic: no negative result and no empty movement.
pub async fn record_movement_in(
    conn: &mut SqliteConnection,
    request: &MovementRequest,
) -> StockResult<StockMovement> {
    let before = quantity_in(conn, &request.product_id, &request.deposit_id).await?;
    let applied = apply_change(
        &request.product_id,
        &request.deposit_id,
        before,
        request.change,
    )?;

    if applied.delta == 0 {
        return Err(ValidationError::NoChange {
            field: "quantity".to_string(),
        }
        .into());
    }

    let now = Utc::now();

    // Guarded upsert: only applies if the row still holds `before`
    let result = sqlx::query(
        r#"
        INSERT INTO stock_entries (product_id, deposit_id, quantity, updated_at)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT (product_id, deposit_id) DO UPDATE SET
            quantity = excluded.quantity,
            updated_at = excluded.updated_at
        WHERE stock_entries.quantity = ?5 AND excluded.quantity >= 0
        "#,
    )
    .bind(&request.product_id)
    .bind(&request.deposit_id)
    .bind(applied.after)
    .bind(now)
    .bind(before)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::TransactionFailed(format!(
            "stock entry {}/{} changed during update",
            request.product_id, request.deposit_id
        ))
        .into());
    }

    let movement = StockMovement {
        id: Uuid::new_v4().to_string(),
        created_at: now,
        deposit_id: request.deposit_id.clone(),
        product_id: request.product_id.clone(),
        kind: request.kind,
        delta: applied.delta,
        quantity_before: applied.before,
        quantity_after: applied.after,
        reason: request.reason.clone(),
        reference: request.reference.clone(),
        actor: request.actor.clone(),
    };

    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, created_at, deposit_id, product_id, kind, delta,
            quantity_before, quantity_after, reason, reference, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&movement.id)
    .bind(movement.created_at)
    .bind(&movement.deposit_id)
    .bind(&movement.product_id)
    .bind(movement.kind)
    .bind(movement.delta)
    .bind(movement.quantity_before)
    .bind(movement.quantity_after)
    .bind(&movement.reason)
    .bind(&movement.reference)
    .bind(&movement.actor)
    .execute(&mut *conn)
    .await?;

    debug!(
        product_id = %movement.product_id,
        deposit_id = %movement.deposit_id,
        kind = %movement.kind,
        before = movement.quantity_before,
        after = movement.quantity_after,
        "Movement recorded"
    );

    Ok(movement)
}

async fn verify_in(conn: &mut SqliteConnection) -> DbResult<ProjectionReport> {
    #[derive(sqlx::FromRow)]
    struct ReplayRow {
        id: String,
        product_id: String,
        deposit_id: String,
        delta: i64,
        quantity_before: i64,
        quantity_after: i64,
    }

    let rows = sqlx::query_as::<_, ReplayRow>(
        r#"
        SELECT id, product_id, deposit_id, delta, quantity_before, quantity_after
        FROM stock_movements
        ORDER BY seq
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut report = ProjectionReport::default();

    // key → (replayed sum, last quantity_after)
    let mut replayed: BTreeMap<(String, String), (i64, i64)> = BTreeMap::new();
    for row in rows {
        let state = replayed
            .entry((row.product_id, row.deposit_id))
            .or_insert((0, 0));

        if row.quantity_before != state.1 {
            report.chain_breaks.push(ChainBreak {
                movement_id: row.id,
                expected_before: state.1,
                actual_before: row.quantity_before,
            });
        }

        state.0 += row.delta;
        state.1 = row.quantity_after;
    }

    let entries = sqlx::query_as::<_, EntryRow>(
        "SELECT product_id, deposit_id, quantity, updated_at FROM stock_entries",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut stored: BTreeMap<(String, String), i64> = entries
        .into_iter()
        .map(|e| ((e.product_id, e.deposit_id), e.quantity))
        .collect();

    for ((product_id, deposit_id), (sum, _)) in replayed {
        let stored_qty = stored
            .remove(&(product_id.clone(), deposit_id.clone()))
            .unwrap_or(0);
        report.keys_checked += 1;
        if stored_qty != sum {
            report.mismatches.push(ProjectionMismatch {
                product_id,
                deposit_id,
                stored: stored_qty,
                replayed: sum,
            });
        }
    }

    // entries with no movements at all
    for ((product_id, deposit_id), stored_qty) in stored {
        report.keys_checked += 1;
        if stored_qty != 0 {
            report.mismatches.push(ProjectionMismatch {
                product_id,
                deposit_id,
                stored: stored_qty,
                replayed: 0,
            });
        }
    }

    Ok(report)
}

// =============================================================================
// Unit Tests
// =============================================================================
