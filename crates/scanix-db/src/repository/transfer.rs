//! # Transfer Repository
//!
//! Persistence for inter-deposit transfers and remito numbering.
//!
//! ## Remito Numbers
//! ```text
//! remito_seq = MAX(remito_seq) + 1      read inside the write transaction
//! remito_number = "R-" + zero-padded(remito_seq, 6)
//!
//! R-000001, R-000002, ...   unique (UNIQUE index) and monotonic
//! ```
//! The sequence is allocated under the write gate, so two transfers can
//! never read the same maximum. The UNIQUE index catches anything else.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::debug;

use scanix_core::{Transfer, TransferLine};

use crate::error::DbResult;

#[derive(Debug, sqlx::FromRow)]
struct TransferRow {
    id: String,
    remito_number: String,
    created_at: DateTime<Utc>,
    source_deposit_id: String,
    destination_deposit_id: String,
}

#[derive(Debug, sqlx::FromRow)]
struct TransferLineRow {
    transfer_id: String,
    product_id: String,
    sku: String,
    name: String,
    quantity: i64,
}

impl From<TransferLineRow> for TransferLine {
    fn from(row: TransferLineRow) -> Self {
        TransferLine {
            product_id: row.product_id,
            sku: row.sku,
            name: row.name,
            quantity: row.quantity,
        }
    }
}

/// Formats a remito sequence number.
pub fn format_remito(seq: i64) -> String {
    format!("R-{:06}", seq)
}

/// Read access to transfers.
#[derive(Debug, Clone)]
pub struct TransferRepository {
    pool: SqlitePool,
}

impl TransferRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TransferRepository { pool }
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Transfer>> {
        let row = sqlx::query_as::<_, TransferRow>(
            r#"
            SELECT id, remito_number, created_at, source_deposit_id, destination_deposit_id
            FROM transfers
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let lines = sqlx::query_as::<_, TransferLineRow>(
            r#"
            SELECT transfer_id, product_id, sku, name, quantity
            FROM transfer_lines
            WHERE transfer_id = ?1
            ORDER BY line_no
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(assemble(row, lines.into_iter().map(TransferLine::from).collect())))
    }

    /// Looks a transfer up by its remito number.
    pub async fn by_remito(&self, remito_number: &str) -> DbResult<Option<Transfer>> {
        let id: Option<String> =
            sqlx::query_scalar("SELECT id FROM transfers WHERE remito_number = ?1")
                .bind(remito_number)
                .fetch_optional(&self.pool)
                .await?;

        match id {
            Some(id) => self.get(&id).await,
            None => Ok(None),
        }
    }

    /// Most recent transfers first.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Transfer>> {
        let rows = sqlx::query_as::<_, TransferRow>(
            r#"
            SELECT id, remito_number, created_at, source_deposit_id, destination_deposit_id
            FROM transfers
            ORDER BY remito_seq DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let lines = sqlx::query_as::<_, TransferLineRow>(
            r#"
            SELECT l.transfer_id, l.product_id, l.sku, l.name, l.quantity
            FROM transfer_lines l
            JOIN (SELECT id FROM transfers ORDER BY remito_seq DESC LIMIT ?1) t
              ON t.id = l.transfer_id
            ORDER BY l.transfer_id, l.line_no
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut by_transfer: HashMap<String, Vec<TransferLine>> = HashMap::new();
        for line in lines {
            by_transfer
                .entry(line.transfer_id.clone())
                .or_default()
                .push(TransferLine::from(line));
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let lines = by_transfer.remove(&row.id).unwrap_or_default();
                assemble(row, lines)
            })
            .collect())
    }
}

/// Allocates the next remito number inside the caller's transaction.
///
/// Returns `(sequence, formatted number)`.
pub async fn next_remito_in(conn: &mut SqliteConnection) -> DbResult<(i64, String)> {
    let last: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(remito_seq), 0) FROM transfers")
        .fetch_one(&mut *conn)
        .await?;

    let seq = last + 1;
    Ok((seq, format_remito(seq)))
}

/// Inserts a transfer and its lines inside the caller's transaction.
pub async fn insert_transfer_in(
    conn: &mut SqliteConnection,
    transfer: &Transfer,
    remito_seq: i64,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transfers (
            id, remito_seq, remito_number, created_at,
            source_deposit_id, destination_deposit_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&transfer.id)
    .bind(remito_seq)
    .bind(&transfer.remito_number)
    .bind(transfer.created_at)
    .bind(&transfer.source_deposit_id)
    .bind(&transfer.destination_deposit_id)
    .execute(&mut *conn)
    .await?;

    for (line_no, line) in transfer.lines.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO transfer_lines (transfer_id, line_no, product_id, sku, name, quantity)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&transfer.id)
        .bind(line_no as i64)
        .bind(&line.product_id)
        .bind(&line.sku)
        .bind(&line.name)
        .bind(line.quantity)
        .execute(&mut *conn)
        .await?;
    }

    debug!(
        transfer_id = %transfer.id,
        remito = %transfer.remito_number,
        lines = transfer.lines.len(),
        "Transfer inserted"
    );
    Ok(())
}

fn assemble(row: TransferRow, lines: Vec<TransferLine>) -> Transfer {
    Transfer {
        id: row.id,
        remito_number: row.remito_number,
        created_at: row.created_at,
        source_deposit_id: row.source_deposit_id,
        destination_deposit_id: row.destination_deposit_id,
        lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remito_format() {
        assert_eq!(format_remito(1), "R-000001");
        assert_eq!(format_remito(42), "R-000042");
        assert_eq!(format_remito(1_234_567), "R-1234567");
    }
}
