//! # Ticket Repository
//!
//! Persistence for sale tickets. A ticket is written once by checkout and
//! never updated: its lines freeze the SKU, name and unit price in effect
//! at sale time.
//!
//! ## Tables
//! ```text
//! tickets       (id, created_at, deposit_id, total_cents)
//! ticket_lines  (ticket_id, line_no, product_id, sku, name,
//!                quantity, unit_price_cents, subtotal_cents)
//! ```

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::debug;

use scanix_core::{Money, Ticket, TicketLine};

use crate::error::DbResult;

#[derive(Debug, sqlx::FromRow)]
struct TicketRow {
    id: String,
    created_at: DateTime<Utc>,
    deposit_id: String,
    total_cents: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct TicketLineRow {
    ticket_id: String,
    product_id: String,
    sku: String,
    name: String,
    quantity: i64,
    unit_price_cents: i64,
    subtotal_cents: i64,
}

impl From<TicketLineRow> for TicketLine {
    fn from(row: TicketLineRow) -> Self {
        TicketLine {
            product_id: row.product_id,
            sku: row.sku,
            name: row.name,
            quantity: row.quantity,
            unit_price: Money::from_cents(row.unit_price_cents),
            subtotal: Money::from_cents(row.subtotal_cents),
        }
    }
}

/// Read access to tickets. Writes go through [`insert_ticket_in`].
#[derive(Debug, Clone)]
pub struct TicketRepository {
    pool: SqlitePool,
}

impl TicketRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TicketRepository { pool }
    }

    /// Gets a ticket with its lines in sale order.
    pub async fn get(&self, id: &str) -> DbResult<Option<Ticket>> {
        let row = sqlx::query_as::<_, TicketRow>(
            "SELECT id, created_at, deposit_id, total_cents FROM tickets WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let lines = sqlx::query_as::<_, TicketLineRow>(
            r#"
            SELECT ticket_id, product_id, sku, name, quantity, unit_price_cents, subtotal_cents
            FROM ticket_lines
            WHERE ticket_id = ?1
            ORDER BY line_no
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(assemble(row, lines.into_iter().map(TicketLine::from).collect())))
    }

    /// Most recent tickets first.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Ticket>> {
        debug!(limit = limit, "Listing tickets");

        let rows = sqlx::query_as::<_, TicketRow>(
            r#"
            SELECT id, created_at, deposit_id, total_cents
            FROM tickets
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        // one query for all lines of the page
        let lines = sqlx::query_as::<_, TicketLineRow>(
            r#"
            SELECT l.ticket_id, l.product_id, l.sku, l.name, l.quantity,
                   l.unit_price_cents, l.subtotal_cents
            FROM ticket_lines l
            JOIN (SELECT id FROM tickets ORDER BY created_at DESC, rowid DESC LIMIT ?1) t
              ON t.id = l.ticket_id
            ORDER BY l.ticket_id, l.line_no
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(group_lines(rows, lines))
    }

    /// Tickets created in `[from, to]`, optionally for one deposit, newest
    /// first.
    pub async fn between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        deposit_id: Option<&str>,
    ) -> DbResult<Vec<Ticket>> {
        debug!(%from, %to, deposit_id = ?deposit_id, "Listing tickets in range");

        let rows = sqlx::query_as::<_, TicketRow>(
            r#"
            SELECT id, created_at, deposit_id, total_cents
            FROM tickets
            WHERE created_at >= ?1 AND created_at <= ?2
              AND (?3 IS NULL OR deposit_id = ?3)
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(from)
        .bind(to)
        .bind(deposit_id)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let lines = sqlx::query_as::<_, TicketLineRow>(
            r#"
            SELECT l.ticket_id, l.product_id, l.sku, l.name, l.quantity,
                   l.unit_price_cents, l.subtotal_cents
            FROM ticket_lines l
            JOIN tickets t ON t.id = l.ticket_id
            WHERE t.created_at >= ?1 AND t.created_at <= ?2
              AND (?3 IS NULL OR t.deposit_id = ?3)
            ORDER BY l.ticket_id, l.line_no
            "#,
        )
        .bind(from)
        .bind(to)
        .bind(deposit_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(group_lines(rows, lines))
    }
}

/// Inserts a ticket and its lines inside the caller's transaction.
pub async fn insert_ticket_in(conn: &mut SqliteConnection, ticket: &Ticket) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO tickets (id, created_at, deposit_id, total_cents) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(&ticket.id)
    .bind(ticket.created_at)
    .bind(&ticket.deposit_id)
    .bind(ticket.total.cents())
    .execute(&mut *conn)
    .await?;

    for (line_no, line) in ticket.lines.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO ticket_lines (
                ticket_id, line_no, product_id, sku, name,
                quantity, unit_price_cents, subtotal_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&ticket.id)
        .bind(line_no as i64)
        .bind(&line.product_id)
        .bind(&line.sku)
        .bind(&line.name)
        .bind(line.quantity)
        .bind(line.unit_price.cents())
        .bind(line.subtotal.cents())
        .execute(&mut *conn)
        .await?;
    }

    debug!(ticket_id = %ticket.id, lines = ticket.lines.len(), "Ticket inserted");
    Ok(())
}

/// Attaches lines (ordered by ticket, then line number) to their tickets,
/// keeping the order of `rows`.
fn group_lines(rows: Vec<TicketRow>, lines: Vec<TicketLineRow>) -> Vec<Ticket> {
    let mut by_ticket: HashMap<String, Vec<TicketLine>> = HashMap::new();
    for line in lines {
        by_ticket
            .entry(line.ticket_id.clone())
            .or_default()
            .push(TicketLine::from(line));
    }

    rows.into_iter()
        .map(|row| {
            let lines = by_ticket.remove(&row.id).unwrap_or_default();
            assemble(row, lines)
        })
        .collect()
}

fn assemble(row: TicketRow, lines: Vec<TicketLine>) -> Ticket {
    Ticket {
        id: row.id,
        created_at: row.created_at,
        deposit_id: row.deposit_id,
        lines,
        total: Money::from_cents(row.total_cents),
    }
}
