//! Statement and statement item operations

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::{parse_date, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{
    Direction, ItemFilter, NewStatement, NewStatementLine, Statement, StatementItem,
};

pub(crate) const STATEMENT_COLUMNS: &str = "id, company_id, account_id, period_label, \
    amount_tolerance_pct, date_tolerance_days, status, total_items, matched_count, \
    pending_count, suspense_count, created_at";

pub(crate) const ITEM_COLUMNS: &str = "id, statement_id, date, amount, direction, reference, \
    description, conciliado, match_type, match_confidence, conciliado_at, conciliado_by, \
    record_id, es_suspense, suspense_resuelto, suspense_notas, suspense_resuelto_by, \
    suspense_resuelto_at, suspense_cleared_by_match";

/// Signed change to a statement's rolling counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CounterDelta {
    pub total: i64,
    pub matched: i64,
    pub pending: i64,
    pub suspense: i64,
}

impl CounterDelta {
    /// A pending line became matched
    pub fn matched(cleared_suspense: bool) -> Self {
        Self {
            total: 0,
            matched: 1,
            pending: -1,
            suspense: -(cleared_suspense as i64),
        }
    }

    /// A matched line returned to pending
    pub fn unmatched(restores_suspense: bool) -> Self {
        Self {
            total: 0,
            matched: -1,
            pending: 1,
            suspense: restores_suspense as i64,
        }
    }

    pub fn suspense(delta: i64) -> Self {
        Self {
            suspense: delta,
            ..Self::default()
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

pub(crate) fn row_to_statement(row: &rusqlite::Row) -> rusqlite::Result<Statement> {
    let status_str: String = row.get(6)?;
    let created_at_str: String = row.get(11)?;
    Ok(Statement {
        id: row.get(0)?,
        company_id: row.get(1)?,
        account_id: row.get(2)?,
        period_label: row.get(3)?,
        amount_tolerance_pct: row.get(4)?,
        date_tolerance_days: row.get(5)?,
        status: status_str.parse().unwrap_or_default(),
        total_items: row.get(7)?,
        matched_count: row.get(8)?,
        pending_count: row.get(9)?,
        suspense_count: row.get(10)?,
        created_at: parse_datetime(&created_at_str),
    })
}

pub(crate) fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<StatementItem> {
    let date_str: String = row.get(2)?;
    let amount: f64 = row.get(3)?;
    let direction_str: String = row.get(4)?;
    let match_type_str: Option<String> = row.get(8)?;
    let conciliado_at_str: Option<String> = row.get(10)?;
    let resuelto_at_str: Option<String> = row.get(17)?;
    Ok(StatementItem {
        id: row.get(0)?,
        statement_id: row.get(1)?,
        date: parse_date(&date_str),
        amount,
        direction: direction_str
            .parse()
            .unwrap_or_else(|_| Direction::from_amount(amount)),
        reference: row.get(5)?,
        description: row.get(6)?,
        conciliado: row.get::<_, i64>(7)? != 0,
        match_type: match_type_str.and_then(|s| s.parse().ok()),
        match_confidence: row.get(9)?,
        conciliado_at: conciliado_at_str.as_deref().map(parse_datetime),
        conciliado_by: row.get(11)?,
        record_id: row.get(12)?,
        es_suspense: row.get::<_, i64>(13)? != 0,
        suspense_resuelto: row.get::<_, i64>(14)? != 0,
        suspense_notas: row.get(15)?,
        suspense_resuelto_by: row.get(16)?,
        suspense_resuelto_at: resuelto_at_str.as_deref().map(parse_datetime),
        suspense_cleared_by_match: row.get::<_, i64>(18)? != 0,
    })
}

pub(crate) fn fetch_statement(conn: &Connection, id: i64) -> Result<Option<Statement>> {
    let sql = format!("SELECT {} FROM statements WHERE id = ?", STATEMENT_COLUMNS);
    Ok(conn.query_row(&sql, params![id], row_to_statement).optional()?)
}

pub(crate) fn require_statement(conn: &Connection, id: i64) -> Result<Statement> {
    fetch_statement(conn, id)?.ok_or_else(|| Error::NotFound(format!("statement {}", id)))
}

pub(crate) fn fetch_item(conn: &Connection, id: i64) -> Result<Option<StatementItem>> {
    let sql = format!("SELECT {} FROM statement_items WHERE id = ?", ITEM_COLUMNS);
    Ok(conn.query_row(&sql, params![id], row_to_item).optional()?)
}

pub(crate) fn require_item(conn: &Connection, id: i64) -> Result<StatementItem> {
    fetch_item(conn, id)?.ok_or_else(|| Error::NotFound(format!("statement item {}", id)))
}

/// Apply a counter change and recompute status from the new counters
pub(crate) fn adjust_counters(conn: &Connection, statement_id: i64, delta: CounterDelta) -> Result<()> {
    if delta.is_zero() {
        return Ok(());
    }

    let changed = conn.execute(
        r#"
        UPDATE statements
        SET total_items = total_items + ?,
            matched_count = matched_count + ?,
            pending_count = pending_count + ?,
            suspense_count = suspense_count + ?
        WHERE id = ?
        "#,
        params![
            delta.total,
            delta.matched,
            delta.pending,
            delta.suspense,
            statement_id
        ],
    )?;
    if changed == 0 {
        return Err(Error::NotFound(format!("statement {}", statement_id)));
    }

    conn.execute(
        r#"
        UPDATE statements
        SET status = CASE
            WHEN total_items > 0 AND matched_count = total_items THEN 'COMPLETADA'
            ELSE 'EN_PROCESO'
        END
        WHERE id = ?
        "#,
        params![statement_id],
    )?;

    Ok(())
}

impl Database {
    /// Create a statement; tolerances default from the matching config
    pub fn create_statement(&self, new: &NewStatement) -> Result<i64> {
        let amount_tolerance_pct = new
            .amount_tolerance_pct
            .unwrap_or(self.config().default_amount_tolerance_pct);
        let date_tolerance_days = new
            .date_tolerance_days
            .unwrap_or(self.config().default_date_tolerance_days);

        if !amount_tolerance_pct.is_finite() || amount_tolerance_pct < 0.0 {
            return Err(Error::InvalidData(format!(
                "amount tolerance must be a non-negative percentage, got {}",
                amount_tolerance_pct
            )));
        }
        if date_tolerance_days < 0 {
            return Err(Error::InvalidData(format!(
                "date tolerance cannot be negative, got {}",
                date_tolerance_days
            )));
        }
        if new.period_label.trim().is_empty() {
            return Err(Error::InvalidData("period label is required".into()));
        }

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO statements (company_id, account_id, period_label, amount_tolerance_pct, date_tolerance_days)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                new.company_id,
                new.account_id,
                new.period_label.trim(),
                amount_tolerance_pct,
                date_tolerance_days
            ],
        )?;

        let id = conn.last_insert_rowid();
        info!(statement_id = id, account_id = new.account_id, "Created statement");
        Ok(id)
    }

    /// Append normalized bank lines to a statement
    ///
    /// All lines go in or none do. Counters and status move with them.
    pub fn add_statement_items(&self, statement_id: i64, lines: &[NewStatementLine]) -> Result<Vec<i64>> {
        // Validate before taking the write lock
        let amounts = lines
            .iter()
            .map(|line| {
                let amount = line.signed_amount()?;
                if !amount.is_finite() {
                    return Err(Error::InvalidData(format!(
                        "line dated {} has a non-finite amount",
                        line.date
                    )));
                }
                Ok(amount)
            })
            .collect::<Result<Vec<f64>>>()?;

        let ids = self.with_transaction(|tx| {
            require_statement(tx, statement_id)?;

            let mut ids = Vec::with_capacity(lines.len());
            {
                let mut stmt = tx.prepare(
                    r#"
                    INSERT INTO statement_items (statement_id, date, amount, direction, reference, description)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )?;
                for (line, amount) in lines.iter().zip(&amounts) {
                    stmt.execute(params![
                        statement_id,
                        line.date.to_string(),
                        amount,
                        Direction::from_amount(*amount).as_str(),
                        line.reference.as_deref().map(str::trim).filter(|r| !r.is_empty()),
                        line.description.trim(),
                    ])?;
                    ids.push(tx.last_insert_rowid());
                }
            }

            let added = ids.len() as i64;
            adjust_counters(
                tx,
                statement_id,
                CounterDelta {
                    total: added,
                    pending: added,
                    ..CounterDelta::default()
                },
            )?;
            Ok(ids)
        })?;

        info!(statement_id, added = ids.len(), "Added statement items");
        Ok(ids)
    }

    /// Get a statement by ID
    pub fn get_statement(&self, id: i64) -> Result<Option<Statement>> {
        let conn = self.conn()?;
        fetch_statement(&conn, id)
    }

    /// List statements, newest first, optionally for one company
    pub fn list_statements(&self, company_id: Option<i64>) -> Result<Vec<Statement>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM statements WHERE (?1 IS NULL OR company_id = ?1) ORDER BY id DESC",
            STATEMENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let statements = stmt
            .query_map(params![company_id], row_to_statement)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(statements)
    }

    /// Get a statement item by ID
    pub fn get_item(&self, id: i64) -> Result<Option<StatementItem>> {
        let conn = self.conn()?;
        fetch_item(&conn, id)
    }

    /// List a statement's items in date order
    pub fn list_items(&self, statement_id: i64, filter: ItemFilter) -> Result<Vec<StatementItem>> {
        let conn = self.conn()?;
        require_statement(&conn, statement_id)?;

        let condition = match filter {
            ItemFilter::All => "",
            ItemFilter::Pending => "AND conciliado = 0",
            ItemFilter::Matched => "AND conciliado = 1",
            ItemFilter::Suspense => "AND conciliado = 0 AND es_suspense = 1",
        };
        let sql = format!(
            "SELECT {} FROM statement_items WHERE statement_id = ? {} ORDER BY date, id",
            ITEM_COLUMNS, condition
        );
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params![statement_id], row_to_item)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }
}
