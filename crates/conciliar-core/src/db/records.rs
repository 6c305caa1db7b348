//! Internal record operations

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::record_filter::RecordFilter;
use super::{format_datetime, parse_date, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Direction, InternalRecord, NewInternalRecord, RecordDirection, RecordSource};

pub(crate) const RECORD_COLUMNS: &str = "r.id, r.company_id, r.account_id, r.date, r.amount, \
    r.direction, r.category, r.document_number, r.counterparty_id, r.counterparty_name, \
    r.description, r.source, r.conciliado, r.conciliado_at, r.conciliado_by, r.created_at";

pub(crate) fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<InternalRecord> {
    let date_str: String = row.get(3)?;
    let direction_str: String = row.get(5)?;
    let category_str: String = row.get(6)?;
    let source_str: String = row.get(11)?;
    let conciliado_at_str: Option<String> = row.get(13)?;
    let created_at_str: String = row.get(15)?;
    Ok(InternalRecord {
        id: row.get(0)?,
        company_id: row.get(1)?,
        account_id: row.get(2)?,
        date: parse_date(&date_str),
        amount: row.get(4)?,
        direction: direction_str.parse().unwrap_or(RecordDirection::Any),
        category: category_str.parse().unwrap_or_default(),
        document_number: row.get(7)?,
        counterparty_id: row.get(8)?,
        counterparty_name: row.get(9)?,
        description: row.get(10)?,
        source: source_str.parse().unwrap_or_default(),
        conciliado: row.get::<_, i64>(12)? != 0,
        conciliado_at: conciliado_at_str.as_deref().map(parse_datetime),
        conciliado_by: row.get(14)?,
        created_at: parse_datetime(&created_at_str),
    })
}

pub(crate) fn fetch_record(conn: &Connection, id: i64) -> Result<Option<InternalRecord>> {
    let sql = format!("SELECT {} FROM internal_records r WHERE r.id = ?", RECORD_COLUMNS);
    Ok(conn.query_row(&sql, params![id], row_to_record).optional()?)
}

pub(crate) fn require_record(conn: &Connection, id: i64) -> Result<InternalRecord> {
    fetch_record(conn, id)?.ok_or_else(|| Error::NotFound(format!("internal record {}", id)))
}

/// Run a record filter for one account
pub(crate) fn query_unmatched(
    conn: &Connection,
    account_id: i64,
    filter: RecordFilter<'_>,
) -> Result<Vec<InternalRecord>> {
    let built = filter.build(account_id);
    let sql = format!(
        "SELECT {} FROM internal_records r {} ORDER BY r.date, r.id {}",
        RECORD_COLUMNS, built.where_clause, built.limit_clause
    );
    let params_refs: Vec<&dyn rusqlite::ToSql> = built.params.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map(params_refs.as_slice(), row_to_record)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(records)
}

/// Live candidate pool for a bank line: unreconciled, same tenant and
/// account, direction-compatible
pub(crate) fn candidate_pool(
    conn: &Connection,
    company_id: i64,
    account_id: i64,
    direction: Direction,
) -> Result<Vec<InternalRecord>> {
    let filter = RecordFilter::new()
        .company_id(Some(company_id))
        .direction(Some(direction));
    query_unmatched(conn, account_id, filter)
}

/// Insert a record; `source` and reconciliation state are set by the caller
pub(crate) fn insert_record(
    conn: &Connection,
    record: &NewInternalRecord,
    source: RecordSource,
    reconciled_by: Option<&str>,
) -> Result<i64> {
    if !record.amount.is_finite() {
        return Err(Error::InvalidData(format!(
            "record amount must be finite, got {}",
            record.amount
        )));
    }

    let conciliado_at = reconciled_by.map(|_| format_datetime(Utc::now()));
    conn.execute(
        r#"
        INSERT INTO internal_records (company_id, account_id, date, amount, direction, category,
            document_number, counterparty_id, counterparty_name, description, source,
            conciliado, conciliado_at, conciliado_by)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            record.company_id,
            record.account_id,
            record.date.to_string(),
            record.amount.abs(),
            record.direction.as_str(),
            record.category.as_str(),
            record.document_number.as_deref().map(str::trim).filter(|d| !d.is_empty()),
            record.counterparty_id,
            record.counterparty_name,
            record.description,
            source.as_str(),
            reconciled_by.is_some(),
            conciliado_at,
            reconciled_by,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl Database {
    /// Add an accounting-side record (amount stored positive)
    pub fn add_internal_record(&self, record: &NewInternalRecord) -> Result<i64> {
        let conn = self.conn()?;
        let id = insert_record(&conn, record, RecordSource::Accounting, None)?;
        debug!(record_id = id, account_id = record.account_id, "Added internal record");
        Ok(id)
    }

    /// Add many records in one transaction
    pub fn add_internal_records(&self, records: &[NewInternalRecord]) -> Result<Vec<i64>> {
        let ids = self.with_transaction(|tx| {
            records
                .iter()
                .map(|r| insert_record(tx, r, RecordSource::Accounting, None))
                .collect::<Result<Vec<i64>>>()
        })?;
        info!(added = ids.len(), "Added internal records");
        Ok(ids)
    }

    /// Get an internal record by ID
    pub fn get_record(&self, id: i64) -> Result<Option<InternalRecord>> {
        let conn = self.conn()?;
        fetch_record(&conn, id)
    }

    /// Unreconciled records of an account, for manual-match screens
    pub fn list_unmatched_records(
        &self,
        account_id: i64,
        filter: RecordFilter<'_>,
    ) -> Result<Vec<InternalRecord>> {
        let conn = self.conn()?;
        query_unmatched(&conn, account_id, filter)
    }
}
