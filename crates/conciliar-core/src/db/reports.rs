//! Read-only summaries recomputed from item rows
//!
//! These never look at the statement's rolling counters, which makes them
//! usable as an oracle for them.

use rusqlite::{params, Connection};
use tracing::warn;

use super::statements::require_statement;
use super::Database;
use crate::error::Result;
use crate::models::{CounterCheck, MatchType, StatementStatus, StoredCounters, SummaryCounts};

fn summarize(conn: &Connection, statement_id: i64) -> Result<SummaryCounts> {
    require_statement(conn, statement_id)?;

    let mut summary = conn.query_row(
        r#"
        SELECT
            COUNT(*),
            COALESCE(SUM(CASE WHEN conciliado = 1 THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN conciliado = 0 THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN conciliado = 0 AND es_suspense = 1 AND suspense_resuelto = 0 THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN conciliado = 0 AND es_suspense = 1 AND suspense_resuelto = 1 THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN conciliado = 1 THEN ABS(amount) ELSE 0 END), 0.0),
            COALESCE(SUM(CASE WHEN conciliado = 0 THEN ABS(amount) ELSE 0 END), 0.0)
        FROM statement_items
        WHERE statement_id = ?
        "#,
        params![statement_id],
        |row| {
            Ok(SummaryCounts {
                statement_id,
                total_items: row.get(0)?,
                matched: row.get(1)?,
                pending: row.get(2)?,
                suspense: row.get(3)?,
                suspense_resolved: row.get(4)?,
                by_match_type: Default::default(),
                matched_amount: row.get(5)?,
                pending_amount: row.get(6)?,
            })
        },
    )?;

    let mut stmt = conn.prepare(
        r#"
        SELECT match_type, COUNT(*)
        FROM statement_items
        WHERE statement_id = ? AND conciliado = 1 AND match_type IS NOT NULL
        GROUP BY match_type
        "#,
    )?;
    let rows = stmt
        .query_map(params![statement_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for (match_type, count) in rows {
        if let Ok(mt) = match_type.parse::<MatchType>() {
            summary.by_match_type.add(mt, count);
        }
    }

    Ok(summary)
}

impl Database {
    /// Derive counts and a per-match-type breakdown directly from items
    pub fn recompute_summary(&self, statement_id: i64) -> Result<SummaryCounts> {
        let conn = self.conn()?;
        summarize(&conn, statement_id)
    }

    /// Compare stored counters and status against a fresh recount
    pub fn verify_counters(&self, statement_id: i64) -> Result<CounterCheck> {
        // One read transaction so both sides come from the same snapshot
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let statement = require_statement(&tx, statement_id)?;
        let recomputed = summarize(&tx, statement_id)?;
        tx.commit()?;

        let stored = StoredCounters::from(&statement);
        let expected = StoredCounters {
            total_items: recomputed.total_items,
            matched: recomputed.matched,
            pending: recomputed.pending,
            suspense: recomputed.suspense,
        };
        let expected_status = StatementStatus::from_counts(recomputed.matched, recomputed.total_items);
        let consistent = stored == expected && statement.status == expected_status;

        if !consistent {
            warn!(
                statement_id,
                ?stored,
                ?expected,
                status = %statement.status,
                expected_status = %expected_status,
                "Statement counters diverge from item rows"
            );
        }

        Ok(CounterCheck {
            statement_id,
            stored,
            recomputed,
            consistent,
        })
    }
}
