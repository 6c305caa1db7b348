//! Reconciliation writes: batch auto-match, manual match and unmatch
//!
//! Every operation re-reads both sides inside its own IMMEDIATE transaction
//! and only writes when `conciliado = 0` still holds, so two callers can never
//! claim the same record.

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use super::records::{candidate_pool, require_record};
use super::statements::{
    adjust_counters, require_item, require_statement, row_to_item, CounterDelta, ITEM_COLUMNS,
};
use super::{format_datetime, Database, AUTO_MATCH_ACTOR};
use crate::error::{Error, Result};
use crate::models::{
    BatchOutcome, BatchResult, InternalRecord, ItemOutcome, MatchResult, MatchType, Statement,
    StatementItem, SuggestionSet,
};
use crate::patterns::PatternMap;
use crate::scoring::{amount_difference, date_difference, Scorer};
use crate::strategy::{StrategyMatcher, Tolerance};
use crate::suggest::aggregate;

/// Flip a record to reconciled, failing if someone already claimed it
pub(crate) fn claim_record(conn: &Connection, record_id: i64, actor: &str) -> Result<()> {
    let changed = conn.execute(
        "UPDATE internal_records SET conciliado = 1, conciliado_at = ?, conciliado_by = ? WHERE id = ? AND conciliado = 0",
        params![format_datetime(Utc::now()), actor, record_id],
    )?;
    if changed == 0 {
        require_record(conn, record_id)?;
        return Err(Error::AlreadyReconciled(format!(
            "internal record {} is already reconciled",
            record_id
        )));
    }
    Ok(())
}

/// Mark a pending line as matched and return the counter change it implies
///
/// An open suspense flag is closed by the match and remembered, so unmatch
/// can reopen it.
pub(crate) fn mark_item_matched(
    conn: &Connection,
    item: &StatementItem,
    record_id: i64,
    match_type: MatchType,
    confidence: f64,
    actor: &str,
) -> Result<CounterDelta> {
    let clears_suspense = item.is_open_suspense();
    let changed = conn.execute(
        r#"
        UPDATE statement_items
        SET conciliado = 1,
            match_type = ?,
            match_confidence = ?,
            conciliado_at = ?,
            conciliado_by = ?,
            record_id = ?,
            suspense_resuelto = CASE WHEN ? THEN 1 ELSE suspense_resuelto END,
            suspense_cleared_by_match = ?
        WHERE id = ? AND conciliado = 0
        "#,
        params![
            match_type.as_str(),
            confidence.clamp(0.0, 1.0),
            format_datetime(Utc::now()),
            actor,
            record_id,
            clears_suspense,
            clears_suspense,
            item.id
        ],
    )?;
    if changed == 0 {
        return Err(Error::PreconditionFailed(format!(
            "statement item {} changed while matching",
            item.id
        )));
    }
    Ok(CounterDelta::matched(clears_suspense))
}

/// Pending lines a batch pass considers, in date order
fn batch_candidates(conn: &Connection, statement_id: i64) -> Result<Vec<StatementItem>> {
    let sql = format!(
        "SELECT {} FROM statement_items \
         WHERE statement_id = ? AND conciliado = 0 AND NOT (es_suspense = 1 AND suspense_resuelto = 1) \
         ORDER BY date, id",
        ITEM_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(params![statement_id], row_to_item)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(items)
}

fn ensure_same_scope(statement: &Statement, record: &InternalRecord) -> Result<()> {
    if record.company_id != statement.company_id || record.account_id != statement.account_id {
        return Err(Error::InvalidData(format!(
            "internal record {} belongs to a different company or account than statement {}",
            record.id, statement.id
        )));
    }
    Ok(())
}

impl Database {
    /// Run one auto-match pass over a statement
    pub fn auto_match_batch(&self, statement_id: i64) -> Result<BatchResult> {
        self.auto_match_batch_with_patterns(statement_id, None)
    }

    /// Run one auto-match pass, letting learned patterns inform confidence
    ///
    /// Items are processed sequentially inside a single transaction; each
    /// claim is visible to the next item's pool query. Any failure rolls the
    /// whole pass back.
    pub fn auto_match_batch_with_patterns(
        &self,
        statement_id: i64,
        patterns: Option<&PatternMap>,
    ) -> Result<BatchResult> {
        let config = self.config();

        let result = self.with_transaction(|tx| {
            let statement = require_statement(tx, statement_id)?;
            let matcher = StrategyMatcher::new(config, Tolerance::from(&statement), patterns);
            let items = batch_candidates(tx, statement_id)?;

            let mut result = BatchResult {
                statement_id,
                total_items: statement.total_items,
                ..BatchResult::default()
            };

            for item in &items {
                let pool = candidate_pool(tx, statement.company_id, statement.account_id, item.direction)?;
                let outcome = matcher.decide(item, &pool);

                match &outcome {
                    BatchOutcome::Matched {
                        record_id,
                        match_type,
                        confidence,
                    } => {
                        claim_record(tx, *record_id, AUTO_MATCH_ACTOR)?;
                        let delta = mark_item_matched(
                            tx,
                            item,
                            *record_id,
                            *match_type,
                            *confidence,
                            AUTO_MATCH_ACTOR,
                        )?;
                        adjust_counters(tx, statement_id, delta)?;
                        result.matched += 1;
                    }
                    BatchOutcome::Suspense => {
                        if !item.es_suspense {
                            tx.execute(
                                "UPDATE statement_items SET es_suspense = 1 WHERE id = ? AND conciliado = 0",
                                params![item.id],
                            )?;
                            adjust_counters(tx, statement_id, CounterDelta::suspense(1))?;
                        }
                        result.suspense += 1;
                    }
                    BatchOutcome::Ambiguous { .. } => {}
                }

                debug!(item_id = item.id, outcome = ?outcome, "Batch item processed");
                result.items.push(ItemOutcome {
                    item_id: item.id,
                    outcome,
                });
            }

            result.unmatched = items.len() as i64 - result.matched;
            Ok(result)
        })?;

        info!(
            statement_id,
            attempted = result.items.len(),
            matched = result.matched,
            suspense = result.suspense,
            "Auto-match pass complete"
        );
        Ok(result)
    }

    /// Manually link a line to a record
    ///
    /// Fails with `AlreadyReconciled` when either side is already claimed.
    pub fn manual_match(&self, item_id: i64, record_id: i64, user_id: &str) -> Result<MatchResult> {
        let result = self.with_transaction(|tx| {
            let item = require_item(tx, item_id)?;
            if item.conciliado {
                return Err(Error::AlreadyReconciled(format!(
                    "statement item {} is already reconciled",
                    item_id
                )));
            }
            let record = require_record(tx, record_id)?;
            if record.conciliado {
                return Err(Error::AlreadyReconciled(format!(
                    "internal record {} is already reconciled",
                    record_id
                )));
            }
            let statement = require_statement(tx, item.statement_id)?;
            ensure_same_scope(&statement, &record)?;
            if !record.direction.accepts(item.direction) {
                return Err(Error::InvalidData(format!(
                    "internal record {} ({}) cannot settle a {} bank line",
                    record_id, record.direction, item.direction
                )));
            }

            claim_record(tx, record_id, user_id)?;
            let delta = mark_item_matched(tx, &item, record_id, MatchType::Manual, 1.0, user_id)?;
            adjust_counters(tx, item.statement_id, delta)?;

            let (amount_diff, _) = amount_difference(item.amount, record.amount);
            Ok(MatchResult {
                candidate_id: record_id,
                score: 100.0,
                amount_difference: amount_diff,
                date_difference: date_difference(&item, &record),
                match_type: MatchType::Manual,
                reasoning: format!("manual match by {}", user_id),
            })
        })?;

        info!(item_id, record_id, user = user_id, "Manual match applied");
        Ok(result)
    }

    /// Undo a match, restoring both sides and the counters exactly
    pub fn unmatch(&self, item_id: i64) -> Result<()> {
        self.with_transaction(|tx| {
            let item = require_item(tx, item_id)?;
            if !item.conciliado {
                return Err(Error::NotReconciled(format!(
                    "statement item {} is not reconciled",
                    item_id
                )));
            }

            let changed = tx.execute(
                r#"
                UPDATE statement_items
                SET conciliado = 0,
                    match_type = NULL,
                    match_confidence = NULL,
                    conciliado_at = NULL,
                    conciliado_by = NULL,
                    record_id = NULL,
                    suspense_resuelto = CASE WHEN suspense_cleared_by_match = 1 THEN 0 ELSE suspense_resuelto END,
                    suspense_cleared_by_match = 0
                WHERE id = ? AND conciliado = 1
                "#,
                params![item_id],
            )?;
            if changed == 0 {
                return Err(Error::PreconditionFailed(format!(
                    "statement item {} changed while unmatching",
                    item_id
                )));
            }

            if let Some(record_id) = item.record_id {
                tx.execute(
                    "UPDATE internal_records SET conciliado = 0, conciliado_at = NULL, conciliado_by = NULL WHERE id = ?",
                    params![record_id],
                )?;
            }

            adjust_counters(
                tx,
                item.statement_id,
                CounterDelta::unmatched(item.suspense_cleared_by_match),
            )
        })?;

        info!(item_id, "Match removed");
        Ok(())
    }

    /// Ranked proposals for one pending line
    pub fn suggest_matches(&self, item_id: i64, patterns: Option<&PatternMap>) -> Result<SuggestionSet> {
        let conn = self.conn()?;
        let item = require_item(&conn, item_id)?;
        if item.conciliado {
            return Err(Error::AlreadyReconciled(format!(
                "statement item {} is already reconciled",
                item_id
            )));
        }
        let statement = require_statement(&conn, item.statement_id)?;
        let pool = candidate_pool(&conn, statement.company_id, statement.account_id, item.direction)?;

        let ranked = Scorer::new(self.config()).rank(&item, &pool, patterns);
        Ok(aggregate(self.config(), item_id, ranked))
    }

    /// Rebuild the learned-pattern map from confirmed matches of a company
    ///
    /// Matches are replayed in the order they were made, so the latest
    /// resolution of a description wins.
    pub fn learned_patterns(&self, company_id: i64) -> Result<PatternMap> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT i.description, r.counterparty_id
            FROM statement_items i
            JOIN statements s ON s.id = i.statement_id
            JOIN internal_records r ON r.id = i.record_id
            WHERE s.company_id = ? AND i.conciliado = 1 AND r.counterparty_id IS NOT NULL
            ORDER BY i.conciliado_at, i.id
            "#,
        )?;
        let rows = stmt
            .query_map(params![company_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut patterns = PatternMap::new();
        for (description, entity_id) in rows {
            patterns.learn(&description, entity_id);
        }
        debug!(company_id, patterns = patterns.len(), "Rebuilt learned patterns");
        Ok(patterns)
    }
}
