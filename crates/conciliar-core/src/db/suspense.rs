//! Suspense handling: administrative resolution and materialization
//!
//! A suspense line has no plausible counterpart. It is either accepted as-is
//! (stays unreconciled, leaves the suspense counter) or turned into a new
//! internal record that it is immediately matched against.

use chrono::Utc;
use rusqlite::params;
use tracing::info;

use super::matching::mark_item_matched;
use super::records::insert_record;
use super::statements::{adjust_counters, require_item, require_statement, CounterDelta};
use super::{format_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{MatchType, NewInternalRecord, RecordCategory, RecordDirection, RecordSource, StatementItem};
use crate::text::{fold, tokens};

/// Keyword stems per category, checked in order
const CATEGORY_KEYWORDS: &[(RecordCategory, &[&str])] = &[
    (
        RecordCategory::Fee,
        &["comision", "commission", "fee", "cargo", "mantenimiento", "manejo"],
    ),
    (RecordCategory::Interest, &["interes", "interest", "rendimiento"]),
    (
        RecordCategory::Tax,
        &["iva", "impuesto", "tax", "retencion", "itf", "gmf"],
    ),
    (RecordCategory::Transfer, &["transferencia", "transfer", "traspaso"]),
];

/// Guess a record category from bank text
///
/// Short keywords ("iva", "fee") must match a whole token; longer ones also
/// match as a prefix ("comisiones", "intereses").
pub fn classify_description(text: &str) -> RecordCategory {
    let folded = fold(text);
    let words: Vec<&str> = tokens(&folded).collect();

    for (category, keywords) in CATEGORY_KEYWORDS {
        let hit = keywords.iter().any(|kw| {
            words
                .iter()
                .any(|w| *w == *kw || (kw.len() >= 5 && w.starts_with(kw)))
        });
        if hit {
            return *category;
        }
    }
    RecordCategory::Adjustment
}

fn ensure_suspense(item: &StatementItem) -> Result<()> {
    if item.conciliado {
        return Err(Error::AlreadyReconciled(format!(
            "statement item {} is already reconciled",
            item.id
        )));
    }
    if !item.es_suspense {
        return Err(Error::NotSuspense(format!(
            "statement item {} is not flagged suspense",
            item.id
        )));
    }
    Ok(())
}

impl Database {
    /// Accept a suspense line without a counterpart
    ///
    /// The line stays unreconciled; only the suspense counter moves.
    pub fn resolve_suspense(&self, item_id: i64, notes: &str, user_id: &str) -> Result<()> {
        self.with_transaction(|tx| {
            let item = require_item(tx, item_id)?;
            ensure_suspense(&item)?;
            if item.suspense_resuelto {
                return Err(Error::NotSuspense(format!(
                    "statement item {} suspense is already resolved",
                    item_id
                )));
            }

            let changed = tx.execute(
                r#"
                UPDATE statement_items
                SET suspense_resuelto = 1,
                    suspense_notas = ?,
                    suspense_resuelto_by = ?,
                    suspense_resuelto_at = ?
                WHERE id = ? AND conciliado = 0 AND es_suspense = 1 AND suspense_resuelto = 0
                "#,
                params![
                    Some(notes.trim()).filter(|n| !n.is_empty()),
                    user_id,
                    format_datetime(Utc::now()),
                    item_id
                ],
            )?;
            if changed == 0 {
                return Err(Error::PreconditionFailed(format!(
                    "statement item {} changed while resolving",
                    item_id
                )));
            }

            adjust_counters(tx, item.statement_id, CounterDelta::suspense(-1))
        })?;

        info!(item_id, user = user_id, "Suspense resolved");
        Ok(())
    }

    /// Create a record from a suspense line and match the line to it
    ///
    /// `reference_type` overrides the keyword classification; `description`
    /// overrides the text stored on the new record.
    pub fn materialize_from_suspense(
        &self,
        item_id: i64,
        reference_type: Option<RecordCategory>,
        description: Option<&str>,
        user_id: &str,
    ) -> Result<i64> {
        let record_id = self.with_transaction(|tx| {
            let item = require_item(tx, item_id)?;
            ensure_suspense(&item)?;
            let statement = require_statement(tx, item.statement_id)?;

            let description = description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .unwrap_or(item.description.as_str())
                .to_string();
            let category =
                reference_type.unwrap_or_else(|| classify_description(&item.search_text()));

            let record = NewInternalRecord {
                company_id: statement.company_id,
                account_id: statement.account_id,
                date: item.date,
                amount: item.amount.abs(),
                direction: RecordDirection::from(item.direction),
                category,
                document_number: item.reference.clone(),
                counterparty_id: None,
                counterparty_name: None,
                description: Some(description),
            };
            let record_id = insert_record(tx, &record, RecordSource::Suspense, Some(user_id))?;

            let delta = mark_item_matched(tx, &item, record_id, MatchType::Manual, 1.0, user_id)?;
            adjust_counters(tx, item.statement_id, delta)?;
            Ok(record_id)
        })?;

        info!(item_id, record_id, user = user_id, "Suspense materialized");
        Ok(record_id)
    }
}
