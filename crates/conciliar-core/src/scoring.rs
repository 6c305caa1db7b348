//! Scoring engine
//!
//! Pure, stateless scoring of one bank line against a pool of internal
//! records. Points are additive and capped at 100:
//!
//! | criterion   | points                                              |
//! |-------------|-----------------------------------------------------|
//! | amount      | up to 40, linear in % difference, 0 past tolerance  |
//! | date        | 25 same day, 15 within near window, 5 within far    |
//! | reference   | 25 when the document number is in the bank text     |
//! | name        | up to 10 from bounded name similarity               |
//! | pattern     | 10 when a learned pattern resolves to the candidate |
//!
//! Same amount on the same day is an EXACT match and scores 100 outright.
//! Direction compatibility is a hard filter applied before any scoring.

use std::cmp::Ordering;

use tracing::debug;

use crate::config::MatchingConfig;
use crate::models::{InternalRecord, MatchResult, MatchType, StatementItem, AMOUNT_EPSILON};
use crate::patterns::PatternMap;
use crate::text::{contains_reference, name_similarity};

/// Absolute and percentage difference between a bank amount and a candidate
///
/// The percentage is relative to the bank amount. Zero amounts fall back to the
/// larger side, and two zeros are a 0% difference.
pub fn amount_difference(bank_amount: f64, candidate_amount: f64) -> (f64, f64) {
    let bank = bank_amount.abs();
    let candidate = candidate_amount.abs();
    let diff = (bank - candidate).abs();

    if diff < AMOUNT_EPSILON {
        return (diff, 0.0);
    }

    let denominator = if bank > AMOUNT_EPSILON {
        bank
    } else {
        bank.max(candidate)
    };

    if denominator <= AMOUNT_EPSILON {
        (diff, 0.0)
    } else {
        (diff, diff / denominator * 100.0)
    }
}

/// Absolute day difference between a line and a candidate
pub fn date_difference(item: &StatementItem, record: &InternalRecord) -> i64 {
    (item.date - record.date).num_days().abs()
}

/// Direction-compatible, unreconciled candidates for a line
pub fn eligible<'r>(
    item: &StatementItem,
    pool: &'r [InternalRecord],
) -> impl Iterator<Item = &'r InternalRecord> {
    let direction = item.direction;
    pool.iter()
        .filter(move |r| !r.conciliado && r.direction.accepts(direction))
}

/// Whether a document number appears in a line's reference or description
///
/// Each field is folded and capped on its own, reference first, so a long
/// description never pushes the reference out of the comparison window.
pub fn document_in_line(item: &StatementItem, document: &str, config: &MatchingConfig) -> bool {
    let found = |text: &str| {
        contains_reference(text, document, config.min_reference_len, config.max_compare_chars)
    };
    item.reference.as_deref().is_some_and(found) || found(&item.description)
}

/// Scores lines against candidates using a matching configuration
pub struct Scorer<'a> {
    config: &'a MatchingConfig,
}

impl<'a> Scorer<'a> {
    pub fn new(config: &'a MatchingConfig) -> Self {
        Self { config }
    }

    /// Amount points for a percentage difference
    pub fn amount_points(&self, diff_pct: f64) -> f64 {
        let max = self.config.weights.amount;
        let tolerance = self.config.amount_tolerance_pct;
        if diff_pct <= 0.0 {
            max
        } else if diff_pct > tolerance {
            0.0
        } else {
            max * (1.0 - diff_pct / tolerance)
        }
    }

    /// Date points for a day difference
    pub fn date_points(&self, days: i64) -> f64 {
        let w = &self.config.weights;
        if days == 0 {
            w.date
        } else if days <= self.config.date_near_days {
            w.date_near
        } else if days <= self.config.date_far_days {
            w.date_far
        } else {
            0.0
        }
    }

    /// Score one candidate; `None` when the candidate is not eligible at all
    pub fn score(
        &self,
        item: &StatementItem,
        record: &InternalRecord,
        patterns: Option<&PatternMap>,
    ) -> Option<MatchResult> {
        if record.conciliado || !record.direction.accepts(item.direction) {
            return None;
        }

        let w = &self.config.weights;
        let mut reasons: Vec<String> = Vec::new();

        let (amount_diff, diff_pct) = amount_difference(item.amount, record.amount);
        let days = date_difference(item, record);

        let amount = self.amount_points(diff_pct);
        if diff_pct <= 0.0 {
            reasons.push("exact amount".to_string());
        } else if amount > 0.0 {
            reasons.push(format!("amount within {:.1}%", diff_pct));
        } else {
            reasons.push(format!("amount off by {:.1}%", diff_pct));
        }

        let date = self.date_points(days);
        if days == 0 {
            reasons.push("same date".to_string());
        } else {
            reasons.push(format!("{} day(s) apart", days));
        }

        let reference_hit = record
            .document_number
            .as_deref()
            .is_some_and(|doc| document_in_line(item, doc, self.config));
        let reference = if reference_hit {
            reasons.push(format!(
                "document {} found in bank text",
                record.document_number.as_deref().unwrap_or_default()
            ));
            w.reference
        } else {
            0.0
        };

        let similarity = record
            .counterparty_name
            .as_deref()
            .map(|name| {
                name_similarity(
                    name,
                    &item.description,
                    self.config.min_reference_len,
                    self.config.max_compare_chars,
                    self.config.max_edit_distance_chars,
                )
            })
            .unwrap_or(0.0);
        let name = similarity * w.name;
        if similarity > 0.0 {
            reasons.push(format!("name similarity {:.2}", similarity));
        }

        let learned = match (patterns, record.counterparty_id) {
            (Some(map), Some(entity)) if map.resolves_to(&item.description, entity) => {
                reasons.push("learned pattern".to_string());
                w.pattern
            }
            _ => 0.0,
        };

        let exact = diff_pct <= 0.0 && days == 0;
        let score = if exact {
            100.0
        } else {
            (amount + date + reference + name + learned).clamp(0.0, 100.0)
        };

        let match_type = if exact {
            MatchType::Exact
        } else if reference_hit {
            MatchType::Reference
        } else {
            MatchType::Fuzzy
        };

        debug!(
            item_id = item.id,
            record_id = record.id,
            score,
            %match_type,
            "Scored candidate"
        );

        Some(MatchResult {
            candidate_id: record.id,
            score,
            amount_difference: amount_diff,
            date_difference: days,
            match_type,
            reasoning: reasons.join(", "),
        })
    }

    /// Score every eligible candidate, best first
    ///
    /// Ties break on smaller date difference, then smaller amount difference,
    /// then lower record id, so output is deterministic.
    pub fn rank(
        &self,
        item: &StatementItem,
        pool: &[InternalRecord],
        patterns: Option<&PatternMap>,
    ) -> Vec<MatchResult> {
        let mut results: Vec<MatchResult> = pool
            .iter()
            .filter_map(|record| self.score(item, record, patterns))
            .collect();
        results.sort_by(compare_results);
        results
    }
}

fn compare_results(a: &MatchResult, b: &MatchResult) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then(a.date_difference.cmp(&b.date_difference))
        .then(
            a.amount_difference
                .partial_cmp(&b.amount_difference)
                .unwrap_or(Ordering::Equal),
        )
        .then(a.candidate_id.cmp(&b.candidate_id))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{Direction, RecordCategory, RecordDirection, RecordSource};
    use chrono::{NaiveDate, Utc};

    pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    pub(crate) fn item(amount: f64, on: NaiveDate, description: &str) -> StatementItem {
        StatementItem {
            id: 1,
            statement_id: 1,
            date: on,
            amount,
            direction: Direction::from_amount(amount),
            reference: None,
            description: description.to_string(),
            conciliado: false,
            match_type: None,
            match_confidence: None,
            conciliado_at: None,
            conciliado_by: None,
            record_id: None,
            es_suspense: false,
            suspense_resuelto: false,
            suspense_notas: None,
            suspense_resuelto_by: None,
            suspense_resuelto_at: None,
            suspense_cleared_by_match: false,
        }
    }

    pub(crate) fn record(id: i64, amount: f64, on: NaiveDate, direction: RecordDirection) -> InternalRecord {
        InternalRecord {
            id,
            company_id: 1,
            account_id: 1,
            date: on,
            amount,
            direction,
            category: RecordCategory::ClientCollection,
            document_number: None,
            counterparty_id: None,
            counterparty_name: None,
            description: None,
            source: RecordSource::Accounting,
            conciliado: false,
            conciliado_at: None,
            conciliado_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_amount_difference_guards_zero() {
        assert_eq!(amount_difference(0.0, 0.0), (0.0, 0.0));
        let (diff, pct) = amount_difference(0.0, 50.0);
        assert_eq!(diff, 50.0);
        assert_eq!(pct, 100.0);
        let (_, pct) = amount_difference(-15000.0, 20000.0);
        assert!((pct - 33.333).abs() < 0.01);
    }

    #[test]
    fn test_amount_points_linear_then_zero() {
        let config = MatchingConfig::default();
        let scorer = Scorer::new(&config);
        assert_eq!(scorer.amount_points(0.0), 40.0);
        assert!((scorer.amount_points(5.0) - 20.0).abs() < 1e-9);
        assert_eq!(scorer.amount_points(10.5), 0.0);
    }

    #[test]
    fn test_date_points_windows() {
        let config = MatchingConfig::default();
        let scorer = Scorer::new(&config);
        assert_eq!(scorer.date_points(0), 25.0);
        assert_eq!(scorer.date_points(2), 15.0);
        assert_eq!(scorer.date_points(5), 5.0);
        assert_eq!(scorer.date_points(8), 0.0);
    }

    #[test]
    fn test_reference_scenario_scores_high() {
        let config = MatchingConfig::default();
        let scorer = Scorer::new(&config);
        let line = item(15000.0, date(2026, 1, 15), "TRANSFERENCIA PAG-001 CLIENTE");
        let mut candidate = record(10, 15000.0, date(2026, 1, 15), RecordDirection::Inflow);
        candidate.document_number = Some("PAG-001".into());

        let result = scorer.score(&line, &candidate, None).unwrap();
        assert!(result.score >= 85.0);
        assert_eq!(result.match_type, MatchType::Exact);
        assert!(result.reasoning.contains("PAG-001"));
        assert_eq!(result.amount_difference, 0.0);
        assert_eq!(result.date_difference, 0);
    }

    #[test]
    fn test_reference_found_behind_long_description() {
        let config = MatchingConfig::default();
        let scorer = Scorer::new(&config);
        let description = format!("TRANSFERENCIA RECIBIDA {}", "DETALLE ".repeat(40));
        assert!(description.chars().count() > config.max_compare_chars);

        let mut line = item(15000.0, date(2026, 1, 15), &description);
        line.reference = Some("PAG-001".into());
        let mut candidate = record(10, 15000.0, date(2026, 1, 20), RecordDirection::Inflow);
        candidate.document_number = Some("PAG-001".into());

        let result = scorer.score(&line, &candidate, None).unwrap();
        assert_eq!(result.match_type, MatchType::Reference);
        assert!(result.reasoning.contains("document PAG-001"));
        // 40 amount + 5 date + 25 reference
        assert!((result.score - 70.0).abs() < 1e-9, "got {}", result.score);
    }

    #[test]
    fn test_short_name_inside_description_word_gets_no_name_bonus() {
        let config = MatchingConfig::default();
        let scorer = Scorer::new(&config);
        let line = item(1000.0, date(2026, 2, 3), "TRANSFERENCIA BANCARIA");
        let mut candidate = record(7, 1050.0, date(2026, 2, 3), RecordDirection::Inflow);
        candidate.counterparty_name = Some("Ria".into());

        let result = scorer.score(&line, &candidate, None).unwrap();
        assert!(result.score < config.min_suggestion_score, "got {}", result.score);
        assert!(!result.reasoning.contains("name similarity 1.00"));
    }

    #[test]
    fn test_exact_amount_and_date_reaches_auto_threshold() {
        let config = MatchingConfig::default();
        let scorer = Scorer::new(&config);
        let line = item(-320.10, date(2026, 3, 1), "CARGO");
        let candidate = record(3, 320.10, date(2026, 3, 1), RecordDirection::Outflow);
        let result = scorer.score(&line, &candidate, None).unwrap();
        assert!(result.score >= config.auto_reconcile_threshold);
        assert!((0.0..=1.0).contains(&result.confidence()));
    }

    #[test]
    fn test_large_amount_gap_scores_below_suggestion() {
        let config = MatchingConfig::default();
        let scorer = Scorer::new(&config);
        let line = item(15000.0, date(2026, 1, 15), "DEPOSITO");
        let candidate = record(2, 20000.0, date(2026, 1, 15), RecordDirection::Inflow);
        let result = scorer.score(&line, &candidate, None).unwrap();
        assert!(result.score < config.min_suggestion_score, "got {}", result.score);
        assert_eq!(result.match_type, MatchType::Fuzzy);
    }

    #[test]
    fn test_direction_filter_excludes_incompatible() {
        let config = MatchingConfig::default();
        let scorer = Scorer::new(&config);
        let line = item(500.0, date(2026, 2, 1), "ABONO");
        let outflow = record(1, 500.0, date(2026, 2, 1), RecordDirection::Outflow);
        let any = record(2, 500.0, date(2026, 2, 1), RecordDirection::Any);

        assert!(scorer.score(&line, &outflow, None).is_none());
        assert!(scorer.score(&line, &any, None).is_some());

        let pool = vec![outflow, any];
        let ids: Vec<i64> = eligible(&line, &pool).map(|r| r.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn test_reconciled_candidates_are_skipped() {
        let config = MatchingConfig::default();
        let scorer = Scorer::new(&config);
        let line = item(500.0, date(2026, 2, 1), "ABONO");
        let mut claimed = record(1, 500.0, date(2026, 2, 1), RecordDirection::Inflow);
        claimed.conciliado = true;
        assert!(scorer.score(&line, &claimed, None).is_none());
    }

    #[test]
    fn test_pattern_and_name_bonus() {
        let config = MatchingConfig::default();
        let scorer = Scorer::new(&config);
        let line = item(1000.0, date(2026, 4, 10), "TRANSF 8812 GLOBEX SA");
        let mut candidate = record(5, 1040.0, date(2026, 4, 12), RecordDirection::Inflow);
        candidate.counterparty_id = Some(77);
        candidate.counterparty_name = Some("Globex".into());

        let base = scorer.score(&line, &candidate, None).unwrap();

        let mut patterns = PatternMap::new();
        patterns.learn("transf 1 globex sa", 77);
        let boosted = scorer.score(&line, &candidate, Some(&patterns)).unwrap();

        assert!((boosted.score - base.score - 10.0).abs() < 1e-9);
        assert!(boosted.reasoning.contains("learned pattern"));
        assert!(base.reasoning.contains("name similarity"));
    }

    #[test]
    fn test_rank_orders_best_first() {
        let config = MatchingConfig::default();
        let scorer = Scorer::new(&config);
        let line = item(100.0, date(2026, 5, 5), "ABONO");
        let pool = vec![
            record(1, 104.0, date(2026, 5, 7), RecordDirection::Inflow),
            record(2, 100.0, date(2026, 5, 5), RecordDirection::Inflow),
            record(3, 101.0, date(2026, 5, 5), RecordDirection::Inflow),
        ];
        let ranked = scorer.rank(&line, &pool, None);
        let ids: Vec<i64> = ranked.iter().map(|r| r.candidate_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_zero_amount_line_does_not_panic() {
        let config = MatchingConfig::default();
        let scorer = Scorer::new(&config);
        let line = item(0.0, date(2026, 5, 5), "AJUSTE");
        let candidate = record(1, 0.0, date(2026, 5, 5), RecordDirection::Any);
        let result = scorer.score(&line, &candidate, None).unwrap();
        assert_eq!(result.score, 100.0);
    }
}
