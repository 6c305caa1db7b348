//! Batch matching strategies
//!
//! The auto-match pass tries EXACT, then FUZZY (inside the statement's own
//! tolerance window), then REFERENCE, and stops at the first strategy that
//! yields a single candidate. A strategy with several qualifying candidates
//! is skipped; a line only becomes suspense when no strategy found anything.

use std::collections::BTreeSet;

use tracing::debug;

use crate::config::MatchingConfig;
use crate::models::{BatchOutcome, InternalRecord, MatchType, Statement, StatementItem, AMOUNT_EPSILON};
use crate::patterns::PatternMap;
use crate::scoring::{amount_difference, date_difference, document_in_line, eligible, Scorer};

/// Fuzzy window configured on a statement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub amount_pct: f64,
    pub days: i64,
}

impl From<&Statement> for Tolerance {
    fn from(s: &Statement) -> Self {
        Self {
            amount_pct: s.amount_tolerance_pct,
            days: s.date_tolerance_days,
        }
    }
}

/// Strategies in the order they are attempted
pub const STRATEGIES: [MatchType; 3] = [MatchType::Exact, MatchType::Fuzzy, MatchType::Reference];

/// Decides the batch outcome for one line against the live candidate pool
pub struct StrategyMatcher<'a> {
    config: &'a MatchingConfig,
    scorer: Scorer<'a>,
    tolerance: Tolerance,
    patterns: Option<&'a PatternMap>,
}

impl<'a> StrategyMatcher<'a> {
    pub fn new(config: &'a MatchingConfig, tolerance: Tolerance, patterns: Option<&'a PatternMap>) -> Self {
        Self {
            config,
            scorer: Scorer::new(config),
            tolerance,
            patterns,
        }
    }

    /// Whether `record` qualifies for `strategy`
    pub fn qualifies(&self, strategy: MatchType, item: &StatementItem, record: &InternalRecord) -> bool {
        let (diff, pct) = amount_difference(item.amount, record.amount);
        let days = date_difference(item, record);
        match strategy {
            MatchType::Exact => diff < AMOUNT_EPSILON && days == 0,
            MatchType::Fuzzy => pct <= self.tolerance.amount_pct && days <= self.tolerance.days,
            MatchType::Reference => record
                .document_number
                .as_deref()
                .is_some_and(|doc| document_in_line(item, doc, self.config)),
            MatchType::Manual => false,
        }
    }

    /// Run the strategies in order against `pool`
    ///
    /// `pool` may contain reconciled or direction-incompatible records; they
    /// are filtered out here.
    pub fn decide(&self, item: &StatementItem, pool: &[InternalRecord]) -> BatchOutcome {
        let candidates: Vec<&InternalRecord> = eligible(item, pool).collect();
        let mut seen: BTreeSet<i64> = BTreeSet::new();

        for strategy in STRATEGIES {
            let hits: Vec<&InternalRecord> = candidates
                .iter()
                .copied()
                .filter(|r| self.qualifies(strategy, item, r))
                .collect();

            match hits.as_slice() {
                [] => continue,
                [record] => {
                    let confidence = match strategy {
                        MatchType::Exact => 1.0,
                        _ => self
                            .scorer
                            .score(item, record, self.patterns)
                            .map(|r| r.confidence())
                            .unwrap_or(0.0),
                    };
                    debug!(item_id = item.id, record_id = record.id, %strategy, confidence, "Strategy hit");
                    return BatchOutcome::Matched {
                        record_id: record.id,
                        match_type: strategy,
                        confidence,
                    };
                }
                many => {
                    debug!(item_id = item.id, %strategy, candidates = many.len(), "Strategy ambiguous, skipping");
                    seen.extend(many.iter().map(|r| r.id));
                }
            }
        }

        if seen.is_empty() {
            BatchOutcome::Suspense
        } else {
            BatchOutcome::Ambiguous {
                candidates: seen.len(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordDirection;
    use crate::scoring::tests::{date, item, record};

    fn tolerance() -> Tolerance {
        Tolerance {
            amount_pct: 1.0,
            days: 3,
        }
    }

    #[test]
    fn test_exact_wins_first() {
        let config = MatchingConfig::default();
        let matcher = StrategyMatcher::new(&config, tolerance(), None);
        let line = item(250.0, date(2026, 1, 10), "ABONO");
        let pool = vec![
            record(1, 250.5, date(2026, 1, 11), RecordDirection::Inflow),
            record(2, 250.0, date(2026, 1, 10), RecordDirection::Inflow),
        ];
        let outcome = matcher.decide(&line, &pool);
        assert_eq!(
            outcome,
            BatchOutcome::Matched {
                record_id: 2,
                match_type: MatchType::Exact,
                confidence: 1.0
            }
        );
    }

    #[test]
    fn test_fuzzy_inside_statement_window() {
        let config = MatchingConfig::default();
        let matcher = StrategyMatcher::new(&config, tolerance(), None);
        let line = item(-1000.0, date(2026, 1, 10), "PAGO PROVEEDOR");
        let pool = vec![
            record(4, 1005.0, date(2026, 1, 12), RecordDirection::Outflow),
            record(5, 1200.0, date(2026, 1, 10), RecordDirection::Outflow),
        ];
        match matcher.decide(&line, &pool) {
            BatchOutcome::Matched {
                record_id,
                match_type,
                confidence,
            } => {
                assert_eq!(record_id, 4);
                assert_eq!(match_type, MatchType::Fuzzy);
                assert!(confidence > 0.0 && confidence < 1.0);
            }
            other => panic!("expected fuzzy match, got {:?}", other),
        }
    }

    #[test]
    fn test_reference_when_amount_out_of_window() {
        let config = MatchingConfig::default();
        let matcher = StrategyMatcher::new(&config, tolerance(), None);
        let line = item(900.0, date(2026, 1, 10), "DEP FACT-7781");
        let mut rec = record(9, 1000.0, date(2026, 1, 20), RecordDirection::Inflow);
        rec.document_number = Some("FACT-7781".into());
        match matcher.decide(&line, &[rec]) {
            BatchOutcome::Matched { match_type, .. } => assert_eq!(match_type, MatchType::Reference),
            other => panic!("expected reference match, got {:?}", other),
        }
    }

    #[test]
    fn test_reference_field_checked_despite_long_description() {
        let config = MatchingConfig::default();
        let matcher = StrategyMatcher::new(&config, tolerance(), None);
        let description = format!("DEPOSITO {}", "SUCURSAL CENTRO ".repeat(20));
        let mut line = item(900.0, date(2026, 1, 10), &description);
        line.reference = Some("FACT-7781".into());
        let mut rec = record(9, 1000.0, date(2026, 1, 20), RecordDirection::Inflow);
        rec.document_number = Some("FACT-7781".into());

        assert!(matcher.qualifies(MatchType::Reference, &line, &rec));
        match matcher.decide(&line, &[rec]) {
            BatchOutcome::Matched { match_type, .. } => assert_eq!(match_type, MatchType::Reference),
            other => panic!("expected reference match, got {:?}", other),
        }
    }

    #[test]
    fn test_ambiguous_is_not_suspense() {
        let config = MatchingConfig::default();
        let matcher = StrategyMatcher::new(&config, tolerance(), None);
        let line = item(300.0, date(2026, 1, 10), "ABONO");
        let pool = vec![
            record(1, 300.0, date(2026, 1, 10), RecordDirection::Inflow),
            record(2, 300.0, date(2026, 1, 10), RecordDirection::Any),
        ];
        assert_eq!(matcher.decide(&line, &pool), BatchOutcome::Ambiguous { candidates: 2 });
    }

    #[test]
    fn test_no_candidates_is_suspense() {
        let config = MatchingConfig::default();
        let matcher = StrategyMatcher::new(&config, tolerance(), None);
        let line = item(15000.0, date(2026, 1, 15), "DEPOSITO");
        let pool = vec![
            record(1, 20000.0, date(2026, 1, 15), RecordDirection::Inflow),
            // Right amount, wrong direction
            record(2, 15000.0, date(2026, 1, 15), RecordDirection::Outflow),
        ];
        assert_eq!(matcher.decide(&line, &pool), BatchOutcome::Suspense);
    }
}
