//! Suggestion aggregation
//!
//! Turns the scorer's ranked output into what a reviewer sees: candidates
//! above the suggestion floor, capped, plus the `auto_reconcileable` flag.

use crate::config::MatchingConfig;
use crate::models::{MatchResult, SuggestionSet};

/// Filter, cap and flag already-ranked results for one line
///
/// A line is auto-reconcileable only when exactly one candidate survives the
/// floor and that candidate clears the auto threshold. Two strong candidates
/// are never auto-applied.
pub fn aggregate(config: &MatchingConfig, item_id: i64, ranked: Vec<MatchResult>) -> SuggestionSet {
    let mut candidates: Vec<MatchResult> = ranked
        .into_iter()
        .filter(|r| r.score >= config.min_suggestion_score)
        .collect();

    let auto_reconcileable =
        candidates.len() == 1 && candidates[0].score >= config.auto_reconcile_threshold;

    candidates.truncate(config.max_suggestions);

    SuggestionSet {
        item_id,
        candidates,
        auto_reconcileable,
    }
}
