//! Matching commands (auto-match, suggest, match, unmatch)

use anyhow::{Context, Result};
use conciliar_core::db::Database;
use conciliar_core::models::BatchOutcome;

use super::statements::require_statement;
use super::truncate;

pub fn cmd_auto_match(db: &Database, statement_id: i64, use_patterns: bool, json: bool) -> Result<()> {
    let statement = require_statement(db, statement_id)?;

    let patterns = if use_patterns {
        Some(db.learned_patterns(statement.company_id)?)
    } else {
        None
    };

    if !json {
        println!("🔍 Matching statement {} ({})...", statement_id, statement.period_label);
        if let Some(ref p) = patterns {
            println!("   Learned patterns: {}", p.len());
        }
    }

    let result = db
        .auto_match_batch_with_patterns(statement_id, patterns.as_ref())
        .context("Batch matching failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let ambiguous: Vec<_> = result
        .items
        .iter()
        .filter_map(|i| match i.outcome {
            BatchOutcome::Ambiguous { candidates } => Some((i.item_id, candidates)),
            _ => None,
        })
        .collect();

    println!();
    println!("📊 Batch Results");
    println!("   ─────────────────────────────");
    println!("   Lines in statement: {}", result.total_items);
    println!("   ✅ Matched this pass: {}", result.matched);
    println!("   ⏳ Still unmatched: {}", result.unmatched);
    println!("   ❓ Flagged suspense: {}", result.suspense);

    for outcome in &result.items {
        if let BatchOutcome::Matched {
            record_id,
            match_type,
            confidence,
        } = outcome.outcome
        {
            println!(
                "      line {} → record {} ({}, {:.0}%)",
                outcome.item_id,
                record_id,
                match_type,
                confidence * 100.0
            );
        }
    }

    if !ambiguous.is_empty() {
        println!();
        println!(
            "⚠️  {} line(s) have several equally good candidates. Review with 'conciliar suggest <item>':",
            ambiguous.len()
        );
        for (item_id, candidates) in ambiguous {
            println!("      line {} ({} candidates)", item_id, candidates);
        }
    }

    Ok(())
}

pub fn cmd_suggest(db: &Database, item_id: i64, json: bool) -> Result<()> {
    let item = db
        .get_item(item_id)?
        .ok_or_else(|| anyhow::anyhow!("Statement item {} not found", item_id))?;
    let statement = require_statement(db, item.statement_id)?;
    let patterns = db.learned_patterns(statement.company_id)?;

    let suggestions = db.suggest_matches(item_id, Some(&patterns))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&suggestions)?);
        return Ok(());
    }

    println!(
        "💡 Line {}: {} {:.2} \"{}\"",
        item.id,
        item.date,
        item.amount,
        truncate(&item.description, 50)
    );

    if suggestions.candidates.is_empty() {
        println!("   No candidates above the suggestion threshold.");
        return Ok(());
    }

    println!();
    println!(
        "   {:>6}  {:>6}  {:<9}  {:>10}  {:>5}  Reasoning",
        "Record", "Score", "Type", "Amt diff", "Days"
    );
    for c in &suggestions.candidates {
        println!(
            "   {:>6}  {:>6.1}  {:<9}  {:>10.2}  {:>5}  {}",
            c.candidate_id,
            c.score,
            c.match_type.as_str(),
            c.amount_difference,
            c.date_difference,
            c.reasoning
        );
    }

    if suggestions.auto_reconcileable {
        println!();
        println!(
            "✅ Top candidate is safe to apply: conciliar match {} {}",
            item_id, suggestions.candidates[0].candidate_id
        );
    }

    Ok(())
}

pub fn cmd_match(db: &Database, item_id: i64, record_id: i64, user: &str) -> Result<()> {
    let result = db.manual_match(item_id, record_id, user)?;
    println!(
        "✅ Matched line {} to record {} ({})",
        item_id, result.candidate_id, result.reasoning
    );
    Ok(())
}

pub fn cmd_unmatch(db: &Database, item_id: i64) -> Result<()> {
    db.unmatch(item_id)?;
    println!("↩️  Unmatched line {}", item_id);
    Ok(())
}
