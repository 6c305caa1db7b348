//! Report commands (summary, verify)

use anyhow::Result;
use conciliar_core::db::Database;

pub fn cmd_summary(db: &Database, statement_id: i64, json: bool) -> Result<()> {
    let summary = db.recompute_summary(statement_id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("📊 Statement {} Summary", statement_id);
    println!("   ─────────────────────────────");
    println!("   Lines: {}", summary.total_items);
    println!(
        "   ✅ Matched: {} ({:.2})",
        summary.matched, summary.matched_amount
    );
    println!(
        "   ⏳ Pending: {} ({:.2})",
        summary.pending, summary.pending_amount
    );
    println!("   ❓ Open suspense: {}", summary.suspense);
    println!("   📝 Resolved suspense: {}", summary.suspense_resolved);

    let by_type = &summary.by_match_type;
    if by_type.total() > 0 {
        println!();
        println!("   By match type:");
        println!("      exact: {}", by_type.exact);
        println!("      fuzzy: {}", by_type.fuzzy);
        println!("      reference: {}", by_type.reference);
        println!("      manual: {}", by_type.manual);
    }

    Ok(())
}

pub fn cmd_verify(db: &Database, statement_id: i64) -> Result<()> {
    let check = db.verify_counters(statement_id)?;

    let stored = &check.stored;
    let recomputed = &check.recomputed;
    println!("🔎 Statement {} counters", statement_id);
    println!("   {:<10} {:>8} {:>10}", "", "stored", "recounted");
    println!("   {:<10} {:>8} {:>10}", "total", stored.total_items, recomputed.total_items);
    println!("   {:<10} {:>8} {:>10}", "matched", stored.matched, recomputed.matched);
    println!("   {:<10} {:>8} {:>10}", "pending", stored.pending, recomputed.pending);
    println!("   {:<10} {:>8} {:>10}", "suspense", stored.suspense, recomputed.suspense);

    if check.consistent {
        println!("✅ Counters are consistent");
        Ok(())
    } else {
        anyhow::bail!("Statement {} counters diverge from its lines", statement_id)
    }
}
