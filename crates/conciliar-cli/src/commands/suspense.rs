//! Suspense commands (resolve, materialize)

use anyhow::Result;
use conciliar_core::db::Database;
use conciliar_core::models::RecordCategory;

pub fn cmd_resolve(db: &Database, item_id: i64, notes: &str, user: &str) -> Result<()> {
    db.resolve_suspense(item_id, notes, user)?;
    println!("📝 Suspense line {} resolved by {}", item_id, user);
    if !notes.trim().is_empty() {
        println!("   Notes: {}", notes.trim());
    }
    Ok(())
}

pub fn cmd_materialize(
    db: &Database,
    item_id: i64,
    reference_type: Option<&str>,
    description: Option<&str>,
    user: &str,
) -> Result<()> {
    let category = reference_type
        .map(|t| t.parse::<RecordCategory>())
        .transpose()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let record_id = db.materialize_from_suspense(item_id, category, description, user)?;
    let record = db
        .get_record(record_id)?
        .ok_or_else(|| anyhow::anyhow!("Record {} not found", record_id))?;

    println!(
        "✅ Created record {} ({}, {:.2}) and matched line {} to it",
        record.id, record.category, record.amount, item_id
    );
    Ok(())
}
