//! Statement commands (create, list, show, import-items)

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use conciliar_core::db::Database;
use conciliar_core::import::parse_statement_lines;
use conciliar_core::models::{ItemFilter, ItemState, NewStatement, Statement};

use super::truncate;

pub fn cmd_statement_create(
    db: &Database,
    company_id: i64,
    account_id: i64,
    period: &str,
    amount_tolerance: Option<f64>,
    date_tolerance: Option<i64>,
) -> Result<()> {
    let id = db
        .create_statement(&NewStatement {
            company_id,
            account_id,
            period_label: period.to_string(),
            amount_tolerance_pct: amount_tolerance,
            date_tolerance_days: date_tolerance,
        })
        .context("Failed to create statement")?;

    let statement = require_statement(db, id)?;
    println!("✅ Created statement {} ({})", id, statement.period_label);
    println!(
        "   Tolerance: {}% / {} days",
        statement.amount_tolerance_pct, statement.date_tolerance_days
    );
    Ok(())
}

pub fn cmd_statement_list(db: &Database, company_id: Option<i64>) -> Result<()> {
    let statements = db.list_statements(company_id)?;

    if statements.is_empty() {
        println!("No statements found.");
        return Ok(());
    }

    println!(
        "{:>5}  {:>7}  {:>7}  {:<12}  {:<11}  {:>5}  {:>7}  {:>7}  {:>8}",
        "ID", "Company", "Account", "Period", "Status", "Lines", "Matched", "Pending", "Suspense"
    );
    println!("{}", "─".repeat(88));
    for s in &statements {
        println!(
            "{:>5}  {:>7}  {:>7}  {:<12}  {:<11}  {:>5}  {:>7}  {:>7}  {:>8}",
            s.id,
            s.company_id,
            s.account_id,
            truncate(&s.period_label, 12),
            s.status.as_str(),
            s.total_items,
            s.matched_count,
            s.pending_count,
            s.suspense_count
        );
    }

    Ok(())
}

pub fn cmd_statement_show(db: &Database, id: i64, state: &str) -> Result<()> {
    let filter: ItemFilter = state.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let statement = require_statement(db, id)?;

    println!(
        "📄 Statement {} - {} (company {}, account {})",
        statement.id, statement.period_label, statement.company_id, statement.account_id
    );
    println!("   Status: {}", statement.status);
    println!(
        "   Lines: {} total, {} matched, {} pending, {} in suspense",
        statement.total_items,
        statement.matched_count,
        statement.pending_count,
        statement.suspense_count
    );
    println!();

    let items = db.list_items(id, filter)?;
    if items.is_empty() {
        println!("No lines match filter '{}'.", state);
        return Ok(());
    }

    println!(
        "{:>6}  {:<10}  {:>12}  {:<17}  {:<9}  {:<40}",
        "ID", "Date", "Amount", "State", "Match", "Description"
    );
    println!("{}", "─".repeat(102));
    for item in &items {
        let state = item.state();
        let marker = match state {
            ItemState::Matched => "✅",
            ItemState::Suspense => "❓",
            ItemState::SuspenseResolved => "📝",
            ItemState::Pending => "⏳",
        };
        let match_info = match (item.match_type, item.record_id) {
            (Some(mt), Some(record_id)) => format!("{}→{}", mt.as_str(), record_id),
            _ => String::new(),
        };
        println!(
            "{:>6}  {:<10}  {:>12.2}  {} {:<14}  {:<9}  {:<40}",
            item.id,
            item.date,
            item.amount,
            marker,
            state.as_str(),
            match_info,
            truncate(&item.description, 40)
        );
    }

    Ok(())
}

pub fn cmd_statement_import_items(db: &Database, id: i64, file: &Path) -> Result<()> {
    println!("📥 Importing lines from {}...", file.display());

    require_statement(db, id)?;

    let reader =
        File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
    let lines = parse_statement_lines(reader).context("Failed to parse statement CSV")?;

    if lines.is_empty() {
        println!("   No lines found in file.");
        return Ok(());
    }

    let ids = db
        .add_statement_items(id, &lines)
        .context("Failed to add statement lines")?;
    let statement = require_statement(db, id)?;

    println!("   Added {} lines", ids.len());
    println!(
        "   Statement {}: {} total, {} pending ({})",
        id, statement.total_items, statement.pending_count, statement.status
    );
    println!();
    println!("Run 'conciliar auto-match {}' to match them.", id);

    Ok(())
}

pub(crate) fn require_statement(db: &Database, id: i64) -> Result<Statement> {
    db.get_statement(id)?
        .ok_or_else(|| anyhow::anyhow!("Statement {} not found", id))
}
