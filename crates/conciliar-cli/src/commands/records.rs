//! Internal record commands (add, import, unmatched)

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use conciliar_core::db::{Database, RecordFilter};
use conciliar_core::import::{parse_date, parse_records};
use conciliar_core::models::{Direction, NewInternalRecord, RecordCategory, RecordDirection};

use super::truncate;

/// Fields for a single record entered on the command line
pub struct RecordArgs<'a> {
    pub company_id: i64,
    pub account_id: i64,
    pub date: &'a str,
    pub amount: f64,
    pub direction: &'a str,
    pub category: &'a str,
    pub document_number: Option<&'a str>,
    pub counterparty_id: Option<i64>,
    pub counterparty_name: Option<&'a str>,
    pub description: Option<&'a str>,
}

/// Filters for the unmatched record listing
#[derive(Default)]
pub struct UnmatchedArgs<'a> {
    pub company_id: Option<i64>,
    pub direction: Option<&'a str>,
    pub from: Option<&'a str>,
    pub to: Option<&'a str>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub search: Option<&'a str>,
    pub limit: i64,
}

pub fn cmd_records_add(db: &Database, args: RecordArgs<'_>) -> Result<()> {
    let direction: RecordDirection = args
        .direction
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let category: RecordCategory = args
        .category
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let date = parse_date(args.date).context("Invalid --date")?;

    let record = NewInternalRecord {
        company_id: args.company_id,
        account_id: args.account_id,
        date,
        amount: args.amount,
        direction,
        category,
        document_number: args.document_number.map(String::from),
        counterparty_id: args.counterparty_id,
        counterparty_name: args.counterparty_name.map(String::from),
        description: args.description.map(String::from),
    };

    let id = db
        .add_internal_record(&record)
        .context("Failed to add record")?;
    println!(
        "✅ Added record {} ({} {:.2} on {})",
        id,
        direction,
        args.amount.abs(),
        date
    );
    Ok(())
}

pub fn cmd_records_import(
    db: &Database,
    company_id: i64,
    account_id: i64,
    file: &Path,
) -> Result<()> {
    println!("📥 Importing records from {}...", file.display());

    let reader =
        File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
    let records =
        parse_records(reader, company_id, account_id).context("Failed to parse records CSV")?;

    if records.is_empty() {
        println!("   No records found in file.");
        return Ok(());
    }

    let ids = db
        .add_internal_records(&records)
        .context("Failed to add records")?;
    println!(
        "   Added {} records for company {}, account {}",
        ids.len(),
        company_id,
        account_id
    );

    Ok(())
}

pub fn cmd_records_unmatched(db: &Database, account_id: i64, args: UnmatchedArgs<'_>) -> Result<()> {
    let direction = args
        .direction
        .map(|d| d.parse::<Direction>())
        .transpose()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let from = args
        .from
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .context("Invalid --from date format (use YYYY-MM-DD)")?;
    let to = args
        .to
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .context("Invalid --to date format (use YYYY-MM-DD)")?;
    let date_range = match (from, to) {
        (Some(f), Some(t)) => Some((f, t)),
        (Some(f), None) => Some((f, chrono::Local::now().date_naive())),
        (None, Some(t)) => Some((NaiveDate::default(), t)),
        (None, None) => None,
    };

    let filter = RecordFilter::new()
        .company_id(args.company_id)
        .direction(direction)
        .date_range(date_range)
        .amount_range(args.min_amount, args.max_amount)
        .search(args.search)
        .limit(Some(args.limit.max(1)));

    let records = db.list_unmatched_records(account_id, filter)?;

    if records.is_empty() {
        println!("No unmatched records for account {}.", account_id);
        return Ok(());
    }

    println!(
        "{:>6}  {:<10}  {:>12}  {:<7}  {:<17}  {:<12}  {:<30}",
        "ID", "Date", "Amount", "Dir", "Category", "Document", "Counterparty / Description"
    );
    println!("{}", "─".repeat(104));
    for r in &records {
        let label = r
            .counterparty_name
            .as_deref()
            .or(r.description.as_deref())
            .unwrap_or("");
        println!(
            "{:>6}  {:<10}  {:>12.2}  {:<7}  {:<17}  {:<12}  {:<30}",
            r.id,
            r.date,
            r.amount,
            r.direction.as_str(),
            r.category.as_str(),
            truncate(r.document_number.as_deref().unwrap_or("-"), 12),
            truncate(label, 30)
        );
    }
    println!();
    println!("{} record(s)", records.len());

    Ok(())
}
