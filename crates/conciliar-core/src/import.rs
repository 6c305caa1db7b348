//! CSV loaders for already-normalized bank lines and accounting records
//!
//! These are not bank format parsers. Lines arrive with named columns:
//!
//! - statement lines: `date, amount | debit, credit, reference, description`
//! - records: `date, amount, direction, category, document_number,
//!   counterparty_id, counterparty_name, description`
//!
//! Column order does not matter; header names are matched case-insensitively.

use std::io::Read;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{NewInternalRecord, NewStatementLine, RecordCategory, RecordDirection};

/// Header name -> column index lookup
struct Columns {
    headers: Vec<String>,
}

impl Columns {
    fn new(headers: &StringRecord) -> Self {
        Self {
            headers: headers.iter().map(|h| h.trim().to_lowercase()).collect(),
        }
    }

    fn index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.index(name)
            .ok_or_else(|| Error::InvalidData(format!("Missing column: {}", name)))
    }

    /// Trimmed, non-empty cell value
    fn get<'r>(&self, record: &'r StringRecord, name: &str) -> Option<&'r str> {
        self.index(name)
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Parse normalized statement lines
pub fn parse_statement_lines<R: Read>(reader: R) -> Result<Vec<NewStatementLine>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let columns = Columns::new(rdr.headers()?);
    columns.require("date")?;
    if columns.index("amount").is_none()
        && columns.index("debit").is_none()
        && columns.index("credit").is_none()
    {
        return Err(Error::InvalidData(
            "Statement lines need an amount column or a debit/credit pair".into(),
        ));
    }

    let mut lines = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        let date = columns
            .get(&record, "date")
            .ok_or_else(|| Error::InvalidData(format!("Row {}: missing date", row + 1)))?;

        let line = NewStatementLine {
            date: parse_date(date)?,
            amount: columns.get(&record, "amount").map(parse_amount).transpose()?,
            debit: columns.get(&record, "debit").map(parse_amount).transpose()?,
            credit: columns.get(&record, "credit").map(parse_amount).transpose()?,
            reference: columns.get(&record, "reference").map(String::from),
            description: columns
                .get(&record, "description")
                .unwrap_or_default()
                .to_string(),
        };
        // Reject rows that carry no amount at all now, not at insert time
        line.signed_amount()?;
        lines.push(line);
    }

    debug!(count = lines.len(), "Parsed statement lines");
    Ok(lines)
}

/// Parse accounting records for one company/account
pub fn parse_records<R: Read>(
    reader: R,
    company_id: i64,
    account_id: i64,
) -> Result<Vec<NewInternalRecord>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let columns = Columns::new(rdr.headers()?);
    columns.require("date")?;
    columns.require("amount")?;
    columns.require("direction")?;

    let mut records = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        let row = row + 1;

        let date = columns
            .get(&record, "date")
            .ok_or_else(|| Error::InvalidData(format!("Row {}: missing date", row)))?;
        let amount = columns
            .get(&record, "amount")
            .ok_or_else(|| Error::InvalidData(format!("Row {}: missing amount", row)))?;
        let direction: RecordDirection = columns
            .get(&record, "direction")
            .unwrap_or("any")
            .parse()
            .map_err(|e: String| Error::InvalidData(format!("Row {}: {}", row, e)))?;
        let category: RecordCategory = match columns.get(&record, "category") {
            Some(c) => c
                .parse()
                .map_err(|e: String| Error::InvalidData(format!("Row {}: {}", row, e)))?,
            None => RecordCategory::default(),
        };
        let counterparty_id = columns
            .get(&record, "counterparty_id")
            .map(|s| {
                s.parse::<i64>().map_err(|_| {
                    Error::InvalidData(format!("Row {}: invalid counterparty_id {}", row, s))
                })
            })
            .transpose()?;

        records.push(NewInternalRecord {
            company_id,
            account_id,
            date: parse_date(date)?,
            amount: parse_amount(amount)?.abs(),
            direction,
            category,
            document_number: columns.get(&record, "document_number").map(String::from),
            counterparty_id,
            counterparty_name: columns.get(&record, "counterparty_name").map(String::from),
            description: columns.get(&record, "description").map(String::from),
        });
    }

    debug!(count = records.len(), "Parsed internal records");
    Ok(records)
}

/// Parse a date string in the formats bank exports commonly use
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();

    let formats = [
        "%Y-%m-%d", // 2026-01-15
        "%d/%m/%Y", // 15/01/2026
        "%d-%m-%Y", // 15-01-2026
        "%Y/%m/%d", // 2026/01/15
    ];

    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }

    Err(Error::InvalidData(format!("Unable to parse date: {}", s)))
}

/// Parse an amount string, handling currency symbols and thousands separators
pub fn parse_amount(s: &str) -> Result<f64> {
    let cleaned: String = s
        .trim()
        .replace(['$', ',', ' '], "")
        .replace('(', "-")
        .replace(')', "");

    cleaned
        .parse::<f64>()
        .map_err(|_| Error::InvalidData(format!("Unable to parse amount: {}", s)))
}
