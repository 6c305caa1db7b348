//! Domain models for bank-statement reconciliation

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Amounts closer than this are treated as equal
pub const AMOUNT_EPSILON: f64 = 0.005;

// ============================================================================
// Statement
// ============================================================================

/// Lifecycle status of an imported statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementStatus {
    /// At least one line is still unmatched
    #[default]
    EnProceso,
    /// Every line is matched
    Completada,
}

impl StatementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EnProceso => "EN_PROCESO",
            Self::Completada => "COMPLETADA",
        }
    }

    /// Status implied by the counters
    pub fn from_counts(matched: i64, total: i64) -> Self {
        if total > 0 && matched == total {
            Self::Completada
        } else {
            Self::EnProceso
        }
    }
}

impl std::str::FromStr for StatementStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "EN_PROCESO" => Ok(Self::EnProceso),
            "COMPLETADA" => Ok(Self::Completada),
            _ => Err(format!("Unknown statement status: {}", s)),
        }
    }
}

impl fmt::Display for StatementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One imported batch of bank lines for an account and period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub id: i64,
    pub company_id: i64,
    pub account_id: i64,
    pub period_label: String,
    /// Fuzzy strategy amount window, in percent of the bank amount
    pub amount_tolerance_pct: f64,
    /// Fuzzy strategy date window, in days
    pub date_tolerance_days: i64,
    pub status: StatementStatus,
    pub total_items: i64,
    pub matched_count: i64,
    pub pending_count: i64,
    pub suspense_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStatement {
    pub company_id: i64,
    pub account_id: i64,
    pub period_label: String,
    #[serde(default)]
    pub amount_tolerance_pct: Option<f64>,
    #[serde(default)]
    pub date_tolerance_days: Option<i64>,
}

// ============================================================================
// Statement items
// ============================================================================

/// Direction of a bank line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Money received (credit on the bank statement)
    Inflow,
    /// Money paid out (debit on the bank statement)
    Outflow,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inflow => "inflow",
            Self::Outflow => "outflow",
        }
    }

    /// Direction of a signed amount (zero counts as inflow)
    pub fn from_amount(amount: f64) -> Self {
        if amount < 0.0 {
            Self::Outflow
        } else {
            Self::Inflow
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inflow" | "in" | "credit" => Ok(Self::Inflow),
            "outflow" | "out" | "debit" => Ok(Self::Outflow),
            _ => Err(format!("Unknown direction: {}", s)),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a line was matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    Exact,
    Fuzzy,
    Reference,
    Manual,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "EXACT",
            Self::Fuzzy => "FUZZY",
            Self::Reference => "REFERENCE",
            Self::Manual => "MANUAL",
        }
    }
}

impl std::str::FromStr for MatchType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "EXACT" => Ok(Self::Exact),
            "FUZZY" => Ok(Self::Fuzzy),
            "REFERENCE" => Ok(Self::Reference),
            "MANUAL" => Ok(Self::Manual),
            _ => Err(format!("Unknown match type: {}", s)),
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derived per-line state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Pending,
    Matched,
    Suspense,
    /// Suspense line accepted administratively; still unreconciled
    SuspenseResolved,
}

impl ItemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Matched => "matched",
            Self::Suspense => "suspense",
            Self::SuspenseResolved => "suspense_resolved",
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One bank transaction line within a statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementItem {
    pub id: i64,
    pub statement_id: i64,
    pub date: NaiveDate,
    /// Signed amount: credit positive, debit negative
    pub amount: f64,
    pub direction: Direction,
    pub reference: Option<String>,
    pub description: String,
    pub conciliado: bool,
    pub match_type: Option<MatchType>,
    pub match_confidence: Option<f64>,
    pub conciliado_at: Option<DateTime<Utc>>,
    pub conciliado_by: Option<String>,
    /// Linked internal record while matched
    pub record_id: Option<i64>,
    pub es_suspense: bool,
    pub suspense_resuelto: bool,
    pub suspense_notas: Option<String>,
    pub suspense_resuelto_by: Option<String>,
    pub suspense_resuelto_at: Option<DateTime<Utc>>,
    /// Set when the current match is what closed an open suspense flag
    #[serde(skip)]
    pub suspense_cleared_by_match: bool,
}

impl StatementItem {
    pub fn state(&self) -> ItemState {
        if self.conciliado {
            ItemState::Matched
        } else if self.es_suspense && self.suspense_resuelto {
            ItemState::SuspenseResolved
        } else if self.es_suspense {
            ItemState::Suspense
        } else {
            ItemState::Pending
        }
    }

    /// Whether this line is counted in the statement's suspense counter
    pub fn is_open_suspense(&self) -> bool {
        !self.conciliado && self.es_suspense && !self.suspense_resuelto
    }

    /// Reference followed by description, for keyword classification
    pub fn search_text(&self) -> String {
        match &self.reference {
            Some(r) if !r.is_empty() => format!("{} {}", r, self.description),
            _ => self.description.clone(),
        }
    }
}

/// An already-normalized bank line handed over by the import step
///
/// Either `amount` (signed) or a `debit`/`credit` pair must be present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStatementLine {
    pub date: NaiveDate,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub debit: Option<f64>,
    #[serde(default)]
    pub credit: Option<f64>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl NewStatementLine {
    /// Signed amount: explicit amount, else credit minus debit
    pub fn signed_amount(&self) -> Result<f64> {
        if let Some(amount) = self.amount {
            return Ok(amount);
        }
        match (self.debit, self.credit) {
            (None, None) => Err(Error::InvalidData(format!(
                "line dated {} has neither amount nor debit/credit",
                self.date
            ))),
            (debit, credit) => Ok(credit.unwrap_or(0.0).abs() - debit.unwrap_or(0.0).abs()),
        }
    }
}

/// Filter for listing statement items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemFilter {
    #[default]
    All,
    Pending,
    Matched,
    Suspense,
}

impl std::str::FromStr for ItemFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "pending" => Ok(Self::Pending),
            "matched" => Ok(Self::Matched),
            "suspense" => Ok(Self::Suspense),
            _ => Err(format!("Unknown item filter: {}", s)),
        }
    }
}

// ============================================================================
// Internal records
// ============================================================================

/// Which bank-line directions a record may be matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordDirection {
    /// Collection from a client
    Inflow,
    /// Payment to a supplier
    Outflow,
    /// Treasury movements usable in either direction
    Any,
}

impl RecordDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inflow => "inflow",
            Self::Outflow => "outflow",
            Self::Any => "any",
        }
    }

    pub fn accepts(&self, direction: Direction) -> bool {
        match self {
            Self::Any => true,
            Self::Inflow => direction == Direction::Inflow,
            Self::Outflow => direction == Direction::Outflow,
        }
    }
}

impl From<Direction> for RecordDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Inflow => Self::Inflow,
            Direction::Outflow => Self::Outflow,
        }
    }
}

impl std::str::FromStr for RecordDirection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inflow" | "in" => Ok(Self::Inflow),
            "outflow" | "out" => Ok(Self::Outflow),
            "any" | "both" => Ok(Self::Any),
            _ => Err(format!("Unknown record direction: {}", s)),
        }
    }
}

impl fmt::Display for RecordDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Accounting category of an internal record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordCategory {
    ClientCollection,
    SupplierPayment,
    Fee,
    Interest,
    Tax,
    Transfer,
    #[default]
    Adjustment,
}

impl RecordCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientCollection => "client_collection",
            Self::SupplierPayment => "supplier_payment",
            Self::Fee => "fee",
            Self::Interest => "interest",
            Self::Tax => "tax",
            Self::Transfer => "transfer",
            Self::Adjustment => "adjustment",
        }
    }
}

impl std::str::FromStr for RecordCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "client_collection" | "collection" => Ok(Self::ClientCollection),
            "supplier_payment" | "payment" => Ok(Self::SupplierPayment),
            "fee" => Ok(Self::Fee),
            "interest" => Ok(Self::Interest),
            "tax" => Ok(Self::Tax),
            "transfer" => Ok(Self::Transfer),
            "adjustment" => Ok(Self::Adjustment),
            _ => Err(format!("Unknown record category: {}", s)),
        }
    }
}

impl fmt::Display for RecordCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How an internal record came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordSource {
    /// Produced by the accounting system
    #[default]
    Accounting,
    /// Materialized from a suspense bank line
    Suspense,
}

impl RecordSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accounting => "accounting",
            Self::Suspense => "suspense",
        }
    }
}

impl std::str::FromStr for RecordSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "accounting" => Ok(Self::Accounting),
            "suspense" => Ok(Self::Suspense),
            _ => Err(format!("Unknown record source: {}", s)),
        }
    }
}

/// A cash movement known to the accounting system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalRecord {
    pub id: i64,
    pub company_id: i64,
    pub account_id: i64,
    pub date: NaiveDate,
    /// Always non-negative; direction carries the sign
    pub amount: f64,
    pub direction: RecordDirection,
    pub category: RecordCategory,
    pub document_number: Option<String>,
    /// Client or supplier the movement belongs to
    pub counterparty_id: Option<i64>,
    pub counterparty_name: Option<String>,
    pub description: Option<String>,
    pub source: RecordSource,
    pub conciliado: bool,
    pub conciliado_at: Option<DateTime<Utc>>,
    pub conciliado_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating an internal record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInternalRecord {
    pub company_id: i64,
    pub account_id: i64,
    pub date: NaiveDate,
    pub amount: f64,
    pub direction: RecordDirection,
    #[serde(default)]
    pub category: RecordCategory,
    #[serde(default)]
    pub document_number: Option<String>,
    #[serde(default)]
    pub counterparty_id: Option<i64>,
    #[serde(default)]
    pub counterparty_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

// ============================================================================
// Matching results
// ============================================================================

/// One scored match proposal (transient, never persisted)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub candidate_id: i64,
    /// 0-100
    pub score: f64,
    /// Absolute amount difference
    pub amount_difference: f64,
    /// Absolute date difference in days
    pub date_difference: i64,
    pub match_type: MatchType,
    pub reasoning: String,
}

impl MatchResult {
    /// Score expressed as a 0-1 confidence
    pub fn confidence(&self) -> f64 {
        (self.score / 100.0).clamp(0.0, 1.0)
    }
}

/// Ranked proposals for one bank line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionSet {
    pub item_id: i64,
    pub candidates: Vec<MatchResult>,
    /// Exactly one surviving candidate at or above the auto threshold
    pub auto_reconcileable: bool,
}

/// What a batch pass did with one line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchOutcome {
    Matched {
        record_id: i64,
        match_type: MatchType,
        confidence: f64,
    },
    /// Candidates exist but none could be chosen unambiguously
    Ambiguous { candidates: usize },
    /// No candidate at all
    Suspense,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub item_id: i64,
    #[serde(flatten)]
    pub outcome: BatchOutcome,
}

/// Result of one auto-match pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResult {
    pub statement_id: i64,
    pub total_items: i64,
    /// Lines matched during this pass
    pub matched: i64,
    /// Attempted lines still unmatched after this pass
    pub unmatched: i64,
    /// Attempted lines that had no candidate at all
    pub suspense: i64,
    pub items: Vec<ItemOutcome>,
}

/// Per match-type breakdown of matched lines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchTypeBreakdown {
    pub exact: i64,
    pub fuzzy: i64,
    pub reference: i64,
    pub manual: i64,
}

impl MatchTypeBreakdown {
    pub fn add(&mut self, match_type: MatchType, count: i64) {
        match match_type {
            MatchType::Exact => self.exact += count,
            MatchType::Fuzzy => self.fuzzy += count,
            MatchType::Reference => self.reference += count,
            MatchType::Manual => self.manual += count,
        }
    }

    pub fn total(&self) -> i64 {
        self.exact + self.fuzzy + self.reference + self.manual
    }
}

/// Counts derived directly from item rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryCounts {
    pub statement_id: i64,
    pub total_items: i64,
    pub matched: i64,
    pub pending: i64,
    pub suspense: i64,
    pub suspense_resolved: i64,
    pub by_match_type: MatchTypeBreakdown,
    pub matched_amount: f64,
    pub pending_amount: f64,
}

/// Counters as stored on the statement row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCounters {
    pub total_items: i64,
    pub matched: i64,
    pub pending: i64,
    pub suspense: i64,
}

impl From<&Statement> for StoredCounters {
    fn from(s: &Statement) -> Self {
        Self {
            total_items: s.total_items,
            matched: s.matched_count,
            pending: s.pending_count,
            suspense: s.suspense_count,
        }
    }
}

/// Stored counters compared against a fresh recount
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterCheck {
    pub statement_id: i64,
    pub stored: StoredCounters,
    pub recomputed: SummaryCounts,
    pub consistent: bool,
}
