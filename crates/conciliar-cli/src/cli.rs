//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Conciliar - Reconcile bank statements against accounting records
#[derive(Parser)]
#[command(name = "conciliar")]
#[command(about = "Bank statement reconciliation engine", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "conciliar.db", global = true)]
    pub db: PathBuf,

    /// Matching thresholds file (TOML)
    ///
    /// Defaults to the override in the platform data directory, then to the
    /// built-in thresholds.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// User recorded on manual actions
    #[arg(long, default_value = "cli", global = true)]
    pub user: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Manage bank statements and their lines
    Statement {
        #[command(subcommand)]
        action: StatementAction,
    },

    /// Manage internal accounting records
    Records {
        #[command(subcommand)]
        action: RecordsAction,
    },

    /// Run the batch matcher over a statement's pending lines
    AutoMatch {
        /// Statement ID
        statement_id: i64,

        /// Ignore patterns learned from confirmed matches
        #[arg(long)]
        no_patterns: bool,

        /// Print the batch result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show ranked candidates for a statement line
    Suggest {
        /// Statement item ID
        item_id: i64,

        /// Print suggestions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manually match a statement line to an internal record
    Match {
        /// Statement item ID
        item_id: i64,

        /// Internal record ID
        record_id: i64,
    },

    /// Undo a match, releasing both sides
    Unmatch {
        /// Statement item ID
        item_id: i64,
    },

    /// Accept a suspense line without a counterpart
    Resolve {
        /// Statement item ID
        item_id: i64,

        /// Resolution notes
        #[arg(short, long, default_value = "")]
        notes: String,
    },

    /// Create a record from a suspense line and match it
    Materialize {
        /// Statement item ID
        item_id: i64,

        /// Record category (fee, interest, tax, transfer, adjustment, ...)
        ///
        /// Guessed from the bank text when omitted.
        #[arg(short = 't', long = "type")]
        reference_type: Option<String>,

        /// Description stored on the new record
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Show counts recomputed from statement lines
    Summary {
        /// Statement ID
        statement_id: i64,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare stored counters against a fresh recount
    Verify {
        /// Statement ID
        statement_id: i64,
    },

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

#[derive(Subcommand)]
pub enum StatementAction {
    /// Create an empty statement for a company account and period
    Create {
        /// Company (tenant) ID
        #[arg(long)]
        company: i64,

        /// Bank account ID
        #[arg(long)]
        account: i64,

        /// Period label (e.g. 2026-01)
        #[arg(long)]
        period: String,

        /// Amount tolerance in percent for fuzzy batch matches
        #[arg(long)]
        amount_tolerance: Option<f64>,

        /// Date tolerance in days for fuzzy batch matches
        #[arg(long)]
        date_tolerance: Option<i64>,
    },

    /// List statements
    List {
        /// Only statements of this company
        #[arg(long)]
        company: Option<i64>,
    },

    /// Show a statement and its lines
    Show {
        /// Statement ID
        id: i64,

        /// Line filter: all, pending, matched, suspense
        #[arg(short, long, default_value = "all")]
        state: String,
    },

    /// Append lines from a normalized CSV (date,debit,credit,reference,description)
    ImportItems {
        /// Statement ID
        id: i64,

        /// CSV file to import
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum RecordsAction {
    /// Add a single accounting record
    Add {
        /// Company (tenant) ID
        #[arg(long)]
        company: i64,

        /// Bank account ID
        #[arg(long)]
        account: i64,

        /// Record date (YYYY-MM-DD)
        #[arg(long)]
        date: String,

        /// Amount (stored positive)
        #[arg(long, allow_hyphen_values = true)]
        amount: f64,

        /// Direction: inflow, outflow, any
        #[arg(long, default_value = "any")]
        direction: String,

        /// Category (client_collection, supplier_payment, fee, ...)
        #[arg(long, default_value = "adjustment")]
        category: String,

        /// Document number (invoice, payment order)
        #[arg(long)]
        document: Option<String>,

        /// Counterparty ID
        #[arg(long)]
        counterparty_id: Option<i64>,

        /// Counterparty name
        #[arg(long)]
        counterparty_name: Option<String>,

        /// Free-text description
        #[arg(long)]
        description: Option<String>,
    },

    /// Import records from CSV (date,amount,direction,category,document_number,...)
    Import {
        /// Company (tenant) ID
        #[arg(long)]
        company: i64,

        /// Bank account ID
        #[arg(long)]
        account: i64,

        /// CSV file to import
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List unreconciled records of an account
    Unmatched {
        /// Bank account ID
        #[arg(long)]
        account: i64,

        /// Only records of this company
        #[arg(long)]
        company: Option<i64>,

        /// Only records usable against this bank direction (inflow, outflow)
        #[arg(long)]
        direction: Option<String>,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Minimum amount
        #[arg(long)]
        min: Option<f64>,

        /// Maximum amount
        #[arg(long)]
        max: Option<f64>,

        /// Search document number, counterparty and description
        #[arg(short, long)]
        search: Option<String>,

        /// Number of records to show
        #[arg(short, long, default_value = "50")]
        limit: i64,
    },
}
