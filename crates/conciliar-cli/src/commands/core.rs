//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database with matching config
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use conciliar_core::{Database, MatchingConfig};
use tracing::debug;

/// Open the database with thresholds loaded from `config_path` or the default locations
pub fn open_db(db_path: &Path, config_path: Option<&Path>) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;
    let config = MatchingConfig::load(config_path).context("Failed to load matching config")?;
    debug!(path = path_str, "Opening database");
    Database::with_config(path_str, config).context("Failed to open database")
}

pub fn cmd_init(db_path: &Path, config_path: Option<&Path>) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, config_path)?;
    let config = db.config();

    println!(
        "   Auto-reconcile threshold: {}",
        config.auto_reconcile_threshold
    );
    println!(
        "   Suggestions: score >= {}, up to {}",
        config.min_suggestion_score, config.max_suggestions
    );
    println!(
        "   New statement tolerance: {}% / {} days",
        config.default_amount_tolerance_pct, config.default_date_tolerance_days
    );

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Create a statement: conciliar statement create --company 1 --account 1 --period 2026-01");
    println!("  2. Load bank lines: conciliar statement import-items 1 --file lines.csv");
    println!("  3. Load records: conciliar records import --company 1 --account 1 --file records.csv");
    println!("  4. Match: conciliar auto-match 1");

    Ok(())
}
