//! Conciliar Core Library
//!
//! Bank-statement reconciliation:
//! - Database access, migrations and transactional match bookkeeping
//! - Scoring engine for bank line vs internal record candidates
//! - Learned description patterns that bias scoring
//! - Suggestion aggregation and batch matching strategies
//! - Suspense handling and recomputed summaries
//! - Loaders for already-normalized CSV lines and records

pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod models;
pub mod patterns;
pub mod scoring;
pub mod strategy;
pub mod suggest;
pub mod text;

pub use config::MatchingConfig;
pub use db::{Database, RecordFilter};
pub use error::{Error, Result};
pub use patterns::PatternMap;
pub use scoring::Scorer;
pub use strategy::{StrategyMatcher, Tolerance};
