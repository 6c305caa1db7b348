//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db)
//! - `statements` - Statement creation, listing and line import
//! - `records` - Internal record entry, import and unmatched listing
//! - `matching` - Batch matching, suggestions, manual match/unmatch
//! - `suspense` - Suspense resolution and materialization
//! - `reports` - Summary and counter verification
//! - `serve` - Web server command

pub mod core;
pub mod matching;
pub mod records;
pub mod reports;
pub mod serve;
pub mod statements;
pub mod suspense;

// Re-export command functions for main.rs
pub use self::core::*;
pub use matching::*;
pub use records::*;
pub use reports::*;
pub use serve::*;
pub use statements::*;
pub use suspense::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
