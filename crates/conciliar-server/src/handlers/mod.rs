//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod items;
pub mod records;
pub mod statements;

// Re-export all handlers for use in router
pub use items::*;
pub use records::*;
pub use statements::*;
