//! Error types for reconciliation

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// One side of a requested match is already claimed
    #[error("Already reconciled: {0}")]
    AlreadyReconciled(String),

    /// Unmatch requested on an item that is not matched
    #[error("Not reconciled: {0}")]
    NotReconciled(String),

    /// Suspense action requested on an item that is not an open suspense line
    #[error("Not a suspense item: {0}")]
    NotSuspense(String),

    /// State changed between read and write; the caller may retry
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),
}

impl Error {
    /// Whether this error reports a domain rule rather than an infrastructure failure
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::AlreadyReconciled(_)
                | Self::NotReconciled(_)
                | Self::NotSuspense(_)
                | Self::PreconditionFailed(_)
                | Self::InvalidData(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_domain_splits_rules_from_infrastructure() {
        assert!(Error::NotFound("item 1".into()).is_domain());
        assert!(Error::AlreadyReconciled("record 2".into()).is_domain());
        assert!(Error::InvalidData("bad date".into()).is_domain());
        assert!(!Error::Config("missing weights".into()).is_domain());
        assert!(!Error::Io(std::io::Error::other("disk")).is_domain());
    }
}
