//! Crate-level error types.
use thiserror::Error;

/// Errors surfaced by model lookups and persistence.
///
/// Everything here is detect-and-propagate: there are no retries and no
/// recovery paths anywhere in the crate.
#[derive(Debug, Error)]
pub enum OrmError {
    /// The backing store failed or rejected a query.
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    /// A filtered lookup matched more than one row where at most one was
    /// expected.
    #[error("lookup on `{table}` matched {matched} rows, expected at most one")]
    MultipleRecords { table: &'static str, matched: usize },
}
