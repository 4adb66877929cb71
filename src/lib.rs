//! # Deprekey - deterministic re-keying of dependency records
//!
//! One-shot migration for a package/dependency store whose dependency rows
//! were keyed with random UUIDs. After it runs, every dependency id is a
//! name-based UUID derived from the row's content, and every link row that
//! referenced the old id references the new one.
//!
//! Deprekey provides:
//! - Backfill of concrete dependent versions from `version_range`
//! - Content-derived identity (SHA-256, version 5 layout)
//! - A constraint gate around the key rewrite window
//! - The migration itself, plus read-only planning and verification

pub mod backfill;
pub mod config;
pub mod constraint;
pub mod identity;
pub mod migrate;
pub mod storage;
pub mod ui;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenient access
pub use constraint::{ConstraintGate, ForeignKey};
pub use identity::DependencyContent;
pub use migrate::{MigrationPlan, MigrationReport, Migrator, Verification};
pub use storage::{SqliteStore, Store};

/// Result type alias for Deprekey operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Deprekey operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unable to connect to {target}")]
    Connect {
        target: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Storage error")]
    Storage(#[from] rusqlite::Error),

    #[error("Failed to decode row")]
    Decode(#[source] rusqlite::Error),

    #[error("Batch '{label}' failed at statement {index}")]
    BatchFailed {
        label: &'static str,
        index: usize,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Batch '{label}' statement {index} affected {affected} row(s), expected 1")]
    RowMismatch {
        label: &'static str,
        index: usize,
        affected: usize,
    },

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Foreign key {0} does not exist")]
    ConstraintMissing(String),

    #[error("Foreign key {0} already exists")]
    ConstraintExists(String),

    #[error("Foreign key {constraint} is violated by {rows} existing row(s)")]
    ConstraintViolation { constraint: String, rows: u64 },

    #[error("Foreign key {constraint} left disabled, restore it manually")]
    ConstraintLeftDisabled {
        constraint: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Invalid pattern")]
    Pattern(#[from] regex::Error),
}
