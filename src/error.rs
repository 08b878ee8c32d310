//! # Error Types
//!
//! Every failure the engine can report is a distinct variant of
//! [`GrainError`], so callers can branch on the cause rather than on the
//! mere presence of a failure.
//!
//! ## Taxonomy
//!
//! | Group | Variants | Surfaced by |
//! |-------|----------|-------------|
//! | Format | `EmptyFile`, `VersionMismatch`, `CorruptHeader`, `UnknownTypeId`, `FileCorrupt` | `initialize` |
//! | Schema | `NotIndexable`, `InvalidLayout`, `InvalidColumn` | `create_new`, `load` |
//! | State | `NotInitialized`, `NotLoaded`, `NotBound`, `AlreadyBound`, `NotSorted` | any operation |
//! | Operation | `SchemaMismatch`, `InvalidValue`, `DuplicateKey`, `UnknownKey` | CRUD calls |
//! | I/O | `Io` | any stream access |
//!
//! A file that loads with duplicate keys is *not* an error; that outcome is
//! carried in [`crate::file::LoadReport`] because the load still succeeds.

use thiserror::Error;

/// Result type alias using GrainError.
pub type Result<T> = std::result::Result<T, GrainError>;

/// Unified error type for all engine operations.
#[derive(Debug, Error)]
pub enum GrainError {
    // -------------------------------------------------------------------------
    // Format errors (initialize time)
    // -------------------------------------------------------------------------
    #[error("database file is empty")]
    EmptyFile,

    #[error("unsupported format version {found} (expected {expected})")]
    VersionMismatch { found: u8, expected: u8 },

    #[error("corrupt or truncated header: {0}")]
    CorruptHeader(&'static str),

    #[error("unknown column type id {0}")]
    UnknownTypeId(u8),

    #[error("file length is not aligned to the row size")]
    FileCorrupt,

    // -------------------------------------------------------------------------
    // Schema errors
    // -------------------------------------------------------------------------
    #[error("layout must have between 1 and 255 columns")]
    InvalidLayout,

    #[error("column {0} cannot serve as an index: not a string column")]
    NotIndexable(usize),

    #[error("column index {0} is out of range")]
    InvalidColumn(usize),

    // -------------------------------------------------------------------------
    // State errors
    // -------------------------------------------------------------------------
    #[error("file has not been initialized")]
    NotInitialized,

    #[error("file has not been loaded")]
    NotLoaded,

    #[error("no read-write stream is bound")]
    NotBound,

    #[error("a read-write stream is already bound")]
    AlreadyBound,

    #[error("no sort column was configured at load time")]
    NotSorted,

    // -------------------------------------------------------------------------
    // Operation errors
    // -------------------------------------------------------------------------
    #[error("expected {expected} values, got {got}")]
    SchemaMismatch { expected: usize, got: usize },

    #[error("value for column {column} does not satisfy its element type")]
    InvalidValue { column: usize },

    #[error("key '{0}' already exists")]
    DuplicateKey(String),

    #[error("key '{0}' not found")]
    UnknownKey(String),

    // -------------------------------------------------------------------------
    // I/O
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
