//! # GrainDB - Embedded Fixed-Row-Width Record Store
//!
//! GrainDB is a minimal embedded storage engine: one file, a typed-column
//! schema, fixed-width rows, keyed lookup, optional secondary grouping and
//! crash-tolerant in-place updates. There is no external database process
//! and no write-ahead log; durability of in-place mutation comes from a
//! reserved backup slot in the file header and a flag-based row state
//! machine.
//!
//! ## Quick Start
//!
//! ```ignore
//! use graindb::{ElementRegistry, ElementType, GrainFile, Layout, Value};
//!
//! let db = GrainFile::new("scores.gdb", ElementRegistry::standard());
//!
//! db.create_new(
//!     Layout::new(&[ElementType::String8, ElementType::Int, ElementType::Bool]),
//!     0,      // index column: "name"
//!     None,   // no sort column
//! )?;
//! db.bind()?;
//!
//! db.add_line(&[Value::String("alice".into()), Value::Int(10), Value::Bool(true)])?;
//! let line = db.get_line("alice").unwrap();
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │        GrainFile (engine)           │
//! │  slot table │ primary │ secondary   │
//! ├─────────────────────────────────────┤
//! │     Layout (schema + offsets)       │
//! ├─────────────────────────────────────┤
//! │  ElementType / Value (fixed codec)  │
//! ├─────────────────────────────────────┤
//! │   seekable file stream (std::fs)    │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## File Layout
//!
//! ```text
//! [version:1][column count:1][index column:1][type ids:N]
//! [backup slot: row_size bytes][row 0][row 1]...
//! ```
//!
//! Every row is one flag byte plus fixed-width column payloads, so a slot
//! number converts to a byte offset with plain arithmetic. The backup slot
//! stages pre-images during in-place updates; see [`file`] for the full
//! recovery protocol.
//!
//! ## Concurrency
//!
//! The engine is synchronous and blocking. All state sits behind a single
//! per-file lock; operations execute as atomic units and never interleave
//! their seek/write sequences.
//!
//! ## Module Overview
//!
//! - [`types`]: element descriptors, runtime values, binary/text codec
//! - [`layout`]: ordered schema with derived byte offsets
//! - [`line`]: row handles and the flag state machine
//! - [`file`]: the storage engine itself
//! - [`error`]: the failure taxonomy
//! - [`constants`]: file-format constants

pub mod constants;
pub mod error;
pub mod file;
pub mod layout;
pub mod line;
pub mod types;

pub use error::{GrainError, Result};
pub use file::{GrainFile, LoadReport};
pub use layout::Layout;
pub use line::{Line, LineFlag};
pub use types::{DateTime, ElementRegistry, ElementType, Value};
