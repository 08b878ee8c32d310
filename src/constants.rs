//! # File Format Constants
//!
//! Centralizes every constant the on-disk format depends on. Values that
//! derive from each other are co-located so a change to one is checked
//! against the others.
//!
//! ## Header Arithmetic
//!
//! ```text
//! HEADER_FIXED_SIZE (3 bytes)
//!       │
//!       │   [version:1][column count:1][index column:1]
//!       │
//!       └─> header_size = HEADER_FIXED_SIZE + column count + row_size
//!             The trailing row_size bytes are the reserved backup slot,
//!             a staging area for pre-images during in-place updates.
//!
//! MAX_LAYOUT_SIZE (255)
//!       │
//!       └─> The column count is persisted in a single byte; 0 is invalid,
//!           so a layout holds 1..=255 elements.
//! ```
//!
//! ## Row Flags
//!
//! The first byte of every row encodes its lifecycle state; see
//! [`crate::line::LineFlag`] for the state machine. The numeric values of
//! `Active`, `Inactive` and `NoRecycle` are fixed by the original file
//! format; the remaining states occupy previously unused byte values.

/// Current on-disk format version, persisted as the header's first byte.
pub const FORMAT_VERSION: u8 = 1;

/// Bytes of header before the column type-id list begins.
pub const HEADER_FIXED_SIZE: usize = 3;

/// Maximum number of columns a layout may hold.
pub const MAX_LAYOUT_SIZE: usize = 255;
