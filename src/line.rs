//! # Line Handles and the Row State Machine
//!
//! A `Line` is the in-memory handle for one on-disk row: its unique key,
//! optional sort key, slot number, current flag and materialized column
//! values. Lines live exclusively in the engine's slot table; the primary
//! and secondary indexes refer to them by slot number.
//!
//! ## Flag State Machine
//!
//! ```text
//! (slot reserved) ──> Incomplete ──> Active ⇄ Corrupt
//!                                      │
//!                                      ├──> Inactive    (recyclable)
//!                                      └──> NoRecycle   (permanent tombstone)
//! ```
//!
//! `Corrupt` is transient, bracketing a single in-place rewrite; a row
//! still flagged `Corrupt` at initialize time signals an interrupted
//! update and is repaired from the header's backup slot. `Backup` and
//! `BackupObject` tag only that reserved slot, never a live row.

use crate::types::Value;

/// Lifecycle state of a row, persisted as its first byte.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineFlag {
    /// Storage reserved, payload not yet fully written.
    Incomplete = 0x10,
    /// Fully written, live, indexed.
    Active = 0x20,
    /// Soft-deleted; the slot may be reclaimed by external compaction.
    Inactive = 0x40,
    /// Soft-deleted, never reusable.
    NoRecycle = 0x48,
    /// In-place rewrite in progress; repaired from the backup slot if
    /// observed at initialize time.
    Corrupt = 0x80,
    /// Backup slot holds a full-row pre-image.
    Backup = 0x81,
    /// Backup slot holds a single-field pre-image, preceded by one byte
    /// naming the column.
    BackupObject = 0x82,
}

impl LineFlag {
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x10 => Some(LineFlag::Incomplete),
            0x20 => Some(LineFlag::Active),
            0x40 => Some(LineFlag::Inactive),
            0x48 => Some(LineFlag::NoRecycle),
            0x80 => Some(LineFlag::Corrupt),
            0x81 => Some(LineFlag::Backup),
            0x82 => Some(LineFlag::BackupObject),
            _ => None,
        }
    }

    /// True for the soft-deleted terminal states.
    pub const fn is_tombstone(self) -> bool {
        matches!(self, LineFlag::Inactive | LineFlag::NoRecycle)
    }
}

/// In-memory handle for one logical record.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    key: String,
    sort_key: Option<String>,
    slot: u32,
    flag: LineFlag,
    content: Vec<Value>,
}

impl Line {
    pub(crate) fn new(
        key: String,
        sort_key: Option<String>,
        slot: u32,
        flag: LineFlag,
        content: Vec<Value>,
    ) -> Self {
        Self {
            key,
            sort_key,
            slot,
            flag,
            content,
        }
    }

    /// Current value of the index column.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current value of the sort column, when grouping is enabled.
    pub fn sort_key(&self) -> Option<&str> {
        self.sort_key.as_deref()
    }

    /// Physical slot number; fixed for the line's lifetime.
    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn flag(&self) -> LineFlag {
        self.flag
    }

    /// Materialized column values, in schema order.
    pub fn content(&self) -> &[Value] {
        &self.content
    }

    pub fn value(&self, column: usize) -> Option<&Value> {
        self.content.get(column)
    }

    pub(crate) fn set_key(&mut self, key: String) {
        self.key = key;
    }

    pub(crate) fn set_sort_key(&mut self, sort_key: Option<String>) {
        self.sort_key = sort_key;
    }

    pub(crate) fn set_flag(&mut self, flag: LineFlag) {
        self.flag = flag;
    }

    pub(crate) fn set_value(&mut self, column: usize, value: Value) {
        self.content[column] = value;
    }
}
