//! # Row Layout
//!
//! A `Layout` is the ordered schema of a file: the sequence of element
//! descriptors plus the byte arithmetic derived from it. All offsets are
//! computed once at construction and never change.
//!
//! ## Derived Sizes
//!
//! ```text
//! offsets[i]  = sum of widths of elements before i   (payload-relative,
//!               excluding the row's leading flag byte)
//! row_size    = 1 flag byte + sum of element widths
//! header_size = 3 fixed bytes + element count + row_size
//!               (the trailing row_size bytes are the reserved backup slot)
//! ```
//!
//! Two layouts are schema-compatible iff their type-id sequences are equal,
//! element for element; [`Layout::compare`] checks exactly that and is used
//! to validate that a reloaded file still matches the schema a caller
//! expects.

use crate::constants::HEADER_FIXED_SIZE;
use crate::error::{GrainError, Result};
use crate::types::{ElementRegistry, ElementType};

/// The ordered schema of a file with its derived byte offsets.
#[derive(Debug, Clone)]
pub struct Layout {
    elements: Vec<ElementType>,
    offsets: Vec<usize>,
    row_size: usize,
    header_size: usize,
}

impl Layout {
    /// Builds a layout from an ordered element sequence.
    pub fn new(elements: &[ElementType]) -> Self {
        let mut offsets = Vec::with_capacity(elements.len());
        let mut offset = 0;

        for element in elements {
            offsets.push(offset);
            offset += element.size();
        }

        let row_size = offset + 1;

        Self {
            elements: elements.to_vec(),
            offsets,
            row_size,
            header_size: HEADER_FIXED_SIZE + elements.len() + row_size,
        }
    }

    /// Rebuilds a layout from the type-id list persisted in a file header.
    pub fn from_ids(ids: &[u8], registry: &ElementRegistry) -> Result<Self> {
        let mut elements = Vec::with_capacity(ids.len());

        for &id in ids {
            elements.push(registry.resolve(id).ok_or(GrainError::UnknownTypeId(id))?);
        }

        Ok(Self::new(&elements))
    }

    pub fn elements(&self) -> &[ElementType] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Payload-relative byte offset of column `index`.
    pub fn offset(&self, index: usize) -> usize {
        self.offsets[index]
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Full row width in bytes, including the leading flag byte.
    pub fn row_size(&self) -> usize {
        self.row_size
    }

    /// Header width in bytes, including the reserved backup slot.
    pub fn header_size(&self) -> usize {
        self.header_size
    }

    /// Schema-identity check: equal type-id sequences, length and all.
    pub fn compare(&self, other: &Layout) -> bool {
        self.elements.len() == other.elements.len()
            && self
                .elements
                .iter()
                .zip(&other.elements)
                .all(|(a, b)| a.id() == b.id())
    }
}
