//! # Element Descriptors
//!
//! `ElementType` is the closed set of storable column kinds. Each variant
//! carries a persisted numeric id (written into the file header) and a
//! fixed on-disk width, so every row occupies exactly the same number of
//! bytes.
//!
//! ## Descriptor Table
//!
//! | Variant | id | width | notes |
//! |---------|----|-------|-------|
//! | Bool | 0 | 1 | 0x00 / 0x01 |
//! | Byte | 1 | 1 | raw |
//! | Short | 2 | 2 | big-endian i16 |
//! | Int | 3 | 4 | big-endian i32 |
//! | Long | 4 | 8 | big-endian i64 |
//! | String8..String256 | 32..37 | 9..257 | 1 length byte + UTF-8 + pad |
//! | Blob8..Blob256 | 64..69 | 9..257 | 1 length byte + bytes + pad |
//! | DateTime | 128 | 7 | see [`crate::types::datetime`] |
//!
//! Strings and blobs hold up to `width - 1` payload bytes; the leading byte
//! records the actual payload length and the unused tail is padding.
//!
//! ## Registry
//!
//! [`ElementRegistry`] resolves a persisted type id back to its descriptor.
//! It is an explicit value constructed once (see
//! [`ElementRegistry::standard`]) and held by the engine, never a global,
//! and never mutated after construction.

use crate::types::datetime::DATETIME_SIZE;

/// A column's element descriptor: one arm per storable kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Bool,
    Byte,
    Short,
    Int,
    Long,
    String8,
    String16,
    String32,
    String64,
    String128,
    String256,
    Blob8,
    Blob16,
    Blob32,
    Blob64,
    Blob128,
    Blob256,
    DateTime,
}

/// Every descriptor, in registration order.
pub const ALL_ELEMENTS: [ElementType; 18] = [
    ElementType::Bool,
    ElementType::Byte,
    ElementType::Short,
    ElementType::Int,
    ElementType::Long,
    ElementType::String8,
    ElementType::String16,
    ElementType::String32,
    ElementType::String64,
    ElementType::String128,
    ElementType::String256,
    ElementType::Blob8,
    ElementType::Blob16,
    ElementType::Blob32,
    ElementType::Blob64,
    ElementType::Blob128,
    ElementType::Blob256,
    ElementType::DateTime,
];

impl ElementType {
    /// Persisted type id, written into the file header.
    pub const fn id(self) -> u8 {
        match self {
            ElementType::Bool => 0,
            ElementType::Byte => 1,
            ElementType::Short => 2,
            ElementType::Int => 3,
            ElementType::Long => 4,
            ElementType::String8 => 32,
            ElementType::String16 => 33,
            ElementType::String32 => 34,
            ElementType::String64 => 35,
            ElementType::String128 => 36,
            ElementType::String256 => 37,
            ElementType::Blob8 => 64,
            ElementType::Blob16 => 65,
            ElementType::Blob32 => 66,
            ElementType::Blob64 => 67,
            ElementType::Blob128 => 68,
            ElementType::Blob256 => 69,
            ElementType::DateTime => 128,
        }
    }

    /// Fixed on-disk width in bytes, including the length prefix for
    /// strings and blobs.
    pub const fn size(self) -> usize {
        match self {
            ElementType::Bool | ElementType::Byte => 1,
            ElementType::Short => 2,
            ElementType::Int => 4,
            ElementType::Long => 8,
            ElementType::String8 | ElementType::Blob8 => 9,
            ElementType::String16 | ElementType::Blob16 => 17,
            ElementType::String32 | ElementType::Blob32 => 33,
            ElementType::String64 | ElementType::Blob64 => 65,
            ElementType::String128 | ElementType::Blob128 => 129,
            ElementType::String256 | ElementType::Blob256 => 257,
            ElementType::DateTime => DATETIME_SIZE,
        }
    }

    /// Maximum payload length for strings and blobs; `None` for fixed
    /// scalar kinds.
    pub const fn capacity(self) -> Option<usize> {
        if self.is_string() || self.is_blob() {
            Some(self.size() - 1)
        } else {
            None
        }
    }

    pub const fn is_string(self) -> bool {
        matches!(
            self,
            ElementType::String8
                | ElementType::String16
                | ElementType::String32
                | ElementType::String64
                | ElementType::String128
                | ElementType::String256
        )
    }

    pub const fn is_blob(self) -> bool {
        matches!(
            self,
            ElementType::Blob8
                | ElementType::Blob16
                | ElementType::Blob32
                | ElementType::Blob64
                | ElementType::Blob128
                | ElementType::Blob256
        )
    }

    /// Human-readable descriptor name for diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            ElementType::Bool => "Bool",
            ElementType::Byte => "Byte",
            ElementType::Short => "Short",
            ElementType::Int => "Int",
            ElementType::Long => "Long",
            ElementType::String8 => "String8",
            ElementType::String16 => "String16",
            ElementType::String32 => "String32",
            ElementType::String64 => "String64",
            ElementType::String128 => "String128",
            ElementType::String256 => "String256",
            ElementType::Blob8 => "Blob8",
            ElementType::Blob16 => "Blob16",
            ElementType::Blob32 => "Blob32",
            ElementType::Blob64 => "Blob64",
            ElementType::Blob128 => "Blob128",
            ElementType::Blob256 => "Blob256",
            ElementType::DateTime => "DateTime",
        }
    }
}

/// Resolves persisted type ids to descriptors.
///
/// Constructed once and passed by reference wherever a header must be
/// decoded; the table is immutable after construction.
#[derive(Debug, Clone)]
pub struct ElementRegistry {
    table: [Option<ElementType>; 256],
}

impl ElementRegistry {
    /// Builds the registry holding every standard descriptor.
    pub fn standard() -> Self {
        let mut registry = Self {
            table: [None; 256],
        };

        for element in ALL_ELEMENTS {
            registry.table[element.id() as usize] = Some(element);
        }

        registry
    }

    /// Resolves a type id, or `None` if the id is not registered.
    pub fn resolve(&self, id: u8) -> Option<ElementType> {
        self.table[id as usize]
    }
}

impl Default for ElementRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let mut seen = [false; 256];
        for element in ALL_ELEMENTS {
            assert!(!seen[element.id() as usize], "duplicate id {}", element.id());
            seen[element.id() as usize] = true;
        }
    }

    #[test]
    fn string_tiers_match_capacity_plus_prefix() {
        for element in ALL_ELEMENTS {
            if let Some(capacity) = element.capacity() {
                assert_eq!(element.size(), capacity + 1);
            }
        }
    }

    #[test]
    fn registry_resolves_every_standard_id() {
        let registry = ElementRegistry::standard();
        for element in ALL_ELEMENTS {
            assert_eq!(registry.resolve(element.id()), Some(element));
        }
    }

    #[test]
    fn registry_rejects_unknown_ids() {
        let registry = ElementRegistry::standard();
        assert_eq!(registry.resolve(200), None);
        assert_eq!(registry.resolve(5), None);
    }
}
