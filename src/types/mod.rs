//! # Typed Value System
//!
//! The canonical type system for GrainDB: descriptors, runtime values and
//! the binary/text codec.
//!
//! ## Module Structure
//!
//! - `element`: `ElementType` descriptors and the `ElementRegistry`
//! - `value`: runtime `Value` variant plus the codec on `ElementType`
//! - `datetime`: the 7-byte calendar timestamp
//!
//! ## Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | `ElementType` | Storage-level column descriptor (id + fixed width) |
//! | `ElementRegistry` | Type id resolution when decoding headers |
//! | `Value` | Runtime cell value, one arm per descriptor kind |
//! | `DateTime` | Second-precision calendar timestamp |

pub mod datetime;
pub mod element;
pub mod value;

pub use datetime::DateTime;
pub use element::{ElementRegistry, ElementType, ALL_ELEMENTS};
pub use value::Value;
