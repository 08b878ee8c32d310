//! # Runtime Values and the Binary Codec
//!
//! `Value` is the closed tagged variant holding one cell of a row, one arm
//! per [`ElementType`] kind. The codec itself lives on `ElementType`:
//! validity checks, buffer and stream encode/decode, and the text form used
//! for human-readable import/export.
//!
//! ## Codec Contract
//!
//! - Buffer encode writes exactly `size()` bytes (unused string/blob tail
//!   is zero padding).
//! - Stream decode and encode always advance the cursor by exactly
//!   `size()` bytes, seeking over padding, so the stream stays row-aligned
//!   for the next column regardless of payload length.
//! - A string/blob length prefix at or above the declared width is treated
//!   as an empty payload; the remaining declared width is still skipped.
//! - `from_text` never fails: unparsable text falls back to the kind's
//!   zero value (`false`, `0`, empty string/blob, zero timestamp).

use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::Result;
use crate::types::datetime::DateTime;
use crate::types::element::ElementType;

/// One cell of a row: the runtime counterpart of an [`ElementType`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Byte(u8),
    Short(i16),
    Int(i32),
    Long(i64),
    String(String),
    Blob(Vec<u8>),
    DateTime(DateTime),
}

impl Value {
    /// Borrows the payload of a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "Bool",
            Value::Byte(_) => "Byte",
            Value::Short(_) => "Short",
            Value::Int(_) => "Int",
            Value::Long(_) => "Long",
            Value::String(_) => "String",
            Value::Blob(_) => "Blob",
            Value::DateTime(_) => "DateTime",
        }
    }
}

impl ElementType {
    /// Checks that `value` is the right variant for this descriptor and,
    /// for strings and blobs, that the payload fits in `size() - 1` bytes.
    pub fn is_valid(self, value: &Value) -> bool {
        match value {
            Value::Bool(_) => matches!(self, ElementType::Bool),
            Value::Byte(_) => matches!(self, ElementType::Byte),
            Value::Short(_) => matches!(self, ElementType::Short),
            Value::Int(_) => matches!(self, ElementType::Int),
            Value::Long(_) => matches!(self, ElementType::Long),
            Value::String(s) => self.is_string() && s.len() <= self.size() - 1,
            Value::Blob(b) => self.is_blob() && b.len() <= self.size() - 1,
            Value::DateTime(_) => matches!(self, ElementType::DateTime),
        }
    }

    /// The fallback value used when text parsing fails.
    pub fn zero_value(self) -> Value {
        match self {
            ElementType::Bool => Value::Bool(false),
            ElementType::Byte => Value::Byte(0),
            ElementType::Short => Value::Short(0),
            ElementType::Int => Value::Int(0),
            ElementType::Long => Value::Long(0),
            ElementType::DateTime => Value::DateTime(DateTime::default()),
            _ if self.is_string() => Value::String(String::new()),
            _ => Value::Blob(Vec::new()),
        }
    }

    /// Encodes `value` into `buf`, which must be exactly `size()` bytes of
    /// zeroed scratch. The caller must have validated the value first; a
    /// mismatched variant leaves the buffer zeroed.
    pub fn encode(self, value: &Value, buf: &mut [u8]) {
        debug_assert_eq!(buf.len(), self.size());

        match value {
            Value::Bool(b) => buf[0] = *b as u8,
            Value::Byte(b) => buf[0] = *b,
            Value::Short(v) => buf.copy_from_slice(&v.to_be_bytes()),
            Value::Int(v) => buf.copy_from_slice(&v.to_be_bytes()),
            Value::Long(v) => buf.copy_from_slice(&v.to_be_bytes()),
            Value::String(s) => {
                buf[0] = s.len() as u8;
                buf[1..1 + s.len()].copy_from_slice(s.as_bytes());
            }
            Value::Blob(b) => {
                buf[0] = b.len() as u8;
                buf[1..1 + b.len()].copy_from_slice(b);
            }
            Value::DateTime(dt) => dt.encode(buf),
        }
    }

    /// Writes `value` at the current stream position, advancing the cursor
    /// by exactly `size()` bytes (string/blob padding is seeked over, not
    /// rewritten).
    pub fn write<W: Write + Seek>(self, value: &Value, writer: &mut W) -> Result<()> {
        match value {
            Value::String(s) => self.write_prefixed(s.as_bytes(), writer),
            Value::Blob(b) => self.write_prefixed(b, writer),
            _ => {
                let mut buf = [0u8; 8];
                let buf = &mut buf[..self.size()];
                self.encode(value, buf);
                writer.write_all(buf)?;
                Ok(())
            }
        }
    }

    fn write_prefixed<W: Write + Seek>(self, payload: &[u8], writer: &mut W) -> Result<()> {
        writer.write_all(&[payload.len() as u8])?;
        writer.write_all(payload)?;

        let padding = self.size() - 1 - payload.len();
        if padding > 0 {
            writer.seek(SeekFrom::Current(padding as i64))?;
        }

        Ok(())
    }

    /// Decodes one value from the current stream position, advancing the
    /// cursor by exactly `size()` bytes.
    pub fn parse<R: Read + Seek>(self, reader: &mut R) -> Result<Value> {
        match self {
            ElementType::Bool => Ok(Value::Bool(read_byte(reader)? == 0x01)),
            ElementType::Byte => Ok(Value::Byte(read_byte(reader)?)),
            ElementType::Short => {
                let mut buf = [0u8; 2];
                reader.read_exact(&mut buf)?;
                Ok(Value::Short(i16::from_be_bytes(buf)))
            }
            ElementType::Int => {
                let mut buf = [0u8; 4];
                reader.read_exact(&mut buf)?;
                Ok(Value::Int(i32::from_be_bytes(buf)))
            }
            ElementType::Long => {
                let mut buf = [0u8; 8];
                reader.read_exact(&mut buf)?;
                Ok(Value::Long(i64::from_be_bytes(buf)))
            }
            ElementType::DateTime => {
                let mut buf = [0u8; 7];
                reader.read_exact(&mut buf)?;
                Ok(Value::DateTime(DateTime::decode(&buf)))
            }
            _ if self.is_string() => {
                let payload = self.read_prefixed(reader)?;
                Ok(Value::String(String::from_utf8_lossy(&payload).into_owned()))
            }
            _ => {
                let payload = self.read_prefixed(reader)?;
                Ok(Value::Blob(payload))
            }
        }
    }

    /// Reads a length-prefixed payload, consuming exactly `size()` bytes.
    /// A prefix of zero or at/above the declared width yields an empty
    /// payload.
    fn read_prefixed<R: Read + Seek>(self, reader: &mut R) -> Result<Vec<u8>> {
        let length = read_byte(reader)? as usize;

        if length == 0 || length >= self.size() {
            reader.seek(SeekFrom::Current((self.size() - 1) as i64))?;
            return Ok(Vec::new());
        }

        let mut payload = vec![0u8; length];
        reader.read_exact(&mut payload)?;

        let padding = self.size() - 1 - length;
        if padding > 0 {
            reader.seek(SeekFrom::Current(padding as i64))?;
        }

        Ok(payload)
    }

    /// Human-readable form of `value` for export.
    pub fn to_text(self, value: &Value) -> String {
        match value {
            Value::Bool(b) => b.to_string(),
            Value::Byte(b) => b.to_string(),
            Value::Short(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Long(v) => v.to_string(),
            Value::String(s) => s.clone(),
            Value::Blob(b) => b.iter().map(|byte| format!("{:02x}", byte)).collect(),
            Value::DateTime(dt) => dt.to_string(),
        }
    }

    /// Parses the text form back into a value. Never fails: unparsable
    /// text yields this kind's zero value.
    pub fn from_text(self, text: &str) -> Value {
        match self {
            ElementType::Bool => Value::Bool(text.eq_ignore_ascii_case("true")),
            ElementType::Byte => Value::Byte(text.parse().unwrap_or(0)),
            ElementType::Short => Value::Short(text.parse().unwrap_or(0)),
            ElementType::Int => Value::Int(text.parse().unwrap_or(0)),
            ElementType::Long => Value::Long(text.parse().unwrap_or(0)),
            ElementType::DateTime => Value::DateTime(DateTime::parse(text)),
            _ if self.is_string() => Value::String(text.to_string()),
            _ => Value::Blob(decode_hex(text).unwrap_or_default()),
        }
    }
}

fn read_byte<R: Read>(reader: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }

    text.as_bytes()
        .chunks(2)
        .map(|pair| {
            let high = (pair[0] as char).to_digit(16)?;
            let low = (pair[1] as char).to_digit(16)?;
            Some((high * 16 + low) as u8)
        })
        .collect()
}
