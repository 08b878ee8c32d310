//! # Calendar Timestamps
//!
//! Seven-byte calendar timestamp: a big-endian 16-bit year followed by
//! month, day, hour, minute and second as single bytes. No timezone, no
//! sub-second precision.
//!
//! The text form is `Y-M-D H:MM:SS` with minute and second zero-padded
//! (the hour is not). Parsing is permissive: `-` or `.` may separate date
//! fields, the time part is optional, and missing time fields default to
//! zero. Text that does not yield a full date parses to the zero timestamp
//! rather than failing.

use std::fmt;

/// Width in bytes of an encoded timestamp.
pub const DATETIME_SIZE: usize = 7;

/// A calendar timestamp with second precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTime {
    pub fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// Encodes into exactly [`DATETIME_SIZE`] bytes.
    pub fn encode(&self, buf: &mut [u8]) {
        buf[..2].copy_from_slice(&self.year.to_be_bytes());
        buf[2] = self.month;
        buf[3] = self.day;
        buf[4] = self.hour;
        buf[5] = self.minute;
        buf[6] = self.second;
    }

    /// Decodes from exactly [`DATETIME_SIZE`] bytes.
    pub fn decode(buf: &[u8]) -> Self {
        Self {
            year: u16::from_be_bytes([buf[0], buf[1]]),
            month: buf[2],
            day: buf[3],
            hour: buf[4],
            minute: buf[5],
            second: buf[6],
        }
    }

    /// Parses the permissive text form. Never fails: a string without a
    /// complete `Y-M-D` date yields the zero timestamp.
    pub fn parse(text: &str) -> Self {
        let mut parts = text.trim().splitn(2, ' ');
        let date = parts.next().unwrap_or("");
        let time = parts.next();

        let fields: Vec<&str> = date.split(['-', '.']).collect();
        if fields.len() != 3 {
            return Self::default();
        }

        let (Ok(year), Ok(month), Ok(day)) = (
            fields[0].parse::<u16>(),
            fields[1].parse::<u8>(),
            fields[2].parse::<u8>(),
        ) else {
            return Self::default();
        };

        let mut out = Self {
            year,
            month,
            day,
            ..Self::default()
        };

        if let Some(time) = time {
            let mut clock = time.split(':');
            out.hour = clock.next().and_then(|s| s.parse().ok()).unwrap_or(0);
            out.minute = clock.next().and_then(|s| s.parse().ok()).unwrap_or(0);
            out.second = clock.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        }

        out
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{} {}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let dt = DateTime::new(2024, 3, 9, 17, 4, 59);
        let mut buf = [0u8; DATETIME_SIZE];
        dt.encode(&mut buf);
        assert_eq!(DateTime::decode(&buf), dt);
    }

    #[test]
    fn year_is_big_endian() {
        let dt = DateTime::new(2024, 1, 1, 0, 0, 0);
        let mut buf = [0u8; DATETIME_SIZE];
        dt.encode(&mut buf);
        assert_eq!(&buf[..2], &2024u16.to_be_bytes());
    }

    #[test]
    fn display_pads_minute_and_second_only() {
        let dt = DateTime::new(2024, 3, 9, 7, 4, 5);
        assert_eq!(dt.to_string(), "2024-3-9 7:04:05");
    }

    #[test]
    fn parse_full_form() {
        assert_eq!(
            DateTime::parse("2024-3-9 7:04:05"),
            DateTime::new(2024, 3, 9, 7, 4, 5)
        );
    }

    #[test]
    fn parse_accepts_dot_separators() {
        assert_eq!(
            DateTime::parse("2024.12.31"),
            DateTime::new(2024, 12, 31, 0, 0, 0)
        );
    }

    #[test]
    fn parse_missing_time_fields_default_to_zero() {
        assert_eq!(
            DateTime::parse("2024-1-2 13"),
            DateTime::new(2024, 1, 2, 13, 0, 0)
        );
        assert_eq!(
            DateTime::parse("2024-1-2 13:30"),
            DateTime::new(2024, 1, 2, 13, 30, 0)
        );
    }

    #[test]
    fn parse_malformed_yields_zero_timestamp() {
        assert_eq!(DateTime::parse("not a date"), DateTime::default());
        assert_eq!(DateTime::parse("2024-1"), DateTime::default());
        assert_eq!(DateTime::parse(""), DateTime::default());
    }

    #[test]
    fn display_parse_roundtrip() {
        let dt = DateTime::new(1999, 12, 31, 23, 59, 58);
        assert_eq!(DateTime::parse(&dt.to_string()), dt);
    }
}
