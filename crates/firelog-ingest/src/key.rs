//! Aggregate identity: hour-of-day and the `(date, hour)` key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An hour of the day, `0..=23`, rendered as `HH:00`.
///
/// Ordering is numeric, which matches the string order of the rendered form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hour(u8);

impl Hour {
    /// Creates an hour, returning `None` outside `0..=23`.
    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        if value < 24 { Some(Self(value)) } else { None }
    }

    /// Parses the two ASCII digits `HH`.
    #[must_use]
    pub fn from_digits(digits: &str) -> Option<Self> {
        let bytes = digits.as_bytes();
        if bytes.len() != 2 || !bytes.iter().all(u8::is_ascii_digit) {
            return None;
        }
        Self::new((bytes[0] - b'0') * 10 + (bytes[1] - b'0'))
    }

    /// Returns the numeric hour.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Hour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:00", self.0)
    }
}

/// Error returned when an hour string is not `HH:00` or `HH`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hour '{0}': expected HH:00 with HH in 00..=23")]
pub struct HourParseError(String);

impl FromStr for Hour {
    type Err = HourParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_suffix(":00").unwrap_or(s);
        Self::from_digits(digits).ok_or_else(|| HourParseError(s.to_string()))
    }
}

impl Serialize for Hour {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Hour {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Identity of one aggregate record: calendar date plus hour of day.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HourKey {
    /// Calendar day, `YYYY-MM-DD`.
    pub date: String,
    /// Hour of day.
    pub hour: Hour,
}

impl HourKey {
    /// Creates a key.
    #[must_use]
    pub fn new(date: impl Into<String>, hour: Hour) -> Self {
        Self {
            date: date.into(),
            hour,
        }
    }
}

impl fmt::Display for HourKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}T{}", self.date, self.hour)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hour_renders_zero_padded() {
        assert_eq!(Hour::new(0).unwrap().to_string(), "00:00");
        assert_eq!(Hour::new(9).unwrap().to_string(), "09:00");
        assert_eq!(Hour::new(23).unwrap().to_string(), "23:00");
        assert!(Hour::new(24).is_none());
    }

    #[test]
    fn hour_parses_both_forms() {
        assert_eq!("10:00".parse::<Hour>().unwrap().get(), 10);
        assert_eq!("07".parse::<Hour>().unwrap().get(), 7);
        assert!("24:00".parse::<Hour>().is_err());
        assert!("1a".parse::<Hour>().is_err());
        assert!("".parse::<Hour>().is_err());
    }

    #[test]
    fn hour_serde_uses_display_form() {
        let hour = Hour::new(11).unwrap();
        assert_eq!(serde_json::to_string(&hour).unwrap(), "\"11:00\"");
        let back: Hour = serde_json::from_str("\"11:00\"").unwrap();
        assert_eq!(back, hour);
    }

    #[test]
    fn key_order_is_date_then_hour() {
        let a = HourKey::new("2025-04-28", Hour::new(23).unwrap());
        let b = HourKey::new("2025-04-29", Hour::new(0).unwrap());
        let c = HourKey::new("2025-04-28", Hour::new(2).unwrap());
        let mut keys = vec![a.clone(), b.clone(), c.clone()];
        keys.sort();
        assert_eq!(keys, vec![c, a, b]);
    }
}
