use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::LoadError;

/// One segment of a ramp profile: reach `target` virtual users by the end of
/// `duration`, starting from wherever the previous stage left off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    #[serde(with = "duration_str")]
    pub duration: Duration,
    pub target: u64,
}

impl Stage {
    pub fn new(duration: Duration, target: u64) -> Self {
        Self { duration, target }
    }

    /// Build a stage from a k6-style duration string such as `"30s"`.
    pub fn parse(duration: &str, target: u64) -> Result<Self, LoadError> {
        Ok(Self {
            duration: parse_duration(duration)?,
            target,
        })
    }
}

/// Parse durations written as a sequence of `<number><unit>` pairs.
///
/// Units: `ms`, `s`, `m`, `h`. Fractions are accepted (`1.5s`), signs are not.
pub fn parse_duration(input: &str) -> Result<Duration, LoadError> {
    let invalid = || LoadError::InvalidDuration(input.to_string());
    let mut rest = input.trim();
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        if num_len == 0 {
            return Err(invalid());
        }
        let (number, tail) = rest.split_at(num_len);
        let value: f64 = number.parse().map_err(|_| invalid())?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_len);
        let seconds_per_unit = match unit {
            "ms" => 0.001,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return Err(invalid()),
        };

        let part = Duration::try_from_secs_f64(value * seconds_per_unit).map_err(|_| invalid())?;
        total = total.checked_add(part).ok_or_else(invalid)?;
        rest = next;
    }

    Ok(total)
}

/// Inverse of [`parse_duration`] for whole seconds and milliseconds.
pub fn format_duration(duration: Duration) -> String {
    if duration.subsec_millis() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

pub(crate) mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
