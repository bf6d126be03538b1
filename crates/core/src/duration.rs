//! Time period parsing for configuration values
//!
//! Durations in property maps and config files are written as a count
//! followed by a unit, e.g. `"3 secs"`, `"500 millis"`, `"1 min"`.

use crate::error::ConfigError;
use std::time::Duration;

/// Parse a time period such as `"3 secs"` or `"250ms"`
///
/// Units are case-insensitive. Accepted spellings:
///
/// | Unit | Spellings |
/// |------|-----------|
/// | nanoseconds | `ns`, `nanos`, `nanosecond`, `nanoseconds` |
/// | milliseconds | `ms`, `milli`, `millis`, `millisecond`, `milliseconds` |
/// | seconds | `s`, `sec`, `secs`, `second`, `seconds` |
/// | minutes | `m`, `min`, `mins`, `minute`, `minutes` |
/// | hours | `h`, `hr`, `hrs`, `hour`, `hours` |
/// | days | `d`, `day`, `days` |
///
/// # Examples
///
/// ```
/// use statekeeper_core::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("3 secs").unwrap(), Duration::from_secs(3));
/// assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
/// ```
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);

    if digits.is_empty() {
        return Err(ConfigError::InvalidDuration {
            input: input.to_string(),
            reason: "missing numeric count".to_string(),
        });
    }

    let count: u64 = digits.parse().map_err(|_| ConfigError::InvalidDuration {
        input: input.to_string(),
        reason: "count out of range".to_string(),
    })?;

    let unit = unit.trim().to_ascii_lowercase();
    let per_unit = match unit.as_str() {
        "ns" | "nanos" | "nanosecond" | "nanoseconds" => Duration::from_nanos(1),
        "ms" | "milli" | "millis" | "millisecond" | "milliseconds" => Duration::from_millis(1),
        "s" | "sec" | "secs" | "second" | "seconds" => Duration::from_secs(1),
        "m" | "min" | "mins" | "minute" | "minutes" => Duration::from_secs(60),
        "h" | "hr" | "hrs" | "hour" | "hours" => Duration::from_secs(60 * 60),
        "d" | "day" | "days" => Duration::from_secs(24 * 60 * 60),
        "" => {
            return Err(ConfigError::InvalidDuration {
                input: input.to_string(),
                reason: "missing time unit".to_string(),
            })
        }
        other => {
            return Err(ConfigError::InvalidDuration {
                input: input.to_string(),
                reason: format!("unknown time unit '{}'", other),
            })
        }
    };

    let count = u32::try_from(count).map_err(|_| ConfigError::InvalidDuration {
        input: input.to_string(),
        reason: "count out of range".to_string(),
    })?;

    per_unit
        .checked_mul(count)
        .ok_or_else(|| ConfigError::InvalidDuration {
            input: input.to_string(),
            reason: "duration overflows".to_string(),
        })
}
