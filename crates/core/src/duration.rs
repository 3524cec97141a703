//! ISO-8601 durations used for configuration age windows.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::Duration;

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;

const DATE_UNITS: &[(char, i64)] = &[
    ('Y', 365 * SECONDS_PER_DAY),
    ('M', 30 * SECONDS_PER_DAY),
    ('W', 7 * SECONDS_PER_DAY),
    ('D', SECONDS_PER_DAY),
];

const TIME_UNITS: &[(char, i64)] = &[('H', SECONDS_PER_HOUR), ('M', SECONDS_PER_MINUTE), ('S', 1)];

/// A duration written as an ISO-8601 string such as `PT4S` or `P30D`.
///
/// Years count as 365 days and months as 30 days; there is no calendar
/// anchor for an age window.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IsoDuration {
    text: String,
    duration: Duration,
}

impl IsoDuration {
    /// Parse an ISO-8601 duration.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let duration = parse_iso8601(s)?;
        Ok(Self {
            text: s.to_string(),
            duration,
        })
    }

    /// Build from whole seconds, rendered as `PT<n>S`.
    pub fn from_secs(secs: i64) -> Self {
        Self {
            text: format!("PT{secs}S"),
            duration: Duration::seconds(secs),
        }
    }

    /// Get the duration.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// The textual form this duration was parsed from.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl FromStr for IsoDuration {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for IsoDuration {
    type Error = crate::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<IsoDuration> for String {
    fn from(d: IsoDuration) -> Self {
        d.text
    }
}

impl fmt::Debug for IsoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IsoDuration({})", self.text)
    }
}

impl fmt::Display for IsoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn invalid(s: &str, reason: &str) -> crate::Error {
    crate::Error::InvalidDuration(format!("{s:?}: {reason}"))
}

fn parse_iso8601(s: &str) -> crate::Result<Duration> {
    let body = s
        .strip_prefix('P')
        .ok_or_else(|| invalid(s, "must start with 'P'"))?;
    let (date_part, time_part) = match body.split_once('T') {
        Some((date, time)) => {
            if time.is_empty() {
                return Err(invalid(s, "empty time part"));
            }
            (date, Some(time))
        }
        None => (body, None),
    };
    if date_part.is_empty() && time_part.is_none() {
        return Err(invalid(s, "no components"));
    }

    let mut total = parse_components(s, date_part, DATE_UNITS)?;
    if let Some(time_part) = time_part {
        total = total
            .checked_add(parse_components(s, time_part, TIME_UNITS)?)
            .ok_or_else(|| invalid(s, "out of range"))?;
    }
    Ok(total)
}

/// Parse `<number><designator>` pairs whose designators appear in `units` order.
fn parse_components(full: &str, part: &str, units: &[(char, i64)]) -> crate::Result<Duration> {
    let mut total = Duration::ZERO;
    let mut next_unit = 0;
    let mut number = String::new();

    for c in part.chars() {
        if c.is_ascii_digit() || c == '.' || c == ',' {
            number.push(if c == ',' { '.' } else { c });
            continue;
        }
        let offset = units[next_unit..]
            .iter()
            .position(|(designator, _)| *designator == c)
            .ok_or_else(|| invalid(full, &format!("unexpected '{c}'")))?;
        let (_, secs_per_unit) = units[next_unit + offset];
        next_unit += offset + 1;

        if number.is_empty() {
            return Err(invalid(full, &format!("missing number before '{c}'")));
        }
        let value: f64 = number
            .parse()
            .map_err(|_| invalid(full, &format!("bad number {number:?}")))?;
        if number.contains('.') && c != 'S' {
            return Err(invalid(full, "fractions are only allowed for seconds"));
        }
        total = Duration::checked_seconds_f64(value * secs_per_unit as f64)
            .and_then(|component| total.checked_add(component))
            .ok_or_else(|| invalid(full, "out of range"))?;
        number.clear();
    }

    if !number.is_empty() {
        return Err(invalid(full, "trailing number without designator"));
    }
    Ok(total)
}
