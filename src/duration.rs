//! Timeout strings like "90s", "5m" or "2h".

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{de, Deserialize, Deserializer};

/// Parse a timeout string made of a whole number and one unit suffix
/// (`s`, `m`, `h` or `d`). Case-insensitive; surrounding whitespace is ignored.
///
/// ```
/// use ledgerlink::duration::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
/// assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
/// ```
pub fn parse_duration(input: &str) -> Result<Duration> {
    let s = input.trim().to_ascii_lowercase();
    let Some(unit) = s.chars().last() else {
        anyhow::bail!("Empty timeout");
    };

    let multiplier: u64 = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => anyhow::bail!("Timeout {input:?} must end with s, m, h or d"),
    };

    let digits = &s[..s.len() - 1];
    let count: u64 = digits
        .parse()
        .with_context(|| format!("Invalid number in timeout {input:?}"))?;

    let secs = count
        .checked_mul(multiplier)
        .with_context(|| format!("Timeout {input:?} is too large"))?;
    Ok(Duration::from_secs(secs))
}

/// Serde helper for optional timeout strings.
///
/// Use with `#[serde(default, deserialize_with = "deserialize_duration_opt")]`.
pub fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|s| parse_duration(&s).map_err(de::Error::custom))
        .transpose()
}
