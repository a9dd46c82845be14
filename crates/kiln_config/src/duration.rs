//! Human-readable duration strings used by `ttl` settings.

use serde::de::{self, Deserializer, Visitor};
use std::time::Duration;

use crate::error::ConfigError;

/// Parses a duration string such as `"500ms"`, `"30s"`, `"10m"`, `"24h"` or `"7d"`.
///
/// A bare `"0"` is accepted as zero. Any other value must carry a unit.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    let invalid = |reason: String| ConfigError::InvalidDuration {
        input: s.to_string(),
        reason,
    };

    if s.is_empty() {
        return Err(invalid("empty string".to_string()));
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let digit_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if digit_end == 0 {
        return Err(invalid("no numeric value".to_string()));
    }

    let number: u64 = s[..digit_end]
        .parse()
        .map_err(|_| invalid("number out of range".to_string()))?;

    let unit = s[digit_end..].trim();
    let millis_per_unit: u64 = match unit {
        "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        "d" => 86_400_000,
        "" => return Err(invalid("missing unit (use ms, s, m, h, or d)".to_string())),
        other => {
            return Err(invalid(format!(
                "unknown unit '{other}' (use ms, s, m, h, or d)"
            )))
        }
    };

    number
        .checked_mul(millis_per_unit)
        .map(Duration::from_millis)
        .ok_or_else(|| invalid("duration out of range".to_string()))
}

/// Deserializes an optional duration given as a unit string or as whole seconds.
pub(crate) fn deserialize_opt_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct DurationVisitor;

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a duration string like \"10m\" or a number of seconds")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            parse_duration(v).map(Some).map_err(E::custom)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            u64::try_from(v)
                .map(|secs| Some(Duration::from_secs(secs)))
                .map_err(|_| E::custom("duration must not be negative"))
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_unit() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7_200));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86_400));
    }

    #[test]
    fn zero_forms() {
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
    }

    #[test]
    fn whitespace_tolerated() {
        assert_eq!(parse_duration(" 5 s ").unwrap(), Duration::from_secs(5));
    }

    #[test]
    fn rejects_missing_unit() {
        let err = parse_duration("15").unwrap_err();
        assert!(err.to_string().contains("missing unit"));
    }

    #[test]
    fn rejects_unknown_unit() {
        let err = parse_duration("3w").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDuration { .. }));
        assert!(err.to_string().contains("unknown unit 'w'"));
    }

    #[test]
    fn rejects_non_numeric() {
        assert!(parse_duration("ms").is_err());
        assert!(parse_duration("").is_err());
    }
}
