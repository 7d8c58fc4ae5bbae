use std::time::Duration;

use crate::TransferError;

/// Parses an interval string like `"500ms"`, `"1s"`, `"5m"`, `"1h30m"`.
///
/// Units: `ms`, `s`, `m`, `h`. Multiple value-unit pairs concatenate
/// additively. Whole numbers only; an empty string or a bare number is
/// rejected.
pub fn parse_interval(input: &str) -> Result<Duration, TransferError> {
    let invalid = || TransferError::InvalidInterval(input.to_string());
    let s = input.trim();
    if s.is_empty() {
        return Err(invalid());
    }

    let mut total = Duration::ZERO;
    let mut rest = s;

    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(invalid)?;
        if digits_end == 0 {
            return Err(invalid());
        }
        let value: u64 = rest[..digits_end].parse().map_err(|_| invalid())?;
        rest = &rest[digits_end..];

        let (unit_len, unit_ms) = if rest.starts_with("ms") {
            (2, 1)
        } else if rest.starts_with('s') {
            (1, 1_000)
        } else if rest.starts_with('m') {
            (1, 60_000)
        } else if rest.starts_with('h') {
            (1, 3_600_000)
        } else {
            return Err(invalid());
        };
        rest = &rest[unit_len..];

        total += Duration::from_millis(value.checked_mul(unit_ms).ok_or_else(invalid)?);
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_units() {
        assert_eq!(parse_interval("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_interval("1s").unwrap(), Duration::from_secs(1));
        assert_eq!(parse_interval("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_interval("2h").unwrap(), Duration::from_secs(7200));
    }

    #[test]
    fn parses_compound_intervals() {
        assert_eq!(parse_interval("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(
            parse_interval("1s500ms").unwrap(),
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn zero_is_a_valid_duration() {
        assert_eq!(parse_interval("0s").unwrap(), Duration::ZERO);
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(parse_interval(" 1s ").unwrap(), Duration::from_secs(1));
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "s", "1", "1x", "ms", "one second", "1.5s", "-1s"] {
            assert!(parse_interval(bad).is_err(), "should reject {bad:?}");
        }
    }
}
