use anyhow::{Result, bail};
use std::time::Duration;

/// Parse a `wait` argument: `<N>ms`, `<N>s`, or a bare `<N>` meaning seconds.
/// Fractions are accepted (`1.5s`, `0.5`); negative and non-finite values are rejected.
pub fn parse_wait(text: &str) -> Result<Duration> {
    let text = text.trim();
    let (number, scale) = if let Some(n) = text.strip_suffix("ms") {
        (n, 0.001)
    } else if let Some(n) = text.strip_suffix('s') {
        (n, 1.0)
    } else {
        (text, 1.0)
    };

    let value: f64 = match number.trim().parse() {
        Ok(v) => v,
        Err(_) => bail!("Invalid wait duration '{text}'"),
    };
    if !value.is_finite() || value < 0.0 {
        bail!("Wait duration must be a non-negative number, got '{text}'");
    }
    match Duration::try_from_secs_f64(value * scale) {
        Ok(duration) => Ok(duration),
        Err(_) => bail!("Wait duration '{text}' is too large"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_and_milliseconds_are_equivalent() {
        assert_eq!(parse_wait("3s").unwrap(), parse_wait("3000ms").unwrap());
        assert_eq!(parse_wait("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn fractional_values() {
        assert_eq!(parse_wait("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_wait("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_wait(" 0.5 ").unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_wait("soon").is_err());
        assert!(parse_wait("-1s").is_err());
        assert!(parse_wait("ms").is_err());
        assert!(parse_wait("").is_err());
        assert!(parse_wait("infs").is_err());
    }

    #[test]
    fn rejects_durations_beyond_range() {
        let err = parse_wait("1e30s").unwrap_err();
        assert!(err.to_string().contains("too large"), "{err}");
        assert!(parse_wait("1e300ms").is_err());
        assert!(parse_wait("1e15s").is_ok());
    }
}
