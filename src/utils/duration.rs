//! Parsing of schedule intervals ("90m", "1h30m", "2days", "1 week") and
//! wall-clock times ("04:30")

use anyhow::{bail, Context, Result};
use chrono::NaiveTime;
use std::time::Duration;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

fn unit_seconds(unit: &str) -> Option<u64> {
    let seconds = match unit {
        "s" | "sec" | "secs" | "second" | "seconds" => 1,
        "m" | "min" | "mins" | "minute" | "minutes" => MINUTE,
        "h" | "hr" | "hour" | "hours" => HOUR,
        "d" | "day" | "days" => DAY,
        "w" | "week" | "weeks" => 7 * DAY,
        // approximated as 30 days
        "month" | "months" => 30 * DAY,
        _ => return None,
    };
    Some(seconds)
}

/// Parse an interval made of one or more `<number><unit>` terms.
/// Units are case-insensitive; whitespace between terms is allowed.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let text = input.trim().to_lowercase();
    if text.is_empty() {
        bail!("invalid duration format: empty string");
    }

    let mut total: u64 = 0;
    let mut rest = text.as_str();

    while !rest.is_empty() {
        let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if digits == 0 {
            bail!("invalid duration format: {}", input);
        }
        let value: u64 = rest[..digits]
            .parse()
            .with_context(|| format!("invalid duration format: {}", input))?;
        rest = rest[digits..].trim_start();

        let letters = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()).len();
        let unit = &rest[..letters];
        let seconds = unit_seconds(unit)
            .with_context(|| format!("invalid duration format: {} (unknown unit '{}')", input, unit))?;
        rest = rest[letters..].trim_start();

        total = value
            .checked_mul(seconds)
            .and_then(|s| total.checked_add(s))
            .with_context(|| format!("duration too large: {}", input))?;
    }

    if total == 0 {
        bail!("duration must be greater than zero: {}", input);
    }

    Ok(Duration::from_secs(total))
}

/// Parse a wall-clock time written as `HH:MM` or `HH:MM:SS`
pub fn parse_time_of_day(input: &str) -> Result<NaiveTime> {
    let text = input.trim();
    NaiveTime::parse_from_str(text, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S"))
        .with_context(|| format!("invalid time of day (expected HH:MM): {}", input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_units() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("90m").unwrap(), Duration::from_secs(90 * 60));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
    }

    #[test]
    fn test_extended_units() {
        assert_eq!(parse_duration("1day").unwrap(), Duration::from_secs(DAY));
        assert_eq!(parse_duration("2 Days").unwrap(), Duration::from_secs(2 * DAY));
        assert_eq!(parse_duration("1w").unwrap(), Duration::from_secs(7 * DAY));
        assert_eq!(parse_duration("1month").unwrap(), Duration::from_secs(30 * DAY));
    }

    #[test]
    fn test_invalid_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("day").is_err());
        assert!(parse_duration("5").is_err());
        assert!(parse_duration("5 fortnights").is_err());
        assert!(parse_duration("0h").is_err());
    }

    #[test]
    fn test_time_of_day() {
        assert_eq!(
            parse_time_of_day("04:30").unwrap(),
            NaiveTime::from_hms_opt(4, 30, 0).unwrap()
        );
        assert!(parse_time_of_day("25:00").is_err());
        assert!(parse_time_of_day("noon").is_err());
    }
}
