//! Display helpers for sizes, counts and ages.
//!
//! These are lossy: sizes and counts are rounded to one decimal place.

use chrono::Duration;

/// Format a byte count with 1024-based units, e.g. `"1.5 KB"`.
///
/// Output for units up to TB is accepted by [`crate::units::parse_size`].
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    let prefix = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {prefix}B", bytes as f64 / div as f64)
}

/// Format a document count with K/M/B suffixes, e.g. `"1.5M"`.
pub fn format_number(num: u64) -> String {
    match num {
        0..1_000 => num.to_string(),
        1_000..1_000_000 => format!("{:.1}K", num as f64 / 1e3),
        1_000_000..1_000_000_000 => format!("{:.1}M", num as f64 / 1e6),
        _ => format!("{:.1}B", num as f64 / 1e9),
    }
}

/// Format an elapsed duration as a coarse relative age, e.g. `"3d 4h ago"`.
pub fn format_age(age: Duration) -> String {
    let days = age.num_days();
    let hours = age.num_hours() % 24;
    let minutes = age.num_minutes() % 60;

    if days > 0 {
        format!("{days}d {hours}h ago")
    } else if hours > 0 {
        format!("{hours}h {minutes}m ago")
    } else {
        format!("{}m ago", age.num_minutes().max(0))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::units::{GIB, KIB, MIB, TIB, parse_size};

    #[rstest]
    #[case(0, "0 B")]
    #[case(1, "1 B")]
    #[case(1000, "1000 B")]
    #[case(1023, "1023 B")]
    #[case(1024, "1.0 KB")]
    #[case(1536, "1.5 KB")]
    #[case(1_500_000, "1.4 MB")]
    #[case(MIB, "1.0 MB")]
    #[case(GIB, "1.0 GB")]
    #[case(5 * GIB, "5.0 GB")]
    #[case(512 * GIB, "512.0 GB")]
    #[case(TIB, "1.0 TB")]
    #[case(1024 * TIB, "1.0 PB")]
    #[case(1024 * 1024 * TIB, "1.0 EB")]
    fn test_format_bytes(#[case] input: u64, #[case] expected: &str) {
        assert_eq!(format_bytes(input), expected);
    }

    #[test]
    fn test_format_bytes_max() {
        assert_eq!(format_bytes(u64::MAX), "16.0 EB");
    }

    #[rstest]
    #[case(0, "0")]
    #[case(999, "999")]
    #[case(1000, "1.0K")]
    #[case(1500, "1.5K")]
    #[case(999_999, "1000.0K")]
    #[case(1_000_000, "1.0M")]
    #[case(2_500_000, "2.5M")]
    #[case(1_000_000_000, "1.0B")]
    fn test_format_number(#[case] input: u64, #[case] expected: &str) {
        assert_eq!(format_number(input), expected);
    }

    #[rstest]
    #[case(Duration::minutes(7), "7m ago")]
    #[case(Duration::seconds(30), "0m ago")]
    #[case(Duration::minutes(125), "2h 5m ago")]
    #[case(Duration::hours(76), "3d 4h ago")]
    #[case(Duration::days(10), "10d 0h ago")]
    fn test_format_age(#[case] input: Duration, #[case] expected: &str) {
        assert_eq!(format_age(input), expected);
    }

    #[rstest]
    #[case(1)]
    #[case(1023)]
    #[case(1536)]
    #[case(1_500_000)]
    #[case(7 * MIB + 123_456)]
    #[case(3 * GIB + 700 * MIB)]
    #[case(2 * TIB + 5 * GIB)]
    #[case(999 * TIB)]
    fn test_format_then_parse_within_rounding(#[case] bytes: u64) {
        let shown = format_bytes(bytes);
        let parsed = parse_size(&shown).unwrap();

        // One decimal place of the displayed unit, plus truncation slack.
        let unit = if bytes < KIB {
            1
        } else if bytes < MIB {
            KIB
        } else if bytes < GIB {
            MIB
        } else if bytes < TIB {
            GIB
        } else {
            TIB
        };
        let tolerance = unit / 20 + 1;
        assert!(
            parsed.abs_diff(bytes) <= tolerance,
            "{bytes} -> {shown} -> {parsed}"
        );
    }
}
