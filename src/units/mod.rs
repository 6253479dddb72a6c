//! Parsers for human-written size and age limits.
//!
//! Sizes accept fractional values (`"1.5GB"`) with 1024-based units, ages
//! accept whole counts only (`"7d"`, not `"1.5d"`). Both are pure functions
//! of their input.

use std::sync::LazyLock;

use chrono::Duration;
use regex::Regex;

pub const KIB: u64 = 1024;
pub const MIB: u64 = KIB * 1024;
pub const GIB: u64 = MIB * 1024;
pub const TIB: u64 = GIB * 1024;

static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)?)?\s*([A-Za-z]*)$").expect("size pattern is valid")
});

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)?\s*([A-Za-z]*)$").expect("duration pattern is valid"));

/// Error returned when a size limit cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SizeFormatError {
    #[error("size value is empty")]
    Empty,

    #[error("invalid size format '{0}', expected a value like '10GB' or '500MB'")]
    Invalid(String),

    #[error("unknown size unit '{unit}' in '{input}', expected one of B, KB, MB, GB, TB")]
    UnknownUnit { input: String, unit: String },

    #[error("size '{0}' does not fit in 64 bits")]
    Overflow(String),
}

/// Error returned when an age limit cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationFormatError {
    #[error("age value is empty")]
    Empty,

    #[error("invalid age format '{0}', expected a whole number and unit like '7d', '24h' or '30m'")]
    Invalid(String),

    #[error("unknown age unit '{unit}' in '{input}', expected one of s, m, h, d, w")]
    UnknownUnit { input: String, unit: String },

    #[error("age '{0}' is out of range")]
    Overflow(String),
}

fn size_multiplier(unit: &str) -> Option<u64> {
    match unit.to_ascii_uppercase().as_str() {
        "" | "B" => Some(1),
        "KB" => Some(KIB),
        "MB" => Some(MIB),
        "GB" => Some(GIB),
        "TB" => Some(TIB),
        _ => None,
    }
}

/// Parse a size such as `"100GB"`, `"1.5 tb"` or `"4096"` into bytes.
///
/// Units are case-insensitive and binary (1 KB = 1024 B). A bare number is
/// taken as bytes. Fractional results are truncated to whole bytes.
pub fn parse_size(text: &str) -> Result<u64, SizeFormatError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(SizeFormatError::Empty);
    }

    let caps = SIZE_RE
        .captures(trimmed)
        .ok_or_else(|| SizeFormatError::Invalid(text.to_string()))?;
    let number = caps
        .get(1)
        .ok_or_else(|| SizeFormatError::Invalid(text.to_string()))?
        .as_str();
    let unit = caps.get(2).map_or("", |m| m.as_str());

    let multiplier = size_multiplier(unit).ok_or_else(|| SizeFormatError::UnknownUnit {
        input: text.to_string(),
        unit: unit.to_string(),
    })?;

    // Whole numbers stay in integer arithmetic so large exact values don't
    // lose precision through f64.
    if let Ok(whole) = number.parse::<u64>() {
        return whole
            .checked_mul(multiplier)
            .ok_or_else(|| SizeFormatError::Overflow(text.to_string()));
    }

    let value: f64 = number
        .parse()
        .map_err(|_| SizeFormatError::Invalid(text.to_string()))?;
    let bytes = value * multiplier as f64;
    if !bytes.is_finite() || bytes >= u64::MAX as f64 {
        return Err(SizeFormatError::Overflow(text.to_string()));
    }
    Ok(bytes as u64)
}

/// Parse an age such as `"7d"`, `"24h"` or `"2w"`.
///
/// Accepts a whole number followed by exactly one of `s`, `m`, `h`, `d`, `w`
/// (case-insensitive).
pub fn parse_duration(text: &str) -> Result<Duration, DurationFormatError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DurationFormatError::Empty);
    }

    let invalid = || DurationFormatError::Invalid(text.to_string());
    let caps = DURATION_RE.captures(trimmed).ok_or_else(invalid)?;
    let count: i64 = caps
        .get(1)
        .ok_or_else(invalid)?
        .as_str()
        .parse()
        .map_err(|_| DurationFormatError::Overflow(text.to_string()))?;
    let unit = caps.get(2).map_or("", |m| m.as_str());
    if unit.is_empty() {
        return Err(invalid());
    }

    let unit_seconds: i64 = match unit.to_ascii_lowercase().as_str() {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        "w" => 7 * 24 * 60 * 60,
        _ => {
            return Err(DurationFormatError::UnknownUnit {
                input: text.to_string(),
                unit: unit.to_string(),
            });
        }
    };

    count
        .checked_mul(unit_seconds)
        .and_then(Duration::try_seconds)
        .ok_or_else(|| DurationFormatError::Overflow(text.to_string()))
}

/// Decode a `store.size` value reported by the cluster.
///
/// With `bytes=b` the cluster reports a plain integer; older or proxied
/// clusters may still answer in human form (`"4.9gb"`), which is decoded with
/// the same units as [`parse_size`].
pub fn parse_store_size(text: &str) -> Result<u64, SizeFormatError> {
    let trimmed = text.trim();
    match trimmed.parse::<u64>() {
        Ok(bytes) => Ok(bytes),
        Err(_) => parse_size(trimmed),
    }
}
