// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Unit conversion helpers for monitors that scrape human-readable reports.
//!
//! Inputs look like `"6.38 MB"` or `"749 ms"`: a number, one space, a unit.
//! Anything else yields `None`, which callers treat as "skip this metric for
//! this sample" and never as zero.

/// Megabyte-equivalents per unit.
const MEGABYTE_SCALE: &[(&str, f64)] = &[
    ("kb", 0.001),
    ("mb", 1.0),
    ("gb", 1000.0),
    ("tb", 1_000_000.0),
];

/// Millisecond-equivalents per unit.
const MILLISECOND_SCALE: &[(&str, f64)] = &[("s", 1000.0), ("ms", 1.0)];

fn convert_scaled(value: &str, scale: &[(&str, f64)]) -> Option<f64> {
    let mut parts = value.split(' ');
    let number = parts.next()?;
    let unit = parts.next()?;

    let (_, multiplier) = scale
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(unit))?;

    // Integers and decimals only; "1e3" or "inf" are not report values.
    let parsed = if number.contains('.') {
        number.parse::<f64>().ok()?
    } else {
        number.parse::<i64>().ok()? as f64
    };

    Some(parsed * multiplier).filter(|v| v.is_finite())
}

/// Converts `"<n> KB|MB|GB|TB"` to megabytes.
///
/// ```
/// use monitor_core::units::convert_to_megabytes;
///
/// assert_eq!(convert_to_megabytes("123.75 GB"), Some(123750.0));
/// assert_eq!(convert_to_megabytes("bogus"), None);
/// ```
pub fn convert_to_megabytes(value: &str) -> Option<f64> {
    convert_scaled(value, MEGABYTE_SCALE)
}

/// Converts `"<n> s|ms"` to milliseconds.
///
/// ```
/// use monitor_core::units::convert_to_milliseconds;
///
/// assert_eq!(convert_to_milliseconds("749 ms"), Some(749.0));
/// ```
pub fn convert_to_milliseconds(value: &str) -> Option<f64> {
    convert_scaled(value, MILLISECOND_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("expected a value");
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_convert_to_megabytes() {
        assert_close(convert_to_megabytes("6.38 MB"), 6.38);
        assert_close(convert_to_megabytes("16.87 MB"), 16.87);
        assert_close(convert_to_megabytes("123.75 GB"), 123750.0);
        assert_close(convert_to_megabytes("512 KB"), 0.512);
        assert_close(convert_to_megabytes("2 TB"), 2_000_000.0);
        assert_close(convert_to_megabytes("0.18 mb"), 0.18);
    }

    #[test]
    fn test_convert_to_megabytes_no_value() {
        assert_eq!(convert_to_megabytes("bogus"), None);
        assert_eq!(convert_to_megabytes("6.38"), None);
        assert_eq!(convert_to_megabytes("6.38 PB"), None);
        assert_eq!(convert_to_megabytes("six MB"), None);
        assert_eq!(convert_to_megabytes("1e3 MB"), None);
        assert_eq!(convert_to_megabytes(""), None);
    }

    #[test]
    fn test_convert_to_milliseconds() {
        assert_close(convert_to_milliseconds("749 ms"), 749.0);
        assert_close(convert_to_milliseconds("0.952 s"), 952.0);
        assert_close(convert_to_milliseconds("3 S"), 3000.0);
        assert_eq!(convert_to_milliseconds("749 us"), None);
        assert_eq!(convert_to_milliseconds("749"), None);
    }
}
