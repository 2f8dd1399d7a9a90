//! Duration codec: `[[[days:]hours:]minutes:]seconds` strings and back.
//!
//! Every component talks about simulated time as elapsed seconds since the
//! first chat event. Operators type offsets as colon-separated strings, and
//! bin labels and the clock display are rendered the same way.
//!
//! Formatting rounds to tenths of a second, so a formatted value parses back
//! to within 0.05 s of the original. Whole seconds render without a
//! fractional part (`00:01:30`); anything else keeps one decimal place
//! (`00:01:30.5`).

/// Seconds per minute, hour, and day.
const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Maximum number of colon-separated fields.
pub const MAX_FIELDS: usize = 4;

/// Errors that can occur when parsing a duration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationError {
    /// Fewer than one or more than four fields.
    #[error("duration must have 1 to 4 colon-separated fields, got {count}")]
    FieldCount {
        /// Number of fields found.
        count: usize,
    },

    /// A field is not a number.
    #[error("duration field {field:?} is not a number")]
    NotANumber {
        /// The offending field text.
        field: String,
    },

    /// A field is negative, infinite, or NaN.
    #[error("duration field {field:?} must be a finite non-negative number")]
    OutOfRange {
        /// The offending field text.
        field: String,
    },
}

/// Combine 1 to 4 numeric fields into seconds.
///
/// The field count decides the meaning: `[s]`, `[m, s]`, `[h, m, s]`, or
/// `[d, h, m, s]`.
///
/// # Errors
///
/// Returns [`DurationError::FieldCount`] for any other field count and
/// [`DurationError::OutOfRange`] for negative or non-finite fields.
pub fn parse_fields(fields: &[f64]) -> Result<f64, DurationError> {
    if let Some(bad) = fields.iter().find(|f| !f.is_finite() || f.is_sign_negative()) {
        return Err(DurationError::OutOfRange {
            field: bad.to_string(),
        });
    }

    let minute = 60.0;
    let hour = 60.0 * minute;
    let day = 24.0 * hour;

    match *fields {
        [s] => Ok(s),
        [m, s] => Ok(m * minute + s),
        [h, m, s] => Ok(h * hour + m * minute + s),
        [d, h, m, s] => Ok(d * day + h * hour + m * minute + s),
        _ => Err(DurationError::FieldCount {
            count: fields.len(),
        }),
    }
}

/// Parse a duration string such as `90`, `1:30`, or `00:01:30.5`.
///
/// # Errors
///
/// Returns [`DurationError`] if the string has the wrong number of fields
/// or a field is not a finite non-negative number.
pub fn parse(text: &str) -> Result<f64, DurationError> {
    let fields = split_fields(text)?;
    parse_fields(&fields)
}

/// Number of colon-separated fields in a duration string.
pub fn field_count(text: &str) -> usize {
    text.trim().split(':').count()
}

/// Split a duration string into numeric fields.
fn split_fields(text: &str) -> Result<Vec<f64>, DurationError> {
    let parts: Vec<&str> = text.trim().split(':').collect();
    if parts.len() > MAX_FIELDS {
        return Err(DurationError::FieldCount { count: parts.len() });
    }
    parts
        .into_iter()
        .map(|part| {
            let part = part.trim();
            part.parse::<f64>().map_err(|_err| DurationError::NotANumber {
                field: part.to_owned(),
            })
        })
        .collect()
}

/// Format seconds as a colon-separated duration.
///
/// Leading all-zero fields are dropped until `min_fields` remain (clamped to
/// `1..=4`); every field is zero-padded to two digits. Negative and
/// non-finite input is treated as zero.
pub fn format(seconds: f64, min_fields: usize) -> String {
    let min_fields = min_fields.clamp(1, MAX_FIELDS);
    let tenths = to_tenths(seconds);

    let whole = tenths / 10;
    let tenth = tenths % 10;

    let days = whole / DAY;
    let hours = (whole % DAY) / HOUR;
    let minutes = (whole % HOUR) / MINUTE;
    let secs = whole % MINUTE;

    // Only leading zero fields may be dropped, and never below `min_fields`.
    let leading = [days, hours, minutes];
    let droppable = MAX_FIELDS.saturating_sub(min_fields);
    let skip = leading
        .iter()
        .take(droppable)
        .take_while(|v| **v == 0)
        .count();
    let mut fields: Vec<String> = leading
        .iter()
        .skip(skip)
        .map(|v| format!("{v:02}"))
        .collect();

    if tenth == 0 {
        fields.push(format!("{secs:02}"));
    } else {
        fields.push(format!("{secs:02}.{tenth}"));
    }

    fields.join(":")
}

/// Convert seconds to whole milliseconds, rounding to the nearest.
///
/// Negative and non-finite input yields zero; values beyond `u64` saturate.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn to_millis(seconds: f64) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    // `as` saturates for out-of-range floats.
    (seconds * 1000.0).round() as u64
}

/// Convert milliseconds to seconds.
#[allow(clippy::cast_precision_loss)]
pub const fn millis_to_seconds(millis: u64) -> f64 {
    millis as f64 / 1000.0
}

/// Round seconds to whole tenths.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_tenths(seconds: f64) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * 10.0).round() as u64
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_field_counts() {
        assert!((parse("45").unwrap() - 45.0).abs() < 1e-9);
        assert!((parse("2:05").unwrap() - 125.0).abs() < 1e-9);
        assert!((parse("1:00:00").unwrap() - 3600.0).abs() < 1e-9);
        assert!((parse("1:00:00:01").unwrap() - 86_401.0).abs() < 1e-9);
        assert!((parse("00:00:12.5").unwrap() - 12.5).abs() < 1e-9);
    }

    #[test]
    fn parse_rejects_five_fields() {
        assert_eq!(
            parse("1:1:1:1:1"),
            Err(DurationError::FieldCount { count: 5 })
        );
        assert_eq!(
            parse_fields(&[]),
            Err(DurationError::FieldCount { count: 0 })
        );
    }

    #[test]
    fn parse_rejects_non_numeric_fields() {
        assert!(matches!(parse("1:xx"), Err(DurationError::NotANumber { .. })));
        assert!(matches!(parse(""), Err(DurationError::NotANumber { .. })));
        assert!(matches!(parse("1::2"), Err(DurationError::NotANumber { .. })));
    }

    #[test]
    fn parse_rejects_negative_fields() {
        assert!(matches!(parse("-5"), Err(DurationError::OutOfRange { .. })));
        assert!(matches!(parse("inf"), Err(DurationError::OutOfRange { .. })));
    }

    #[test]
    fn format_drops_leading_zero_fields() {
        assert_eq!(format(5.0, 1), "05");
        assert_eq!(format(65.0, 1), "01:05");
        assert_eq!(format(3600.0, 1), "01:00:00");
        assert_eq!(format(86_400.0, 1), "01:00:00:00");
    }

    #[test]
    fn format_keeps_minimum_fields() {
        assert_eq!(format(0.0, 3), "00:00:00");
        assert_eq!(format(10.0, 3), "00:00:10");
        assert_eq!(format(5.0, 4), "00:00:00:05");
        assert_eq!(format(5.0, 9), "00:00:00:05");
        assert_eq!(format(5.0, 0), "05");
    }

    #[test]
    fn format_keeps_non_zero_inner_fields() {
        // Only leading zeros are dropped.
        assert_eq!(format(3605.0, 1), "01:00:05");
    }

    #[test]
    fn format_tenths() {
        assert_eq!(format(12.5, 3), "00:00:12.5");
        assert_eq!(format(0.1, 1), "00.1");
        // 59.96 rounds up into the next minute instead of showing `60.0`.
        assert_eq!(format(59.96, 2), "01:00");
    }

    #[test]
    fn format_clamps_negative_to_zero() {
        assert_eq!(format(-3.0, 2), "00:00");
        assert_eq!(format(f64::NAN, 1), "00");
    }

    #[test]
    fn field_count_counts_colons() {
        assert_eq!(field_count("00:10:00"), 3);
        assert_eq!(field_count("30"), 1);
    }

    #[test]
    fn millis_conversions() {
        assert_eq!(to_millis(1.2346), 1235);
        assert_eq!(to_millis(-1.0), 0);
        assert!((millis_to_seconds(1500) - 1.5).abs() < 1e-9);
    }
}
