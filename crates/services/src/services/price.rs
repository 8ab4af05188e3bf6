//! Lenient parsing of price values as they appear in imported catalog data.

use serde_json::Value;

/// Parse a price string such as `"€1.234,56"`, `"1,234.56"` or `"1234.56"`.
///
/// When both `,` and `.` appear, whichever comes last is the decimal
/// separator. A lone separator that repeats is a thousands separator, as is
/// a single one followed by exactly three digits after a non-zero integer
/// part. Otherwise it is the decimal separator, so `"0.125"` stays below one.
pub fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) => normalize_single(&cleaned, ','),
        (None, Some(_)) => normalize_single(&cleaned, '.'),
        (None, None) => cleaned,
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn normalize_single(cleaned: &str, separator: char) -> String {
    let occurrences = cleaned.matches(separator).count();
    let digits_after = cleaned
        .rsplit(separator)
        .next()
        .map(|tail| tail.len())
        .unwrap_or(0);

    let integer_part = cleaned
        .split(separator)
        .next()
        .unwrap_or("")
        .trim_start_matches('-');
    let has_units = integer_part.chars().any(|c| c != '0');

    if occurrences > 1 || (digits_after == 3 && has_units) {
        cleaned.replace(separator, "")
    } else {
        cleaned.replace(separator, ".")
    }
}

/// Numeric value of a catalog cell, parsing strings as prices.
pub fn price_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_price(s),
        _ => None,
    }
}

/// Slider step for a numeric range, chosen by the width of the range.
pub fn step_for_span(span: f64) -> f64 {
    if span > 1000.0 {
        50.0
    } else if span > 100.0 {
        10.0
    } else if span > 10.0 {
        1.0
    } else {
        0.1
    }
}
