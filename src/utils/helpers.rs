// src/utils/helpers.rs

use serde_json::Value;

/// Safely parses a value to a floating-point number.
/// If parsing fails or results in NaN, returns a default value.
pub fn safe_parse_float(value: &Value, default_value: f64) -> f64 {
    match value {
        Value::Null => default_value,
        Value::Number(n) => n.as_f64().unwrap_or(default_value),
        Value::String(s) => safe_parse_float_str(s, default_value),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => default_value,
    }
}

/// Safely parses a string to a floating-point number.
///
/// Accepts localized spreadsheet-style values: NBSP or space thousands
/// separators and a comma decimal mark ("42 500,00" -> 42500.0).
pub fn safe_parse_float_str(value: &str, default_value: f64) -> f64 {
    if value.trim().is_empty() {
        return default_value;
    }
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|c| *c != '\u{a0}' && *c != ' ')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    cleaned.parse::<f64>().unwrap_or(default_value)
}

/// Parses "HH:MM" worked-hours values into fractional hours
/// ("252:24" -> 252.4); plain numbers pass through.
pub fn parse_clock_hours(value: &str) -> f64 {
    let value = value.trim();
    if value.is_empty() {
        return 0.0;
    }
    if let Some((h, m)) = value.split_once(':') {
        return match (h.trim().parse::<f64>(), m.trim().parse::<f64>()) {
            (Ok(hours), Ok(minutes)) => hours + minutes / 60.0,
            _ => 0.0,
        };
    }
    safe_parse_float_str(value, 0.0)
}

/// Rounds a float to a specified number of decimal places
pub fn round_to_decimal_places(value: f64, decimal_places: u32) -> f64 {
    let multiplier = 10_f64.powi(decimal_places as i32);
    (value * multiplier).round() / multiplier
}

/// Checks if a float is approximately equal to another within a tolerance
pub fn approximately_equal(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() < tolerance
}
