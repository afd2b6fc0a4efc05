//!
//! Column value rendering.
//!
//! Mirrors the text SQLite hands back from `sqlite3_column_text`: integers in
//! decimal, reals via `%!.15g`, text and blobs as their bytes.
//!

use rusqlite::types::ValueRef;

pub(crate) fn value_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(r) => Some(format_real(r)),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// Formats a real the way SQLite's `%!.15g` does: 15 significant digits,
/// trailing zeros dropped, and always a decimal point or an exponent.
pub fn format_real(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Inf" } else { "-Inf" }.to_string();
    }
    if value == 0.0 {
        return "0.0".to_string();
    }

    let scientific = format!("{:.14e}", value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if !(-4..15).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            sign,
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (14 - exponent) as usize;
        trim_fraction(&format!("{:.*}", decimals, value))
    }
}

fn trim_fraction(digits: &str) -> String {
    match digits.find('.') {
        Some(dot) => {
            let trimmed = digits.trim_end_matches('0');
            if trimmed.len() == dot + 1 {
                format!("{}0", trimmed)
            } else {
                trimmed.to_string()
            }
        }
        None => format!("{}.0", digits),
    }
}
