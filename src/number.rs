// src/number.rs
//
// es-AR numbers: `.` groups thousands, `,` is the decimal point.

use crate::table::CellValue;

/// Parse a cell into a number. `None` stands for NaN.
pub fn parse_locale_number(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Number(n) if n.is_finite() => Some(*n),
        CellValue::Number(_) => None,
        CellValue::Text(s) => parse_locale_str(s),
        CellValue::Empty | CellValue::Bool(_) => None,
    }
}

/// `"1.234,56"` → `1234.56`. Empty or unparsable text yields `None`.
pub fn parse_locale_str(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    let plain = t.replace('.', "").replace(',', ".");
    plain.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Render with at most two fraction digits, es-AR grouping.
///
/// `1234567.891` → `"1.234.567,89"`, `70.0` → `"70"`, `-0.5` → `"-0,5"`.
/// Rounds the shortest decimal form half away from zero, so `1.005` gives
/// `"1,01"`. Negative values keep their sign even when they round to zero.
pub fn format_locale_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "∞" } else { "-∞" }.to_string();
    }

    // Display for f64 never uses an exponent
    let plain = n.abs().to_string();
    let (int_digits, frac_digits) = plain.split_once('.').unwrap_or((plain.as_str(), ""));

    // integer digits followed by exactly two fraction digits
    let mut digits: Vec<u8> = int_digits
        .bytes()
        .chain(frac_digits.bytes().chain(std::iter::repeat(b'0')).take(2))
        .collect();
    if frac_digits.as_bytes().get(2).is_some_and(|d| *d >= b'5') {
        round_up(&mut digits);
    }

    let split = digits.len() - 2;
    let int_part = String::from_utf8_lossy(&digits[..split]).into_owned();
    let frac_part = String::from_utf8_lossy(&digits[split..]).into_owned();

    let mut out = String::new();
    if n.is_sign_negative() {
        out.push('-');
    }
    out.push_str(&group_thousands(&int_part));

    let frac_part = frac_part.trim_end_matches('0');
    if !frac_part.is_empty() {
        out.push(',');
        out.push_str(frac_part);
    }
    out
}

/// Add one unit in the last place of a string of ASCII digits.
fn round_up(digits: &mut Vec<u8>) {
    for d in digits.iter_mut().rev() {
        if *d == b'9' {
            *d = b'0';
        } else {
            *d += 1;
            return;
        }
    }
    digits.insert(0, b'1');
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}
