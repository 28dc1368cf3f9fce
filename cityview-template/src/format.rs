//! Display formatting for attribute values.

use serde_json::{Map, Value};

const ADDRESS_MARKERS: [&str; 3] = ["streetAddress", "addressLocality", "addressCountry"];
const ADDRESS_PARTS: [&str; 5] = [
    "streetAddress",
    "addressLocality",
    "addressRegion",
    "addressCountry",
    "postalCode",
];

/// Formats a plain attribute value for display.
///
/// - `null` → empty
/// - booleans → `Yes` / `No`
/// - numbers → grouped, at most two fraction digits
/// - GeoJSON points → `10.7800°N, 106.7000°E`
/// - address objects → comma-joined parts
/// - other objects and arrays → compact JSON
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "Yes".to_string(),
        Value::Bool(false) => "No".to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => group_integer(&i.unsigned_abs().to_string(), i < 0),
            (None, Some(u)) => group_integer(&u.to_string(), false),
            _ => format_number(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => s.clone(),
        Value::Object(obj) => {
            if let Some((lng, lat)) = as_point(obj) {
                format_coordinates(lat, lng)
            } else if ADDRESS_MARKERS.iter().any(|k| obj.contains_key(*k)) {
                format_address(obj)
            } else {
                value.to_string()
            }
        }
        Value::Array(_) => value.to_string(),
    }
}

/// en-US style: thousands separators, at most two fraction digits, halves
/// rounded away from zero on the shortest decimal representation.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "∞" } else { "-∞" }.to_string();
    }

    let repr = value.abs().to_string();
    let (int_part, frac_part) = repr.split_once('.').unwrap_or((repr.as_str(), ""));

    let mut digits: Vec<u8> = int_part.bytes().chain(frac_part.bytes().take(2)).collect();
    let frac_len = frac_part.len().min(2);
    if frac_part.as_bytes().get(2).is_some_and(|d| *d >= b'5') {
        round_up(&mut digits);
    }

    let split = digits.len() - frac_len;
    let int_digits = String::from_utf8_lossy(&digits[..split]).into_owned();
    let frac_digits = String::from_utf8_lossy(&digits[split..]);
    let frac_digits = frac_digits.trim_end_matches('0');

    let mut out = group_integer(&int_digits, value < 0.0);
    if !frac_digits.is_empty() {
        out.push('.');
        out.push_str(frac_digits);
    }
    out
}

/// Adds one unit in the last place of a decimal digit string.
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

fn group_integer(digits: &str, negative: bool) -> String {
    let digits = digits.trim_start_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };

    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if negative {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `lat°N/S, lng°E/W` with four decimals.
pub fn format_coordinates(lat: f64, lng: f64) -> String {
    let lat_dir = if lat >= 0.0 { 'N' } else { 'S' };
    let lng_dir = if lng >= 0.0 { 'E' } else { 'W' };
    format!("{:.4}°{lat_dir}, {:.4}°{lng_dir}", lat.abs(), lng.abs())
}

/// `[lng, lat]` of a GeoJSON Point with exactly two coordinates.
fn as_point(obj: &Map<String, Value>) -> Option<(f64, f64)> {
    if obj.get("type").and_then(Value::as_str) != Some("Point") {
        return None;
    }
    match obj.get("coordinates")?.as_array()?.as_slice() {
        [lng, lat] => Some((lng.as_f64()?, lat.as_f64()?)),
        _ => None,
    }
}

fn format_address(obj: &Map<String, Value>) -> String {
    let parts: Vec<String> = ADDRESS_PARTS
        .iter()
        .filter_map(|key| obj.get(*key))
        .filter(|v| is_truthy(v))
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();

    if parts.is_empty() {
        Value::Object(obj.clone()).to_string()
    } else {
        parts.join(", ")
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
