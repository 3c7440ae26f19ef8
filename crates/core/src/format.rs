use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

const BACKEND_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    NotAvailable,
    Zero,
}

/// Parses a JSON number or numeric string. Strings use the leading numeric
/// prefix, so `"12.5%"` yields `12.5`. Non-finite results are rejected.
pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => leading_float(s),
        _ => None,
    }
}

pub fn safe_number(value: Option<&Value>) -> f64 {
    value.and_then(parse_number).unwrap_or(0.0)
}

pub fn safe_to_fixed(value: Option<&Value>, digits: usize, sentinel: Sentinel) -> String {
    to_fixed(value.and_then(parse_number), digits, sentinel)
}

pub fn to_fixed(value: Option<f64>, digits: usize, sentinel: Sentinel) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) => format!("{v:.digits$}"),
        None => match sentinel {
            Sentinel::NotAvailable => "N/A".to_string(),
            Sentinel::Zero => format!("{:.digits$}", 0.0),
        },
    }
}

pub fn format_signed_percent(value: f64) -> String {
    let value = if value == 0.0 { 0.0 } else { value };
    format!("{value:+.2}%")
}

pub fn format_currency(value: f64) -> String {
    if value < 0.0 {
        format!("-${:.2}", value.abs())
    } else {
        format!("${value:.2}")
    }
}

/// Accepts RFC 3339 and the backend's naive `YYYY-MM-DD HH:MM:SS` (read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, BACKEND_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Buckets elapsed time into minutes (< 60), hours (< 1440 minutes) or days.
/// Timestamps in the future count as zero elapsed time.
pub fn time_ago(timestamp: &str, now: DateTime<Utc>) -> Option<String> {
    let at = parse_timestamp(timestamp)?;
    let minutes = (now - at).num_minutes().max(0);
    Some(if minutes < 60 {
        format!("{minutes}m ago")
    } else if minutes < 1440 {
        format!("{}h ago", minutes / 60)
    } else {
        format!("{}d ago", minutes / 1440)
    })
}

fn leading_float(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let len = bytes.len();
    let digits_from = |mut i: usize| {
        while i < len && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = if matches!(bytes.first(), Some(b'+' | b'-')) { 1 } else { 0 };
    let int_end = digits_from(end);
    let mut mantissa = int_end - end;
    end = int_end;

    if end < len && bytes[end] == b'.' {
        let frac_end = digits_from(end + 1);
        if frac_end > end + 1 {
            mantissa += frac_end - end - 1;
            end = frac_end;
        }
    }
    if mantissa == 0 {
        return None;
    }

    if end < len && matches!(bytes[end], b'e' | b'E') {
        let mut exp = end + 1;
        if exp < len && matches!(bytes[exp], b'+' | b'-') {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}
