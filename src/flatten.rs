//! Helpers turning API response fields back into state values.
//!
//! Singleton nested blocks are stored as one-element lists and absent blocks
//! as empty lists, so a plan never sees a block flip between null and `[]`.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::{json, Value};

/// Render a duration in the canonical form accepted by
/// [`parse_duration`](crate::expand::parse_duration): `"5m0s"`, `"1h0m0s"`,
/// `"1.5s"`, `"500ms"`, `"0s"`.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < 1_000 {
        return format!("{}ns", nanos);
    }
    if nanos < 1_000_000 {
        return format!("{}µs", with_fraction(nanos / 1_000, nanos % 1_000, 3));
    }
    if nanos < 1_000_000_000 {
        return format!("{}ms", with_fraction(nanos / 1_000_000, nanos % 1_000_000, 6));
    }

    let secs = d.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    out.push_str(&with_fraction(
        seconds as u128,
        d.subsec_nanos() as u128,
        9,
    ));
    out.push('s');
    out
}

fn with_fraction(whole: u128, frac: u128, digits: usize) -> String {
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0width$}", frac, width = digits);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Flatten an optional duration; absent becomes null.
pub fn flatten_duration(d: Option<Duration>) -> Value {
    d.map(|d| Value::String(format_duration(d)))
        .unwrap_or(Value::Null)
}

/// Flatten an optional block into its list representation.
pub fn flatten_singleton(block: Option<Value>) -> Value {
    match block {
        Some(b) => json!([b]),
        None => json!([]),
    }
}

/// Flatten an optional string; absent and empty both become null.
pub fn flatten_string_opt(value: Option<&str>) -> Value {
    match value {
        Some(s) if !s.is_empty() => Value::String(s.to_string()),
        _ => Value::Null,
    }
}

/// Flatten a string map.
pub fn flatten_string_map(map: &HashMap<String, String>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::parse_duration;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(format_duration(Duration::from_secs(5)), "5s");
        assert_eq!(format_duration(Duration::from_secs(300)), "5m0s");
        assert_eq!(format_duration(Duration::from_secs(900)), "15m0s");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h0m0s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h2m5s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_micros(1500)), "1.5ms");
        assert_eq!(format_duration(Duration::from_nanos(42)), "42ns");
    }

    #[test]
    fn test_formatted_durations_parse_back() {
        for d in [
            Duration::from_secs(60),
            Duration::from_millis(500),
            Duration::from_millis(61_250),
            Duration::from_secs(7200),
        ] {
            assert_eq!(parse_duration(&format_duration(d)).unwrap(), d);
        }
    }

    #[test]
    fn test_flatten_singleton() {
        assert_eq!(flatten_singleton(None), json!([]));
        assert_eq!(
            flatten_singleton(Some(json!({"ip": "10.0.0.1"}))),
            json!([{"ip": "10.0.0.1"}])
        );
    }

    #[test]
    fn test_flatten_optionals() {
        assert_eq!(flatten_duration(None), Value::Null);
        assert_eq!(flatten_duration(Some(Duration::from_secs(30))), json!("30s"));
        assert_eq!(flatten_string_opt(Some("")), Value::Null);
        assert_eq!(flatten_string_opt(Some("x")), json!("x"));

        let mut map = HashMap::new();
        map.insert("a".to_string(), "b".to_string());
        assert_eq!(flatten_string_map(&map), json!({"a": "b"}));
    }
}
