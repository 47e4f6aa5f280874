//! Helpers turning configured attribute values into API request fields.
//!
//! Everything here runs before any network call, so malformed input is
//! reported as [`ProviderError::Validation`].

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::ProviderError;

/// Parse a duration string such as `"5m"`, `"1h30m"`, `"0.5s"` or `"250ms"`.
///
/// The bare string `"0"` is accepted as zero. Negative durations are rejected.
pub fn parse_duration(input: &str) -> Result<Duration, ProviderError> {
    let invalid = || ProviderError::Validation(format!("invalid duration {:?}", input));
    let s = input.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() || s.starts_with('-') {
        return Err(invalid());
    }
    let mut rest = s.strip_prefix('+').unwrap_or(s);
    let mut total = 0f64;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        if number_len == 0 {
            return Err(invalid());
        }
        let number: f64 = rest[..number_len].parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];
        total += number * nanos_per_unit;
    }

    Ok(Duration::from_nanos(total.round() as u64))
}

/// Expand an optional duration attribute; null or absent stays `None`.
pub fn expand_duration(value: Option<&Value>) -> Result<Option<Duration>, ProviderError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => parse_duration(s).map(Some),
        Some(other) => Err(ProviderError::Validation(format!(
            "expected a duration string, got {}",
            other
        ))),
    }
}

/// An IP network in CIDR notation, e.g. `192.168.1.10/24`.
///
/// The host bits are kept as written: a service IP is an address plus the
/// prefix of the network it lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpNet {
    /// The address part.
    pub addr: IpAddr,
    /// The prefix length.
    pub prefix: u8,
}

impl FromStr for IpNet {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| ProviderError::Validation(format!("invalid CIDR {:?}: {}", s, why));
        let (addr, prefix) = s.split_once('/').ok_or_else(|| invalid("missing prefix length"))?;
        let addr: IpAddr = addr.parse().map_err(|_| invalid("bad address"))?;
        let prefix: u8 = prefix.parse().map_err(|_| invalid("bad prefix length"))?;
        let max = if addr.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            return Err(invalid("prefix length out of range"));
        }
        Ok(Self { addr, prefix })
    }
}

impl fmt::Display for IpNet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

impl Serialize for IpNet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IpNet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|e: ProviderError| serde::de::Error::custom(e.message()))
    }
}

/// Expand an optional CIDR attribute.
pub fn expand_ip_net(value: Option<&str>) -> Result<Option<IpNet>, ProviderError> {
    match value {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some),
    }
}

/// Whether the string is an IPv4 or IPv6 address.
pub fn is_ip_address(value: &str) -> bool {
    value.parse::<IpAddr>().is_ok()
}

/// Return the configured value, or a generated `tf-{prefix}-xxxxxxxx` name when empty.
pub fn expand_or_generate_string(value: Option<&str>, prefix: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => {
            let suffix = uuid::Uuid::new_v4().simple().to_string();
            format!("tf-{}-{}", prefix, &suffix[..8])
        },
    }
}

/// Expand a list (or set) of strings; non-string elements are skipped.
pub fn expand_strings(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Expand a map of strings; non-string values are skipped.
pub fn expand_string_map(value: Option<&Value>) -> HashMap<String, String> {
    value
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("15m0s").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("0.5s").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("10us").unwrap(), Duration::from_micros(10));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_rejects_malformed() {
        for bad in ["", "5", "m", "5 minutes", "-5s", "1d", "1.2.3s"] {
            let err = parse_duration(bad).unwrap_err();
            assert!(matches!(err, ProviderError::Validation(_)), "{:?}", bad);
        }
    }

    #[test]
    fn test_expand_duration() {
        assert_eq!(expand_duration(None).unwrap(), None);
        assert_eq!(expand_duration(Some(&json!(null))).unwrap(), None);
        assert_eq!(
            expand_duration(Some(&json!("30s"))).unwrap(),
            Some(Duration::from_secs(30))
        );
        assert!(expand_duration(Some(&json!("soon"))).is_err());
        assert!(expand_duration(Some(&json!(30))).is_err());
    }

    #[test]
    fn test_ip_net() {
        let net: IpNet = "10.12.1.5/20".parse().unwrap();
        assert_eq!(net.addr, "10.12.1.5".parse::<IpAddr>().unwrap());
        assert_eq!(net.prefix, 20);
        assert_eq!(net.to_string(), "10.12.1.5/20");

        let v6: IpNet = "fd00::1/64".parse().unwrap();
        assert_eq!(v6.prefix, 64);

        assert!("10.0.0.1".parse::<IpNet>().is_err());
        assert!("10.0.0.1/33".parse::<IpNet>().is_err());
        assert!("nope/24".parse::<IpNet>().is_err());
    }

    #[test]
    fn test_ip_net_serde() {
        let net: IpNet = serde_json::from_value(json!("192.168.0.2/24")).unwrap();
        assert_eq!(serde_json::to_value(net).unwrap(), json!("192.168.0.2/24"));
        assert!(serde_json::from_value::<IpNet>(json!("192.168.0.2")).is_err());
    }

    #[test]
    fn test_expand_ip_net_absent() {
        assert_eq!(expand_ip_net(None).unwrap(), None);
        assert_eq!(expand_ip_net(Some("")).unwrap(), None);
        assert!(expand_ip_net(Some("1.2.3.4")).is_err());
    }

    #[test]
    fn test_generated_names() {
        assert_eq!(expand_or_generate_string(Some("my-app"), "app"), "my-app");

        let generated = expand_or_generate_string(None, "app");
        assert!(generated.starts_with("tf-app-"));
        assert_eq!(generated.len(), "tf-app-".len() + 8);

        let other = expand_or_generate_string(Some(""), "app");
        assert_ne!(generated, other);
    }

    #[test]
    fn test_expand_collections() {
        assert_eq!(expand_strings(Some(&json!(["a", "b"]))), vec!["a", "b"]);
        assert!(expand_strings(None).is_empty());

        let map = expand_string_map(Some(&json!({"max-pods": "110"})));
        assert_eq!(map.get("max-pods").map(String::as_str), Some("110"));
        assert!(expand_string_map(Some(&json!("x"))).is_empty());
    }

    #[test]
    fn test_is_ip_address() {
        assert!(is_ip_address("192.168.1.1"));
        assert!(is_ip_address("2001:db8::1"));
        assert!(!is_ip_address("192.168.1.256"));
    }
}
