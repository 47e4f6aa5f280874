//! Typed access to the Scaleway REST API.
//!
//! One sub-module per product: request/response structs mirroring the wire
//! format, one function per endpoint and the `wait_for_*` helpers polling a
//! resource until its status is terminal.

/// Declare a string enum as the API spells it.
///
/// Statuses the crate does not know deserialize to `Unknown` instead of failing.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[allow(missing_docs)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
            #[serde(other, rename = "unknown")]
            Unknown,
        }

        impl $name {
            /// The wire spelling.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                    Self::Unknown => "unknown",
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::ProviderError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(Self::$variant),)+
                    _ => Err($crate::error::ProviderError::Validation(format!(
                        "unsupported {} {:?}",
                        stringify!($name),
                        s
                    ))),
                }
            }
        }
    };
}

pub mod client;
// wire structs mirror the API reference field for field
#[allow(missing_docs)]
pub mod documentdb;
#[allow(missing_docs)]
pub mod domain;
#[allow(missing_docs)]
pub mod iam;
#[allow(missing_docs)]
pub mod k8s;
#[allow(missing_docs)]
pub mod lb;

pub use client::ScalewayClient;

/// Optional durations as the API writes them: seconds with an `s` suffix (`"1.5s"`).
pub mod wire_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    use crate::expand::parse_duration;

    /// Serialize `Some(1.5s)` as `"1.5s"`.
    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_str(&format!("{}s", d.as_secs_f64())),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize `"1.5s"` (or null) into an optional duration.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) => parse_duration(&s)
                .map(Some)
                .map_err(|e| serde::de::Error::custom(e.message())),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::time::Duration;

    wire_enum!(Color {
        Red => "red",
        DarkBlue => "dark_blue",
    });

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Timed {
        #[serde(with = "wire_duration", default, skip_serializing_if = "Option::is_none")]
        timeout: Option<Duration>,
    }

    #[test]
    fn test_wire_enum() {
        assert_eq!(serde_json::to_value(Color::DarkBlue).unwrap(), json!("dark_blue"));
        let c: Color = serde_json::from_value(json!("red")).unwrap();
        assert_eq!(c, Color::Red);
        let unknown: Color = serde_json::from_value(json!("ultraviolet")).unwrap();
        assert_eq!(unknown, Color::Unknown);
        assert_eq!("dark_blue".parse::<Color>().unwrap(), Color::DarkBlue);
        assert!("unknown".parse::<Color>().is_err());
        assert_eq!(Color::Red.to_string(), "red");
    }

    #[test]
    fn test_wire_duration() {
        let t = Timed {
            timeout: Some(Duration::from_millis(1500)),
        };
        assert_eq!(serde_json::to_value(&t).unwrap(), json!({"timeout": "1.5s"}));
        let back: Timed = serde_json::from_value(json!({"timeout": "300s"})).unwrap();
        assert_eq!(back.timeout, Some(Duration::from_secs(300)));
        let none: Timed = serde_json::from_value(json!({})).unwrap();
        assert_eq!(none.timeout, None);
        assert_eq!(serde_json::to_value(&none).unwrap(), json!({}));
    }
}
