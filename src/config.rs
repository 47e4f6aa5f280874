//! Provider configuration.
//!
//! Every setting may be given explicitly in the provider block or taken from
//! the matching `SCW_*` environment variable. Explicit values win.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::expand::parse_duration;
use crate::locality::{Region, Zone};
use crate::schema::{Attribute, Schema, Validator};

/// Default API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.scaleway.com";
/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "fr-par";
/// Zone used when none is configured.
pub const DEFAULT_ZONE: &str = "fr-par-1";

/// Raw provider configuration as written by the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Access key, informational only.
    pub access_key: Option<String>,
    /// Secret key sent as `X-Auth-Token`.
    pub secret_key: Option<String>,
    /// Project used when a resource does not set one.
    pub project_id: Option<String>,
    /// Organization used when a resource does not set one.
    pub organization_id: Option<String>,
    /// Default region.
    pub region: Option<String>,
    /// Default zone.
    pub zone: Option<String>,
    /// API base URL.
    pub api_url: Option<String>,
    /// Overrides every resource's polling interval.
    pub wait_retry_interval: Option<String>,
}

/// Configuration after fallbacks and parsing, ready to build a client.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Secret key sent as `X-Auth-Token`.
    pub secret_key: String,
    /// Default project.
    pub project_id: Option<String>,
    /// Default organization.
    pub organization_id: Option<String>,
    /// Default region.
    pub region: Region,
    /// Default zone.
    pub zone: Zone,
    /// API base URL, without trailing slash.
    pub api_url: String,
    /// Polling interval override.
    pub wait_retry_interval: Option<Duration>,
}

impl ProviderConfig {
    /// Deserialize the provider block.
    pub fn from_value(value: &Value) -> Result<Self, ProviderError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone())
            .map_err(|e| ProviderError::Configuration(format!("invalid provider configuration: {}", e)))
    }

    /// Fill unset fields from the process environment.
    pub fn with_env_fallback(self) -> Self {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Fill unset fields using `lookup` for environment variables.
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let slots = [
            (&mut self.access_key, "SCW_ACCESS_KEY"),
            (&mut self.secret_key, "SCW_SECRET_KEY"),
            (&mut self.project_id, "SCW_DEFAULT_PROJECT_ID"),
            (&mut self.organization_id, "SCW_DEFAULT_ORGANIZATION_ID"),
            (&mut self.region, "SCW_DEFAULT_REGION"),
            (&mut self.zone, "SCW_DEFAULT_ZONE"),
            (&mut self.api_url, "SCW_API_URL"),
        ];
        for (slot, var) in slots {
            if slot.as_deref().map_or(true, str::is_empty) {
                *slot = lookup(var).filter(|v| !v.is_empty());
            }
        }
        self
    }

    /// Check and resolve the configuration.
    ///
    /// When only one of region and zone is given, the other is derived from it.
    pub fn resolve(&self) -> Result<ResolvedConfig, ProviderError> {
        let secret_key = self
            .secret_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                ProviderError::Configuration(
                    "secret_key is required (or set SCW_SECRET_KEY)".to_string(),
                )
            })?;

        let zone: Option<Zone> = self.zone.as_deref().map(str::parse).transpose()?;
        let region: Option<Region> = self.region.as_deref().map(str::parse).transpose()?;
        let (region, zone) = match (region, zone) {
            (Some(r), Some(z)) => (r, z),
            (Some(r), None) => {
                let z = r.default_zone();
                (r, z)
            },
            (None, Some(z)) => (z.region(), z),
            (None, None) => (DEFAULT_REGION.parse()?, DEFAULT_ZONE.parse()?),
        };

        let wait_retry_interval = self
            .wait_retry_interval
            .as_deref()
            .map(parse_duration)
            .transpose()?;

        Ok(ResolvedConfig {
            secret_key,
            project_id: self.project_id.clone(),
            organization_id: self.organization_id.clone(),
            region,
            zone,
            api_url: self
                .api_url
                .as_deref()
                .unwrap_or(DEFAULT_API_URL)
                .trim_end_matches('/')
                .to_string(),
            wait_retry_interval,
        })
    }
}

/// Schema of the provider block.
pub fn schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "access_key",
            Attribute::optional_string().with_description("The Scaleway access key"),
        )
        .with_attribute(
            "secret_key",
            Attribute::optional_string()
                .sensitive()
                .with_description("The Scaleway secret key"),
        )
        .with_attribute(
            "project_id",
            Attribute::optional_string()
                .with_validator(Validator::UuidOrLocalized)
                .with_description("The Scaleway project ID"),
        )
        .with_attribute(
            "organization_id",
            Attribute::optional_string()
                .with_validator(Validator::UuidOrLocalized)
                .with_description("The Scaleway organization ID"),
        )
        .with_attribute(
            "region",
            Attribute::optional_string().with_description("The default region"),
        )
        .with_attribute(
            "zone",
            Attribute::optional_string().with_description("The default zone"),
        )
        .with_attribute(
            "api_url",
            Attribute::optional_string().with_description("The Scaleway API URL"),
        )
        .with_attribute(
            "wait_retry_interval",
            Attribute::optional_string()
                .with_validator(Validator::Duration)
                .with_description("Polling interval used by every waiter"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::from_value(&json!({"secret_key": "s"})).unwrap();
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.region.as_str(), "fr-par");
        assert_eq!(resolved.zone.as_str(), "fr-par-1");
        assert_eq!(resolved.api_url, "https://api.scaleway.com");
        assert!(resolved.wait_retry_interval.is_none());
    }

    #[test]
    fn test_missing_secret_key() {
        let err = ProviderConfig::default().resolve().unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn test_env_fallback_does_not_override_explicit() {
        let config = ProviderConfig::from_value(&json!({"region": "nl-ams"}))
            .unwrap()
            .with_env_from(env(&[
                ("SCW_SECRET_KEY", "from-env"),
                ("SCW_DEFAULT_REGION", "pl-waw"),
                ("SCW_DEFAULT_PROJECT_ID", "11111111-1111-1111-1111-111111111111"),
            ]));

        assert_eq!(config.secret_key.as_deref(), Some("from-env"));
        assert_eq!(config.region.as_deref(), Some("nl-ams"));
        assert!(config.project_id.is_some());
    }

    #[test]
    fn test_region_derived_from_zone() {
        let config = ProviderConfig {
            secret_key: Some("s".into()),
            zone: Some("pl-waw-2".into()),
            ..Default::default()
        };
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.region.as_str(), "pl-waw");
        assert_eq!(resolved.zone.as_str(), "pl-waw-2");
    }

    #[test]
    fn test_invalid_values() {
        let config = ProviderConfig {
            secret_key: Some("s".into()),
            region: Some("paris".into()),
            ..Default::default()
        };
        assert!(config.resolve().is_err());

        let config = ProviderConfig {
            secret_key: Some("s".into()),
            wait_retry_interval: Some("often".into()),
            ..Default::default()
        };
        assert!(config.resolve().is_err());

        assert!(ProviderConfig::from_value(&json!({"region": 3})).is_err());
    }

    #[test]
    fn test_api_url_trailing_slash_and_interval() {
        let config = ProviderConfig {
            secret_key: Some("s".into()),
            api_url: Some("http://127.0.0.1:8080/".into()),
            wait_retry_interval: Some("10ms".into()),
            ..Default::default()
        };
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.api_url, "http://127.0.0.1:8080");
        assert_eq!(resolved.wait_retry_interval, Some(Duration::from_millis(10)));
    }
}
