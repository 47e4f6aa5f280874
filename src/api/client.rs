//! HTTP client for the Scaleway REST API.

use std::time::Duration;

use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::config::ResolvedConfig;
use crate::error::ProviderError;
use crate::locality::{Region, Zone};

/// Longest error body kept in logs.
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Truncate a response body and drop control characters before logging it.
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };
    truncated.replace(|c: char| c.is_control(), "")
}

/// Pull the `message` field out of a Scaleway error body.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        })
}

/// Authenticated client shared by every resource.
///
/// Holds the provider-level defaults (project, organization, region, zone)
/// that resources fall back to when their configuration leaves them unset.
#[derive(Debug, Clone)]
pub struct ScalewayClient {
    http: Client,
    base_url: String,
    secret_key: String,
    /// Project used when a resource sets none.
    pub default_project_id: Option<String>,
    /// Organization used when a resource sets none.
    pub default_organization_id: Option<String>,
    /// Region used when a resource sets none.
    pub default_region: Region,
    /// Zone used when a resource sets none.
    pub default_zone: Zone,
    /// Polling interval that overrides every resource's own.
    pub wait_retry_interval: Option<Duration>,
}

impl ScalewayClient {
    /// Build a client from a resolved provider configuration.
    pub fn new(config: &ResolvedConfig) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .user_agent(concat!("scaleway-provider/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.api_url.clone(),
            secret_key: config.secret_key.clone(),
            default_project_id: config.project_id.clone(),
            default_organization_id: config.organization_id.clone(),
            default_region: config.region.clone(),
            default_zone: config.zone.clone(),
            wait_retry_interval: config.wait_retry_interval,
        })
    }

    /// GET `path` and decode the JSON body.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        self.get_with_query(path, &[]).await
    }

    /// GET `path` with query parameters and decode the JSON body.
    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let body = self.send(Method::GET, path, query, None::<&()>).await?;
        decode(&body)
    }

    /// POST a JSON body and decode the response.
    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ProviderError> {
        let body = self.send(Method::POST, path, &[], Some(body)).await?;
        decode(&body)
    }

    /// PATCH a JSON body and decode the response.
    pub async fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ProviderError> {
        let body = self.send(Method::PATCH, path, &[], Some(body)).await?;
        decode(&body)
    }

    /// PUT a JSON body and decode the response.
    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ProviderError> {
        let body = self.send(Method::PUT, path, &[], Some(body)).await?;
        decode(&body)
    }

    /// DELETE `path`, ignoring whatever the API returns on success.
    pub async fn delete(&self, path: &str) -> Result<(), ProviderError> {
        self.send(Method::DELETE, path, &[], None::<&()>).await?;
        Ok(())
    }

    async fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<String, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "sending request");

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header("X-Auth-Token", &self.secret_key);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            error!(%method, %url, status = status.as_u16(), body = %sanitize_for_log(&text), "API error");
            return Err(ProviderError::from_status(
                status.as_u16(),
                error_message(status, &text),
            ));
        }
        Ok(text)
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ProviderError> {
    if body.trim().is_empty() {
        return Ok(serde_json::from_str("null")?);
    }
    Ok(serde_json::from_str(body)?)
}
