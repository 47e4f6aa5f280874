//! Domains and DNS (`domain/v2beta1`): external domains.

use serde::{Deserialize, Serialize};

use super::ScalewayClient;
use crate::error::ProviderError;

/// A domain as returned by the listing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainSummary {
    pub domain: String,
    pub project_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub dnssec_status: String,
    #[serde(default)]
    pub epp_code: Vec<String>,
    #[serde(default)]
    pub expired_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub registrar: String,
    #[serde(default)]
    pub is_external: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListDomainsResponse {
    #[serde(default)]
    pub domains: Vec<DomainSummary>,
    #[serde(default)]
    pub total_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateExternalDomainRequest {
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateExternalDomainResponse {
    pub domain: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub validation_token: Option<String>,
}

/// List the domains of a project, optionally filtered by name.
pub async fn list_domains(
    client: &ScalewayClient,
    project_id: Option<&str>,
    domain: Option<&str>,
) -> Result<ListDomainsResponse, ProviderError> {
    let mut query = Vec::new();
    if let Some(project_id) = project_id {
        query.push(("project_id", project_id.to_string()));
    }
    if let Some(domain) = domain {
        query.push(("domain", domain.to_string()));
    }
    client
        .get_with_query("/domain/v2beta1/domains", &query)
        .await
}

pub async fn create_external_domain(
    client: &ScalewayClient,
    request: &CreateExternalDomainRequest,
) -> Result<CreateExternalDomainResponse, ProviderError> {
    client.post("/domain/v2beta1/external-domains", request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_response_defaults() {
        let resp: ListDomainsResponse = serde_json::from_value(json!({
            "domains": [{"domain": "example.com", "project_id": "p", "is_external": true}]
        }))
        .unwrap();
        assert_eq!(resp.domains.len(), 1);
        assert!(resp.domains[0].is_external);
        assert!(resp.domains[0].epp_code.is_empty());
    }

    #[test]
    fn test_create_request_omits_missing_project() {
        let req = CreateExternalDomainRequest {
            domain: "example.com".into(),
            project_id: None,
        };
        assert_eq!(serde_json::to_value(&req).unwrap(), json!({"domain": "example.com"}));
    }
}
