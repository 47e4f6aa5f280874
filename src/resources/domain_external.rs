//! `scaleway_domain_external`: a domain registered elsewhere whose DNS is
//! delegated to Scaleway.
//!
//! The identifier is the lowercased domain name. Removing the resource only
//! forgets it; the domain stays in the project.

use std::time::Duration;

use serde_json::json;
use tracing::{debug, info};

use super::{Resource, ResourceContext, ResourceData, ResourceTimeouts};
use crate::api::domain::{self, CreateExternalDomainRequest, DomainSummary};
use crate::error::ProviderError;
use crate::flatten::flatten_string_opt;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

const TYPE_NAME: &str = "scaleway_domain_external";

/// External domain resource.
pub struct DomainExternal;

fn flatten_domain(data: &mut ResourceData, dmn: &DomainSummary) {
    data.set("domain", json!(dmn.domain));
    data.set("dnssec_status", json!(dmn.dnssec_status));
    data.set("status", json!(dmn.status));
    data.set("message", flatten_string_opt(dmn.message.as_deref()));
    data.set("epp_code", json!(dmn.epp_code));
    data.set("updated_at", flatten_string_opt(dmn.updated_at.as_deref()));
    data.set("expire_at", flatten_string_opt(dmn.expired_at.as_deref()));
    data.set("is_external", json!(dmn.is_external));
    data.set("registrar", json!(dmn.registrar));
    data.set("project_id", json!(dmn.project_id));
}

#[async_trait::async_trait]
impl Resource for DomainExternal {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "domain",
                Attribute::required_string()
                    .with_description("The external domain to register into Scaleway nameservers")
                    .with_force_new(),
            )
            .with_attribute(
                "token",
                Attribute::computed_string().with_description("The domain validation token"),
            )
            .with_attribute(
                "status",
                Attribute::computed_string().with_description("The domain zone status"),
            )
            .with_attribute("message", Attribute::computed_string())
            .with_attribute(
                "updated_at",
                Attribute::computed_string()
                    .with_description("The date and time of the last update of the DNS zone"),
            )
            .with_attribute("dnssec_status", Attribute::computed_string())
            .with_attribute(
                "epp_code",
                Attribute::new(AttributeType::list(AttributeType::String), AttributeFlags::computed()),
            )
            .with_attribute("expire_at", Attribute::computed_string())
            .with_attribute("is_external", Attribute::computed_bool())
            .with_attribute("registrar", Attribute::computed_string())
            .with_attribute(
                "project_id",
                Attribute::optional_computed_string()
                    .with_description("The project the domain belongs to")
                    .with_force_new(),
            )
    }

    fn timeouts(&self) -> ResourceTimeouts {
        ResourceTimeouts::uniform(Duration::from_secs(15 * 60), Duration::from_secs(5))
    }

    async fn create(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        let name = data.require_str("domain")?.to_lowercase();
        let project_id = ctx.project_id(data);

        let existing = domain::list_domains(&ctx.client, project_id.as_deref(), None).await?;
        if existing.domains.iter().any(|d| d.domain == name) {
            debug!(resource_type = TYPE_NAME, domain = %name, "domain already registered, adopting it");
            data.set_id(name);
            return self.read(ctx, data).await;
        }

        let request = CreateExternalDomainRequest {
            domain: name.clone(),
            project_id,
        };
        match domain::create_external_domain(&ctx.client, &request).await {
            Ok(created) => {
                info!(resource_type = TYPE_NAME, domain = %created.domain, "external domain registered");
                data.set("token", flatten_string_opt(created.validation_token.as_deref()));
                data.set_id(created.domain.to_lowercase());
            },
            Err(e) if e.is_conflict() => {
                debug!(resource_type = TYPE_NAME, domain = %name, "domain exists, adopting it");
                data.set_id(name);
            },
            Err(e) => return Err(e),
        }

        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        let name = data.require_id()?.to_string();
        let project_id = ctx.project_id(data);

        let listed = match domain::list_domains(&ctx.client, project_id.as_deref(), Some(&name)).await {
            Ok(listed) => listed,
            Err(e) if e.is_not_found() => {
                data.clear_id();
                return Ok(());
            },
            Err(e) => return Err(e),
        };

        let matches: Vec<&DomainSummary> = listed.domains.iter().filter(|d| d.domain == name).collect();
        match matches.as_slice() {
            [] => Err(ProviderError::NotFound(format!("no domain found with the name {}", name))),
            [dmn] => {
                flatten_domain(data, dmn);
                Ok(())
            },
            many => Err(ProviderError::FailedPrecondition(format!(
                "{} domains found with the same name {}",
                many.len(),
                name
            ))),
        }
    }

    async fn update(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        self.read(ctx, data).await
    }

    async fn delete(&self, _ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        debug!(resource_type = TYPE_NAME, id = ?data.id(), "forgetting external domain");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_domain() {
        let dmn: DomainSummary = serde_json::from_value(json!({
            "domain": "example.com",
            "project_id": "p",
            "status": "active",
            "dnssec_status": "disabled",
            "epp_code": ["ok"],
            "expired_at": "2030-01-01T00:00:00Z",
            "registrar": "External",
            "is_external": true
        }))
        .unwrap();
        let mut data = ResourceData::from_id("example.com");
        flatten_domain(&mut data, &dmn);

        let state = data.into_state().unwrap();
        assert_eq!(state["status"], "active");
        assert_eq!(state["epp_code"], json!(["ok"]));
        assert_eq!(state["expire_at"], "2030-01-01T00:00:00Z");
        assert_eq!(state["is_external"], true);
        assert!(state["message"].is_null());
    }

    #[test]
    fn test_every_attribute_replaces_or_is_computed() {
        let schema = DomainExternal.schema();
        for (name, attr) in &schema.block.attributes {
            assert!(
                attr.force_new || (!attr.flags.optional && !attr.flags.required),
                "{} can change in place",
                name
            );
        }
    }
}
