//! `scaleway_iam_ssh_key`: an SSH public key installed on new instances of a
//! project.

use serde_json::json;
use tracing::{debug, info};

use super::{Resource, ResourceContext, ResourceData};
use crate::api::iam::{self, CreateSshKeyRequest, SshKey, UpdateSshKeyRequest};
use crate::error::ProviderError;
use crate::expand::expand_or_generate_string;
use crate::flatten::flatten_string_opt;
use crate::schema::{Attribute, DiffSuppress, Schema};
use crate::wait::allow_not_found;

const TYPE_NAME: &str = "scaleway_iam_ssh_key";

/// IAM SSH key resource.
pub struct IamSshKey;

/// Keys pasted from files often carry blank lines around them.
fn trim_public_key(key: &str) -> &str {
    key.trim_matches(|c: char| c == '\n' || c == '\r' || c == ' ')
}

fn flatten_ssh_key(data: &mut ResourceData, key: &SshKey) {
    data.set("name", json!(key.name));
    data.set("public_key", json!(trim_public_key(&key.public_key)));
    data.set("fingerprint", json!(key.fingerprint));
    data.set("organization_id", json!(key.organization_id));
    data.set("project_id", json!(key.project_id));
    data.set("disabled", json!(key.disabled));
    data.set("created_at", flatten_string_opt(key.created_at.as_deref()));
    data.set("updated_at", flatten_string_opt(key.updated_at.as_deref()));
}

#[async_trait::async_trait]
impl Resource for IamSshKey {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "name",
                Attribute::optional_computed_string().with_description("The name of the SSH key"),
            )
            .with_attribute(
                "public_key",
                Attribute::required_string()
                    .with_description("The public SSH key")
                    .with_force_new()
                    .with_diff_suppress(DiffSuppress::TrimmedWhitespace),
            )
            .with_attribute(
                "fingerprint",
                Attribute::computed_string().with_description("The fingerprint of the public key"),
            )
            .with_attribute(
                "disabled",
                Attribute::optional_bool()
                    .with_description("Whether the SSH key is disabled")
                    .with_default(json!(false)),
            )
            .with_attribute(
                "project_id",
                Attribute::optional_computed_string()
                    .with_description("The project the SSH key belongs to")
                    .with_force_new(),
            )
            .with_attribute("organization_id", Attribute::computed_string())
            .with_attribute("created_at", Attribute::computed_string())
            .with_attribute("updated_at", Attribute::computed_string())
    }

    async fn create(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        let request = CreateSshKeyRequest {
            name: expand_or_generate_string(data.get_str("name"), "ssh-key"),
            public_key: trim_public_key(data.require_str("public_key")?).to_string(),
            project_id: ctx.project_id(data),
        };
        let key = iam::create_ssh_key(&ctx.client, &request).await?;
        info!(resource_type = TYPE_NAME, id = %key.id, fingerprint = %key.fingerprint, "ssh key created");
        data.set_id(key.id.clone());

        // keys are created enabled
        if data.get_bool("disabled").unwrap_or(false) {
            let disable = UpdateSshKeyRequest {
                disabled: Some(true),
                ..Default::default()
            };
            iam::update_ssh_key(&ctx.client, &key.id, &disable).await?;
        }

        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        let id = data.require_id()?.to_string();
        match iam::get_ssh_key(&ctx.client, &id).await {
            Ok(key) => {
                flatten_ssh_key(data, &key);
                Ok(())
            },
            Err(e) if e.is_not_found() => {
                debug!(resource_type = TYPE_NAME, %id, "ssh key gone, clearing state");
                data.clear_id();
                Ok(())
            },
            Err(e) => Err(e),
        }
    }

    async fn update(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        let id = data.require_id()?.to_string();

        let mut request = UpdateSshKeyRequest::default();
        if data.has_change("name") {
            request.name = data.get_str("name").map(str::to_string);
        }
        if data.has_change("disabled") {
            request.disabled = Some(data.get_bool("disabled").unwrap_or(false));
        }
        if !request.is_empty() && allow_not_found(iam::update_ssh_key(&ctx.client, &id, &request).await)?.is_none() {
            debug!(resource_type = TYPE_NAME, %id, "ssh key gone during update, clearing state");
            data.clear_id();
            return Ok(());
        }

        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        let id = data.require_id()?;
        allow_not_found(iam::delete_ssh_key(&ctx.client, id).await)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_public_key() {
        assert_eq!(trim_public_key("\n\nssh-ed25519 AAAA test\n\n"), "ssh-ed25519 AAAA test");
        assert_eq!(trim_public_key("ssh-rsa AAAA"), "ssh-rsa AAAA");
    }

    #[test]
    fn test_flatten_trims_key() {
        let key: SshKey = serde_json::from_value(json!({
            "id": "k",
            "name": "main",
            "public_key": "ssh-ed25519 AAAA\n",
            "fingerprint": "256 MD5:aa",
            "project_id": "p",
            "organization_id": "o",
            "disabled": true
        }))
        .unwrap();
        let mut data = ResourceData::from_id("k");
        flatten_ssh_key(&mut data, &key);
        assert_eq!(data.get_str("public_key"), Some("ssh-ed25519 AAAA"));
        assert_eq!(data.get_bool("disabled"), Some(true));
    }

    #[test]
    fn test_disabled_defaults_to_false() {
        let schema = IamSshKey.schema();
        let disabled = &schema.block.attributes["disabled"];
        assert_eq!(disabled.default, Some(json!(false)));
    }
}
