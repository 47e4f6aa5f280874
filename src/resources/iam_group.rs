//! `scaleway_iam_group`: a named set of users and applications.

use serde_json::{json, Value};
use tracing::{debug, info};

use super::{Resource, ResourceContext, ResourceData};
use crate::api::iam::{self, CreateGroupRequest, Group, SetGroupMembersRequest, UpdateGroupRequest};
use crate::error::ProviderError;
use crate::expand::{expand_or_generate_string, expand_strings};
use crate::flatten::flatten_string_opt;
use crate::schema::{Attribute, Schema, Validator};
use crate::wait::allow_not_found;

const TYPE_NAME: &str = "scaleway_iam_group";

/// IAM group resource.
pub struct IamGroup;

fn members(data: &ResourceData) -> SetGroupMembersRequest {
    SetGroupMembersRequest {
        user_ids: expand_strings(data.get("user_ids")),
        application_ids: expand_strings(data.get("application_ids")),
    }
}

fn sorted(ids: &[String]) -> Value {
    let mut ids = ids.to_vec();
    ids.sort();
    json!(ids)
}

fn flatten_group(data: &mut ResourceData, group: &Group) {
    data.set("name", json!(group.name));
    data.set("description", json!(group.description));
    data.set("user_ids", sorted(&group.user_ids));
    data.set("application_ids", sorted(&group.application_ids));
    data.set("organization_id", json!(group.organization_id));
    data.set("created_at", flatten_string_opt(group.created_at.as_deref()));
    data.set("updated_at", flatten_string_opt(group.updated_at.as_deref()));
}

#[async_trait::async_trait]
impl Resource for IamGroup {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "name",
                Attribute::optional_computed_string().with_description("The name of the IAM group"),
            )
            .with_attribute(
                "description",
                Attribute::optional_string().with_description("The description of the IAM group"),
            )
            .with_attribute(
                "user_ids",
                Attribute::optional_string_set()
                    .with_description("User IDs attached to the group")
                    .with_validator(Validator::UuidOrLocalized),
            )
            .with_attribute(
                "application_ids",
                Attribute::optional_string_set()
                    .with_description("Application IDs attached to the group")
                    .with_validator(Validator::UuidOrLocalized),
            )
            .with_attribute(
                "organization_id",
                Attribute::optional_computed_string().with_force_new(),
            )
            .with_attribute("created_at", Attribute::computed_string())
            .with_attribute("updated_at", Attribute::computed_string())
    }

    async fn create(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        let request = CreateGroupRequest {
            name: expand_or_generate_string(data.get_str("name"), "group"),
            description: data.get_str("description").unwrap_or_default().to_string(),
            organization_id: ctx.organization_id(data),
        };
        let group = iam::create_group(&ctx.client, &request).await?;
        info!(resource_type = TYPE_NAME, id = %group.id, name = %group.name, "group created");
        data.set_id(group.id.clone());

        let members = members(data);
        if !members.user_ids.is_empty() || !members.application_ids.is_empty() {
            iam::set_group_members(&ctx.client, &group.id, &members).await?;
        }

        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        let id = data.require_id()?.to_string();
        match iam::get_group(&ctx.client, &id).await {
            Ok(group) => {
                flatten_group(data, &group);
                Ok(())
            },
            Err(e) if e.is_not_found() => {
                debug!(resource_type = TYPE_NAME, %id, "group gone, clearing state");
                data.clear_id();
                Ok(())
            },
            Err(e) => Err(e),
        }
    }

    async fn update(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        let id = data.require_id()?.to_string();

        let mut request = UpdateGroupRequest::default();
        if data.has_change("name") {
            request.name = data.get_str("name").map(str::to_string);
        }
        if data.has_change("description") {
            request.description = Some(data.get_str("description").unwrap_or_default().to_string());
        }
        if !request.is_empty() && allow_not_found(iam::update_group(&ctx.client, &id, &request).await)?.is_none() {
            debug!(resource_type = TYPE_NAME, %id, "group gone during update, clearing state");
            data.clear_id();
            return Ok(());
        }

        if (data.has_change("user_ids") || data.has_change("application_ids"))
            && allow_not_found(iam::set_group_members(&ctx.client, &id, &members(data)).await)?.is_none()
        {
            debug!(resource_type = TYPE_NAME, %id, "group gone during update, clearing state");
            data.clear_id();
            return Ok(());
        }

        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        let id = data.require_id()?;
        allow_not_found(iam::delete_group(&ctx.client, id).await)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_members_from_state() {
        let data = ResourceData::new(json!({
            "user_ids": ["b", "a"],
            "application_ids": null
        }))
        .unwrap();
        let req = members(&data);
        assert_eq!(req.user_ids, vec!["b".to_string(), "a".to_string()]);
        assert!(req.application_ids.is_empty());
    }

    #[test]
    fn test_flatten_sorts_member_sets() {
        let group: Group = serde_json::from_value(json!({
            "id": "g", "name": "n", "organization_id": "o",
            "application_ids": ["z", "m"]
        }))
        .unwrap();
        let mut data = ResourceData::from_id("g");
        flatten_group(&mut data, &group);
        assert_eq!(data.get("application_ids"), Some(&json!(["m", "z"])));
        assert_eq!(data.get("user_ids"), Some(&json!([])));
    }
}
