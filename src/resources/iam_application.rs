//! `scaleway_iam_application`: a non-human IAM principal.

use serde_json::json;
use tracing::{debug, info};

use super::{Resource, ResourceContext, ResourceData};
use crate::api::iam::{self, Application, CreateApplicationRequest, UpdateApplicationRequest};
use crate::error::ProviderError;
use crate::expand::expand_or_generate_string;
use crate::flatten::flatten_string_opt;
use crate::schema::{Attribute, Schema};
use crate::wait::allow_not_found;

const TYPE_NAME: &str = "scaleway_iam_application";

/// IAM application resource.
pub struct IamApplication;

fn flatten_application(data: &mut ResourceData, app: &Application) {
    data.set("name", json!(app.name));
    data.set("description", json!(app.description));
    data.set("created_at", flatten_string_opt(app.created_at.as_deref()));
    data.set("updated_at", flatten_string_opt(app.updated_at.as_deref()));
    data.set("organization_id", json!(app.organization_id));
    data.set("editable", json!(app.editable));
}

#[async_trait::async_trait]
impl Resource for IamApplication {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "name",
                Attribute::optional_computed_string().with_description("The name of the IAM application"),
            )
            .with_attribute(
                "description",
                Attribute::optional_string().with_description("The description of the IAM application"),
            )
            .with_attribute(
                "created_at",
                Attribute::computed_string()
                    .with_description("The date and time of the creation of the application"),
            )
            .with_attribute(
                "updated_at",
                Attribute::computed_string()
                    .with_description("The date and time of the last update of the application"),
            )
            .with_attribute(
                "editable",
                Attribute::computed_bool().with_description("Whether or not the application is editable"),
            )
            .with_attribute(
                "organization_id",
                Attribute::optional_computed_string()
                    .with_description("The organization the application belongs to")
                    .with_force_new(),
            )
    }

    async fn create(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        let request = CreateApplicationRequest {
            name: expand_or_generate_string(data.get_str("name"), "application"),
            description: data.get_str("description").unwrap_or_default().to_string(),
            organization_id: ctx.organization_id(data),
        };
        let app = iam::create_application(&ctx.client, &request).await?;
        info!(resource_type = TYPE_NAME, id = %app.id, name = %app.name, "application created");
        data.set_id(app.id);

        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        let id = data.require_id()?.to_string();
        match iam::get_application(&ctx.client, &id).await {
            Ok(app) => {
                flatten_application(data, &app);
                Ok(())
            },
            Err(e) if e.is_not_found() => {
                debug!(resource_type = TYPE_NAME, %id, "application gone, clearing state");
                data.clear_id();
                Ok(())
            },
            Err(e) => Err(e),
        }
    }

    async fn update(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        let id = data.require_id()?.to_string();

        let mut request = UpdateApplicationRequest::default();
        if data.has_change("name") {
            request.name = data.get_str("name").map(str::to_string);
        }
        if data.has_change("description") {
            request.description = Some(data.get_str("description").unwrap_or_default().to_string());
        }

        if !request.is_empty()
            && allow_not_found(iam::update_application(&ctx.client, &id, &request).await)?.is_none()
        {
            debug!(resource_type = TYPE_NAME, %id, "application gone during update, clearing state");
            data.clear_id();
            return Ok(());
        }
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        let id = data.require_id()?;
        allow_not_found(iam::delete_application(&ctx.client, id).await)?;
        Ok(())
    }
}
