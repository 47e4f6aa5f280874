//! The provider entry points.
//!
//! [`ProviderService`] is the lifecycle surface a host drives: schema,
//! configuration, validation, state upgrade, plan, CRUD and import. Values cross
//! it as `serde_json::Value`, and failures come back as [`ProviderError`]s that
//! callers turn into diagnostics with [`ProviderError::to_diagnostic`].
//!
//! [`ScalewayProvider`] implements it by dispatching each call to the
//! [`Resource`] registered for the requested type.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, instrument, warn};

use crate::api::ScalewayClient;
use crate::config::{self, ProviderConfig};
use crate::error::ProviderError;
use crate::plan::plan_resource;
use crate::resources::{self, Resource, ResourceContext, ResourceData};
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::types::{ImportedResource, PlanResult, ProviderMetadata};
use crate::validation;

/// Lifecycle operations of a provider.
///
/// Only [`schema`](Self::schema), [`configure`](Self::configure),
/// [`plan`](Self::plan) and the CRUD methods are mandatory; the others have
/// defaults derived from the schema.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// Provider configuration schema and every resource schema.
    fn schema(&self) -> ProviderSchema;

    /// Name, version and resource types, derived from the schema by default.
    fn metadata(&self) -> ProviderMetadata {
        let mut resources: Vec<String> = self.schema().resources.keys().cloned().collect();
        resources.sort();
        ProviderMetadata {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            resources,
        }
    }

    /// Check a provider configuration without applying it.
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validation::validate(&self.schema().provider, &config))
    }

    /// Apply the provider configuration: credentials, defaults, endpoint.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Abort in-flight waits; later waits fail as cancelled too.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Check a resource configuration against its schema.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let schema = self.schema();
        let resource_schema = schema
            .resources
            .get(resource_type)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))?;
        Ok(validation::validate(resource_schema, &config))
    }

    /// Rewrite a state written by an older schema `version`.
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: u64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let _ = (resource_type, version);
        Ok(state)
    }

    /// Compute the planned state. `config` is null when the resource is being
    /// destroyed, `prior_state` is `None` when it is being created.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a resource. `None` means it vanished before it could be read back.
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Option<Value>, ProviderError>;

    /// Refresh a state. `None` means the remote object is gone.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Option<Value>, ProviderError>;

    /// Apply a planned update. `None` means the remote object is gone.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Option<Value>, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Bring an existing remote object under management.
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let _ = id;
        Err(ProviderError::Unimplemented(format!(
            "import not supported for resource type: {}",
            resource_type
        )))
    }
}

/// The Scaleway provider.
///
/// Unconfigured until [`configure`](ProviderService::configure) succeeds; any
/// call that reaches the API before that fails as a failed precondition.
pub struct ScalewayProvider {
    resources: HashMap<&'static str, Arc<dyn Resource>>,
    client: RwLock<Option<Arc<ScalewayClient>>>,
    stop: watch::Sender<bool>,
}

impl Default for ScalewayProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ScalewayProvider {
    /// A provider serving every resource of the crate.
    pub fn new() -> Self {
        Self::with_resources(resources::all())
    }

    /// A provider serving only `resources`.
    pub fn with_resources(resources: Vec<Arc<dyn Resource>>) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            resources: resources.into_iter().map(|r| (r.type_name(), r)).collect(),
            client: RwLock::new(None),
            stop,
        }
    }

    /// A provider already configured with `client`.
    pub fn with_client(client: ScalewayClient) -> Self {
        let mut provider = Self::new();
        provider.client = RwLock::new(Some(Arc::new(client)));
        provider
    }

    fn resource(&self, resource_type: &str) -> Result<&Arc<dyn Resource>, ProviderError> {
        self.resources
            .get(resource_type)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    async fn context(&self, resource: &dyn Resource) -> Result<ResourceContext, ProviderError> {
        let client = self.client.read().await.clone().ok_or_else(|| {
            ProviderError::FailedPrecondition("provider is not configured".to_string())
        })?;
        Ok(ResourceContext::new(client, resource.timeouts()).with_cancel(self.stop.subscribe()))
    }
}

#[async_trait::async_trait]
impl ProviderService for ScalewayProvider {
    fn schema(&self) -> ProviderSchema {
        self.resources.values().fold(
            ProviderSchema::new().with_provider_config(config::schema()),
            |schema, resource| schema.with_resource(resource.type_name(), resource.schema()),
        )
    }

    #[instrument(skip(self, config))]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = validation::validate(&config::schema(), &config);
        if diagnostics.iter().any(|d| d.severity == DiagnosticSeverity::Error) {
            warn!(diagnostics = diagnostics.len(), "provider configuration rejected");
            return Ok(diagnostics);
        }

        let resolved = match ProviderConfig::from_value(&config)
            .map(ProviderConfig::with_env_fallback)
            .and_then(|c| c.resolve())
        {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(error = %e, "provider configuration rejected");
                return Ok(vec![e.to_diagnostic()]);
            },
        };

        let client = ScalewayClient::new(&resolved)?;
        *self.client.write().await = Some(Arc::new(client));
        info!(region = %resolved.region, zone = %resolved.zone, "provider configured");
        Ok(diagnostics)
    }

    #[instrument(skip(self))]
    async fn stop(&self) -> Result<(), ProviderError> {
        info!("stop requested");
        self.stop.send_replace(true);
        Ok(())
    }

    #[instrument(skip(self, state))]
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: u64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let current = resource.schema().version;
        if version > current {
            return Err(ProviderError::InvalidRequest(format!(
                "state version {} is newer than schema version {}",
                version, current
            )));
        }

        let mut state = state;
        for from in version..current {
            state = resource.upgrade_state(from, state).inspect_err(|e| {
                error!(resource_type, from_version = from, error = %e, "state upgrade failed");
            })?;
        }
        if version < current {
            info!(resource_type, from_version = version, to_version = current, "state upgraded");
        }
        Ok(state)
    }

    #[instrument(skip(self, prior_state, config))]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        let customize = |prior: Option<&Value>, config: &Value, planned: &mut serde_json::Map<String, Value>| {
            resource.customize_plan(prior, config, planned)
        };
        let plan = plan_resource(&resource.schema(), prior_state.as_ref(), &config, &customize)?;
        debug!(
            resource_type,
            changes = plan.changes.len(),
            requires_replace = plan.requires_replace,
            "plan computed"
        );
        Ok(plan)
    }

    #[instrument(skip(self, planned_state))]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Option<Value>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let ctx = self.context(resource.as_ref()).await?;
        let mut data = ResourceData::new(planned_state)?;

        info!(resource_type, "create called");
        match resource.create(&ctx, &mut data).await {
            Ok(()) => {
                info!(resource_type, id = data.id().unwrap_or_default(), "create completed");
                Ok(data.into_state())
            },
            Err(e) => {
                error!(resource_type, error = %e, "create failed");
                Err(e)
            },
        }
    }

    #[instrument(skip(self, current_state))]
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Option<Value>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let ctx = self.context(resource.as_ref()).await?;
        let mut data = ResourceData::new(current_state)?;

        debug!(resource_type, id = data.id().unwrap_or_default(), "read called");
        match resource.read(&ctx, &mut data).await {
            Ok(()) => {
                if data.is_gone() {
                    info!(resource_type, "resource no longer exists");
                }
                Ok(data.into_state())
            },
            Err(e) => {
                error!(resource_type, error = %e, "read failed");
                Err(e)
            },
        }
    }

    #[instrument(skip(self, prior_state, planned_state))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let ctx = self.context(resource.as_ref()).await?;
        let mut data = ResourceData::with_prior(planned_state, prior_state)?;

        info!(resource_type, id = data.id().unwrap_or_default(), "update called");
        match resource.update(&ctx, &mut data).await {
            Ok(()) => {
                info!(resource_type, "update completed");
                Ok(data.into_state())
            },
            Err(e) => {
                error!(resource_type, error = %e, "update failed");
                Err(e)
            },
        }
    }

    #[instrument(skip(self, current_state))]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.resource(resource_type)?;
        let ctx = self.context(resource.as_ref()).await?;
        let mut data = ResourceData::new(current_state)?;

        info!(resource_type, id = data.id().unwrap_or_default(), "delete called");
        resource.delete(&ctx, &mut data).await.inspect_err(|e| {
            error!(resource_type, error = %e, "delete failed");
        })?;
        info!(resource_type, "delete completed");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let ctx = self.context(resource.as_ref()).await?;
        let mut data = ResourceData::from_id(id);

        resource.read(&ctx, &mut data).await?;
        let state = data.into_state().ok_or_else(|| {
            ProviderError::NotFound(format!("cannot import non-existent {} {}", resource_type, id))
        })?;
        info!(resource_type, id, "resource imported");
        Ok(vec![ImportedResource::new(resource_type, state)])
    }
}
