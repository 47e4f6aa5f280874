//! Resource types served by the provider.
//!
//! Every resource follows the same cycle: expand the planned attributes into a
//! request, invoke the API, wait for the object to settle and flatten the
//! response back into state. A [`Resource`] implementation only does the
//! per-product mapping; planning, validation and dispatch live in
//! [`crate::plan`], [`crate::validation`] and [`crate::provider`].

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::watch;

use crate::api::ScalewayClient;
use crate::error::ProviderError;
use crate::locality::{Region, Zone};
use crate::schema::Schema;
use crate::wait::WaitOptions;

mod data;
pub mod document_db_read_replica;
pub mod domain_external;
pub mod iam_application;
pub mod iam_group;
pub mod iam_ssh_key;
pub mod k8s_pool;
pub mod lb_backend;

pub use data::{singleton, ResourceData};

/// How long each lifecycle step may wait, and how often it polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceTimeouts {
    /// Create deadline.
    pub create: Duration,
    /// Read deadline.
    pub read: Duration,
    /// Update deadline.
    pub update: Duration,
    /// Delete deadline.
    pub delete: Duration,
    /// Delay between two polls, unless the provider configuration overrides it.
    pub retry_interval: Duration,
}

impl ResourceTimeouts {
    /// The same deadline for every step.
    pub const fn uniform(timeout: Duration, retry_interval: Duration) -> Self {
        Self {
            create: timeout,
            read: timeout,
            update: timeout,
            delete: timeout,
            retry_interval,
        }
    }
}

impl Default for ResourceTimeouts {
    fn default() -> Self {
        Self::uniform(Duration::from_secs(300), Duration::from_secs(5))
    }
}

/// What a lifecycle call gets besides the resource data.
#[derive(Debug, Clone)]
pub struct ResourceContext {
    /// Configured API client.
    pub client: Arc<ScalewayClient>,
    /// Deadlines of the resource being handled.
    pub timeouts: ResourceTimeouts,
    cancel: Option<watch::Receiver<bool>>,
}

impl ResourceContext {
    /// A context without a stop signal.
    pub fn new(client: Arc<ScalewayClient>, timeouts: ResourceTimeouts) -> Self {
        Self {
            client,
            timeouts,
            cancel: None,
        }
    }

    /// Abort waits once `cancel` flips to `true`.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Polling options bounded by `timeout`.
    pub fn wait_options(&self, timeout: Duration) -> WaitOptions {
        let interval = self
            .client
            .wait_retry_interval
            .unwrap_or(self.timeouts.retry_interval);
        let opts = WaitOptions::new(interval, timeout);
        match &self.cancel {
            Some(cancel) => opts.with_cancel(cancel.clone()),
            None => opts,
        }
    }

    /// The `region` attribute, or the provider default.
    pub fn region(&self, data: &ResourceData) -> Result<Region, ProviderError> {
        match data.get_str("region") {
            Some(region) => region.parse(),
            None => Ok(self.client.default_region.clone()),
        }
    }

    /// The `zone` attribute, or the provider default.
    pub fn zone(&self, data: &ResourceData) -> Result<Zone, ProviderError> {
        match data.get_str("zone") {
            Some(zone) => zone.parse(),
            None => Ok(self.client.default_zone.clone()),
        }
    }

    /// The `project_id` attribute, or the provider default.
    pub fn project_id(&self, data: &ResourceData) -> Option<String> {
        data.get_str("project_id")
            .map(str::to_string)
            .or_else(|| self.client.default_project_id.clone())
    }

    /// The `organization_id` attribute, or the provider default.
    pub fn organization_id(&self, data: &ResourceData) -> Option<String> {
        data.get_str("organization_id")
            .map(str::to_string)
            .or_else(|| self.client.default_organization_id.clone())
    }
}

/// One resource type: its schema and its four lifecycle steps.
///
/// A step that finds the remote object gone calls
/// [`ResourceData::clear_id`] instead of failing.
#[async_trait::async_trait]
pub trait Resource: Send + Sync {
    /// Type name, e.g. `scaleway_k8s_pool`.
    fn type_name(&self) -> &'static str;

    /// Configuration and state surface.
    fn schema(&self) -> Schema;

    /// Step deadlines and polling interval.
    fn timeouts(&self) -> ResourceTimeouts {
        ResourceTimeouts::default()
    }

    /// Adjust a planned state before it is diffed against the prior one.
    fn customize_plan(
        &self,
        prior: Option<&Value>,
        config: &Value,
        planned: &mut Map<String, Value>,
    ) -> Result<(), ProviderError> {
        let _ = (prior, config, planned);
        Ok(())
    }

    /// Rewrite a state written by schema `version` into the current layout.
    fn upgrade_state(&self, version: u64, state: Value) -> Result<Value, ProviderError> {
        let _ = version;
        Ok(state)
    }

    /// Create the remote object and fill `data` with its state.
    async fn create(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError>;

    /// Refresh `data` from the remote object.
    async fn read(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError>;

    /// Apply the planned changes carried by `data`.
    async fn update(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError>;

    /// Delete the remote object.
    async fn delete(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError>;
}

/// Every resource the provider serves.
pub fn all() -> Vec<Arc<dyn Resource>> {
    vec![
        Arc::new(document_db_read_replica::DocumentDbReadReplica),
        Arc::new(domain_external::DomainExternal),
        Arc::new(iam_application::IamApplication),
        Arc::new(iam_group::IamGroup),
        Arc::new(iam_ssh_key::IamSshKey),
        Arc::new(k8s_pool::K8sPool),
        Arc::new(lb_backend::LbBackend),
    ]
}
