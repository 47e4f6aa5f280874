//! Scaleway Provider
//!
//! Manages Scaleway resources (DocumentDB read replicas, external domains, IAM
//! applications, groups and SSH keys, Kubernetes pools, load balancer backends)
//! for an infrastructure-as-code host that plans and applies changes.
//!
//! # Overview
//!
//! The crate provides:
//!
//! - **Schema types**: attribute and block declarations with validators, diff
//!   suppressors, conflicts and schema versions
//! - **Validation and planning**: configuration checks and a generic planner that
//!   fills defaults, keeps computed values and detects replacements
//! - **ProviderService trait**: the lifecycle entry points a host drives, and
//!   [`ScalewayProvider`] implementing them
//! - **Resources**: one module per resource type, each mapping its attributes to
//!   the Scaleway REST API and waiting for the object to settle
//! - **Error types**: [`ProviderError`] with HTTP status classification
//! - **Logging**: integration with `tracing`, written to stderr
//!
//! # Quick Start
//!
//! ```ignore
//! use scaleway_provider::{init_logging, ProviderService, ScalewayProvider};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!
//!     let provider = ScalewayProvider::new();
//!     // falls back to SCW_SECRET_KEY, SCW_DEFAULT_REGION, ...
//!     provider.configure(json!({})).await?;
//!
//!     let config = json!({"name": "ci-runner"});
//!     let plan = provider.plan("scaleway_iam_application", None, config).await?;
//!     let state = provider
//!         .create("scaleway_iam_application", plan.planned_state)
//!         .await?;
//!     println!("{:?}", state);
//!     Ok(())
//! }
//! ```
//!
//! # Lifecycle
//!
//! - **Configure**: credentials and defaults, with `SCW_*` environment fallbacks
//! - **ValidateResourceConfig**: checks a configuration against the resource schema
//! - **UpgradeResourceState**: migrates state written by an older schema version
//! - **Plan**: computes the planned state and whether it forces a replacement
//! - **Create/Read/Update/Delete**: expand, invoke, wait, flatten
//! - **ImportResource**: reads an existing object by identifier
//! - **Stop**: aborts in-flight waits

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod error;
pub mod expand;
pub mod flatten;
pub mod locality;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod testing;
pub mod types;
pub mod validation;
pub mod wait;

// Re-export main types at crate root
pub use api::ScalewayClient;
pub use config::ProviderConfig;
pub use error::ProviderError;
pub use locality::{Region, Zone};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{ProviderService, ScalewayProvider};
pub use resources::{Resource, ResourceContext, ResourceData};
pub use schema::ProviderSchema;
pub use types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
