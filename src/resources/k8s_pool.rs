//! `scaleway_k8s_pool`: a group of identical worker nodes in a Kubernetes
//! cluster.
//!
//! The identifier is regional (`fr-par/{pool}`). Creating the first pool of a
//! cluster is what brings the cluster to `ready`, so create waits on the cluster
//! after the pool when the cluster reported `pool_required`.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::{singleton, Resource, ResourceContext, ResourceData, ResourceTimeouts};
use crate::api::k8s::{
    self, ClusterStatus, CreatePoolRequest, Node, Pool, PoolVolumeType, Runtime, UpdatePoolRequest,
    UpgradePolicyRequest,
};
use crate::error::ProviderError;
use crate::expand::{expand_or_generate_string, expand_string_map, expand_strings};
use crate::flatten::{flatten_singleton, flatten_string_map, flatten_string_opt};
use crate::locality::{expand_id, parse_regional_id, regional_id, zoned_id, Region};
use crate::plan::equivalent;
use crate::schema::{
    Attribute, AttributeFlags, AttributeType, Block, DiffSuppress, NestedBlock, Schema, Validator,
};
use crate::wait::allow_not_found;

const TYPE_NAME: &str = "scaleway_k8s_pool";

const GB: u64 = 1_000_000_000;

/// Kubernetes pool resource.
pub struct K8sPool;

fn as_u32(value: i64, name: &str) -> Result<u32, ProviderError> {
    u32::try_from(value)
        .map_err(|_| ProviderError::Validation(format!("{} must be a non-negative 32-bit integer", name)))
}

fn block_u32(block: Option<&Map<String, Value>>, key: &str) -> Option<u32> {
    block
        .and_then(|b| b.get(key))
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
}

/// Region of the pool: the attribute, then the cluster ID prefix, then the default.
fn pool_region(ctx: &ResourceContext, data: &ResourceData) -> Result<Region, ProviderError> {
    if data.get_str("region").is_none() {
        if let Some(Ok((region, _))) = data.get_str("cluster_id").map(parse_regional_id) {
            return Ok(region);
        }
    }
    ctx.region(data)
}

fn expand_create_request(ctx: &ResourceContext, data: &ResourceData) -> Result<CreatePoolRequest, ProviderError> {
    let size = as_u32(data.get_i64("size").unwrap_or(0), "size")?;

    let min_size = match data.get_i64("min_size").filter(|v| *v != 0) {
        Some(v) => Some(as_u32(v, "min_size")?),
        None => None,
    };
    // an unset max_size pins the pool to its initial size
    let max_size = match data.get_i64("max_size").filter(|v| *v != 0) {
        Some(v) => as_u32(v, "max_size")?,
        None => size,
    };

    let container_runtime = data.get_str("container_runtime").map(str::parse::<Runtime>).transpose()?;
    let root_volume_type = data
        .get_str("root_volume_type")
        .map(str::parse::<PoolVolumeType>)
        .transpose()?;
    let root_volume_size = match data.get_i64("root_volume_size_in_gb").filter(|v| *v != 0) {
        Some(gb) => Some(u64::try_from(gb).map_err(|_| {
            ProviderError::Validation("root_volume_size_in_gb must be positive".to_string())
        })? * GB),
        None => None,
    };

    let policy = data.get_block("upgrade_policy");
    let upgrade_policy = UpgradePolicyRequest {
        max_unavailable: block_u32(policy, "max_unavailable").filter(|v| *v != 0),
        max_surge: block_u32(policy, "max_surge").filter(|v| *v != 0),
    };
    let upgrade_policy = (upgrade_policy != UpgradePolicyRequest::default()).then_some(upgrade_policy);

    Ok(CreatePoolRequest {
        name: expand_or_generate_string(data.get_str("name"), "pool"),
        node_type: data.require_str("node_type")?.to_string(),
        autoscaling: data.get_bool("autoscaling").unwrap_or(false),
        autohealing: data.get_bool("autohealing").unwrap_or(false),
        size,
        min_size,
        max_size: Some(max_size),
        container_runtime,
        tags: expand_strings(data.get("tags")),
        kubelet_args: expand_string_map(data.get("kubelet_args")),
        placement_group_id: data.get_str("placement_group_id").map(|id| expand_id(id).to_string()),
        upgrade_policy,
        zone: ctx.zone(data)?,
        root_volume_type,
        root_volume_size,
        public_ip_disabled: data.get_bool("public_ip_disabled").unwrap_or(false),
    })
}

fn expand_update_request(data: &ResourceData) -> Result<UpdatePoolRequest, ProviderError> {
    let mut request = UpdatePoolRequest::default();
    let autoscaling = data.get_bool("autoscaling").unwrap_or(false);

    if data.has_change("autoscaling") {
        request.autoscaling = Some(autoscaling);
    }
    if data.has_change("autohealing") {
        request.autohealing = Some(data.get_bool("autohealing").unwrap_or(false));
    }
    if data.has_change("min_size") {
        request.min_size = Some(as_u32(data.get_i64("min_size").unwrap_or(0), "min_size")?);
    }
    if data.has_change("max_size") {
        request.max_size = Some(as_u32(data.get_i64("max_size").unwrap_or(0), "max_size")?);
    }
    // the autoscaler owns the size
    if !autoscaling && data.has_change("size") {
        request.size = Some(as_u32(data.get_i64("size").unwrap_or(0), "size")?);
    }
    if data.has_change("tags") {
        request.tags = Some(expand_strings(data.get("tags")));
    }
    if data.has_change("kubelet_args") {
        request.kubelet_args = Some(expand_string_map(data.get("kubelet_args")));
    }

    let (old, new) = data.get_change("upgrade_policy");
    let (old, new) = (singleton(old), singleton(new));
    for (key, slot) in [
        ("max_surge", &mut request.upgrade_policy.max_surge),
        ("max_unavailable", &mut request.upgrade_policy.max_unavailable),
    ] {
        let planned = new.and_then(|b| b.get(key));
        if new.is_some() && !equivalent(old.and_then(|b| b.get(key)), planned) {
            *slot = Some(block_u32(new, key).unwrap_or(0));
        }
    }

    Ok(request)
}

fn flatten_nodes(nodes: &[Node]) -> Value {
    Value::Array(
        nodes
            .iter()
            .map(|n| {
                json!({
                    "name": n.name,
                    "status": n.status.as_str(),
                    "public_ip": flatten_string_opt(n.public_ip_v4.as_deref()),
                    "public_ip_v6": flatten_string_opt(n.public_ip_v6.as_deref()),
                })
            })
            .collect(),
    )
}

fn flatten_pool(data: &mut ResourceData, region: &Region, pool: &Pool, nodes: &[Node]) {
    data.set("cluster_id", json!(regional_id(region, &pool.cluster_id)));
    data.set("name", json!(pool.name));
    data.set("node_type", json!(pool.node_type));
    data.set("autoscaling", json!(pool.autoscaling));
    data.set("autohealing", json!(pool.autohealing));
    data.set("current_size", json!(pool.size));
    if !pool.autoscaling {
        data.set("size", json!(pool.size));
    }
    data.set("version", json!(pool.version));
    data.set("min_size", json!(pool.min_size));
    data.set("max_size", json!(pool.max_size));
    data.set("tags", json!(pool.tags));
    data.set(
        "container_runtime",
        pool.container_runtime.map_or(Value::Null, |r| json!(r.as_str())),
    );
    data.set("created_at", flatten_string_opt(pool.created_at.as_deref()));
    data.set("updated_at", flatten_string_opt(pool.updated_at.as_deref()));
    data.set("nodes", flatten_nodes(nodes));
    data.set("status", json!(pool.status.as_str()));
    data.set("kubelet_args", flatten_string_map(&pool.kubelet_args));
    data.set("zone", json!(pool.zone));
    data.set("region", json!(region));
    data.set(
        "upgrade_policy",
        flatten_singleton(pool.upgrade_policy.as_ref().map(|p| {
            json!({
                "max_unavailable": p.max_unavailable,
                "max_surge": p.max_surge,
            })
        })),
    );
    data.set("public_ip_disabled", json!(pool.public_ip_disabled));
    if let Some(pg) = &pool.placement_group_id {
        data.set("placement_group_id", json!(zoned_id(&pool.zone, pg)));
    }
}

fn upgrade_policy_block() -> Block {
    Block::new()
        .with_attribute(
            "max_unavailable",
            Attribute::optional_int64()
                .with_description("The maximum number of nodes that can be not ready at the same time")
                .with_default(json!(1)),
        )
        .with_attribute(
            "max_surge",
            Attribute::optional_int64()
                .with_description("The maximum number of nodes to be created during the upgrade")
                .with_default(json!(0)),
        )
}

fn node_type() -> AttributeType {
    AttributeType::list(AttributeType::Object(HashMap::from([
        ("name".to_string(), AttributeType::String),
        ("status".to_string(), AttributeType::String),
        ("public_ip".to_string(), AttributeType::String),
        ("public_ip_v6".to_string(), AttributeType::String),
    ])))
}

#[async_trait::async_trait]
impl Resource for K8sPool {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "cluster_id",
                Attribute::required_string()
                    .with_description("The ID of the cluster on which this pool will be created")
                    .with_force_new()
                    .with_validator(Validator::UuidOrLocalized)
                    .with_diff_suppress(DiffSuppress::Locality),
            )
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_description("The name of the pool")
                    .with_force_new(),
            )
            .with_attribute(
                "node_type",
                Attribute::required_string()
                    .with_description("Server type of the pool servers")
                    .with_force_new()
                    .with_diff_suppress(DiffSuppress::IgnoreCaseAndHyphen),
            )
            .with_attribute(
                "autoscaling",
                Attribute::optional_bool()
                    .with_description("Enable the autoscaling on the pool")
                    .with_default(json!(false)),
            )
            .with_attribute(
                "autohealing",
                Attribute::optional_bool()
                    .with_description("Enable the autohealing on the pool")
                    .with_default(json!(false)),
            )
            .with_attribute(
                "size",
                Attribute::required_int64().with_description("Size of the pool"),
            )
            .with_attribute(
                "min_size",
                Attribute::optional_int64()
                    .with_description("Minimum size of the pool")
                    .with_default(json!(1)),
            )
            .with_attribute(
                "max_size",
                Attribute::optional_computed_int64().with_description("Maximum size of the pool"),
            )
            .with_attribute(
                "tags",
                Attribute::optional_string_list().with_description("The tags associated with the pool"),
            )
            .with_attribute(
                "container_runtime",
                Attribute::optional_string()
                    .with_description("Container runtime for the pool")
                    .with_default(json!("containerd"))
                    .with_force_new()
                    .with_validator(Validator::one_of(&["docker", "containerd", "crio"])),
            )
            .with_attribute(
                "wait_for_pool_ready",
                Attribute::optional_bool()
                    .with_description("Whether to wait for the pool to be ready")
                    .with_default(json!(true)),
            )
            .with_attribute(
                "placement_group_id",
                Attribute::optional_string()
                    .with_description("ID of the placement group")
                    .with_force_new()
                    .with_diff_suppress(DiffSuppress::Locality),
            )
            .with_attribute(
                "kubelet_args",
                Attribute::optional_string_map()
                    .with_description("The Kubelet arguments to be used by this pool"),
            )
            .with_block(
                "upgrade_policy",
                NestedBlock::singleton_list(upgrade_policy_block()).with_computed(),
            )
            .with_attribute(
                "root_volume_type",
                Attribute::optional_string()
                    .with_description("System volume type of the nodes composing the pool")
                    .with_force_new()
                    .with_validator(Validator::one_of(&["b_ssd", "l_ssd"])),
            )
            .with_attribute(
                "root_volume_size_in_gb",
                Attribute::optional_int64()
                    .with_description("The size of the system volume of the nodes in gigabyte")
                    .with_force_new(),
            )
            .with_attribute(
                "public_ip_disabled",
                Attribute::optional_bool()
                    .with_description("Defines if the public IP should be removed from the nodes")
                    .with_default(json!(false))
                    .with_force_new(),
            )
            .with_attribute("zone", Attribute::optional_computed_string().with_force_new())
            .with_attribute("region", Attribute::optional_computed_string().with_force_new())
            .with_attribute("created_at", Attribute::computed_string())
            .with_attribute("updated_at", Attribute::computed_string())
            .with_attribute(
                "version",
                Attribute::computed_string().with_description("The Kubernetes version of the pool"),
            )
            .with_attribute(
                "current_size",
                Attribute::computed_int64().with_description("The actual size of the pool"),
            )
            .with_attribute("nodes", Attribute::new(node_type(), AttributeFlags::computed()))
            .with_attribute(
                "status",
                Attribute::computed_string().with_description("The status of the pool"),
            )
    }

    fn timeouts(&self) -> ResourceTimeouts {
        ResourceTimeouts::uniform(Duration::from_secs(15 * 60), Duration::from_secs(5))
    }

    fn customize_plan(
        &self,
        prior: Option<&Value>,
        _config: &Value,
        planned: &mut Map<String, Value>,
    ) -> Result<(), ProviderError> {
        // resizing replaces nodes, their list is only known after apply
        if let Some(prior) = prior {
            if !equivalent(prior.get("size"), planned.get("size")) {
                planned.remove("nodes");
            }
        }
        Ok(())
    }

    async fn create(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        let region = pool_region(ctx, data)?;
        let cluster_id = expand_id(data.require_str("cluster_id")?).to_string();
        let mut request = expand_create_request(ctx, data)?;
        if data.get_str("zone").is_none() && request.zone.region() != region {
            request.zone = region.default_zone();
        }
        let opts = ctx.wait_options(ctx.timeouts.create);

        let cluster = k8s::get_cluster(&ctx.client, &region, &cluster_id).await?;
        let wait_cluster_after = match cluster.status {
            ClusterStatus::PoolRequired => true,
            ClusterStatus::Creating => {
                debug!(resource_type = TYPE_NAME, cluster = %cluster_id, "cluster still creating, waiting");
                k8s::wait_for_cluster(&ctx.client, &region, &cluster_id, &opts).await?;
                false
            },
            _ => false,
        };

        let pool = k8s::create_pool(&ctx.client, &region, &cluster_id, &request).await?;
        info!(resource_type = TYPE_NAME, id = %pool.id, name = %pool.name, "pool created");
        data.set_id(regional_id(&region, &pool.id));

        if data.get_bool("wait_for_pool_ready").unwrap_or(true) {
            k8s::wait_for_pool_ready(&ctx.client, &region, &pool.id, &opts).await?;
        }
        if wait_cluster_after {
            k8s::wait_for_cluster(&ctx.client, &region, &cluster_id, &opts).await?;
        }

        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        let (region, pool_id) = parse_regional_id(data.require_id()?)?;

        let opts = ctx.wait_options(ctx.timeouts.read);
        let pool = match k8s::wait_for_pool(&ctx.client, &region, &pool_id, &opts).await {
            Ok(pool) => pool,
            Err(e) if e.is_not_found() => {
                debug!(resource_type = TYPE_NAME, id = %pool_id, "pool gone, clearing state");
                data.clear_id();
                return Ok(());
            },
            Err(e) => return Err(e),
        };
        let nodes = k8s::list_pool_nodes(&ctx.client, &region, &pool.cluster_id, &pool.id).await?;

        flatten_pool(data, &region, &pool, &nodes);
        Ok(())
    }

    async fn update(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        let (region, pool_id) = parse_regional_id(data.require_id()?)?;

        let request = expand_update_request(data)?;
        if request != UpdatePoolRequest::default()
            && allow_not_found(k8s::update_pool(&ctx.client, &region, &pool_id, &request).await)?.is_none()
        {
            debug!(resource_type = TYPE_NAME, id = %pool_id, "pool gone during update, clearing state");
            data.clear_id();
            return Ok(());
        }

        if data.get_bool("wait_for_pool_ready").unwrap_or(true) {
            let opts = ctx.wait_options(ctx.timeouts.update);
            if allow_not_found(k8s::wait_for_pool_ready(&ctx.client, &region, &pool_id, &opts).await)?.is_none() {
                data.clear_id();
                return Ok(());
            }
        }

        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        let (region, pool_id) = parse_regional_id(data.require_id()?)?;

        allow_not_found(k8s::delete_pool(&ctx.client, &region, &pool_id).await)?;

        let opts = ctx.wait_options(ctx.timeouts.delete);
        allow_not_found(k8s::wait_for_pool(&ctx.client, &region, &pool_id, &opts).await)?;
        Ok(())
    }
}
