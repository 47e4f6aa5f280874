//! `scaleway_documentdb_read_replica`: a read replica of a document database
//! instance, reachable through a public endpoint, a private network endpoint
//! or both.

use std::time::Duration;

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::{singleton, Resource, ResourceContext, ResourceData, ResourceTimeouts};
use crate::api::documentdb::{
    self, CreateReadReplicaEndpointRequest, CreateReadReplicaRequest, Endpoint, EndpointSpecDirectAccess,
    EndpointSpecPrivateNetwork, IpamConfig, ReadReplicaEndpointSpec,
};
use crate::error::ProviderError;
use crate::expand::expand_ip_net;
use crate::flatten::{flatten_singleton, flatten_string_opt};
use crate::locality::{expand_id, parse_regional_id, regional_id, Region};
use crate::schema::{Attribute, Block, DiffSuppress, NestedBlock, Schema, Validator};
use crate::wait::allow_not_found;

const TYPE_NAME: &str = "scaleway_documentdb_read_replica";

/// Read replica resource.
pub struct DocumentDbReadReplica;

fn endpoint_attributes(block: Block) -> Block {
    block
        .with_attribute(
            "endpoint_id",
            Attribute::computed_string().with_description("UUID of the endpoint"),
        )
        .with_attribute(
            "ip",
            Attribute::computed_string().with_description("IPv4 address of the endpoint"),
        )
        .with_attribute(
            "port",
            Attribute::computed_int64().with_description("TCP port of the endpoint"),
        )
        .with_attribute("name", Attribute::computed_string().with_description("Name of the endpoint"))
        .with_attribute(
            "hostname",
            Attribute::computed_string().with_description("Hostname of the endpoint"),
        )
}

/// A public endpoint spec when the block is present.
fn expand_direct_access(block: Option<&Map<String, Value>>) -> Option<ReadReplicaEndpointSpec> {
    block.map(|_| ReadReplicaEndpointSpec {
        direct_access: Some(EndpointSpecDirectAccess {}),
        private_network: None,
    })
}

/// A private network endpoint spec when the block is present.
///
/// An explicit `service_ip` selects a fixed address; without one IPAM picks it.
fn expand_private_network(
    block: Option<&Map<String, Value>>,
) -> Result<Option<ReadReplicaEndpointSpec>, ProviderError> {
    let Some(block) = block else {
        return Ok(None);
    };
    let private_network_id = block
        .get("private_network_id")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::Validation("private_network.0.private_network_id is required".to_string()))?;
    let service_ip = expand_ip_net(block.get("service_ip").and_then(Value::as_str)).map_err(|e| {
        ProviderError::Validation(format!("failed to parse private_network service_ip: {}", e.message()))
    })?;

    let ipam_config = match service_ip {
        Some(_) => None,
        None => Some(IpamConfig {}),
    };
    Ok(Some(ReadReplicaEndpointSpec {
        direct_access: None,
        private_network: Some(EndpointSpecPrivateNetwork {
            private_network_id: expand_id(private_network_id).to_string(),
            service_ip,
            ipam_config,
        }),
    }))
}

/// Split endpoints into the `direct_access` and `private_network` blocks.
fn flatten_endpoints(endpoints: &[Endpoint]) -> (Value, Value) {
    let mut direct_access = None;
    let mut private_network = None;

    for endpoint in endpoints {
        let mut raw = json!({
            "endpoint_id": endpoint.id,
            "ip": flatten_string_opt(endpoint.ip.as_deref()),
            "port": endpoint.port,
            "name": flatten_string_opt(endpoint.name.as_deref()),
            "hostname": flatten_string_opt(endpoint.hostname.as_deref()),
        });
        if endpoint.direct_access.is_some() {
            direct_access = Some(raw.clone());
        }
        if let Some(pn) = &endpoint.private_network {
            raw["private_network_id"] = json!(regional_id(&pn.zone.region(), &pn.private_network_id));
            raw["service_ip"] = json!(pn.service_ip.to_string());
            raw["zone"] = json!(pn.zone);
            private_network = Some(raw);
        }
    }

    (flatten_singleton(direct_access), flatten_singleton(private_network))
}

fn ids(data: &ResourceData) -> Result<(Region, String), ProviderError> {
    parse_regional_id(data.require_id()?)
}

#[async_trait::async_trait]
impl Resource for DocumentDbReadReplica {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "instance_id",
                Attribute::required_string()
                    .with_description("Id of the database instance to replicate")
                    .with_validator(Validator::UuidOrLocalized)
                    .with_diff_suppress(DiffSuppress::Locality),
            )
            .with_attribute(
                "region",
                Attribute::optional_computed_string()
                    .with_description("The region of the read replica")
                    .with_force_new(),
            )
            .with_block(
                "direct_access",
                NestedBlock::singleton_list(
                    endpoint_attributes(Block::new())
                        .with_description("Direct access endpoint: an IP and a port reaching the replica"),
                ),
            )
            .with_block(
                "private_network",
                NestedBlock::singleton_list(
                    endpoint_attributes(Block::new())
                        .with_attribute(
                            "private_network_id",
                            Attribute::required_string()
                                .with_description("UUID of the private network the replica is attached to")
                                .with_validator(Validator::UuidOrLocalized)
                                .with_diff_suppress(DiffSuppress::Locality),
                        )
                        .with_attribute(
                            "service_ip",
                            Attribute::optional_computed_string()
                                .with_description("The IP network address within the private subnet")
                                .with_validator(Validator::Cidr),
                        )
                        .with_attribute(
                            "zone",
                            Attribute::computed_string().with_description("Private network zone"),
                        )
                        .with_description("Private network endpoint"),
                ),
            )
    }

    fn timeouts(&self) -> ResourceTimeouts {
        ResourceTimeouts::uniform(Duration::from_secs(15 * 60), Duration::from_secs(30))
    }

    async fn create(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        let region = ctx.region(data)?;

        let mut endpoint_spec = Vec::new();
        endpoint_spec.extend(expand_direct_access(data.get_block("direct_access")));
        endpoint_spec.extend(expand_private_network(data.get_block("private_network"))?);

        let request = CreateReadReplicaRequest {
            instance_id: expand_id(data.require_str("instance_id")?).to_string(),
            endpoint_spec,
        };
        let replica = documentdb::create_read_replica(&ctx.client, &region, &request).await?;
        data.set_id(regional_id(&region, &replica.id));
        info!(resource_type = TYPE_NAME, id = %replica.id, "read replica created");

        documentdb::wait_for_read_replica(
            &ctx.client,
            &region,
            &replica.id,
            &ctx.wait_options(ctx.timeouts.create),
        )
        .await?;

        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        let (region, id) = ids(data)?;

        let replica = match documentdb::wait_for_read_replica(
            &ctx.client,
            &region,
            &id,
            &ctx.wait_options(ctx.timeouts.read),
        )
        .await
        {
            Ok(replica) => replica,
            Err(e) if e.is_not_found() => {
                debug!(resource_type = TYPE_NAME, %id, "read replica gone, clearing state");
                data.clear_id();
                return Ok(());
            },
            Err(e) => return Err(e),
        };

        let (direct_access, private_network) = flatten_endpoints(&replica.endpoints);
        data.set("direct_access", direct_access);
        data.set("private_network", private_network);
        data.set("region", json!(region));
        Ok(())
    }

    async fn update(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        let (region, id) = ids(data)?;
        let opts = ctx.wait_options(ctx.timeouts.update);

        match documentdb::wait_for_read_replica(&ctx.client, &region, &id, &opts).await {
            Ok(_) => {},
            Err(e) if e.is_not_found() => {
                data.clear_id();
                return Ok(());
            },
            Err(e) => return Err(e),
        }

        let mut new_endpoints = Vec::new();
        for block in ["direct_access", "private_network"] {
            if !data.has_change(block) {
                continue;
            }
            match data.get_block(block) {
                None => {
                    let (old, _) = data.get_change(block);
                    if let Some(endpoint_id) = singleton(old)
                        .and_then(|b| b.get("endpoint_id"))
                        .and_then(Value::as_str)
                    {
                        debug!(resource_type = TYPE_NAME, %id, endpoint_id, block, "deleting endpoint");
                        let endpoint_id = expand_id(endpoint_id);
                        allow_not_found(documentdb::delete_endpoint(&ctx.client, &region, endpoint_id).await)?;
                    }
                },
                Some(spec) if block == "direct_access" => {
                    new_endpoints.extend(expand_direct_access(Some(spec)));
                },
                Some(spec) => {
                    new_endpoints.extend(expand_private_network(Some(spec))?);
                },
            }
        }

        if !new_endpoints.is_empty() {
            let request = CreateReadReplicaEndpointRequest {
                endpoint_spec: new_endpoints,
            };
            let settled = documentdb::wait_for_read_replica(&ctx.client, &region, &id, &opts).await;
            let created = match allow_not_found(settled)? {
                Some(_) => allow_not_found(
                    documentdb::create_read_replica_endpoint(&ctx.client, &region, &id, &request).await,
                )?,
                None => None,
            };
            if created.is_none() {
                debug!(resource_type = TYPE_NAME, %id, "read replica gone during update, clearing state");
                data.clear_id();
                return Ok(());
            }
        }

        if allow_not_found(documentdb::wait_for_read_replica(&ctx.client, &region, &id, &opts).await)?.is_none() {
            data.clear_id();
            return Ok(());
        }
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        let (region, id) = ids(data)?;
        let opts = ctx.wait_options(ctx.timeouts.delete);

        if allow_not_found(documentdb::wait_for_read_replica(&ctx.client, &region, &id, &opts).await)?.is_none() {
            return Ok(());
        }
        allow_not_found(documentdb::delete_read_replica(&ctx.client, &region, &id).await)?;
        allow_not_found(documentdb::wait_for_read_replica(&ctx.client, &region, &id, &opts).await)?;
        info!(resource_type = TYPE_NAME, %id, "read replica deleted");
        Ok(())
    }
}
