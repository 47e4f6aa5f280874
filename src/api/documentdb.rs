//! Document database (`document-db/v1beta1`): read replicas and their endpoints.

use serde::{Deserialize, Serialize};

use super::ScalewayClient;
use crate::error::ProviderError;
use crate::expand::IpNet;
use crate::locality::{Region, Zone};
use crate::wait::{wait_until, WaitOptions};

wire_enum!(
    /// Lifecycle status of a read replica.
    ReadReplicaStatus {
        Provisioning => "provisioning",
        Initializing => "initializing",
        Ready => "ready",
        Deleting => "deleting",
        Error => "error",
        Locked => "locked",
        Configuring => "configuring",
        Promoting => "promoting",
    }
);

impl ReadReplicaStatus {
    /// Whether the replica stopped moving.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Error | Self::Locked)
    }
}

/// A read replica of a database instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadReplica {
    pub id: String,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    pub status: ReadReplicaStatus,
    pub region: Region,
}

/// A network endpoint of a read replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: String,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub port: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub private_network: Option<EndpointPrivateNetworkDetails>,
    #[serde(default)]
    pub direct_access: Option<EndpointDirectAccessDetails>,
}

/// Private network attachment of an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointPrivateNetworkDetails {
    pub private_network_id: String,
    pub service_ip: IpNet,
    pub zone: Zone,
}

/// Marker for a public endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDirectAccessDetails {}

/// Endpoint requested for a read replica.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadReplicaEndpointSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direct_access: Option<EndpointSpecDirectAccess>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_network: Option<EndpointSpecPrivateNetwork>,
}

/// Public endpoint spec (no settings).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSpecDirectAccess {}

/// Private network endpoint spec.
///
/// Exactly one of `service_ip` and `ipam_config` is sent: an explicit address,
/// or one allocated by IPAM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSpecPrivateNetwork {
    pub private_network_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_ip: Option<IpNet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipam_config: Option<IpamConfig>,
}

/// Ask IPAM to allocate the endpoint address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpamConfig {}

#[derive(Debug, Clone, Serialize)]
pub struct CreateReadReplicaRequest {
    pub instance_id: String,
    pub endpoint_spec: Vec<ReadReplicaEndpointSpec>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateReadReplicaEndpointRequest {
    pub endpoint_spec: Vec<ReadReplicaEndpointSpec>,
}

fn base(region: &Region) -> String {
    format!("/document-db/v1beta1/regions/{}", region)
}

pub async fn create_read_replica(
    client: &ScalewayClient,
    region: &Region,
    request: &CreateReadReplicaRequest,
) -> Result<ReadReplica, ProviderError> {
    client
        .post(&format!("{}/read-replicas", base(region)), request)
        .await
        .map_err(|e| e.context("failed to create read-replica"))
}

pub async fn get_read_replica(
    client: &ScalewayClient,
    region: &Region,
    id: &str,
) -> Result<ReadReplica, ProviderError> {
    client
        .get(&format!("{}/read-replicas/{}", base(region), id))
        .await
}

pub async fn delete_read_replica(
    client: &ScalewayClient,
    region: &Region,
    id: &str,
) -> Result<(), ProviderError> {
    client
        .delete(&format!("{}/read-replicas/{}", base(region), id))
        .await
}

pub async fn create_read_replica_endpoint(
    client: &ScalewayClient,
    region: &Region,
    id: &str,
    request: &CreateReadReplicaEndpointRequest,
) -> Result<ReadReplica, ProviderError> {
    client
        .post(&format!("{}/read-replicas/{}/endpoints", base(region), id), request)
        .await
        .map_err(|e| e.context("failed to create read-replica endpoint"))
}

pub async fn delete_endpoint(
    client: &ScalewayClient,
    region: &Region,
    endpoint_id: &str,
) -> Result<(), ProviderError> {
    client
        .delete(&format!("{}/endpoints/{}", base(region), endpoint_id))
        .await
        .map_err(|e| e.context("failed to delete read-replica endpoint"))
}

/// Poll a read replica until its status is terminal.
pub async fn wait_for_read_replica(
    client: &ScalewayClient,
    region: &Region,
    id: &str,
    opts: &WaitOptions,
) -> Result<ReadReplica, ProviderError> {
    wait_until(
        &format!("read-replica {}", id),
        opts,
        || get_read_replica(client, region, id),
        |rr| rr.status.is_terminal(),
    )
    .await
}
