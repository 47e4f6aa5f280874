//! Kubernetes (`k8s/v1`): clusters, pools and nodes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::ScalewayClient;
use crate::error::ProviderError;
use crate::locality::{Region, Zone};
use crate::wait::{wait_until, WaitOptions};

wire_enum!(
    /// Lifecycle status of a cluster.
    ClusterStatus {
        Creating => "creating",
        Ready => "ready",
        Deleting => "deleting",
        Deleted => "deleted",
        Updating => "updating",
        Locked => "locked",
        PoolRequired => "pool_required",
    }
);

impl ClusterStatus {
    /// Whether the cluster stopped moving.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Ready | Self::PoolRequired | Self::Locked | Self::Deleted
        )
    }
}

wire_enum!(
    /// Lifecycle status of a pool.
    PoolStatus {
        Ready => "ready",
        Deleting => "deleting",
        Deleted => "deleted",
        Scaling => "scaling",
        Warning => "warning",
        Locked => "locked",
        Upgrading => "upgrading",
    }
);

impl PoolStatus {
    /// Whether the pool stopped moving.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Warning | Self::Locked | Self::Deleted)
    }
}

wire_enum!(
    /// Lifecycle status of a node.
    NodeStatus {
        Creating => "creating",
        NotReady => "not_ready",
        Ready => "ready",
        Deleting => "deleting",
        Deleted => "deleted",
        Locked => "locked",
        Rebooting => "rebooting",
        CreationError => "creation_error",
        Upgrading => "upgrading",
        Starting => "starting",
        Registering => "registering",
    }
);

wire_enum!(
    /// Container runtime of the nodes.
    Runtime {
        Docker => "docker",
        Containerd => "containerd",
        Crio => "crio",
    }
);

wire_enum!(
    /// System volume type of the nodes.
    PoolVolumeType {
        DefaultVolumeType => "default_volume_type",
        LSsd => "l_ssd",
        BSsd => "b_ssd",
    }
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub status: ClusterStatus,
    pub region: Region,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolUpgradePolicy {
    #[serde(default)]
    pub max_unavailable: u32,
    #[serde(default)]
    pub max_surge: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub id: String,
    pub cluster_id: String,
    pub name: String,
    pub status: PoolStatus,
    #[serde(default)]
    pub version: String,
    pub node_type: String,
    #[serde(default)]
    pub autoscaling: bool,
    #[serde(default)]
    pub autohealing: bool,
    pub size: u32,
    #[serde(default)]
    pub min_size: u32,
    #[serde(default)]
    pub max_size: u32,
    #[serde(default)]
    pub container_runtime: Option<Runtime>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub placement_group_id: Option<String>,
    #[serde(default)]
    pub kubelet_args: HashMap<String, String>,
    #[serde(default)]
    pub upgrade_policy: Option<PoolUpgradePolicy>,
    pub zone: Zone,
    #[serde(default)]
    pub root_volume_type: Option<PoolVolumeType>,
    /// Bytes.
    #[serde(default)]
    pub root_volume_size: Option<u64>,
    #[serde(default)]
    pub public_ip_disabled: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    pub region: Region,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub pool_id: String,
    pub name: String,
    pub status: NodeStatus,
    #[serde(default)]
    pub public_ip_v4: Option<String>,
    #[serde(default)]
    pub public_ip_v6: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListNodesResponse {
    #[serde(default)]
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpgradePolicyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_unavailable: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_surge: Option<u32>,
}

impl UpgradePolicyRequest {
    fn is_empty(&self) -> bool {
        self.max_unavailable.is_none() && self.max_surge.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatePoolRequest {
    pub name: String,
    pub node_type: String,
    pub autoscaling: bool,
    pub autohealing: bool,
    pub size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_runtime: Option<Runtime>,
    pub tags: Vec<String>,
    pub kubelet_args: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement_group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_policy: Option<UpgradePolicyRequest>,
    pub zone: Zone,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_volume_type: Option<PoolVolumeType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_volume_size: Option<u64>,
    pub public_ip_disabled: bool,
}

/// Only the fields that changed are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdatePoolRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autohealing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubelet_args: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "UpgradePolicyRequest::is_empty")]
    pub upgrade_policy: UpgradePolicyRequest,
}

fn base(region: &Region) -> String {
    format!("/k8s/v1/regions/{}", region)
}

pub async fn get_cluster(
    client: &ScalewayClient,
    region: &Region,
    id: &str,
) -> Result<Cluster, ProviderError> {
    client
        .get(&format!("{}/clusters/{}", base(region), id))
        .await
}

pub async fn create_pool(
    client: &ScalewayClient,
    region: &Region,
    cluster_id: &str,
    request: &CreatePoolRequest,
) -> Result<Pool, ProviderError> {
    client
        .post(&format!("{}/clusters/{}/pools", base(region), cluster_id), request)
        .await
        .map_err(|e| e.context("failed to create pool"))
}

pub async fn get_pool(client: &ScalewayClient, region: &Region, id: &str) -> Result<Pool, ProviderError> {
    client.get(&format!("{}/pools/{}", base(region), id)).await
}

pub async fn update_pool(
    client: &ScalewayClient,
    region: &Region,
    id: &str,
    request: &UpdatePoolRequest,
) -> Result<Pool, ProviderError> {
    client
        .patch(&format!("{}/pools/{}", base(region), id), request)
        .await
        .map_err(|e| e.context("failed to update pool"))
}

pub async fn delete_pool(client: &ScalewayClient, region: &Region, id: &str) -> Result<(), ProviderError> {
    client.delete(&format!("{}/pools/{}", base(region), id)).await
}

/// Nodes of one pool.
pub async fn list_pool_nodes(
    client: &ScalewayClient,
    region: &Region,
    cluster_id: &str,
    pool_id: &str,
) -> Result<Vec<Node>, ProviderError> {
    let resp: ListNodesResponse = client
        .get_with_query(
            &format!("{}/clusters/{}/nodes", base(region), cluster_id),
            &[("pool_id", pool_id.to_string())],
        )
        .await?;
    Ok(resp.nodes)
}

/// Poll a cluster until its status is terminal.
pub async fn wait_for_cluster(
    client: &ScalewayClient,
    region: &Region,
    id: &str,
    opts: &WaitOptions,
) -> Result<Cluster, ProviderError> {
    wait_until(
        &format!("cluster {}", id),
        opts,
        || get_cluster(client, region, id),
        |c| c.status.is_terminal(),
    )
    .await
}

/// Poll a pool until its status is terminal.
pub async fn wait_for_pool(
    client: &ScalewayClient,
    region: &Region,
    id: &str,
    opts: &WaitOptions,
) -> Result<Pool, ProviderError> {
    wait_until(
        &format!("pool {}", id),
        opts,
        || get_pool(client, region, id),
        |p| p.status.is_terminal(),
    )
    .await
}

/// Poll a pool until it and every one of its nodes are ready.
///
/// Fails as soon as the pool settles in another terminal status or a node
/// reports a creation error.
pub async fn wait_for_pool_ready(
    client: &ScalewayClient,
    region: &Region,
    id: &str,
    opts: &WaitOptions,
) -> Result<(Pool, Vec<Node>), ProviderError> {
    wait_until(
        &format!("pool {} and its nodes", id),
        opts,
        || async {
            let pool = get_pool(client, region, id).await?;
            if pool.status.is_terminal() && pool.status != PoolStatus::Ready {
                return Err(ProviderError::FailedPrecondition(format!(
                    "pool {} is {} instead of ready",
                    id, pool.status
                )));
            }
            let nodes = list_pool_nodes(client, region, &pool.cluster_id, id).await?;
            if let Some(node) = nodes.iter().find(|n| n.status == NodeStatus::CreationError) {
                return Err(ProviderError::FailedPrecondition(format!(
                    "node {} failed to be created: {}",
                    node.name,
                    node.error_message.as_deref().unwrap_or("unknown error")
                )));
            }
            Ok((pool, nodes))
        },
        |(pool, nodes)| {
            pool.status == PoolStatus::Ready && nodes.iter().all(|n| n.status == NodeStatus::Ready)
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_request_sends_only_changes() {
        let req = UpdatePoolRequest {
            size: Some(4),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&req).unwrap(), json!({"size": 4}));

        let req = UpdatePoolRequest {
            upgrade_policy: UpgradePolicyRequest {
                max_surge: Some(2),
                max_unavailable: None,
            },
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"upgrade_policy": {"max_surge": 2}})
        );
    }

    #[test]
    fn test_status_terminality() {
        assert!(ClusterStatus::PoolRequired.is_terminal());
        assert!(!ClusterStatus::Creating.is_terminal());
        assert!(PoolStatus::Warning.is_terminal());
        assert!(!PoolStatus::Scaling.is_terminal());
    }

    #[test]
    fn test_pool_decodes() {
        let pool: Pool = serde_json::from_value(json!({
            "id": "p", "cluster_id": "c", "name": "n", "status": "ready",
            "node_type": "DEV1_M", "size": 2, "zone": "fr-par-1", "region": "fr-par",
            "container_runtime": "containerd", "root_volume_type": "b_ssd",
            "root_volume_size": 20000000000u64,
            "upgrade_policy": {"max_unavailable": 1, "max_surge": 0}
        }))
        .unwrap();
        assert_eq!(pool.container_runtime, Some(Runtime::Containerd));
        assert_eq!(pool.root_volume_size, Some(20_000_000_000));
        assert!(pool.kubelet_args.is_empty());
    }
}
