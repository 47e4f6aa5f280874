//! Load balancers (`lb/v1`, zoned): load balancers and their backends.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{wire_duration, ScalewayClient};
use crate::error::ProviderError;
use crate::locality::Zone;
use crate::wait::{wait_until, WaitOptions};

wire_enum!(
    /// Lifecycle status of a load balancer.
    LbStatus {
        Ready => "ready",
        Pending => "pending",
        Stopped => "stopped",
        Error => "error",
        Locked => "locked",
        Migrating => "migrating",
        ToCreate => "to_create",
        Creating => "creating",
        ToDelete => "to_delete",
        Deleting => "deleting",
    }
);

impl LbStatus {
    /// Whether the load balancer stopped moving.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Stopped | Self::Error | Self::Locked)
    }
}

wire_enum!(
    /// Protocol used between the load balancer and the backend servers.
    Protocol {
        Tcp => "tcp",
        Http => "http",
    }
);

wire_enum!(
    /// How connections are spread over backend servers.
    ForwardPortAlgorithm {
        Roundrobin => "roundrobin",
        Leastconn => "leastconn",
        First => "first",
    }
);

wire_enum!(
    /// Session stickiness.
    StickySessionsType {
        None => "none",
        Cookie => "cookie",
        Table => "table",
    }
);

wire_enum!(
    /// PROXY protocol sent to backend servers.
    ProxyProtocol {
        None => "proxy_protocol_none",
        V1 => "proxy_protocol_v1",
        V2 => "proxy_protocol_v2",
        V2Ssl => "proxy_protocol_v2_ssl",
        V2SslCn => "proxy_protocol_v2_ssl_cn",
    }
);

wire_enum!(
    /// What happens to sessions when a server is marked down.
    OnMarkedDownAction {
        None => "on_marked_down_action_none",
        ShutdownSessions => "shutdown_sessions",
    }
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lb {
    pub id: String,
    pub status: LbStatus,
    pub zone: Zone,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckTcpConfig {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckHttpConfig {
    pub uri: String,
    pub method: String,
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub host_header: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckHttpsConfig {
    pub uri: String,
    pub method: String,
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub host_header: String,
    #[serde(default)]
    pub sni: String,
}

/// Health check settings, as read from a backend and as sent on update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub port: i32,
    #[serde(with = "wire_duration", default, skip_serializing_if = "Option::is_none")]
    pub check_delay: Option<Duration>,
    #[serde(with = "wire_duration", default, skip_serializing_if = "Option::is_none")]
    pub check_timeout: Option<Duration>,
    pub check_max_retries: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_config: Option<HealthCheckTcpConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_config: Option<HealthCheckHttpConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_config: Option<HealthCheckHttpsConfig>,
    #[serde(default)]
    pub check_send_proxy: bool,
    #[serde(with = "wire_duration", default, skip_serializing_if = "Option::is_none")]
    pub transient_check_delay: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backend {
    pub id: String,
    pub name: String,
    pub forward_protocol: Protocol,
    pub forward_port: i32,
    pub forward_port_algorithm: ForwardPortAlgorithm,
    pub sticky_sessions: StickySessionsType,
    #[serde(default)]
    pub sticky_sessions_cookie_name: String,
    pub health_check: HealthCheck,
    #[serde(default)]
    pub pool: Vec<String>,
    pub lb: Lb,
    #[serde(default)]
    pub send_proxy_v2: Option<bool>,
    #[serde(with = "wire_duration", default)]
    pub timeout_server: Option<Duration>,
    #[serde(with = "wire_duration", default)]
    pub timeout_connect: Option<Duration>,
    #[serde(with = "wire_duration", default)]
    pub timeout_tunnel: Option<Duration>,
    pub on_marked_down_action: OnMarkedDownAction,
    pub proxy_protocol: ProxyProtocol,
    #[serde(default)]
    pub failover_host: Option<String>,
    #[serde(default)]
    pub ssl_bridging: Option<bool>,
    #[serde(default)]
    pub ignore_ssl_server_verify: Option<bool>,
    #[serde(default)]
    pub redispatch_attempt_count: Option<i32>,
    #[serde(default)]
    pub max_retries: Option<i32>,
    #[serde(default)]
    pub max_connections: Option<i32>,
    #[serde(with = "wire_duration", default)]
    pub timeout_queue: Option<Duration>,
}

/// Settings shared by backend creation and update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendSettings {
    pub name: String,
    pub forward_protocol: Protocol,
    pub forward_port: i32,
    pub forward_port_algorithm: ForwardPortAlgorithm,
    pub sticky_sessions: StickySessionsType,
    pub sticky_sessions_cookie_name: String,
    pub proxy_protocol: ProxyProtocol,
    #[serde(with = "wire_duration", skip_serializing_if = "Option::is_none")]
    pub timeout_server: Option<Duration>,
    #[serde(with = "wire_duration", skip_serializing_if = "Option::is_none")]
    pub timeout_connect: Option<Duration>,
    #[serde(with = "wire_duration", skip_serializing_if = "Option::is_none")]
    pub timeout_tunnel: Option<Duration>,
    pub on_marked_down_action: OnMarkedDownAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failover_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_bridging: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_ssl_server_verify: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<i32>,
    #[serde(with = "wire_duration", skip_serializing_if = "Option::is_none")]
    pub timeout_queue: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redispatch_attempt_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_proxy_v2: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateBackendRequest {
    #[serde(flatten)]
    pub settings: BackendSettings,
    pub health_check: HealthCheck,
    pub server_ip: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetBackendServersRequest {
    pub server_ip: Vec<String>,
}

fn base(zone: &Zone) -> String {
    format!("/lb/v1/zones/{}", zone)
}

pub async fn get_lb(client: &ScalewayClient, zone: &Zone, id: &str) -> Result<Lb, ProviderError> {
    client.get(&format!("{}/lbs/{}", base(zone), id)).await
}

pub async fn create_backend(
    client: &ScalewayClient,
    zone: &Zone,
    lb_id: &str,
    request: &CreateBackendRequest,
) -> Result<Backend, ProviderError> {
    client
        .post(&format!("{}/lbs/{}/backends", base(zone), lb_id), request)
        .await
        .map_err(|e| e.context("failed to create backend"))
}

pub async fn get_backend(client: &ScalewayClient, zone: &Zone, id: &str) -> Result<Backend, ProviderError> {
    client.get(&format!("{}/backends/{}", base(zone), id)).await
}

pub async fn update_backend(
    client: &ScalewayClient,
    zone: &Zone,
    id: &str,
    request: &BackendSettings,
) -> Result<Backend, ProviderError> {
    client
        .put(&format!("{}/backends/{}", base(zone), id), request)
        .await
        .map_err(|e| e.context("failed to update backend"))
}

pub async fn update_health_check(
    client: &ScalewayClient,
    zone: &Zone,
    backend_id: &str,
    request: &HealthCheck,
) -> Result<HealthCheck, ProviderError> {
    client
        .put(&format!("{}/backends/{}/healthcheck", base(zone), backend_id), request)
        .await
        .map_err(|e| e.context("failed to update health check"))
}

pub async fn set_backend_servers(
    client: &ScalewayClient,
    zone: &Zone,
    backend_id: &str,
    request: &SetBackendServersRequest,
) -> Result<Backend, ProviderError> {
    client
        .put(&format!("{}/backends/{}/servers", base(zone), backend_id), request)
        .await
        .map_err(|e| e.context("failed to set backend servers"))
}

pub async fn delete_backend(client: &ScalewayClient, zone: &Zone, id: &str) -> Result<(), ProviderError> {
    client.delete(&format!("{}/backends/{}", base(zone), id)).await
}

/// Poll a load balancer until its status is terminal.
pub async fn wait_for_lb(
    client: &ScalewayClient,
    zone: &Zone,
    id: &str,
    opts: &WaitOptions,
) -> Result<Lb, ProviderError> {
    wait_until(
        &format!("load balancer {}", id),
        opts,
        || get_lb(client, zone, id),
        |lb| lb.status.is_terminal(),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_health_check_wire_format() {
        let hc = HealthCheck {
            port: 80,
            check_delay: Some(Duration::from_secs(60)),
            check_timeout: Some(Duration::from_secs(30)),
            check_max_retries: 2,
            tcp_config: Some(HealthCheckTcpConfig {}),
            http_config: None,
            https_config: None,
            check_send_proxy: false,
            transient_check_delay: Some(Duration::from_millis(500)),
        };
        assert_eq!(
            serde_json::to_value(&hc).unwrap(),
            json!({
                "port": 80,
                "check_delay": "60s",
                "check_timeout": "30s",
                "check_max_retries": 2,
                "tcp_config": {},
                "check_send_proxy": false,
                "transient_check_delay": "0.5s"
            })
        );
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_value(ProxyProtocol::V2SslCn).unwrap(),
            json!("proxy_protocol_v2_ssl_cn")
        );
        assert_eq!(
            serde_json::to_value(OnMarkedDownAction::None).unwrap(),
            json!("on_marked_down_action_none")
        );
        assert!(LbStatus::Stopped.is_terminal());
        assert!(!LbStatus::Pending.is_terminal());
    }
}
