//! `scaleway_lb_backend`: the set of servers a load balancer frontend forwards
//! to, with its health check.
//!
//! Backends are zoned (`fr-par-1/{backend}`). Every change goes through the
//! parent load balancer, which must be settled before and after the call. A 403
//! from the load balancer API means the load balancer is gone or no longer ours,
//! and is handled like a 404.

use std::time::Duration;

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::{Resource, ResourceContext, ResourceData, ResourceTimeouts};
use crate::api::lb::{
    self, Backend, BackendSettings, CreateBackendRequest, ForwardPortAlgorithm, HealthCheck,
    HealthCheckHttpConfig, HealthCheckHttpsConfig, HealthCheckTcpConfig, OnMarkedDownAction, Protocol,
    ProxyProtocol, SetBackendServersRequest, StickySessionsType,
};
use crate::error::ProviderError;
use crate::expand::{expand_duration, expand_or_generate_string, expand_strings};
use crate::flatten::{flatten_duration, flatten_singleton};
use crate::locality::{parse_zoned_id, regional_to_zoned_id, zoned_id, Zone};
use crate::schema::{Attribute, Block, DiffSuppress, NestedBlock, Schema, Validator};

const TYPE_NAME: &str = "scaleway_lb_backend";

const PROXY_PROTOCOL_PREFIX: &str = "proxy_protocol_";
const MARKED_DOWN_NONE: &str = "none";

/// Load balancer backend resource.
pub struct LbBackend;

/// Map 403 and 404 to `Ok(None)`.
fn allow_gone<T>(result: Result<T, ProviderError>) -> Result<Option<T>, ProviderError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_not_found() || e.is_forbidden() => Ok(None),
        Err(e) => Err(e),
    }
}

fn expand_proxy_protocol(value: Option<&str>) -> Result<ProxyProtocol, ProviderError> {
    format!("{}{}", PROXY_PROTOCOL_PREFIX, value.unwrap_or("none")).parse()
}

fn flatten_proxy_protocol(value: ProxyProtocol) -> &'static str {
    let wire = value.as_str();
    wire.strip_prefix(PROXY_PROTOCOL_PREFIX).unwrap_or(wire)
}

fn expand_marked_down_action(value: Option<&str>) -> Result<OnMarkedDownAction, ProviderError> {
    match value {
        None | Some(MARKED_DOWN_NONE) => Ok(OnMarkedDownAction::None),
        Some(other) => other.parse(),
    }
}

fn flatten_marked_down_action(value: OnMarkedDownAction) -> &'static str {
    match value {
        OnMarkedDownAction::None => MARKED_DOWN_NONE,
        other => other.as_str(),
    }
}

fn opt_i32(data: &ResourceData, key: &str) -> Result<Option<i32>, ProviderError> {
    data.get_i64(key)
        .map(|v| {
            i32::try_from(v).map_err(|_| ProviderError::Validation(format!("{} is out of range", key)))
        })
        .transpose()
}

fn block_str(block: &Map<String, Value>, key: &str) -> String {
    block.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn block_code(block: &Map<String, Value>) -> Option<i32> {
    block
        .get("code")
        .and_then(Value::as_i64)
        .and_then(|c| i32::try_from(c).ok())
}

fn expand_settings(data: &ResourceData) -> Result<BackendSettings, ProviderError> {
    Ok(BackendSettings {
        name: expand_or_generate_string(data.get_str("name"), "lb-bkd"),
        forward_protocol: data.require_str("forward_protocol")?.parse::<Protocol>()?,
        forward_port: opt_i32(data, "forward_port")?.unwrap_or_default(),
        forward_port_algorithm: data
            .get_str("forward_port_algorithm")
            .unwrap_or("roundrobin")
            .parse::<ForwardPortAlgorithm>()?,
        sticky_sessions: data
            .get_str("sticky_sessions")
            .unwrap_or("none")
            .parse::<StickySessionsType>()?,
        sticky_sessions_cookie_name: data.get_str("sticky_sessions_cookie_name").unwrap_or_default().to_string(),
        proxy_protocol: expand_proxy_protocol(data.get_str("proxy_protocol"))?,
        timeout_server: expand_duration(data.get("timeout_server"))?,
        timeout_connect: expand_duration(data.get("timeout_connect"))?,
        timeout_tunnel: expand_duration(data.get("timeout_tunnel"))?,
        on_marked_down_action: expand_marked_down_action(data.get_str("on_marked_down_action"))?,
        failover_host: data.get_str("failover_host").map(str::to_string),
        ssl_bridging: data.get_bool("ssl_bridging"),
        ignore_ssl_server_verify: data.get_bool("ignore_ssl_server_verify"),
        max_connections: opt_i32(data, "max_connections")?,
        timeout_queue: expand_duration(data.get("timeout_queue"))?,
        redispatch_attempt_count: opt_i32(data, "redispatch_attempt_count")?,
        max_retries: opt_i32(data, "max_retries")?,
        send_proxy_v2: data.get_bool("send_proxy_v2"),
    })
}

/// The health check to send. An unset port follows the forward port, and TCP
/// is checked whenever neither HTTP nor HTTPS is configured.
fn expand_health_check(data: &ResourceData) -> Result<HealthCheck, ProviderError> {
    let port = match opt_i32(data, "health_check_port")?.filter(|p| *p != 0) {
        Some(port) => port,
        None => opt_i32(data, "forward_port")?.unwrap_or_default(),
    };

    let http_config = data.get_block("health_check_http").map(|b| HealthCheckHttpConfig {
        uri: block_str(b, "uri"),
        method: block_str(b, "method"),
        code: block_code(b),
        host_header: block_str(b, "host_header"),
    });
    let https_config = data.get_block("health_check_https").map(|b| HealthCheckHttpsConfig {
        uri: block_str(b, "uri"),
        method: block_str(b, "method"),
        code: block_code(b),
        host_header: block_str(b, "host_header"),
        sni: block_str(b, "sni"),
    });
    let tcp_config = (http_config.is_none() && https_config.is_none()).then(HealthCheckTcpConfig::default);

    Ok(HealthCheck {
        port,
        check_delay: expand_duration(data.get("health_check_delay"))?,
        check_timeout: expand_duration(data.get("health_check_timeout"))?,
        check_max_retries: opt_i32(data, "health_check_max_retries")?.unwrap_or(2),
        tcp_config,
        http_config,
        https_config,
        check_send_proxy: data.get_bool("health_check_send_proxy").unwrap_or(false),
        transient_check_delay: expand_duration(data.get("health_check_transient_delay"))?,
    })
}

fn flatten_health_check(data: &mut ResourceData, hc: &HealthCheck) {
    data.set("health_check_port", json!(hc.port));
    data.set("health_check_max_retries", json!(hc.check_max_retries));
    data.set("health_check_timeout", flatten_duration(hc.check_timeout));
    data.set("health_check_delay", flatten_duration(hc.check_delay));
    data.set(
        "health_check_tcp",
        flatten_singleton(hc.tcp_config.as_ref().map(|_| json!({}))),
    );
    data.set(
        "health_check_http",
        flatten_singleton(hc.http_config.as_ref().map(|c| {
            json!({
                "uri": c.uri,
                "method": c.method,
                "code": c.code,
                "host_header": c.host_header,
            })
        })),
    );
    data.set(
        "health_check_https",
        flatten_singleton(hc.https_config.as_ref().map(|c| {
            json!({
                "uri": c.uri,
                "method": c.method,
                "code": c.code,
                "host_header": c.host_header,
                "sni": c.sni,
            })
        })),
    );
    data.set("health_check_transient_delay", flatten_duration(hc.transient_check_delay));
    data.set("health_check_send_proxy", json!(hc.check_send_proxy));
}

fn flatten_backend(data: &mut ResourceData, backend: &Backend) {
    data.set("lb_id", json!(zoned_id(&backend.lb.zone, &backend.lb.id)));
    data.set("name", json!(backend.name));
    data.set("forward_protocol", json!(backend.forward_protocol.as_str()));
    data.set("forward_port", json!(backend.forward_port));
    data.set("forward_port_algorithm", json!(backend.forward_port_algorithm.as_str()));
    data.set("sticky_sessions", json!(backend.sticky_sessions.as_str()));
    data.set("sticky_sessions_cookie_name", json!(backend.sticky_sessions_cookie_name));
    data.set("server_ips", json!(backend.pool));
    data.set("proxy_protocol", json!(flatten_proxy_protocol(backend.proxy_protocol)));
    data.set("timeout_server", flatten_duration(backend.timeout_server));
    data.set("timeout_connect", flatten_duration(backend.timeout_connect));
    data.set("timeout_tunnel", flatten_duration(backend.timeout_tunnel));
    data.set(
        "on_marked_down_action",
        json!(flatten_marked_down_action(backend.on_marked_down_action)),
    );
    data.set("send_proxy_v2", json!(backend.send_proxy_v2));
    data.set("failover_host", json!(backend.failover_host));
    data.set("ssl_bridging", json!(backend.ssl_bridging));
    data.set("ignore_ssl_server_verify", json!(backend.ignore_ssl_server_verify));
    data.set("max_connections", json!(backend.max_connections));
    data.set("redispatch_attempt_count", json!(backend.redispatch_attempt_count));
    data.set("max_retries", json!(backend.max_retries));
    data.set("timeout_queue", flatten_duration(backend.timeout_queue));
    flatten_health_check(data, &backend.health_check);
}

fn duration_attribute(default: &str, description: &str) -> Attribute {
    Attribute::optional_string()
        .with_description(description)
        .with_default(json!(default))
        .with_validator(Validator::Duration)
        .with_diff_suppress(DiffSuppress::Duration)
}

fn http_check_block(with_sni: bool) -> Block {
    let block = Block::new()
        .with_attribute(
            "uri",
            Attribute::required_string().with_description("The HTTP endpoint URL to call for HC requests"),
        )
        .with_attribute(
            "method",
            Attribute::optional_string()
                .with_description("The HTTP method to use for HC requests")
                .with_default(json!("GET")),
        )
        .with_attribute(
            "code",
            Attribute::optional_int64()
                .with_description("The expected HTTP status code")
                .with_default(json!(200)),
        )
        .with_attribute(
            "host_header",
            Attribute::optional_string().with_description("The HTTP host header to use for HC requests"),
        );
    if with_sni {
        block.with_attribute(
            "sni",
            Attribute::optional_string().with_description("The SNI to use for HC requests over SSL"),
        )
    } else {
        block
    }
}

fn int32_attribute(description: &str) -> Attribute {
    Attribute::optional_int64()
        .with_description(description)
        .with_validator(Validator::IntBetween(0, i64::from(i32::MAX)))
}

impl LbBackend {
    fn zone_and_lb(data: &ResourceData) -> Result<(Zone, String), ProviderError> {
        parse_zoned_id(data.require_str("lb_id")?)
    }

    /// Wait for the parent load balancer; `false` when it is gone.
    async fn settle_lb(
        ctx: &ResourceContext,
        zone: &Zone,
        lb_id: &str,
        timeout: Duration,
    ) -> Result<bool, ProviderError> {
        let opts = ctx.wait_options(timeout);
        match lb::wait_for_lb(&ctx.client, zone, lb_id, &opts).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_forbidden() => {
                debug!(resource_type = TYPE_NAME, lb = %lb_id, "load balancer not accessible anymore");
                Ok(false)
            },
            Err(e) => Err(e),
        }
    }

    /// Like [`Self::settle_lb`], but a missing load balancer also counts as
    /// gone: its backends went with it.
    async fn settle_existing_lb(
        ctx: &ResourceContext,
        zone: &Zone,
        lb_id: &str,
        timeout: Duration,
    ) -> Result<bool, ProviderError> {
        let opts = ctx.wait_options(timeout);
        let settled = allow_gone(lb::wait_for_lb(&ctx.client, zone, lb_id, &opts).await)?;
        if settled.is_none() {
            debug!(resource_type = TYPE_NAME, lb = %lb_id, "load balancer gone");
        }
        Ok(settled.is_some())
    }
}

#[async_trait::async_trait]
impl Resource for LbBackend {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::new(1)
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "lb_id",
                Attribute::required_string()
                    .with_description("The load-balancer ID")
                    .with_force_new(),
            )
            .with_attribute(
                "name",
                Attribute::optional_computed_string().with_description("The name of the backend"),
            )
            .with_attribute(
                "forward_protocol",
                Attribute::required_string()
                    .with_description("Backend protocol")
                    .with_validator(Validator::one_of(&["tcp", "http"])),
            )
            .with_attribute(
                "forward_port",
                Attribute::required_int64()
                    .with_description("User sessions will be forwarded to this port of backend servers"),
            )
            .with_attribute(
                "forward_port_algorithm",
                Attribute::optional_string()
                    .with_description("Load balancing algorithm")
                    .with_default(json!("roundrobin"))
                    .with_validator(Validator::one_of(&["roundrobin", "leastconn", "first"])),
            )
            .with_attribute(
                "sticky_sessions",
                Attribute::optional_string()
                    .with_description("The type of sticky sessions")
                    .with_default(json!("none"))
                    .with_validator(Validator::one_of(&["none", "cookie", "table"])),
            )
            .with_attribute(
                "sticky_sessions_cookie_name",
                Attribute::optional_string().with_description("Cookie name for sticky sessions"),
            )
            .with_attribute(
                "server_ips",
                Attribute::optional_string_list()
                    .with_description("Backend server IP addresses list (IPv4 or IPv6)")
                    .with_validator(Validator::IpAddress),
            )
            .with_attribute(
                "send_proxy_v2",
                Attribute::optional_computed_bool()
                    .with_description("Enables PROXY protocol version 2")
                    .deprecated("Please use proxy_protocol instead"),
            )
            .with_attribute(
                "proxy_protocol",
                Attribute::optional_string()
                    .with_description("Type of PROXY protocol to enable")
                    .with_default(json!("none"))
                    .with_validator(Validator::one_of(&["none", "v1", "v2", "v2_ssl", "v2_ssl_cn"])),
            )
            .with_attribute(
                "timeout_server",
                duration_attribute("5m", "Maximum server connection inactivity time"),
            )
            .with_attribute(
                "timeout_connect",
                duration_attribute("5s", "Maximum initial server connection establishment time"),
            )
            .with_attribute("timeout_tunnel", duration_attribute("15m", "Maximum tunnel inactivity time"))
            .with_attribute(
                "health_check_timeout",
                duration_attribute("30s", "Timeout before we consider a HC request failed"),
            )
            .with_attribute(
                "health_check_delay",
                duration_attribute("60s", "Interval between two HC requests"),
            )
            .with_attribute(
                "health_check_port",
                Attribute::optional_computed_int64()
                    .with_description("Port the HC requests will be sent to, defaults to forward_port"),
            )
            .with_attribute(
                "health_check_max_retries",
                Attribute::optional_int64()
                    .with_description("Number of allowed failed HC requests before the backend server is marked down")
                    .with_default(json!(2)),
            )
            .with_block(
                "health_check_tcp",
                NestedBlock::singleton_list(Block::new())
                    .with_computed()
                    .with_conflicts(&["health_check_http", "health_check_https"]),
            )
            .with_block(
                "health_check_http",
                NestedBlock::singleton_list(http_check_block(false))
                    .with_conflicts(&["health_check_tcp", "health_check_https"]),
            )
            .with_block(
                "health_check_https",
                NestedBlock::singleton_list(http_check_block(true))
                    .with_conflicts(&["health_check_tcp", "health_check_http"]),
            )
            .with_attribute(
                "health_check_transient_delay",
                duration_attribute(
                    "0.5s",
                    "Time to wait between two consecutive health checks when a backend server is going up or down",
                ),
            )
            .with_attribute(
                "health_check_send_proxy",
                Attribute::optional_bool()
                    .with_description("Defines whether proxy protocol should be activated for the health check")
                    .with_default(json!(false)),
            )
            .with_attribute(
                "on_marked_down_action",
                Attribute::optional_string()
                    .with_description("Modify what occurs when a backend server is marked down")
                    .with_default(json!(MARKED_DOWN_NONE))
                    .with_validator(Validator::one_of(&[MARKED_DOWN_NONE, "shutdown_sessions"])),
            )
            .with_attribute(
                "failover_host",
                Attribute::optional_string()
                    .with_description("Host of the bucket website served when all backend servers are down"),
            )
            .with_attribute(
                "ssl_bridging",
                Attribute::optional_bool()
                    .with_description("Enables SSL between load balancer and backend servers")
                    .with_default(json!(false)),
            )
            .with_attribute(
                "ignore_ssl_server_verify",
                Attribute::optional_bool()
                    .with_description("Skip the verification of the backend server certificate")
                    .with_default(json!(false)),
            )
            .with_attribute(
                "max_connections",
                int32_attribute("Maximum number of connections allowed per backend server"),
            )
            .with_attribute(
                "timeout_queue",
                duration_attribute(
                    "0s",
                    "Maximum time for a request to be left pending in queue when max_connections is reached",
                ),
            )
            .with_attribute(
                "redispatch_attempt_count",
                int32_attribute("Whether to use another backend server on each attempt"),
            )
            .with_attribute(
                "max_retries",
                int32_attribute("Number of retries when a backend server connection failed")
                    .with_default(json!(3)),
            )
    }

    fn timeouts(&self) -> ResourceTimeouts {
        ResourceTimeouts::uniform(Duration::from_secs(10 * 60), Duration::from_secs(30))
    }

    fn customize_plan(
        &self,
        _prior: Option<&Value>,
        config: &Value,
        planned: &mut Map<String, Value>,
    ) -> Result<(), ProviderError> {
        let user_port = config
            .get("health_check_port")
            .and_then(Value::as_i64)
            .filter(|p| *p != 0);
        if user_port.is_none() {
            if let Some(forward_port) = planned.get("forward_port").cloned() {
                planned.insert("health_check_port".to_string(), forward_port);
            }
        }
        Ok(())
    }

    fn upgrade_state(&self, version: u64, mut state: Value) -> Result<Value, ProviderError> {
        if version >= 1 {
            return Ok(state);
        }
        if let Some(map) = state.as_object_mut() {
            for key in ["id", "lb_id"] {
                if let Some(id) = map.get(key).and_then(Value::as_str) {
                    let zoned = regional_to_zoned_id(id)?;
                    map.insert(key.to_string(), Value::String(zoned));
                }
            }
        }
        Ok(state)
    }

    async fn create(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        let (zone, lb_id) = Self::zone_and_lb(data)?;
        let request = CreateBackendRequest {
            settings: expand_settings(data)?,
            health_check: expand_health_check(data)?,
            server_ip: expand_strings(data.get("server_ips")),
        };

        if !Self::settle_lb(ctx, &zone, &lb_id, ctx.timeouts.create).await? {
            data.clear_id();
            return Ok(());
        }

        let backend = lb::create_backend(&ctx.client, &zone, &lb_id, &request).await?;
        info!(resource_type = TYPE_NAME, id = %backend.id, lb = %lb_id, "backend created");

        if !Self::settle_lb(ctx, &zone, &backend.lb.id, ctx.timeouts.create).await? {
            data.clear_id();
            return Ok(());
        }
        data.set_id(zoned_id(&zone, &backend.id));

        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        let (zone, id) = parse_zoned_id(data.require_id()?)?;

        let Some(backend) = allow_gone(lb::get_backend(&ctx.client, &zone, &id).await)? else {
            debug!(resource_type = TYPE_NAME, %id, "backend gone, clearing state");
            data.clear_id();
            return Ok(());
        };
        flatten_backend(data, &backend);

        let opts = ctx.wait_options(ctx.timeouts.read);
        if allow_gone(lb::wait_for_lb(&ctx.client, &zone, &backend.lb.id, &opts).await)?.is_none() {
            data.clear_id();
        }
        Ok(())
    }

    async fn update(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        let (zone, id) = parse_zoned_id(data.require_id()?)?;
        let (_, lb_id) = Self::zone_and_lb(data)?;
        let settings = expand_settings(data)?;
        let health_check = expand_health_check(data)?;

        if !Self::settle_existing_lb(ctx, &zone, &lb_id, ctx.timeouts.update).await? {
            data.clear_id();
            return Ok(());
        }

        let servers = SetBackendServersRequest {
            server_ip: expand_strings(data.get("server_ips")),
        };
        let updated = match allow_gone(lb::update_backend(&ctx.client, &zone, &id, &settings).await)? {
            None => None,
            Some(_) => match allow_gone(lb::update_health_check(&ctx.client, &zone, &id, &health_check).await)? {
                None => None,
                Some(_) => allow_gone(lb::set_backend_servers(&ctx.client, &zone, &id, &servers).await)?,
            },
        };
        if updated.is_none() {
            debug!(resource_type = TYPE_NAME, %id, "backend gone during update, clearing state");
            data.clear_id();
            return Ok(());
        }
        debug!(resource_type = TYPE_NAME, %id, "backend updated");

        if !Self::settle_existing_lb(ctx, &zone, &lb_id, ctx.timeouts.update).await? {
            data.clear_id();
            return Ok(());
        }

        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &ResourceContext, data: &mut ResourceData) -> Result<(), ProviderError> {
        let (zone, id) = parse_zoned_id(data.require_id()?)?;
        let (_, lb_id) = Self::zone_and_lb(data)?;

        if !Self::settle_existing_lb(ctx, &zone, &lb_id, ctx.timeouts.delete).await? {
            return Ok(());
        }
        allow_gone(lb::delete_backend(&ctx.client, &zone, &id).await)?;
        Self::settle_existing_lb(ctx, &zone, &lb_id, ctx.timeouts.delete).await?;
        Ok(())
    }
}
