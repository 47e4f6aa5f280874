//! Kubernetes pools against a mocked API.

mod common;

use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{configured, not_found};

const CLUSTER_ID: &str = "e0e0e0e0-0000-4000-8000-00000000000e";
const POOL_ID: &str = "f0f0f0f0-0000-4000-8000-00000000000f";
const BASE: &str = "/k8s/v1/regions/fr-par";

fn cluster(status: &str) -> Value {
    json!({"id": CLUSTER_ID, "status": status, "region": "fr-par"})
}

fn pool(status: &str) -> Value {
    json!({
        "id": POOL_ID,
        "cluster_id": CLUSTER_ID,
        "name": "workers",
        "status": status,
        "version": "1.29.1",
        "node_type": "DEV1-M",
        "autoscaling": false,
        "autohealing": false,
        "size": 2,
        "min_size": 1,
        "max_size": 2,
        "container_runtime": "containerd",
        "tags": [],
        "kubelet_args": {},
        "upgrade_policy": {"max_unavailable": 1, "max_surge": 0},
        "zone": "fr-par-1",
        "root_volume_type": "l_ssd",
        "root_volume_size": 20_000_000_000u64,
        "public_ip_disabled": false,
        "created_at": "2024-05-01T10:00:00Z",
        "updated_at": "2024-05-01T10:00:00Z",
        "region": "fr-par"
    })
}

fn nodes(status: &str) -> Value {
    json!({
        "total_count": 2,
        "nodes": [
            {"id": "n1", "pool_id": POOL_ID, "name": "scw-workers-1", "status": status, "public_ip_v4": "51.15.0.1"},
            {"id": "n2", "pool_id": POOL_ID, "name": "scw-workers-2", "status": status, "public_ip_v4": "51.15.0.2"}
        ]
    })
}

async fn mount_cluster(server: &MockServer, status: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(format!("{}/clusters/{}", BASE, CLUSTER_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(cluster(status)))
        .up_to_n_times(times)
        .expect(times)
        .mount(server)
        .await;
}

async fn mount_ready_pool(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("{}/pools/{}", BASE, POOL_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(pool("ready")))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/clusters/{}/nodes", BASE, CLUSTER_ID)))
        .and(query_param("pool_id", POOL_ID))
        .respond_with(ResponseTemplate::new(200).set_body_json(nodes("ready")))
        .mount(server)
        .await;
}

fn config(wait_for_pool_ready: bool) -> Value {
    json!({
        "cluster_id": format!("fr-par/{}", CLUSTER_ID),
        "name": "workers",
        "node_type": "DEV1-M",
        "size": 2,
        "wait_for_pool_ready": wait_for_pool_ready
    })
}

#[tokio::test]
async fn test_create_defaults_max_size_to_size() {
    let server = MockServer::start().await;
    mount_cluster(&server, "ready", 1).await;
    mount_ready_pool(&server).await;

    Mock::given(method("POST"))
        .and(path(format!("{}/clusters/{}/pools", BASE, CLUSTER_ID)))
        .and(body_partial_json(json!({
            "name": "workers",
            "node_type": "DEV1-M",
            "size": 2,
            "min_size": 1,
            "max_size": 2,
            "container_runtime": "containerd",
            "zone": "fr-par-1",
            "public_ip_disabled": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(pool("scaling")))
        .expect(1)
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let state = tester
        .lifecycle_create("scaleway_k8s_pool", config(true))
        .await
        .unwrap();

    assert_eq!(state["id"], format!("fr-par/{}", POOL_ID));
    assert_eq!(state["cluster_id"], format!("fr-par/{}", CLUSTER_ID));
    assert_eq!(state["max_size"], 2);
    assert_eq!(state["current_size"], 2);
    assert_eq!(state["region"], "fr-par");
    assert_eq!(state["nodes"].as_array().map(Vec::len), Some(2));
    assert_eq!(state["nodes"][0]["public_ip"], "51.15.0.1");
    assert_eq!(state["upgrade_policy"], json!([{"max_unavailable": 1, "max_surge": 0}]));
}

#[tokio::test]
async fn test_create_waits_for_creating_cluster_first() {
    let server = MockServer::start().await;
    // first poll says creating, the next one ready
    mount_cluster(&server, "creating", 1).await;
    mount_cluster(&server, "ready", 1).await;
    mount_ready_pool(&server).await;

    Mock::given(method("POST"))
        .and(path(format!("{}/clusters/{}/pools", BASE, CLUSTER_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(pool("scaling")))
        .expect(1)
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let plan = tester
        .plan_create("scaleway_k8s_pool", config(false))
        .await
        .unwrap();
    let state = tester
        .create("scaleway_k8s_pool", plan.planned_state)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state["status"], "ready");
}

#[tokio::test]
async fn test_create_waits_for_cluster_after_first_pool() {
    let server = MockServer::start().await;
    // once before creating the pool, once after it
    mount_cluster(&server, "pool_required", 2).await;
    mount_ready_pool(&server).await;

    Mock::given(method("POST"))
        .and(path(format!("{}/clusters/{}/pools", BASE, CLUSTER_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(pool("scaling")))
        .expect(1)
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let plan = tester
        .plan_create("scaleway_k8s_pool", config(false))
        .await
        .unwrap();
    tester
        .create("scaleway_k8s_pool", plan.planned_state)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_node_creation_error_fails_the_wait() {
    let server = MockServer::start().await;
    mount_cluster(&server, "ready", 1).await;

    Mock::given(method("POST"))
        .and(path(format!("{}/clusters/{}/pools", BASE, CLUSTER_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(pool("scaling")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/pools/{}", BASE, POOL_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(pool("scaling")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/clusters/{}/nodes", BASE, CLUSTER_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(nodes("creation_error")))
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let err = tester
        .lifecycle_create("scaleway_k8s_pool", config(true))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("failed to be created"));
}

#[tokio::test]
async fn test_update_resizes_without_autoscaling() {
    let server = MockServer::start().await;
    mount_ready_pool(&server).await;

    Mock::given(method("PATCH"))
        .and(path(format!("{}/pools/{}", BASE, POOL_ID)))
        .and(body_partial_json(json!({"size": 3})))
        .respond_with(ResponseTemplate::new(200).set_body_json(pool("scaling")))
        .expect(1)
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let prior = tester
        .read(
            "scaleway_k8s_pool",
            json!({"id": format!("fr-par/{}", POOL_ID), "wait_for_pool_ready": true}),
        )
        .await
        .unwrap()
        .unwrap();

    let mut planned = prior.clone();
    planned["size"] = json!(3);
    tester
        .update("scaleway_k8s_pool", prior, planned)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_read_missing_pool_clears_state() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("{}/pools/{}", BASE, POOL_ID)))
        .respond_with(ResponseTemplate::new(404).set_body_json(not_found("pool")))
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let state = tester
        .read("scaleway_k8s_pool", json!({"id": format!("fr-par/{}", POOL_ID)}))
        .await
        .unwrap();
    assert!(state.is_none());
}

#[tokio::test]
async fn test_delete_waits_until_gone() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path(format!("{}/pools/{}", BASE, POOL_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(pool("deleting")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/pools/{}", BASE, POOL_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(pool("deleting")))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/pools/{}", BASE, POOL_ID)))
        .respond_with(ResponseTemplate::new(404).set_body_json(not_found("pool")))
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    tester
        .delete("scaleway_k8s_pool", json!({"id": format!("fr-par/{}", POOL_ID)}))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_update_of_missing_pool_clears_state() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path(format!("{}/pools/{}", BASE, POOL_ID)))
        .and(body_partial_json(json!({"size": 3})))
        .respond_with(ResponseTemplate::new(404).set_body_json(not_found("pool")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/pools/{}", BASE, POOL_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(pool("ready")))
        .expect(0)
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let id = format!("fr-par/{}", POOL_ID);
    let state = tester
        .update(
            "scaleway_k8s_pool",
            json!({"id": id, "size": 2}),
            json!({"id": id, "size": 3}),
        )
        .await
        .unwrap();
    assert!(state.is_none());
}

#[tokio::test]
async fn test_read_waits_for_scaling_pool() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("{}/pools/{}", BASE, POOL_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(pool("scaling")))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/pools/{}", BASE, POOL_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(pool("ready")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/clusters/{}/nodes", BASE, CLUSTER_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(nodes("ready")))
        .mount(&server)
        .await;

    let tester = configured(&server).await;
    let state = tester
        .read("scaleway_k8s_pool", json!({"id": format!("fr-par/{}", POOL_ID)}))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state["status"], "ready");
}
