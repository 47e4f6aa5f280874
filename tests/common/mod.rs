//! Shared setup for the HTTP integration tests.

#![allow(dead_code)]

use serde_json::json;
use wiremock::MockServer;

use scaleway_provider::testing::ProviderTester;
use scaleway_provider::ScalewayProvider;

pub const SECRET_KEY: &str = "11111111-2222-3333-4444-555555555555";
pub const PROJECT_ID: &str = "6f6f6f6f-0000-4000-8000-000000000001";
pub const ORGANIZATION_ID: &str = "6f6f6f6f-0000-4000-8000-000000000002";

/// A provider pointed at `server`, polling every few milliseconds.
pub async fn configured(server: &MockServer) -> ProviderTester<ScalewayProvider> {
    let tester = ProviderTester::new(ScalewayProvider::new());
    tester
        .configure(json!({
            "secret_key": SECRET_KEY,
            "project_id": PROJECT_ID,
            "organization_id": ORGANIZATION_ID,
            "region": "fr-par",
            "zone": "fr-par-1",
            "api_url": server.uri(),
            "wait_retry_interval": "10ms",
        }))
        .await
        .expect("provider should accept the test configuration");
    tester
}

/// Scaleway's error body for a missing object.
pub fn not_found(resource: &str) -> serde_json::Value {
    json!({
        "type": "not_found",
        "message": "resource is not found",
        "resource": resource,
    })
}
