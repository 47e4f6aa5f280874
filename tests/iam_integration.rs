//! IAM resources against a mocked API.

mod common;

use serde_json::{json, Value};
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{configured, not_found, ORGANIZATION_ID, PROJECT_ID, SECRET_KEY};
use scaleway_provider::testing::{assert_plan_creates, assert_plan_updates_in_place, ProviderTester};
use scaleway_provider::{ProviderConfig, ScalewayClient, ScalewayProvider};

const APP_ID: &str = "a0a0a0a0-0000-4000-8000-00000000000a";
const GROUP_ID: &str = "90909090-0000-4000-8000-000000000009";
const KEY_ID: &str = "c0c0c0c0-0000-4000-8000-00000000000c";
const USER_ID: &str = "d0d0d0d0-0000-4000-8000-00000000000d";

fn application(description: &str) -> Value {
    json!({
        "id": APP_ID,
        "name": "ci",
        "description": description,
        "organization_id": ORGANIZATION_ID,
        "editable": true,
        "created_at": "2024-05-01T10:00:00Z",
        "updated_at": "2024-05-01T10:00:00Z"
    })
}

mod application_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_sends_defaults_and_reads_back() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/iam/v1alpha1/applications"))
            .and(header("X-Auth-Token", SECRET_KEY))
            .and(body_json(json!({
                "name": "ci",
                "description": "",
                "organization_id": ORGANIZATION_ID
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(application("")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/iam/v1alpha1/applications/{}", APP_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(application("")))
            .mount(&server)
            .await;

        let tester = configured(&server).await;
        let plan = tester
            .plan_create("scaleway_iam_application", json!({"name": "ci"}))
            .await
            .unwrap();
        assert_plan_creates(&plan);

        let state = tester
            .lifecycle_create("scaleway_iam_application", json!({"name": "ci"}))
            .await
            .unwrap();
        assert_eq!(state["id"], APP_ID);
        assert_eq!(state["editable"], true);
        assert_eq!(state["organization_id"], ORGANIZATION_ID);
    }

    #[tokio::test]
    async fn test_update_sends_only_changed_fields() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path(format!("/iam/v1alpha1/applications/{}", APP_ID)))
            .and(body_json(json!({"description": "builds"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(application("builds")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/iam/v1alpha1/applications/{}", APP_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(application("builds")))
            .mount(&server)
            .await;

        let tester = configured(&server).await;
        let config = json!({"name": "ci", "description": "builds"});
        let plan = tester
            .plan_update("scaleway_iam_application", application(""), config.clone())
            .await
            .unwrap();
        assert_plan_updates_in_place(&plan);

        let state = tester
            .lifecycle_update("scaleway_iam_application", application(""), config)
            .await
            .unwrap();
        assert_eq!(state["description"], "builds");
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/iam/v1alpha1/applications"))
            .respond_with(ResponseTemplate::new(200).set_body_json(application("")))
            .expect(1)
            .mount(&server)
            .await;
        // create and its read back see the original description
        Mock::given(method("GET"))
            .and(path(format!("/iam/v1alpha1/applications/{}", APP_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(application("")))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/iam/v1alpha1/applications/{}", APP_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(application("builds")))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path(format!("/iam/v1alpha1/applications/{}", APP_ID)))
            .and(body_json(json!({"description": "builds"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(application("builds")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("/iam/v1alpha1/applications/{}", APP_ID)))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let tester = configured(&server).await;
        let state = tester
            .lifecycle_crud(
                "scaleway_iam_application",
                json!({"name": "ci"}),
                json!({"name": "ci", "description": "builds"}),
            )
            .await
            .unwrap();
        assert_eq!(state["description"], "builds");
    }

    #[tokio::test]
    async fn test_prebuilt_client_skips_configure() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("/iam/v1alpha1/applications/{}", APP_ID)))
            .and(header("X-Auth-Token", SECRET_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(application("")))
            .expect(1)
            .mount(&server)
            .await;

        let resolved = ProviderConfig {
            secret_key: Some(SECRET_KEY.to_string()),
            api_url: Some(server.uri()),
            ..Default::default()
        }
        .resolve()
        .unwrap();
        let client = ScalewayClient::new(&resolved).unwrap();
        let tester = ProviderTester::new(ScalewayProvider::with_client(client));

        let state = tester
            .read("scaleway_iam_application", application(""))
            .await
            .unwrap();
        assert_eq!(state.unwrap()["name"], "ci");
    }

    #[tokio::test]
    async fn test_read_missing_clears_state() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("/iam/v1alpha1/applications/{}", APP_ID)))
            .respond_with(ResponseTemplate::new(404).set_body_json(not_found("application")))
            .mount(&server)
            .await;

        let tester = configured(&server).await;
        let state = tester
            .read("scaleway_iam_application", application(""))
            .await
            .unwrap();
        assert!(state.is_none());
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path(format!("/iam/v1alpha1/applications/{}", APP_ID)))
            .respond_with(ResponseTemplate::new(404).set_body_json(not_found("application")))
            .expect(1)
            .mount(&server)
            .await;

        let tester = configured(&server).await;
        tester
            .lifecycle_delete("scaleway_iam_application", application(""))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_import_reads_by_id() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("/iam/v1alpha1/applications/{}", APP_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(application("imported")))
            .mount(&server)
            .await;

        let tester = configured(&server).await;
        let imported = tester
            .import_resource("scaleway_iam_application", APP_ID)
            .await
            .unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].resource_type, "scaleway_iam_application");
        assert_eq!(imported[0].state["description"], "imported");
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(format!("/iam/v1alpha1/applications/{}", APP_ID)))
            .respond_with(
                ResponseTemplate::new(503).set_body_json(json!({"message": "service unavailable"})),
            )
            .mount(&server)
            .await;

        let tester = configured(&server).await;
        let err = tester
            .read("scaleway_iam_application", application(""))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("service unavailable"));
    }
    #[tokio::test]
    async fn test_update_of_missing_application_clears_state() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path(format!("/iam/v1alpha1/applications/{}", APP_ID)))
            .respond_with(ResponseTemplate::new(404).set_body_json(not_found("application")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/iam/v1alpha1/applications/{}", APP_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(application("builds")))
            .expect(0)
            .mount(&server)
            .await;

        let tester = configured(&server).await;
        let state = tester
            .update("scaleway_iam_application", application(""), application("builds"))
            .await
            .unwrap();
        assert!(state.is_none());
    }
}

mod group_tests {
    use super::*;

    fn group(user_ids: &[&str]) -> Value {
        json!({
            "id": GROUP_ID,
            "name": "ops",
            "description": "",
            "organization_id": ORGANIZATION_ID,
            "user_ids": user_ids,
            "application_ids": []
        })
    }

    #[tokio::test]
    async fn test_create_sets_members() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/iam/v1alpha1/groups"))
            .and(body_partial_json(json!({"name": "ops"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(group(&[])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(format!("/iam/v1alpha1/groups/{}/members", GROUP_ID)))
            .and(body_json(json!({"user_ids": [USER_ID], "application_ids": []})))
            .respond_with(ResponseTemplate::new(200).set_body_json(group(&[USER_ID])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/iam/v1alpha1/groups/{}", GROUP_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(group(&[USER_ID])))
            .mount(&server)
            .await;

        let tester = configured(&server).await;
        let state = tester
            .lifecycle_create("scaleway_iam_group", json!({"name": "ops", "user_ids": [USER_ID]}))
            .await
            .unwrap();
        assert_eq!(state["user_ids"], json!([USER_ID]));
    }

    #[tokio::test]
    async fn test_create_without_members_skips_membership_call() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/iam/v1alpha1/groups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(group(&[])))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(format!("/iam/v1alpha1/groups/{}/members", GROUP_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(group(&[])))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/iam/v1alpha1/groups/{}", GROUP_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(group(&[])))
            .mount(&server)
            .await;

        let tester = configured(&server).await;
        let state = tester
            .lifecycle_create("scaleway_iam_group", json!({"name": "ops"}))
            .await
            .unwrap();
        assert_eq!(state["user_ids"], json!([]));
    }
    #[tokio::test]
    async fn test_update_of_missing_group_clears_state() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path(format!("/iam/v1alpha1/groups/{}/members", GROUP_ID)))
            .and(body_json(json!({"user_ids": [USER_ID], "application_ids": []})))
            .respond_with(ResponseTemplate::new(404).set_body_json(not_found("group")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/iam/v1alpha1/groups/{}", GROUP_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(group(&[USER_ID])))
            .expect(0)
            .mount(&server)
            .await;

        let tester = configured(&server).await;
        let state = tester
            .update("scaleway_iam_group", group(&[]), group(&[USER_ID]))
            .await
            .unwrap();
        assert!(state.is_none());
    }
}

mod ssh_key_tests {
    use super::*;

    fn ssh_key(disabled: bool) -> Value {
        json!({
            "id": KEY_ID,
            "name": "laptop",
            "public_key": "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIFake laptop",
            "fingerprint": "256 MD5:aa:bb laptop (ssh-ed25519)",
            "project_id": PROJECT_ID,
            "organization_id": ORGANIZATION_ID,
            "disabled": disabled
        })
    }

    #[tokio::test]
    async fn test_create_trims_key_and_disables() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/iam/v1alpha1/ssh-keys"))
            .and(body_json(json!({
                "name": "laptop",
                "public_key": "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIFake laptop",
                "project_id": PROJECT_ID
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(ssh_key(false)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path(format!("/iam/v1alpha1/ssh-keys/{}", KEY_ID)))
            .and(body_json(json!({"disabled": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(ssh_key(true)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/iam/v1alpha1/ssh-keys/{}", KEY_ID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(ssh_key(true)))
            .mount(&server)
            .await;

        let tester = configured(&server).await;
        let state = tester
            .lifecycle_create(
                "scaleway_iam_ssh_key",
                json!({
                    "name": "laptop",
                    "public_key": "\nssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIFake laptop\n\n",
                    "disabled": true
                }),
            )
            .await
            .unwrap();
        assert_eq!(state["disabled"], true);
        assert_eq!(state["fingerprint"], "256 MD5:aa:bb laptop (ssh-ed25519)");
    }

    #[tokio::test]
    async fn test_trailing_newline_is_not_a_change() {
        let tester = configured(&MockServer::start().await).await;
        let mut prior = ssh_key(false);
        prior["created_at"] = json!("2024-05-01T10:00:00Z");
        prior["updated_at"] = json!("2024-05-01T10:00:00Z");

        let plan = tester
            .plan_update(
                "scaleway_iam_ssh_key",
                prior,
                json!({
                    "name": "laptop",
                    "public_key": "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIFake laptop\n"
                }),
            )
            .await
            .unwrap();
        assert!(!plan.requires_replace, "changes: {:?}", plan.changes);
        assert!(plan.changes.is_empty(), "changes: {:?}", plan.changes);
    }

    #[tokio::test]
    async fn test_update_of_missing_key_clears_state() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path(format!("/iam/v1alpha1/ssh-keys/{}", KEY_ID)))
            .and(body_json(json!({"disabled": true})))
            .respond_with(ResponseTemplate::new(404).set_body_json(not_found("ssh_key")))
            .expect(1)
            .mount(&server)
            .await;

        let tester = configured(&server).await;
        let state = tester
            .update("scaleway_iam_ssh_key", ssh_key(false), ssh_key(true))
            .await
            .unwrap();
        assert!(state.is_none());
    }
}
