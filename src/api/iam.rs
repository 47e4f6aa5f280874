//! Identity and access management (`iam/v1alpha1`): applications, groups and SSH keys.
//!
//! IAM objects are global: their IDs carry no locality prefix.

use serde::{Deserialize, Serialize};

use super::ScalewayClient;
use crate::error::ProviderError;

const BASE: &str = "/iam/v1alpha1";

/// An IAM application (a non-human principal).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub organization_id: String,
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateApplicationRequest {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
}

/// Only the fields that changed are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateApplicationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl UpdateApplicationRequest {
    /// Whether there is anything to send.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

/// A group of users and applications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub organization_id: String,
    #[serde(default)]
    pub user_ids: Vec<String>,
    #[serde(default)]
    pub application_ids: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateGroupRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl UpdateGroupRequest {
    /// Whether there is anything to send.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

/// Replaces the whole membership of a group.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SetGroupMembersRequest {
    pub user_ids: Vec<String>,
    pub application_ids: Vec<String>,
}

/// A public SSH key registered in a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SshKey {
    pub id: String,
    pub name: String,
    pub public_key: String,
    #[serde(default)]
    pub fingerprint: String,
    pub project_id: String,
    pub organization_id: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSshKeyRequest {
    pub name: String,
    pub public_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateSshKeyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
}

impl UpdateSshKeyRequest {
    /// Whether there is anything to send.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.disabled.is_none()
    }
}

pub async fn create_application(
    client: &ScalewayClient,
    request: &CreateApplicationRequest,
) -> Result<Application, ProviderError> {
    client.post(&format!("{}/applications", BASE), request).await
}

pub async fn get_application(client: &ScalewayClient, id: &str) -> Result<Application, ProviderError> {
    client.get(&format!("{}/applications/{}", BASE, id)).await
}

pub async fn update_application(
    client: &ScalewayClient,
    id: &str,
    request: &UpdateApplicationRequest,
) -> Result<Application, ProviderError> {
    client
        .patch(&format!("{}/applications/{}", BASE, id), request)
        .await
}

pub async fn delete_application(client: &ScalewayClient, id: &str) -> Result<(), ProviderError> {
    client.delete(&format!("{}/applications/{}", BASE, id)).await
}

pub async fn create_group(
    client: &ScalewayClient,
    request: &CreateGroupRequest,
) -> Result<Group, ProviderError> {
    client.post(&format!("{}/groups", BASE), request).await
}

pub async fn get_group(client: &ScalewayClient, id: &str) -> Result<Group, ProviderError> {
    client.get(&format!("{}/groups/{}", BASE, id)).await
}

pub async fn update_group(
    client: &ScalewayClient,
    id: &str,
    request: &UpdateGroupRequest,
) -> Result<Group, ProviderError> {
    client.patch(&format!("{}/groups/{}", BASE, id), request).await
}

pub async fn set_group_members(
    client: &ScalewayClient,
    id: &str,
    request: &SetGroupMembersRequest,
) -> Result<Group, ProviderError> {
    client
        .put(&format!("{}/groups/{}/members", BASE, id), request)
        .await
        .map_err(|e| e.context("failed to set group members"))
}

pub async fn delete_group(client: &ScalewayClient, id: &str) -> Result<(), ProviderError> {
    client.delete(&format!("{}/groups/{}", BASE, id)).await
}

pub async fn create_ssh_key(
    client: &ScalewayClient,
    request: &CreateSshKeyRequest,
) -> Result<SshKey, ProviderError> {
    client.post(&format!("{}/ssh-keys", BASE), request).await
}

pub async fn get_ssh_key(client: &ScalewayClient, id: &str) -> Result<SshKey, ProviderError> {
    client.get(&format!("{}/ssh-keys/{}", BASE, id)).await
}

pub async fn update_ssh_key(
    client: &ScalewayClient,
    id: &str,
    request: &UpdateSshKeyRequest,
) -> Result<SshKey, ProviderError> {
    client.patch(&format!("{}/ssh-keys/{}", BASE, id), request).await
}

pub async fn delete_ssh_key(client: &ScalewayClient, id: &str) -> Result<(), ProviderError> {
    client.delete(&format!("{}/ssh-keys/{}", BASE, id)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_updates_skip_unset_fields() {
        let req = UpdateApplicationRequest {
            description: Some(String::new()),
            ..Default::default()
        };
        assert!(!req.is_empty());
        assert_eq!(serde_json::to_value(&req).unwrap(), json!({"description": ""}));

        assert!(UpdateSshKeyRequest::default().is_empty());
        assert_eq!(
            serde_json::to_value(UpdateSshKeyRequest {
                disabled: Some(true),
                ..Default::default()
            })
            .unwrap(),
            json!({"disabled": true})
        );
    }

    #[test]
    fn test_group_decodes_without_members() {
        let group: Group = serde_json::from_value(json!({
            "id": "g", "name": "n", "organization_id": "o"
        }))
        .unwrap();
        assert!(group.user_ids.is_empty());
        assert!(group.application_ids.is_empty());
        assert_eq!(group.description, "");
    }
}
