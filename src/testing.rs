//! Testing utilities for providers.
//!
//! [`ProviderTester`] drives a [`ProviderService`] the way a host would, so a
//! test can go through plan and apply without any wire protocol. Pointed at a
//! mock HTTP server through the `api_url` setting, it exercises the full
//! expand, invoke, wait and flatten cycle of a resource.
//!
//! # Example
//!
//! ```ignore
//! use scaleway_provider::testing::ProviderTester;
//! use scaleway_provider::ScalewayProvider;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_application() {
//!     let tester = ProviderTester::new(ScalewayProvider::new());
//!     tester
//!         .configure(json!({"secret_key": "s", "api_url": server.uri()}))
//!         .await
//!         .unwrap();
//!
//!     let state = tester
//!         .lifecycle_create("scaleway_iam_application", json!({"name": "ci"}))
//!         .await
//!         .unwrap();
//!     assert_eq!(state["name"], "ci");
//! }
//! ```

use serde_json::Value;

use crate::error::ProviderError;
use crate::provider::ProviderService;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::types::{ImportedResource, PlanResult};

/// A test harness wrapping a [`ProviderService`].
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Get the list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Validate provider configuration; error diagnostics become `Err`.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider; error diagnostics become `Err`.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    /// Validate a resource configuration; error diagnostics become `Err`.
    pub async fn validate_resource_config(&self, resource_type: &str, config: Value) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a resource creation (no prior state).
    pub async fn plan_create(&self, resource_type: &str, config: Value) -> Result<PlanResult, ProviderError> {
        self.provider.plan(resource_type, None, config).await
    }

    /// Plan a resource update.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider.plan(resource_type, Some(prior_state), config).await
    }

    /// Plan a resource deletion.
    pub async fn plan_delete(&self, resource_type: &str, prior_state: Value) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null)
            .await
    }

    /// Create a new resource.
    pub async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Option<Value>, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read the current state of a resource; `None` when it is gone.
    pub async fn read(&self, resource_type: &str, current_state: Value) -> Result<Option<Value>, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update an existing resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing resource.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Upgrade resource state from an older schema version.
    pub async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: u64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .upgrade_resource_state(resource_type, version, state)
            .await
    }

    /// Plan, create, then read back.
    ///
    /// A resource that vanishes along the way is reported as not found.
    pub async fn lifecycle_create(&self, resource_type: &str, config: Value) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        let created = existing(resource_type, created)?;
        existing(resource_type, self.read(resource_type, created).await?)
    }

    /// Plan, update, then read back.
    ///
    /// A plan that requires replacement is refused: the host would destroy and
    /// recreate instead of calling update.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), config)
            .await?;
        if plan.requires_replace {
            return Err(ProviderError::InvalidRequest(format!(
                "update of {} requires replacement of {:?}",
                resource_type, plan.replace_paths
            )));
        }
        let updated = self
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        let updated = existing(resource_type, updated)?;
        existing(resource_type, self.read(resource_type, updated).await?)
    }

    /// Plan the deletion, then delete.
    pub async fn lifecycle_delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current_state.clone()).await?;
        self.delete(resource_type, current_state).await
    }

    /// Create, update, then delete. Returns the state after the update.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, ProviderError> {
        let created = self.lifecycle_create(resource_type, initial_config).await?;
        let updated = self
            .lifecycle_update(resource_type, created, updated_config)
            .await?;
        self.lifecycle_delete(resource_type, updated.clone()).await?;
        Ok(updated)
    }
}

fn existing(resource_type: &str, state: Option<Value>) -> Result<Value, ProviderError> {
    state.ok_or_else(|| ProviderError::NotFound(format!("{} disappeared", resource_type)))
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics
        .into_iter()
        .filter(|d| d.severity == DiagnosticSeverity::Error)
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

fn changed_paths(plan: &PlanResult) -> Vec<&str> {
    plan.changes.iter().map(|c| c.path.as_str()).collect()
}

/// Assert that a plan creates the resource.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes for create, but got no changes"
    );
    assert!(!plan.requires_replace, "Expected plan to create, not replace");
}

/// Assert that a plan has no changes.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        changed_paths(plan)
    );
}

/// Assert that a plan has changes.
///
/// # Panics
///
/// Panics if the plan has no changes.
pub fn assert_plan_has_changes(plan: &PlanResult) {
    assert!(!plan.changes.is_empty(), "Expected plan to have changes, but got no changes");
}

/// Assert that a plan replaces the resource.
///
/// # Panics
///
/// Panics if the plan does not require replacement.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(plan.requires_replace, "Expected plan to require replacement, but it does not");
}

/// Assert that a plan updates the resource in place.
///
/// # Panics
///
/// Panics if the plan requires replacement.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.requires_replace,
        "Expected plan to update in place, but it replaces because of {:?}",
        plan.replace_paths
    );
}

/// Assert that a plan changes the attribute at `path`.
///
/// # Panics
///
/// Panics if the plan does not change `path`.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "Expected plan to change attribute '{}', but it was not changed. Changed attributes: {:?}",
        path,
        changed_paths(plan)
    );
}

/// Assert that a plan leaves the attribute at `path` alone.
///
/// # Panics
///
/// Panics if the plan changes `path`.
pub fn assert_plan_does_not_change_attribute(plan: &PlanResult, path: &str) {
    assert!(
        !plan.changes.iter().any(|c| c.path == path),
        "Expected plan to not change attribute '{}', but it was changed",
        path
    );
}

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.severity == DiagnosticSeverity::Error)
        .map(|d| &d.summary)
        .collect();
    assert!(errors.is_empty(), "Expected no errors, but got: {:?}", errors);
}

/// Assert that diagnostics contain at least one error.
///
/// # Panics
///
/// Panics if there are no error diagnostics.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    assert!(
        diagnostics.iter().any(|d| d.severity == DiagnosticSeverity::Error),
        "Expected at least one error diagnostic, but got none"
    );
}

/// Assert that some error diagnostic mentions `text` in its summary or detail.
///
/// # Panics
///
/// Panics if no error diagnostic contains `text`.
pub fn assert_error_contains(diagnostics: &[Diagnostic], text: &str) {
    let found = diagnostics
        .iter()
        .filter(|d| d.severity == DiagnosticSeverity::Error)
        .any(|d| d.summary.contains(text) || d.detail.as_deref().is_some_and(|detail| detail.contains(text)));
    assert!(
        found,
        "Expected an error containing '{}', got: {:?}",
        text,
        diagnostics.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ScalewayProvider;
    use serde_json::json;

    const APP: &str = "scaleway_iam_application";

    fn tester() -> ProviderTester<ScalewayProvider> {
        ProviderTester::new(ScalewayProvider::new())
    }

    fn app_state() -> Value {
        json!({
            "id": "11111111-1111-1111-1111-111111111111",
            "name": "ci",
            "description": "",
            "organization_id": "22222222-2222-2222-2222-222222222222",
            "editable": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    #[test]
    fn test_tester_resource_types() {
        let types = tester().resource_types();
        assert!(types.contains(&APP.to_string()));
        assert!(types.contains(&"scaleway_k8s_pool".to_string()));
    }

    #[tokio::test]
    async fn test_tester_validate_provider_config() {
        let tester = tester();
        tester
            .validate_provider_config(json!({"secret_key": "s", "region": "fr-par"}))
            .await
            .unwrap();
        let err = tester
            .validate_provider_config(json!({"region": 42}))
            .await
            .unwrap_err();
        assert!(matches!(err, TestError::Diagnostics(_)));
    }

    #[tokio::test]
    async fn test_tester_plan_create() {
        let plan = tester().plan_create(APP, json!({"name": "ci"})).await.unwrap();
        assert_plan_creates(&plan);
        assert_plan_changes_attribute(&plan, "name");
    }

    #[tokio::test]
    async fn test_tester_plan_update_no_changes() {
        let plan = tester()
            .plan_update(APP, app_state(), json!({"name": "ci"}))
            .await
            .unwrap();
        assert_plan_no_changes(&plan);
        assert_eq!(plan.planned_state["id"], app_state()["id"]);
    }

    #[tokio::test]
    async fn test_tester_plan_update_in_place() {
        let plan = tester()
            .plan_update(APP, app_state(), json!({"name": "ci", "description": "builds"}))
            .await
            .unwrap();
        assert_plan_updates_in_place(&plan);
        assert_plan_changes_attribute(&plan, "description");
        assert_plan_does_not_change_attribute(&plan, "name");
    }

    #[tokio::test]
    async fn test_tester_plan_force_new_replaces() {
        let plan = tester()
            .plan_update(
                APP,
                app_state(),
                json!({"name": "ci", "organization_id": "33333333-3333-3333-3333-333333333333"}),
            )
            .await
            .unwrap();
        assert_plan_replaces(&plan);
        assert_eq!(plan.replace_paths, vec!["organization_id".to_string()]);
        // computed values are dropped for the new object
        assert!(plan.planned_state.get("created_at").is_none());
    }

    #[tokio::test]
    async fn test_tester_plan_delete() {
        let plan = tester().plan_delete(APP, app_state()).await.unwrap();
        assert_plan_has_changes(&plan);
        assert!(plan.planned_state.is_null());
    }

    #[tokio::test]
    async fn test_tester_lifecycle_needs_configuration() {
        let err = tester()
            .lifecycle_create(APP, json!({"name": "ci"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));
    }

    #[test]
    fn test_assert_no_errors() {
        assert_no_errors(&[Diagnostic::warning("careful")]);
    }

    #[test]
    #[should_panic(expected = "Expected no errors")]
    fn test_assert_no_errors_fails() {
        assert_no_errors(&[Diagnostic::error("broken")]);
    }

    #[test]
    fn test_assert_has_errors() {
        assert_has_errors(&[Diagnostic::error("broken")]);
    }

    #[test]
    fn test_assert_error_contains() {
        let diags = vec![Diagnostic::error("Invalid zone").with_detail("unknown zone nl-ams-9")];
        assert_error_contains(&diags, "zone");
        assert_error_contains(&diags, "nl-ams-9");
    }

    #[test]
    fn test_test_error_display() {
        let err = TestError::Diagnostics(vec![Diagnostic::error("Missing field").with_attribute("secret_key")]);
        let display = err.to_string();
        assert!(display.contains("1 diagnostic"));
        assert!(display.contains("Missing field"));
        assert!(display.contains("secret_key"));
    }
}
