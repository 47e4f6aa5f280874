//! Typed access to the attribute bag of one resource instance.

use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::plan::{equivalent, is_empty};

/// The attributes of a resource during one lifecycle call.
///
/// On create and update it starts from the planned state, on read and delete
/// from the current state. On update the prior state is kept alongside so
/// [`has_change`](Self::has_change) can tell what the plan modified.
#[derive(Debug, Clone, Default)]
pub struct ResourceData {
    attributes: Map<String, Value>,
    prior: Option<Map<String, Value>>,
    gone: bool,
}

impl ResourceData {
    /// Wrap a state object.
    pub fn new(state: Value) -> Result<Self, ProviderError> {
        Ok(Self {
            attributes: into_object(state)?,
            prior: None,
            gone: false,
        })
    }

    /// Wrap a planned state and the prior state it replaces.
    pub fn with_prior(planned: Value, prior: Value) -> Result<Self, ProviderError> {
        Ok(Self {
            attributes: into_object(planned)?,
            prior: Some(into_object(prior)?),
            gone: false,
        })
    }

    /// A data holding nothing but an identifier, as import starts from.
    pub fn from_id(id: impl Into<String>) -> Self {
        let mut data = Self::default();
        data.set_id(id);
        data
    }

    /// The resource identifier, if the resource exists yet.
    pub fn id(&self) -> Option<&str> {
        self.get_str("id")
    }

    /// The identifier, or an error when the state carries none.
    pub fn require_id(&self) -> Result<&str, ProviderError> {
        self.id()
            .ok_or_else(|| ProviderError::InvalidRequest("state has no id".to_string()))
    }

    /// Record the identifier of a freshly created resource.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.attributes.insert("id".to_string(), Value::String(id.into()));
        self.gone = false;
    }

    /// Mark the remote object as gone: the state will be dropped.
    pub fn clear_id(&mut self) {
        self.attributes.remove("id");
        self.gone = true;
    }

    /// Whether [`clear_id`](Self::clear_id) was called.
    pub fn is_gone(&self) -> bool {
        self.gone
    }

    /// A set attribute (null counts as unset).
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key).filter(|v| !v.is_null())
    }

    /// A non-empty string attribute.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    /// An integer attribute.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    /// A boolean attribute.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// A required string attribute.
    pub fn require_str(&self, key: &str) -> Result<&str, ProviderError> {
        self.get_str(key)
            .ok_or_else(|| ProviderError::Validation(format!("attribute {:?} is required", key)))
    }

    /// The single item of a block stored as a one-element list.
    pub fn get_block(&self, key: &str) -> Option<&Map<String, Value>> {
        singleton(self.get(key))
    }

    /// Set an attribute.
    pub fn set(&mut self, key: &str, value: Value) {
        self.attributes.insert(key.to_string(), value);
    }

    /// Drop an attribute.
    pub fn unset(&mut self, key: &str) {
        self.attributes.remove(key);
    }

    /// Whether the plan changed `key` relative to the prior state.
    ///
    /// Always false outside of updates.
    pub fn has_change(&self, key: &str) -> bool {
        match &self.prior {
            Some(prior) => !equivalent(prior.get(key), self.attributes.get(key)),
            None => false,
        }
    }

    /// Prior and planned values of `key`.
    pub fn get_change(&self, key: &str) -> (Option<&Value>, Option<&Value>) {
        let old = self
            .prior
            .as_ref()
            .and_then(|p| p.get(key))
            .filter(|v| !is_empty(v));
        (old, self.get(key).filter(|v| !is_empty(v)))
    }

    /// The resulting state, or `None` when the resource is gone.
    pub fn into_state(self) -> Option<Value> {
        if self.gone {
            return None;
        }
        Some(Value::Object(self.attributes))
    }
}

/// The single item of a one-element list block.
pub fn singleton(value: Option<&Value>) -> Option<&Map<String, Value>> {
    value
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(Value::as_object)
}

fn into_object(value: Value) -> Result<Map<String, Value>, ProviderError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(ProviderError::InvalidRequest(format!(
            "resource state must be an object, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accessors() {
        let data = ResourceData::new(json!({
            "id": "fr-par/abc",
            "name": "",
            "size": 3,
            "autoscaling": false,
            "upgrade_policy": [{"max_surge": 1}],
            "region": null
        }))
        .unwrap();

        assert_eq!(data.id(), Some("fr-par/abc"));
        assert_eq!(data.get_str("name"), None);
        assert_eq!(data.get_i64("size"), Some(3));
        assert_eq!(data.get_bool("autoscaling"), Some(false));
        assert!(data.get("region").is_none());
        assert_eq!(data.get_block("upgrade_policy").unwrap()["max_surge"], 1);
        assert!(data.require_str("name").is_err());
    }

    #[test]
    fn test_has_change() {
        let data = ResourceData::with_prior(
            json!({"id": "x", "size": 4, "tags": [], "description": "d"}),
            json!({"id": "x", "size": 3, "description": "d"}),
        )
        .unwrap();

        assert!(data.has_change("size"));
        assert!(!data.has_change("tags"));
        assert!(!data.has_change("description"));
        assert_eq!(data.get_change("size"), (Some(&json!(3)), Some(&json!(4))));

        let plain = ResourceData::new(json!({"size": 1})).unwrap();
        assert!(!plain.has_change("size"));
    }

    #[test]
    fn test_clear_id_drops_state() {
        let mut data = ResourceData::new(json!({"id": "x"})).unwrap();
        data.clear_id();
        assert!(data.is_gone());
        assert!(data.into_state().is_none());

        let mut data = ResourceData::default();
        data.set_id("fr-par-1/y");
        assert_eq!(data.into_state().unwrap()["id"], "fr-par-1/y");
    }

    #[test]
    fn test_rejects_non_object_state() {
        assert!(ResourceData::new(json!([1, 2])).is_err());
        assert!(ResourceData::new(Value::Null).unwrap().id().is_none());
    }
}
