//! Generic planning shared by every resource.
//!
//! A plan starts from the configuration, fills schema defaults, carries computed
//! values over from the prior state and keeps the prior spelling of values a
//! [`DiffSuppress`](crate::schema::DiffSuppress) rule deems equivalent. The
//! resulting planned state is then diffed against the prior state; a change to a
//! `force_new` attribute turns the update into a replacement, in which case the
//! computed values are dropped again since the new object will get fresh ones.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::schema::{Block, Schema};
use crate::types::{AttributeChange, PlanResult};

/// Hook letting a resource adjust the planned state before it is diffed.
///
/// Receives the prior state (`None` on create), the raw configuration and the
/// planned attributes.
pub type CustomizeFn<'a> =
    dyn Fn(Option<&Value>, &Value, &mut Map<String, Value>) -> Result<(), ProviderError> + 'a;

/// Plan a resource.
///
/// A null `config` with a prior state plans the destruction of the resource.
pub fn plan_resource(
    schema: &Schema,
    prior: Option<&Value>,
    config: &Value,
    customize: &CustomizeFn<'_>,
) -> Result<PlanResult, ProviderError> {
    let prior = prior.filter(|p| !p.is_null());

    let Some(config_map) = config.as_object() else {
        if !config.is_null() {
            return Err(ProviderError::Validation(
                "resource configuration must be an object".to_string(),
            ));
        }
        return Ok(match prior {
            None => PlanResult::no_change(Value::Null),
            Some(prior) => {
                let changes = prior
                    .as_object()
                    .map(|m| {
                        m.iter()
                            .filter(|(_, v)| !is_empty(v))
                            .map(|(k, v)| AttributeChange::removed(k.clone(), v.clone()))
                            .collect()
                    })
                    .unwrap_or_default();
                PlanResult::with_changes(Value::Null, changes, Vec::new())
            },
        });
    };
    let prior_map = prior.and_then(Value::as_object);

    let mut planned = plan_block(&schema.block, prior_map, config_map);
    customize(prior, config, &mut planned)?;

    let Some(prior_map) = prior_map else {
        let changes = planned
            .iter()
            .filter(|(_, v)| !is_empty(v))
            .map(|(k, v)| AttributeChange::added(k.clone(), v.clone()))
            .collect();
        return Ok(PlanResult::with_changes(Value::Object(planned), changes, Vec::new()));
    };

    let mut changes = diff_maps(prior_map, &planned);
    let replace_paths: Vec<String> = changes
        .iter()
        .filter(|c| forces_replacement(&schema.block, &c.path))
        .map(|c| c.path.clone())
        .collect();

    if !replace_paths.is_empty() {
        planned = plan_block(&schema.block, None, config_map);
        customize(None, config, &mut planned)?;
        changes = diff_maps(prior_map, &planned);
    }

    if changes.is_empty() {
        return Ok(PlanResult::no_change(Value::Object(planned)));
    }
    Ok(PlanResult::with_changes(Value::Object(planned), changes, replace_paths))
}

fn plan_block(block: &Block, prior: Option<&Map<String, Value>>, config: &Map<String, Value>) -> Map<String, Value> {
    let mut planned = Map::new();

    for (name, attr) in &block.attributes {
        let prior_value = prior.and_then(|p| p.get(name)).filter(|v| !v.is_null());
        let proposed = config
            .get(name)
            .filter(|v| !v.is_null())
            .cloned()
            .or_else(|| attr.default.clone());

        let value = match proposed {
            Some(new) => match (prior_value, attr.diff_suppress) {
                (Some(old), Some(rule)) if rule.suppress(old, &new) => Some(old.clone()),
                _ => Some(new),
            },
            None if attr.flags.computed => prior_value.cloned(),
            None => None,
        };
        if let Some(value) = value {
            planned.insert(name.clone(), value);
        }
    }

    for (name, nested) in &block.blocks {
        let prior_value = prior.and_then(|p| p.get(name));
        match config.get(name).filter(|v| !is_empty(v)) {
            Some(Value::Array(items)) => {
                let prior_items = prior_value.and_then(Value::as_array);
                let empty = Map::new();
                let items = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        let item_prior = prior_items.and_then(|p| p.get(i)).and_then(Value::as_object);
                        let item_config = item.as_object().unwrap_or(&empty);
                        Value::Object(plan_block(&nested.block, item_prior, item_config))
                    })
                    .collect();
                planned.insert(name.clone(), Value::Array(items));
            },
            Some(Value::Object(item)) => {
                let item_prior = prior_value.and_then(Value::as_object);
                planned.insert(name.clone(), Value::Object(plan_block(&nested.block, item_prior, item)));
            },
            Some(other) => {
                planned.insert(name.clone(), other.clone());
            },
            None if nested.computed => {
                if let Some(prior_value) = prior_value.filter(|v| !v.is_null()) {
                    planned.insert(name.clone(), prior_value.clone());
                }
            },
            None => {},
        }
    }

    planned
}

/// Null, `""`, `[]` and `{}` all mean "not set".
pub(crate) fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Whether two attribute values are the same once unset spellings are unified.
pub(crate) fn equivalent(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) if a == b => true,
        (a, b) => a.map_or(true, is_empty) && b.map_or(true, is_empty),
    }
}

fn diff_maps(before: &Map<String, Value>, after: &Map<String, Value>) -> Vec<AttributeChange> {
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    let mut changes = Vec::new();
    for key in keys {
        diff_value(key, before.get(key), after.get(key), &mut changes);
    }
    changes
}

fn diff_value(path: &str, before: Option<&Value>, after: Option<&Value>, out: &mut Vec<AttributeChange>) {
    if equivalent(before, after) {
        return;
    }
    match (before.filter(|v| !is_empty(v)), after.filter(|v| !is_empty(v))) {
        (Some(Value::Object(a)), Some(Value::Object(b))) => {
            let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
            for key in keys {
                diff_value(&format!("{}.{}", path, key), a.get(key), b.get(key), out);
            }
        },
        (Some(Value::Array(a)), Some(Value::Array(b)))
            if a.len() == b.len() && a.iter().chain(b.iter()).all(Value::is_object) =>
        {
            for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
                diff_value(&format!("{}.{}", path, i), Some(x), Some(y), out);
            }
        },
        (None, Some(b)) => out.push(AttributeChange::added(path, b.clone())),
        (Some(a), None) => out.push(AttributeChange::removed(path, a.clone())),
        (Some(a), Some(b)) => out.push(AttributeChange::modified(path, a.clone(), b.clone())),
        (None, None) => {},
    }
}

/// Whether a change at `path` (`name`, `block.0.name`, `map.key`) hits a
/// `force_new` attribute.
fn forces_replacement(block: &Block, path: &str) -> bool {
    let mut segments = path.split('.');
    let Some(head) = segments.next() else {
        return false;
    };
    if let Some(attr) = block.attributes.get(head) {
        return attr.force_new;
    }
    let Some(nested) = block.blocks.get(head) else {
        return false;
    };
    let rest: Vec<&str> = segments
        .skip_while(|s| s.parse::<usize>().is_ok())
        .collect();
    if rest.is_empty() {
        return false;
    }
    forces_replacement(&nested.block, &rest.join("."))
}
