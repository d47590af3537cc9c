//! Attribute overrides for config-backed components.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Applies every override whose key is an attribute of `component`.
///
/// Consumed keys are removed from `overrides`; whatever is left belongs to no
/// attribute of this component.
pub fn apply_overrides<T>(component: T, overrides: &mut Map<String, Value>) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    if overrides.is_empty() {
        return Ok(component);
    }

    let Value::Object(mut fields) = serde_json::to_value(&component)? else {
        return Err(Error::ConfigError(
            "Component does not serialize to a JSON object".to_string(),
        ));
    };

    let matching: Vec<String> = overrides
        .keys()
        .filter(|key| fields.contains_key(key.as_str()))
        .cloned()
        .collect();
    if matching.is_empty() {
        return Ok(component);
    }

    for key in matching {
        if let Some(value) = overrides.remove(&key) {
            fields.insert(key, value);
        }
    }

    serde_json::from_value(Value::Object(fields)).map_err(Error::from)
}
