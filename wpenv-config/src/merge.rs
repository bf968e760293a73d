//! Layered merge of raw configuration objects.
//!
//! Overlays apply left-to-right with increasing precedence. Most keys are
//! replaced wholesale by a later overlay; the nested maps `config`,
//! `mappings`, and `lifecycleScripts` are shallow-unioned instead, and the
//! `env` key recurses so per-environment sections merge with the same rules.
//! All functions return new maps and never mutate their inputs.

use serde_json::{Map, Value};

/// Nested maps whose keys are unioned rather than replaced.
const SHALLOW_MERGED_KEYS: &[&str] = &["config", "mappings", "lifecycleScripts"];

/// Merge `overlay` over `base`, returning the combined object.
pub fn merge_config_maps(
    base: &Map<String, Value>,
    overlay: &Map<String, Value>,
) -> Map<String, Value> {
    let mut merged = base.clone();

    for (key, overlay_value) in overlay {
        let next = match merged.get(key) {
            Some(base_value) if key == "env" => merge_environments(base_value, overlay_value),
            Some(base_value)
                if SHALLOW_MERGED_KEYS.contains(&key.as_str())
                    && base_value.is_object()
                    && overlay_value.is_object() =>
            {
                shallow_union(base_value, overlay_value)
            }
            _ => overlay_value.clone(),
        };
        merged.insert(key.clone(), next);
    }

    merged
}

/// Apply a sequence of overlays in order of increasing precedence.
pub fn merge_all<'a, I>(base: &Map<String, Value>, overlays: I) -> Map<String, Value>
where
    I: IntoIterator<Item = &'a Map<String, Value>>,
{
    overlays
        .into_iter()
        .fold(base.clone(), |merged, overlay| {
            merge_config_maps(&merged, overlay)
        })
}

fn shallow_union(base: &Value, overlay: &Value) -> Value {
    let (Some(base_map), Some(overlay_map)) = (base.as_object(), overlay.as_object()) else {
        return overlay.clone();
    };
    let mut merged = base_map.clone();
    for (key, value) in overlay_map {
        merged.insert(key.clone(), value.clone());
    }
    Value::Object(merged)
}

fn merge_environments(base: &Value, overlay: &Value) -> Value {
    let (Some(base_map), Some(overlay_map)) = (base.as_object(), overlay.as_object()) else {
        return overlay.clone();
    };
    let mut merged = base_map.clone();
    for (name, overlay_env) in overlay_map {
        let next = match (merged.get(name).and_then(Value::as_object), overlay_env.as_object()) {
            (Some(base_env), Some(overlay_env)) => {
                Value::Object(merge_config_maps(base_env, overlay_env))
            }
            _ => overlay_env.clone(),
        };
        merged.insert(name.clone(), next);
    }
    Value::Object(merged)
}
