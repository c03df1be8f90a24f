// Reference command handlers over the scene store. These are the domain glue
// around the dispatch core: each one decodes its keyword parameters, touches
// the store, and returns a JSON-serializable result. Failure is always an
// `Err` - never an error object through the success path.

use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use serde_json::{Map, Value, json};

use crate::registry::{Capability, CapabilityPolicy, CommandRegistry};
use crate::scene::{SceneObject, SceneStore};

/// The trusted escape hatch behind `execute_code`. The embedding host wires
/// in its own script engine here; the entire protocol assumes a same-machine
/// caller with full host access, so the hook is deliberately unrestricted.
pub type ScriptHook = Box<dyn Fn(&mut SceneStore, &str) -> Result<Value> + Send>;

/// Objects included in a scene summary before truncation.
const SCENE_INFO_OBJECT_LIMIT: usize = 10;

/// Build the standard registry: the always-available introspection commands
/// plus the capability-gated integration commands.
pub fn default_registry(
    policy: Arc<dyn CapabilityPolicy>,
    script_hook: Option<ScriptHook>,
) -> CommandRegistry {
    let mut registry = CommandRegistry::new(policy.clone());

    registry.register("get_scene_info", |store, _params| {
        let objects: Vec<Value> = store
            .objects()
            .iter()
            .take(SCENE_INFO_OBJECT_LIMIT)
            .map(|obj| {
                json!({
                    "name": obj.name,
                    "type": obj.object_type,
                    "location": [
                        round2(obj.location[0]),
                        round2(obj.location[1]),
                        round2(obj.location[2]),
                    ],
                })
            })
            .collect();
        Ok(json!({
            "name": store.name(),
            "object_count": store.objects().len(),
            "objects": objects,
            "materials_count": store.materials().len(),
        }))
    });

    registry.register("get_object_info", |store, params| {
        let name = require_str(params, "name")?;
        let obj = store
            .find(name)
            .ok_or_else(|| anyhow!("Object not found: {}", name))?;
        Ok(json!({
            "name": obj.name,
            "type": obj.object_type,
            "location": obj.location,
            "selected": obj.selected,
        }))
    });

    registry.register("get_selection", |store, _params| {
        let selected = store.selected_names();
        Ok(json!({"selected": selected, "count": selected.len()}))
    });

    registry.register("set_selection", |store, params| {
        let names = require_string_array(params, "names")?;
        for name in &names {
            if !store.contains(name) {
                bail!("Object not found: {}", name);
            }
        }
        store.clear_selection();
        for name in &names {
            if let Some(obj) = store.find_mut(name) {
                obj.selected = true;
            }
        }
        Ok(json!({"selected": names}))
    });

    registry.register("batch_rename", |store, params| {
        let find = require_str(params, "find")?;
        let replace = require_str(params, "replace")?;
        if find.is_empty() {
            bail!("Parameter 'find' must not be empty");
        }
        // No matches is a valid outcome: re-running the same rename reports
        // zero renamed rather than failing.
        let mut renamed = Vec::new();
        let matches: Vec<String> = store
            .objects()
            .iter()
            .filter(|obj| obj.name.contains(find))
            .map(|obj| obj.name.clone())
            .collect();
        for old in matches {
            let new = old.replace(find, replace);
            if let Some(obj) = store.find_mut(&old) {
                obj.name = new.clone();
            }
            renamed.push(json!({"old": old, "new": new}));
        }
        Ok(json!({"count": renamed.len(), "renamed": renamed}))
    });

    registry.register("list_materials", |store, _params| {
        Ok(json!({
            "materials": store.materials(),
            "count": store.materials().len(),
        }))
    });

    {
        let policy = policy.clone();
        registry.register("get_capability_status", move |_store, _params| {
            let mut status = Map::new();
            for capability in Capability::ALL {
                status.insert(
                    capability.name().to_string(),
                    Value::Bool(policy.is_enabled(capability)),
                );
            }
            Ok(Value::Object(status))
        });
    }

    match script_hook {
        Some(hook) => {
            registry.register("execute_code", move |store, params| {
                let code = require_str(params, "code")?;
                hook(store, code)
            });
        }
        None => {
            registry.register("execute_code", |_store, _params| {
                bail!("No script engine attached to this host")
            });
        }
    }

    registry.register_gated(
        "search_asset_library",
        Capability::AssetLibrary,
        |_store, params| {
            let query = require_str(params, "query")?;
            let assets: Vec<&str> = ASSET_LIBRARY
                .iter()
                .copied()
                .filter(|name| name.contains(query))
                .collect();
            Ok(json!({"query": query, "assets": assets}))
        },
    );

    registry.register_gated("import_asset", Capability::AssetLibrary, |store, params| {
        let name = require_str(params, "name")?;
        let asset_type = optional_str(params, "asset_type").unwrap_or("MESH");
        let assigned = store.unique_name(name);
        store.add_object(SceneObject::new(
            assigned.clone(),
            asset_type,
            [0.0, 0.0, 0.0],
        ));
        Ok(json!({"object": assigned, "type": asset_type}))
    });

    registry.register_gated(
        "search_marketplace_models",
        Capability::ModelMarketplace,
        |_store, params| {
            let query = require_str(params, "query")?;
            let models: Vec<&str> = MARKETPLACE_MODELS
                .iter()
                .copied()
                .filter(|name| name.contains(query))
                .collect();
            Ok(json!({"query": query, "models": models}))
        },
    );

    registry.register_gated(
        "generate_mesh_asset",
        Capability::MeshGeneration,
        |store, params| {
            let base = optional_str(params, "name").unwrap_or("Generated");
            let assigned = store.unique_name(base);
            store.add_object(SceneObject::new(assigned.clone(), "MESH", [0.0, 0.0, 0.0]));
            Ok(json!({"object": assigned, "status": "completed"}))
        },
    );

    registry
}

// Stand-in catalogs. The real integrations call out to their services; that
// glue is out of scope for the dispatch core.
const ASSET_LIBRARY: [&str; 4] = ["oak_tree", "brick_wall", "rock_moss", "wood_floor"];
const MARKETPLACE_MODELS: [&str; 3] = ["vintage_car", "street_lamp", "park_bench"];

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn require_str<'a>(params: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Missing parameter '{}'", key))
}

fn optional_str<'a>(params: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

fn require_string_array(params: &Map<String, Value>, key: &str) -> Result<Vec<String>> {
    let values = params
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("Missing parameter '{}'", key))?;
    values
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| anyhow!("Parameter '{}' must be an array of strings", key))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{SharedCapabilities, StaticCapabilities};
    use scenebridge_protocol::{Command, Response};

    fn dispatch(registry: &CommandRegistry, store: &mut SceneStore, name: &str, params: Value) -> Response {
        let params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        registry.dispatch(store, &Command::new(name, params))
    }

    fn result(response: Response) -> Value {
        match response {
            Response::Success { result } => result,
            Response::Error { message } => panic!("unexpected error: {}", message),
        }
    }

    fn message(response: Response) -> String {
        match response {
            Response::Error { message } => message,
            Response::Success { result } => panic!("unexpected success: {}", result),
        }
    }

    #[test]
    fn scene_info_summarizes_demo_scene() {
        let registry = default_registry(Arc::new(StaticCapabilities::none()), None);
        let mut store = SceneStore::demo();

        let info = result(dispatch(&registry, &mut store, "get_scene_info", json!({})));
        assert_eq!(info["name"], "Scene");
        assert_eq!(info["object_count"], 3);
        assert_eq!(info["materials_count"], 2);
        assert_eq!(info["objects"][1]["location"], json!([4.08, 1.01, 5.9]));
    }

    #[test]
    fn scene_info_truncates_large_scenes() {
        let registry = default_registry(Arc::new(StaticCapabilities::none()), None);
        let mut store = SceneStore::new("Big");
        for i in 0..25 {
            store.add_object(SceneObject::new(format!("Obj{}", i), "MESH", [0.0; 3]));
        }

        let info = result(dispatch(&registry, &mut store, "get_scene_info", json!({})));
        assert_eq!(info["object_count"], 25);
        assert_eq!(info["objects"].as_array().unwrap().len(), 10);
    }

    #[test]
    fn object_info_requires_known_name() {
        let registry = default_registry(Arc::new(StaticCapabilities::none()), None);
        let mut store = SceneStore::demo();

        let msg = message(dispatch(
            &registry,
            &mut store,
            "get_object_info",
            json!({"name": "Teapot"}),
        ));
        assert_eq!(msg, "Object not found: Teapot");
    }

    #[test]
    fn selection_replaces_rather_than_extends() {
        let registry = default_registry(Arc::new(StaticCapabilities::none()), None);
        let mut store = SceneStore::demo();

        result(dispatch(
            &registry,
            &mut store,
            "set_selection",
            json!({"names": ["Cube", "Light"]}),
        ));
        result(dispatch(
            &registry,
            &mut store,
            "set_selection",
            json!({"names": ["Camera"]}),
        ));

        let selection = result(dispatch(&registry, &mut store, "get_selection", json!({})));
        assert_eq!(selection, json!({"selected": ["Camera"], "count": 1}));
    }

    #[test]
    fn set_selection_rejects_unknown_names_without_side_effects() {
        let registry = default_registry(Arc::new(StaticCapabilities::none()), None);
        let mut store = SceneStore::demo();
        store.find_mut("Cube").unwrap().selected = true;

        let msg = message(dispatch(
            &registry,
            &mut store,
            "set_selection",
            json!({"names": ["Cube", "Teapot"]}),
        ));
        assert_eq!(msg, "Object not found: Teapot");
        // Prior selection untouched on failure.
        assert_eq!(store.selected_names(), vec!["Cube"]);
    }

    #[test]
    fn batch_rename_is_idempotent() {
        let registry = default_registry(Arc::new(StaticCapabilities::none()), None);
        let mut store = SceneStore::demo();

        let first = result(dispatch(
            &registry,
            &mut store,
            "batch_rename",
            json!({"find": "Cube", "replace": "Box"}),
        ));
        assert_eq!(first["count"], 1);
        assert_eq!(first["renamed"][0], json!({"old": "Cube", "new": "Box"}));

        // Already in target state: reports zero renamed, does not fail.
        let second = result(dispatch(
            &registry,
            &mut store,
            "batch_rename",
            json!({"find": "Cube", "replace": "Box"}),
        ));
        assert_eq!(second, json!({"count": 0, "renamed": []}));
    }

    #[test]
    fn execute_code_without_hook_is_an_error() {
        let registry = default_registry(Arc::new(StaticCapabilities::none()), None);
        let mut store = SceneStore::demo();

        let msg = message(dispatch(
            &registry,
            &mut store,
            "execute_code",
            json!({"code": "scene.clear()"}),
        ));
        assert_eq!(msg, "No script engine attached to this host");
    }

    #[test]
    fn execute_code_delegates_to_the_hook() {
        let hook: ScriptHook = Box::new(|store, code| {
            Ok(json!({"scene": store.name(), "executed": code}))
        });
        let registry = default_registry(Arc::new(StaticCapabilities::none()), Some(hook));
        let mut store = SceneStore::demo();

        let out = result(dispatch(
            &registry,
            &mut store,
            "execute_code",
            json!({"code": "print(1)"}),
        ));
        assert_eq!(out, json!({"scene": "Scene", "executed": "print(1)"}));
    }

    #[test]
    fn capability_status_tracks_the_policy() {
        let caps = Arc::new(SharedCapabilities::new([Capability::AssetLibrary]));
        let registry = default_registry(caps.clone(), None);
        let mut store = SceneStore::demo();

        let status = result(dispatch(
            &registry,
            &mut store,
            "get_capability_status",
            json!({}),
        ));
        assert_eq!(
            status,
            json!({
                "asset_library": true,
                "mesh_generation": false,
                "model_marketplace": false,
            })
        );

        caps.disable(Capability::AssetLibrary);
        let status = result(dispatch(
            &registry,
            &mut store,
            "get_capability_status",
            json!({}),
        ));
        assert_eq!(status["asset_library"], false);
    }

    #[test]
    fn import_asset_deduplicates_names() {
        let registry = default_registry(
            Arc::new(StaticCapabilities::new([Capability::AssetLibrary])),
            None,
        );
        let mut store = SceneStore::demo();

        let first = result(dispatch(
            &registry,
            &mut store,
            "import_asset",
            json!({"name": "oak_tree"}),
        ));
        assert_eq!(first["object"], "oak_tree");

        let second = result(dispatch(
            &registry,
            &mut store,
            "import_asset",
            json!({"name": "oak_tree"}),
        ));
        assert_eq!(second["object"], "oak_tree.001");
        assert!(store.contains("oak_tree.001"));
    }

    #[test]
    fn missing_parameter_is_reported_by_name() {
        let registry = default_registry(Arc::new(StaticCapabilities::none()), None);
        let mut store = SceneStore::demo();

        let msg = message(dispatch(&registry, &mut store, "get_object_info", json!({})));
        assert_eq!(msg, "Missing parameter 'name'");
    }
}
