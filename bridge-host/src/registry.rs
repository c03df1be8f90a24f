// Command registry and dispatcher. The registry is built once during
// single-threaded startup and read-only afterwards; capability gates are the
// one thing evaluated per dispatch, so optional integrations can be toggled
// without restarting the host.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock};

use anyhow::Result;
use serde_json::{Map, Value};
use tracing::{debug, error};

use scenebridge_protocol::{Command, Response};

use crate::scene::SceneStore;

/// A registered command handler. Receives the decoded keyword parameters and
/// signals failure purely by returning `Err` - never by smuggling an error
/// object through the success path.
pub type Handler = Box<dyn Fn(&mut SceneStore, &Map<String, Value>) -> Result<Value> + Send>;

/// Optional host integrations that gate part of the command set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    AssetLibrary,
    MeshGeneration,
    ModelMarketplace,
}

impl Capability {
    pub const ALL: [Capability; 3] = [
        Capability::AssetLibrary,
        Capability::MeshGeneration,
        Capability::ModelMarketplace,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Capability::AssetLibrary => "asset_library",
            Capability::MeshGeneration => "mesh_generation",
            Capability::ModelMarketplace => "model_marketplace",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Answers "is this capability currently enabled" once per dispatch.
pub trait CapabilityPolicy: Send + Sync {
    fn is_enabled(&self, capability: Capability) -> bool;
}

/// Fixed capability set, decided at startup.
pub struct StaticCapabilities {
    enabled: HashSet<Capability>,
}

impl StaticCapabilities {
    pub fn new(enabled: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            enabled: enabled.into_iter().collect(),
        }
    }

    pub fn none() -> Self {
        Self::new([])
    }
}

impl CapabilityPolicy for StaticCapabilities {
    fn is_enabled(&self, capability: Capability) -> bool {
        self.enabled.contains(&capability)
    }
}

/// Capability set that the host can flip while running (a preferences panel
/// toggling an integration on or off between two requests).
pub struct SharedCapabilities {
    enabled: RwLock<HashSet<Capability>>,
}

impl SharedCapabilities {
    pub fn new(enabled: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            enabled: RwLock::new(enabled.into_iter().collect()),
        }
    }

    pub fn enable(&self, capability: Capability) {
        self.enabled.write().unwrap().insert(capability);
    }

    pub fn disable(&self, capability: Capability) {
        self.enabled.write().unwrap().remove(&capability);
    }
}

impl CapabilityPolicy for SharedCapabilities {
    fn is_enabled(&self, capability: Capability) -> bool {
        self.enabled.read().unwrap().contains(&capability)
    }
}

struct Entry {
    handler: Handler,
    capability: Option<Capability>,
}

/// Maps command names to handlers and runs them against the scene store.
/// Dispatch never panics outward and never returns a raw error - every
/// outcome is a `Response`.
pub struct CommandRegistry {
    entries: HashMap<String, Entry>,
    policy: Arc<dyn CapabilityPolicy>,
}

impl CommandRegistry {
    pub fn new(policy: Arc<dyn CapabilityPolicy>) -> Self {
        Self {
            entries: HashMap::new(),
            policy,
        }
    }

    pub fn register<F>(&mut self, name: &str, handler: F)
    where
        F: Fn(&mut SceneStore, &Map<String, Value>) -> Result<Value> + Send + 'static,
    {
        self.entries.insert(
            name.to_string(),
            Entry {
                handler: Box::new(handler),
                capability: None,
            },
        );
    }

    /// Register a command that only runs while `capability` is enabled.
    pub fn register_gated<F>(&mut self, name: &str, capability: Capability, handler: F)
    where
        F: Fn(&mut SceneStore, &Map<String, Value>) -> Result<Value> + Send + 'static,
    {
        self.entries.insert(
            name.to_string(),
            Entry {
                handler: Box::new(handler),
                capability: Some(capability),
            },
        );
    }

    pub fn command_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn policy(&self) -> &Arc<dyn CapabilityPolicy> {
        &self.policy
    }

    pub fn dispatch(&self, store: &mut SceneStore, command: &Command) -> Response {
        let Some(entry) = self.entries.get(&command.command) else {
            debug!("Known commands: {}", self.command_names().join(", "));
            return Response::error(format!("Unknown command type: {}", command.command));
        };

        if let Some(capability) = entry.capability {
            if !self.policy.is_enabled(capability) {
                return Response::error(format!(
                    "Command '{}' requires the {} capability, which is disabled",
                    command.command, capability
                ));
            }
        }

        debug!("Executing handler for {}", command.command);
        match (entry.handler)(store, &command.params) {
            Ok(result) => Response::success(result),
            Err(e) => {
                // Full chain stays in the host log; only the message crosses
                // the wire.
                error!("Handler '{}' failed: {:#}", command.command, e);
                Response::error(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, bail};
    use serde_json::json;

    fn echo_registry(policy: Arc<dyn CapabilityPolicy>) -> CommandRegistry {
        let mut registry = CommandRegistry::new(policy);
        registry.register("echo_test", |_store, params| {
            Ok(params.get("value").cloned().unwrap_or(Value::Null))
        });
        registry.register("check_positive", |_store, params| {
            let x = params
                .get("x")
                .and_then(Value::as_i64)
                .ok_or_else(|| anyhow!("Missing parameter 'x'"))?;
            if x < 0 {
                bail!("bad input");
            }
            Ok(json!(x))
        });
        registry
    }

    fn command(name: &str, params: Value) -> Command {
        let params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Command::new(name, params)
    }

    #[test]
    fn dispatch_echoes_params() {
        let registry = echo_registry(Arc::new(StaticCapabilities::none()));
        let mut store = SceneStore::new("Scene");

        let response = registry.dispatch(&mut store, &command("echo_test", json!({"value": 42})));
        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire, json!({"status": "success", "result": 42}));
    }

    #[test]
    fn dispatch_names_unknown_command() {
        let registry = echo_registry(Arc::new(StaticCapabilities::none()));
        let mut store = SceneStore::new("Scene");

        let response = registry.dispatch(&mut store, &command("nonexistent_command", json!({})));
        match response {
            Response::Error { message } => {
                assert_eq!(message, "Unknown command type: nonexistent_command");
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn handler_error_becomes_error_response() {
        let registry = echo_registry(Arc::new(StaticCapabilities::none()));
        let mut store = SceneStore::new("Scene");

        let response = registry.dispatch(&mut store, &command("check_positive", json!({"x": -1})));
        match response {
            Response::Error { message } => assert_eq!(message, "bad input"),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn gated_command_rejected_while_disabled() {
        let mut registry = CommandRegistry::new(Arc::new(StaticCapabilities::none()));
        registry.register_gated("import_asset", Capability::AssetLibrary, |_store, _params| {
            Ok(json!("imported"))
        });
        let mut store = SceneStore::new("Scene");

        let response = registry.dispatch(&mut store, &command("import_asset", json!({})));
        match response {
            Response::Error { message } => {
                assert!(message.contains("asset_library"), "message: {}", message);
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn capability_gate_is_evaluated_per_dispatch() {
        let caps = Arc::new(SharedCapabilities::new([]));
        let mut registry = CommandRegistry::new(caps.clone());
        registry.register_gated("import_asset", Capability::AssetLibrary, |_store, _params| {
            Ok(json!("imported"))
        });
        let mut store = SceneStore::new("Scene");
        let cmd = command("import_asset", json!({}));

        assert!(registry.dispatch(&mut store, &cmd).is_error());

        // Same registry, no rebuild: flipping the policy changes the outcome.
        caps.enable(Capability::AssetLibrary);
        assert!(!registry.dispatch(&mut store, &cmd).is_error());

        caps.disable(Capability::AssetLibrary);
        assert!(registry.dispatch(&mut store, &cmd).is_error());
    }
}
