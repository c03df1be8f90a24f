// The tool catalog. Static on purpose: the full set of possible tools is
// enumerable without a live host, which keeps tools/list honest and testable.
// Whether a gated command is actually available right now is the host's
// dispatch-time decision; get_capability_status reports it.

use serde_json::json;

use crate::protocol::Tool;

pub struct ArgSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
    pub arg_type: &'static str,
}

pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// Bridge command this tool translates to. Same name by convention; the
    /// mapping exists so the MCP surface can diverge without touching hosts.
    pub command: &'static str,
    pub args: &'static [ArgSpec],
}

const TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "get_scene_info",
        description: "Summarize the current scene: name, object count, first objects, material count",
        command: "get_scene_info",
        args: &[],
    },
    ToolSpec {
        name: "get_object_info",
        description: "Full record for one named scene object",
        command: "get_object_info",
        args: &[ArgSpec {
            name: "name",
            description: "Object name",
            required: true,
            arg_type: "string",
        }],
    },
    ToolSpec {
        name: "get_selection",
        description: "Names of the currently selected objects",
        command: "get_selection",
        args: &[],
    },
    ToolSpec {
        name: "set_selection",
        description: "Replace the selection with the named objects",
        command: "set_selection",
        args: &[ArgSpec {
            name: "names",
            description: "Object names to select",
            required: true,
            arg_type: "array",
        }],
    },
    ToolSpec {
        name: "batch_rename",
        description: "Rename every object whose name contains a substring. Re-running the same rename is a no-op",
        command: "batch_rename",
        args: &[
            ArgSpec {
                name: "find",
                description: "Substring to search for",
                required: true,
                arg_type: "string",
            },
            ArgSpec {
                name: "replace",
                description: "Replacement text",
                required: true,
                arg_type: "string",
            },
        ],
    },
    ToolSpec {
        name: "list_materials",
        description: "List the materials in the scene",
        command: "list_materials",
        args: &[],
    },
    ToolSpec {
        name: "get_capability_status",
        description: "Report which optional host integrations are currently enabled",
        command: "get_capability_status",
        args: &[],
    },
    ToolSpec {
        name: "execute_code",
        description: "Run an arbitrary script inside the host with full API access. Trusted same-machine escape hatch; fails if the host has no script engine attached",
        command: "execute_code",
        args: &[ArgSpec {
            name: "code",
            description: "Script source to execute",
            required: true,
            arg_type: "string",
        }],
    },
    ToolSpec {
        name: "search_asset_library",
        description: "Search the asset library (requires the asset_library capability on the host)",
        command: "search_asset_library",
        args: &[ArgSpec {
            name: "query",
            description: "Search text",
            required: true,
            arg_type: "string",
        }],
    },
    ToolSpec {
        name: "import_asset",
        description: "Import a library asset into the scene (requires the asset_library capability on the host)",
        command: "import_asset",
        args: &[
            ArgSpec {
                name: "name",
                description: "Asset name",
                required: true,
                arg_type: "string",
            },
            ArgSpec {
                name: "asset_type",
                description: "Object type tag, defaults to MESH",
                required: false,
                arg_type: "string",
            },
        ],
    },
    ToolSpec {
        name: "search_marketplace_models",
        description: "Search the model marketplace (requires the model_marketplace capability on the host)",
        command: "search_marketplace_models",
        args: &[ArgSpec {
            name: "query",
            description: "Search text",
            required: true,
            arg_type: "string",
        }],
    },
    ToolSpec {
        name: "generate_mesh_asset",
        description: "Generate a mesh asset and add it to the scene (requires the mesh_generation capability on the host)",
        command: "generate_mesh_asset",
        args: &[ArgSpec {
            name: "name",
            description: "Base name for the generated object",
            required: false,
            arg_type: "string",
        }],
    },
];

pub struct ToolCatalog;

impl ToolCatalog {
    pub fn new() -> Self {
        Self
    }

    /// Bridge command for an MCP tool name, if the tool exists.
    pub fn command_for(&self, tool_name: &str) -> Option<&'static str> {
        TOOLS
            .iter()
            .find(|spec| spec.name == tool_name)
            .map(|spec| spec.command)
    }

    // Convert to MCP schema - the client sees exactly this, nothing hidden
    pub fn get_mcp_tools(&self) -> Vec<Tool> {
        TOOLS
            .iter()
            .map(|spec| {
                let mut properties = serde_json::Map::new();
                let mut required = Vec::new();

                for arg in spec.args {
                    let arg_schema = match arg.arg_type {
                        "string" => json!({
                            "type": "string",
                            "description": arg.description
                        }),
                        "number" => json!({
                            "type": "number",
                            "description": arg.description
                        }),
                        "boolean" => json!({
                            "type": "boolean",
                            "description": arg.description
                        }),
                        "array" => json!({
                            "type": "array",
                            "description": arg.description
                        }),
                        _ => json!({
                            "type": "string",
                            "description": arg.description
                        }),
                    };

                    properties.insert(arg.name.to_string(), arg_schema);

                    if arg.required {
                        required.push(json!(arg.name));
                    }
                }

                let schema = json!({
                    "type": "object",
                    "properties": properties,
                    "required": required
                });

                Tool {
                    name: spec.name.to_string(),
                    description: spec.description.to_string(),
                    input_schema: schema,
                }
            })
            .collect()
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::new()
    }
}
