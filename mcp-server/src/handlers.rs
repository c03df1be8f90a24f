// Request handler - pure translation between MCP tool calls and bridge
// commands. No business logic lives here: a tool call becomes exactly one
// command, and whatever comes back becomes the tool result.

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::bridge::CommandTransport;
use crate::protocol::*;
use crate::tools::ToolCatalog;

pub struct RequestHandler<T: CommandTransport> {
    catalog: ToolCatalog,
    transport: Mutex<T>,
}

impl<T: CommandTransport> RequestHandler<T> {
    pub fn new(catalog: ToolCatalog, transport: T) -> Self {
        Self {
            catalog,
            transport: Mutex::new(transport),
        }
    }

    // Request dispatch - only these three methods exist, nothing else
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        debug!("Handling request: {} (id: {})", request.method, request.id);

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params).await,
            "tools/list" => self.handle_tools_list().await,
            "tools/call" => self.handle_tools_call(request.params).await,
            _ => Err(JsonRpcError {
                code: METHOD_NOT_FOUND,
                message: format!("Method '{}' not found", request.method),
                data: None,
            }),
        };

        match result {
            Ok(value) => JsonRpcResponse {
                jsonrpc: "2.0".to_string(),
                id: request.id,
                result: Some(value),
                error: None,
            },
            Err(error) => JsonRpcResponse {
                jsonrpc: "2.0".to_string(),
                id: request.id,
                result: None,
                error: Some(error),
            },
        }
    }

    pub async fn handle_notification(&self, notification: JsonRpcNotification) {
        debug!("Handling notification: {}", notification.method);

        match notification.method.as_str() {
            "notifications/initialized" => {
                info!("Client initialized");
            }
            "notifications/cancelled" => {
                info!("Request cancelled");
            }
            _ => {
                debug!("Unknown notification: {}", notification.method);
            }
        }
    }

    async fn handle_initialize(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let _params: InitializeParams = if let Some(p) = params {
            serde_json::from_value(p).map_err(|e| JsonRpcError {
                code: INVALID_PARAMS,
                message: format!("Invalid initialize params: {}", e),
                data: None,
            })?
        } else {
            return Err(JsonRpcError {
                code: INVALID_PARAMS,
                message: "Missing initialize params".to_string(),
                data: None,
            });
        };

        let result = InitializeResult {
            protocol_version: "2024-11-05".to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {},
            },
            server_info: ServerInfo {
                name: "scenebridge-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(
                "Remote-controls a running 3D content tool over its local bridge socket. \
                 Start the host's bridge listener before calling tools."
                    .to_string(),
            ),
        };

        Ok(serde_json::to_value(result).unwrap())
    }

    async fn handle_tools_list(&self) -> Result<Value, JsonRpcError> {
        let tools = self.catalog.get_mcp_tools();

        let result = ListToolsResult { tools };

        Ok(serde_json::to_value(result).unwrap())
    }

    // Tool execution - look the command up, forward it, wrap what comes back
    async fn handle_tools_call(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: CallToolParams = if let Some(p) = params {
            serde_json::from_value(p).map_err(|e| JsonRpcError {
                code: INVALID_PARAMS,
                message: format!("Invalid tool call params: {}", e),
                data: None,
            })?
        } else {
            return Err(JsonRpcError {
                code: INVALID_PARAMS,
                message: "Missing tool call params".to_string(),
                data: None,
            });
        };

        let Some(command) = self.catalog.command_for(&params.name) else {
            let response = CallToolResult {
                content: vec![ContentBlock::Text {
                    text: format!("Error: Tool '{}' not found", params.name),
                }],
                is_error: Some(true),
            };
            return Ok(serde_json::to_value(response).unwrap());
        };

        let outcome = self
            .transport
            .lock()
            .await
            .send_command(command, params.arguments)
            .await;

        match outcome {
            Ok(result) => {
                let response = CallToolResult {
                    content: vec![ContentBlock::Text {
                        text: serde_json::to_string(&result).unwrap_or_else(|_| "null".to_string()),
                    }],
                    is_error: None,
                };

                Ok(serde_json::to_value(response).unwrap())
            }
            Err(e) => {
                error!("Tool execution failed: {}", e);

                let response = CallToolResult {
                    content: vec![ContentBlock::Text {
                        text: format!("Error: {}", e),
                    }],
                    is_error: Some(true),
                };

                Ok(serde_json::to_value(response).unwrap())
            }
        }
    }
}
