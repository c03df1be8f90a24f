// Seam between the adapter and the socket client, so handler tests can run
// against a scripted transport instead of a live host.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use scenebridge_client::BridgeConnection;

/// Anything that can carry one command to the host and bring back its result.
#[async_trait]
pub trait CommandTransport: Send {
    async fn send_command(&mut self, command_type: &str, params: Value) -> Result<Value>;
}

#[async_trait]
impl CommandTransport for BridgeConnection {
    async fn send_command(&mut self, command_type: &str, params: Value) -> Result<Value> {
        Ok(BridgeConnection::send_command(self, command_type, params).await?)
    }
}
