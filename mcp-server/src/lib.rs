// MCP adapter for the scenebridge protocol: translates tool calls arriving
// over stdio JSON-RPC into bridge commands and back. Pure translation layer;
// all command semantics live host-side.

pub mod bridge;
pub mod handlers;
pub mod protocol;
pub mod tools;
