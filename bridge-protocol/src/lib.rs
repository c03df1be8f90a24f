// Wire format shared by the host listener and the client connection.
// One JSON object per message, no length prefix, no delimiter: both ends
// accumulate bytes and re-attempt a parse after every read.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default listen/connect address for the host socket.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default TCP port the host listener binds.
pub const DEFAULT_PORT: u16 = 9876;
/// Bytes read per socket recv on both sides.
pub const RECV_CHUNK_SIZE: usize = 8192;
/// Read timeout applied by both ends to avoid hanging on a half-open socket.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(15);

/// One request on the wire: a command name plus keyword parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    /// Registry key for the handler.
    #[serde(rename = "type")]
    pub command: String,
    /// Keyword arguments for the handler; absent on the wire means empty.
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl Command {
    pub fn new(command: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            command: command.into(),
            params,
        }
    }

    /// Command with no parameters.
    pub fn bare(command: impl Into<String>) -> Self {
        Self::new(command, Map::new())
    }
}

/// One reply on the wire. The `status` tag guarantees that exactly one of
/// `result` / `message` exists per message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Response {
    Success { result: Value },
    Error { message: String },
}

impl Response {
    pub fn success(result: Value) -> Self {
        Response::Success { result }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}

/// Accumulates received chunks until they decode as one complete JSON value.
///
/// A failed parse is "need more data", never a protocol error - a stream that
/// never becomes valid JSON simply never yields a message, and it is the read
/// timeout's job to cut it off. Only one message per accumulation cycle is
/// supported; pipelining two messages into one buffer is outside the wire
/// contract (a length-prefixed framing would fix this, at the cost of
/// compatibility with existing peers).
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend_from_slice(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Attempt to decode the accumulated bytes as one complete message.
    /// On success the buffer is cleared for the next cycle; on failure the
    /// bytes are kept and the caller should read more.
    pub fn try_decode<T: DeserializeOwned>(&mut self) -> Option<T> {
        match serde_json::from_slice(&self.buf) {
            Ok(value) => {
                self.buf.clear();
                Some(value)
            }
            Err(_) => None,
        }
    }
}
