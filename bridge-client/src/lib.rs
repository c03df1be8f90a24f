// Client side of the bridge. One `BridgeConnection` per caller - no global
// connection singleton. The connection caches its stream across requests and
// silently reconnects on the next call after any transport failure; retrying
// the request itself is the caller's decision, and `BridgeError::is_transport`
// tells the caller which failures are worth retrying.

use std::io;
use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use scenebridge_protocol::{Command, DEFAULT_READ_TIMEOUT, FrameBuffer, RECV_CHUNK_SIZE, Response};

pub use scenebridge_protocol::{DEFAULT_HOST, DEFAULT_PORT};

/// Everything `send_command` can fail with. The first five variants are the
/// transport category: the command may never have reached the host, or its
/// reply was lost. `Command` is the host saying no - retrying it verbatim
/// will not help.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("Connection to host lost: {0}")]
    Transport(#[from] io::Error),
    #[error("Timeout waiting for host response")]
    Timeout,
    #[error("Incomplete response received")]
    Incomplete,
    #[error("Connection closed before receiving any data")]
    NoData,
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),
    #[error("{0}")]
    Command(String),
}

impl BridgeError {
    /// Whether this failure is a communication breakdown rather than the
    /// host rejecting the command.
    pub fn is_transport(&self) -> bool {
        !matches!(self, BridgeError::Command(_) | BridgeError::InvalidParams(_))
    }
}

/// A connection to one host listener. Host and port are injected at
/// construction; nothing here reads the environment.
pub struct BridgeConnection {
    host: String,
    port: u16,
    read_timeout: Duration,
    stream: Option<TcpStream>,
}

impl BridgeConnection {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            read_timeout: DEFAULT_READ_TIMEOUT,
            stream: None,
        }
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Open the cached stream if there is none. Idempotent.
    pub async fn connect(&mut self) -> Result<(), BridgeError> {
        if self.stream.is_none() {
            self.stream = Some(self.open().await?);
        }
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            debug!("Disconnected from {}:{}", self.host, self.port);
        }
    }

    /// One full request/response cycle. `params` must be a JSON object or
    /// `Value::Null` (meaning no parameters).
    pub async fn send_command(
        &mut self,
        command_type: &str,
        params: Value,
    ) -> Result<Value, BridgeError> {
        let params = match params {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(BridgeError::InvalidParams(format!(
                    "params must be a JSON object, got: {}",
                    other
                )));
            }
        };

        let command = Command::new(command_type, params);
        let payload =
            serde_json::to_vec(&command).map_err(|e| BridgeError::InvalidParams(e.to_string()))?;

        // Take the stream out; only a clean exchange puts it back, so every
        // transport failure leaves the next call to reconnect from scratch.
        let mut stream = match self.stream.take() {
            Some(stream) => stream,
            None => self.open().await?,
        };

        debug!("Sending command: {}", command_type);
        match exchange(&mut stream, &payload, self.read_timeout).await {
            Ok(Response::Success { result }) => {
                self.stream = Some(stream);
                Ok(result)
            }
            Ok(Response::Error { message }) => {
                // Application-level rejection; the connection itself is fine.
                self.stream = Some(stream);
                error!("Host error for '{}': {}", command_type, message);
                Err(BridgeError::Command(message))
            }
            Err(e) => {
                error!("Communication error for '{}': {}", command_type, e);
                Err(e)
            }
        }
    }

    async fn open(&self) -> Result<TcpStream, BridgeError> {
        let addr = format!("{}:{}", self.host, self.port);
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| BridgeError::Connect {
                addr: addr.clone(),
                source,
            })?;
        info!("Connected to host at {}", addr);
        Ok(stream)
    }
}

/// Write the request, then chunked-accumulate-then-parse the reply: read up
/// to a chunk at a time, append, re-attempt a JSON decode. Stops on a
/// successful decode, EOF, or the read timeout.
async fn exchange(
    stream: &mut TcpStream,
    payload: &[u8],
    read_timeout: Duration,
) -> Result<Response, BridgeError> {
    stream.write_all(payload).await?;

    let mut frame = FrameBuffer::new();
    let mut chunk = vec![0u8; RECV_CHUNK_SIZE];
    loop {
        let read = match timeout(read_timeout, stream.read(&mut chunk)).await {
            Ok(read) => read,
            Err(_) => {
                warn!("Socket timeout during chunked receive");
                // A timeout with undecodable bytes is an incomplete response,
                // never silently truncated data.
                return Err(if frame.is_empty() {
                    BridgeError::Timeout
                } else {
                    BridgeError::Incomplete
                });
            }
        };
        let n = read?;
        if n == 0 {
            return Err(if frame.is_empty() {
                BridgeError::NoData
            } else {
                BridgeError::Incomplete
            });
        }

        frame.extend_from_slice(&chunk[..n]);
        let received = frame.len();
        if let Some(response) = frame.try_decode::<Response>() {
            debug!("Received complete response ({} bytes)", received);
            return Ok(response);
        }
        // Incomplete JSON, keep receiving.
    }
}
