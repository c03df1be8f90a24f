// TCP front door for the host. Connection tasks do I/O only: they accumulate
// bytes into a command, hand it to the scheduler, and write the reply back.
// One task per accepted connection, all funneling into one executor.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use scenebridge_protocol::{
    Command, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_READ_TIMEOUT, FrameBuffer, RECV_CHUNK_SIZE,
    Response,
};

use crate::scheduler::Scheduler;

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub host: String,
    pub port: u16,
    /// Applied only mid-command: an idle connection may sit as long as it
    /// likes between requests, but a half-received command is cut off.
    pub read_timeout: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

pub struct BridgeListener {
    listener: TcpListener,
    scheduler: Scheduler,
    read_timeout: Duration,
}

impl BridgeListener {
    pub async fn bind(config: &ListenerConfig, scheduler: Scheduler) -> Result<Self> {
        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .await
            .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;
        info!("Bridge listener started on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            scheduler,
            read_timeout: config.read_timeout,
        })
    }

    /// Actual bound address; useful when the config asked for port 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop. Runs until the accept call itself fails; drop the task
    /// driving this future to stop the listener.
    pub async fn serve(self) -> Result<()> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            info!("Connected to client: {}", addr);
            let scheduler = self.scheduler.clone();
            let read_timeout = self.read_timeout;
            tokio::spawn(async move {
                handle_client(stream, scheduler, read_timeout).await;
                debug!("Client handler stopped for {}", addr);
            });
        }
    }
}

/// One connection's lifetime: read a command, schedule it, write the reply,
/// repeat until the client hangs up. Strictly one command in flight per
/// connection from the host's point of view.
async fn handle_client(mut stream: TcpStream, scheduler: Scheduler, read_timeout: Duration) {
    let mut frame = FrameBuffer::new();
    let mut chunk = vec![0u8; RECV_CHUNK_SIZE];

    loop {
        let read = if frame.is_empty() {
            stream.read(&mut chunk).await
        } else {
            match timeout(read_timeout, stream.read(&mut chunk)).await {
                Ok(read) => read,
                Err(_) => {
                    warn!(
                        "Read timed out with {} unparseable bytes pending, dropping connection",
                        frame.len()
                    );
                    return;
                }
            }
        };

        let n = match read {
            Ok(0) => {
                if frame.is_empty() {
                    debug!("Client disconnected");
                } else {
                    warn!("Client disconnected mid-command ({} bytes pending)", frame.len());
                }
                return;
            }
            Ok(n) => n,
            Err(e) => {
                warn!("Error receiving data: {}", e);
                return;
            }
        };

        frame.extend_from_slice(&chunk[..n]);

        // Bytes that do not yet parse are an incomplete command; keep
        // reading. A stream that never parses is cut off by the timeout
        // above, not rejected - the wire format has no way to say "malformed".
        let Some(command) = frame.try_decode::<Command>() else {
            continue;
        };

        let response = match scheduler.schedule(command) {
            Ok(reply) => match reply.await {
                Ok(response) => response,
                Err(_) => Response::error("Host executor dropped the command"),
            },
            Err(e) => Response::error(e.to_string()),
        };

        let payload = match serde_json::to_vec(&response) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize response: {}", e);
                return;
            }
        };

        if let Err(e) = stream.write_all(&payload).await {
            // The client may have given up while the command ran. Its
            // problem, not the host's.
            warn!("Failed to send response - client disconnected: {}", e);
            return;
        }
    }
}
