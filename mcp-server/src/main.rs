// MCP adapter binary. Speaks JSON-RPC over stdio to the MCP client and the
// scenebridge socket protocol to the host; stdout carries protocol only,
// logging goes to stderr.

use anyhow::Result;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use scenebridge_client::{BridgeConnection, DEFAULT_HOST, DEFAULT_PORT};
use scenebridge_mcp::handlers::RequestHandler;
use scenebridge_mcp::protocol::*;
use scenebridge_mcp::tools::ToolCatalog;

#[tokio::main]
async fn main() -> Result<()> {
    // Bridge address: env first, flags override, injected once from here.
    let mut host = std::env::var("SCENEBRIDGE_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
    let mut port = match std::env::var("SCENEBRIDGE_PORT") {
        Ok(value) => match value.parse::<u16>() {
            Ok(port) => port,
            Err(_) => {
                eprintln!("Error: SCENEBRIDGE_PORT is not a valid port: {}", value);
                std::process::exit(1);
            }
        },
        Err(_) => DEFAULT_PORT,
    };

    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--version" | "-V" => {
                println!("scenebridge-mcp {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--host" => {
                if i + 1 < args.len() {
                    host = args[i + 1].clone();
                    i += 2;
                } else {
                    eprintln!("Error: --host requires an argument");
                    std::process::exit(1);
                }
            }
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    match args[i + 1].parse::<u16>() {
                        Ok(value) => port = value,
                        Err(_) => {
                            eprintln!("Error: --port is not a valid port: {}", args[i + 1]);
                            std::process::exit(1);
                        }
                    }
                    i += 2;
                } else {
                    eprintln!("Error: --port requires an argument");
                    std::process::exit(1);
                }
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                eprintln!("Try 'scenebridge-mcp --help' for more information.");
                std::process::exit(1);
            }
        }
    }

    // Tracing to stderr only - stdout is reserved for JSON-RPC protocol
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("scenebridge_mcp=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting scenebridge MCP adapter, bridging to {}:{}", host, port);

    // The connection is lazy: a host coming up after the adapter is fine,
    // the first tool call will connect.
    let connection = BridgeConnection::new(host, port);
    let handler = RequestHandler::new(ToolCatalog::new(), connection);

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();
    let mut reader = BufReader::new(stdin);
    let mut stdout = stdout;

    info!("MCP adapter ready, waiting for requests...");

    // Single-threaded message loop - one request at a time
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                info!("Client disconnected");
                break;
            }
            Ok(_) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                debug!("Received: {}", line);

                // Parse as generic Value first - no implicit deserialization
                match serde_json::from_str::<Value>(line) {
                    Ok(value) => {
                        // Explicit request/notification discrimination by id field
                        if value.get("id").is_some() {
                            match serde_json::from_value::<JsonRpcRequest>(value) {
                                Ok(request) => {
                                    let response = handler.handle_request(request).await;
                                    let response_str = serde_json::to_string(&response)?;
                                    debug!("Sending: {}", response_str);
                                    stdout.write_all(response_str.as_bytes()).await?;
                                    stdout.write_all(b"\n").await?;
                                    stdout.flush().await?;
                                }
                                Err(e) => {
                                    error!("Invalid request: {}", e);
                                    let error_response = JsonRpcResponse {
                                        jsonrpc: "2.0".to_string(),
                                        id: serde_json::Value::Null,
                                        result: None,
                                        error: Some(JsonRpcError {
                                            code: INVALID_REQUEST,
                                            message: "Invalid request".to_string(),
                                            data: None,
                                        }),
                                    };
                                    let response_str = serde_json::to_string(&error_response)?;
                                    stdout.write_all(response_str.as_bytes()).await?;
                                    stdout.write_all(b"\n").await?;
                                    stdout.flush().await?;
                                }
                            }
                        } else {
                            match serde_json::from_value::<JsonRpcNotification>(value) {
                                Ok(notification) => {
                                    handler.handle_notification(notification).await;
                                }
                                Err(e) => {
                                    error!("Invalid notification: {}", e);
                                }
                            }
                        }
                    }
                    Err(e) => {
                        error!("Parse error: {}", e);
                        let error_response = JsonRpcResponse {
                            jsonrpc: "2.0".to_string(),
                            id: serde_json::Value::Null,
                            result: None,
                            error: Some(JsonRpcError {
                                code: PARSE_ERROR,
                                message: "Parse error".to_string(),
                                data: None,
                            }),
                        };
                        let response_str = serde_json::to_string(&error_response)?;
                        stdout.write_all(response_str.as_bytes()).await?;
                        stdout.write_all(b"\n").await?;
                        stdout.flush().await?;
                    }
                }
            }
            Err(e) => {
                error!("Read error: {}", e);
                break;
            }
        }
    }

    info!("MCP adapter shutting down");
    Ok(())
}

fn print_help() {
    println!("scenebridge-mcp {}", env!("CARGO_PKG_VERSION"));
    println!("{}", env!("CARGO_PKG_DESCRIPTION"));
    println!();
    println!("USAGE:");
    println!("    scenebridge-mcp [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help           Print help information");
    println!("    -V, --version        Print version information");
    println!("        --host <ADDR>    Bridge host address (default: {})", DEFAULT_HOST);
    println!("    -p, --port <PORT>    Bridge host port (default: {})", DEFAULT_PORT);
    println!();
    println!("DESCRIPTION:");
    println!("    An MCP server that communicates via stdio (stdin/stdout) and");
    println!("    forwards each tool call to a running content tool's bridge");
    println!("    listener over local TCP.");
    println!();
    println!("    This adapter is designed to be spawned by MCP clients. The");
    println!("    bridge listener must be running inside the content tool; see");
    println!("    scenebridge-host for a standalone demo host.");
    println!();
    println!("ENVIRONMENT:");
    println!("    SCENEBRIDGE_HOST    Bridge host address (flags take precedence)");
    println!("    SCENEBRIDGE_PORT    Bridge host port (flags take precedence)");
    println!("    RUST_LOG            Set logging level (default: info)");
}
