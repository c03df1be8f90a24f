// Demo host: a scenebridge listener in front of an in-memory scene. Real
// deployments embed scenebridge-host inside the content tool and drive the
// executor from the tool's own main loop; this binary stands in for one so
// the full stack can be run and poked end to end.

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use scenebridge_host::handlers::default_registry;
use scenebridge_host::listener::{BridgeListener, ListenerConfig};
use scenebridge_host::registry::{Capability, StaticCapabilities};
use scenebridge_host::scene::SceneStore;
use scenebridge_host::scheduler;
use scenebridge_protocol::{DEFAULT_HOST, DEFAULT_PORT};

fn main() -> Result<()> {
    // Env first, flags override.
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
    let mut capabilities = Vec::new();

    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--version" | "-V" => {
                println!("scenebridge-host {}", env!("CARGO_PKG_VERSION"));
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
            "--enable-asset-library" => {
                capabilities.push(Capability::AssetLibrary);
                i += 1;
            }
            "--enable-mesh-generation" => {
                capabilities.push(Capability::MeshGeneration);
                i += 1;
            }
            "--enable-model-marketplace" => {
                capabilities.push(Capability::ModelMarketplace);
                i += 1;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                eprintln!("Try 'scenebridge-host --help' for more information.");
                std::process::exit(1);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("scenebridge_host=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting scenebridge demo host...");

    let policy = Arc::new(StaticCapabilities::new(capabilities));
    // No script engine in the demo host; execute_code reports as much.
    let registry = default_registry(policy, None);
    let (sched, executor) = scheduler::channel(registry, SceneStore::demo());

    let config = ListenerConfig {
        host,
        port,
        ..ListenerConfig::default()
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let listener = runtime.block_on(BridgeListener::bind(&config, sched))?;
    runtime.spawn(async move {
        if let Err(e) = listener.serve().await {
            error!("Listener stopped: {}", e);
        }
    });

    // The process main thread plays the host application's main loop: it is
    // the one place commands execute.
    info!("Executor running on the main thread");
    executor.run();
    Ok(())
}

fn print_help() {
    println!("scenebridge-host {}", env!("CARGO_PKG_VERSION"));
    println!("Demo host exposing an in-memory scene over the scenebridge socket protocol.");
    println!();
    println!("USAGE:");
    println!("    scenebridge-host [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help                   Print help information");
    println!("    -V, --version                Print version information");
    println!("        --host <ADDR>            Address to bind (default: {})", DEFAULT_HOST);
    println!("    -p, --port <PORT>            Port to bind (default: {})", DEFAULT_PORT);
    println!("        --enable-asset-library   Enable the asset library commands");
    println!("        --enable-mesh-generation Enable the mesh generation commands");
    println!("        --enable-model-marketplace");
    println!("                                 Enable the marketplace commands");
    println!();
    println!("ENVIRONMENT:");
    println!("    SCENEBRIDGE_HOST    Address to bind (flags take precedence)");
    println!("    SCENEBRIDGE_PORT    Port to bind (flags take precedence)");
    println!("    RUST_LOG            Set logging level (default: info)");
}
