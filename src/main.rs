//! Switchyard server binary.
//!
//! ```text
//! switchyard [--config switchyard.toml]
//!     → load + validate config
//!     → init logging / metrics
//!     → register modules, freeze the engine
//!     → serve until Ctrl+C
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use switchyard::config::{load_config, EngineConfig};
use switchyard::demo::DemoModule;
use switchyard::engine::EngineBuilder;
use switchyard::http::{shutdown_signal, HttpServer};
use switchyard::observability::{logging, metrics};
use switchyard::render::PlaceholderTemplates;

#[derive(Parser, Debug)]
#[command(name = "switchyard", version, about = "Declarative HTTP and JSON-RPC dispatch server")]
struct Cli {
    /// Path to a TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };

    logging::init_logging(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        "switchyard starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let engine = EngineBuilder::from_config(&config)
        .template_engine(PlaceholderTemplates)
        .register(&DemoModule, &["/admin"])?
        .build()?;
    tracing::info!(routes = engine.router().len(), "Engine ready");

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config, Arc::new(engine));
    server.run(listener, shutdown_signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
