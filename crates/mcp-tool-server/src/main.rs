//! mcp-tool-server
//!
//! Reference MCP tool server. Speaks newline-delimited JSON-RPC 2.0 on
//! stdin/stdout; stdout carries protocol messages only, so all logging goes
//! to stderr.

mod config;
mod error;
mod server;
mod tool;
mod tools;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ToolServerConfig;
use crate::server::McpServer;
use crate::tools::default_registry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing (stderr only)
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_ansi(false))
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = ToolServerConfig::from_env();
    let registry = default_registry(&config);

    tracing::info!("Registered {} tools:", registry.len());
    for name in registry.names() {
        tracing::info!("  • {}", name);
    }
    tracing::info!("read_file root: {}", config.root.display());

    McpServer::new(registry)
        .serve(tokio::io::stdin(), tokio::io::stdout())
        .await?;

    Ok(())
}
