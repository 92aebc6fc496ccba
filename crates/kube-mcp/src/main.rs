//! kube-mcp binary
//!
//! Reads JSON-RPC requests from stdin and writes responses to stdout, one
//! JSON object per line:
//!
//! ```bash
//! echo '{"jsonrpc":"2.0","id":1,"method":"tools/list"}' | kube-mcp
//! ```

use std::io;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use kube_mcp::{Args, ServerConfig, ToolServer, serve_stdio};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout is clean for JSON-RPC
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_ansi(false))
        .with(EnvFilter::from_default_env().add_directive("kube_mcp=info".parse()?))
        .init();

    let config = ServerConfig::from(Args::parse());
    tracing::info!(
        kubectl = %config.kubectl.display(),
        command_timeout_secs = config.command_timeout.as_secs(),
        context_timeout_secs = config.context_timeout.as_secs(),
        "kube-mcp starting"
    );

    serve_stdio(&ToolServer::new(config)).await?;

    tracing::info!("kube-mcp shutting down");
    Ok(())
}
