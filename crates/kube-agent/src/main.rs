//! kube-agent binary
//!
//! ```bash
//! export AWS_BEARER_TOKEN_BEDROCK=...
//! kube-agent
//! ```

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use kube_agent::repl::{self, ExitReason};
use kube_agent::{AgentConfig, connect};

fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr so stdout carries only the conversation
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_ansi(false))
        .with(EnvFilter::from_default_env().add_directive("kube_agent=warn".parse()?))
        .init();

    let config = AgentConfig::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let code = runtime.block_on(run(config));
    // The stdin reader may still be parked on a blocking read.
    runtime.shutdown_background();
    code
}

async fn run(config: AgentConfig) -> anyhow::Result<ExitCode> {
    let mut out = io::stdout();
    writeln!(out, "\n🚀 Initializing Kubernetes kubectl agent...")?;

    let mut session = match connect(&config).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, "initialization failed");
            writeln!(out, "\n❌ Failed to initialize kubectl agent: {e}")?;
            writeln!(out, "\n🔧 Troubleshooting:")?;
            writeln!(out, "   1. Ensure the tool server ({}) is installed and on PATH", config.server)?;
            writeln!(out, "   2. Verify kubectl is installed and configured")?;
            writeln!(out, "   3. Check that AWS_BEARER_TOKEN_BEDROCK grants Bedrock access")?;
            return Ok(ExitCode::FAILURE);
        }
    };

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let stdin = BufReader::new(tokio::io::stdin());
    match repl::run_session(&mut session, stdin, &mut out, &cancel).await? {
        ExitReason::Fatal(e) => {
            tracing::error!(error = %e, "session ended on error");
            Ok(ExitCode::FAILURE)
        }
        ExitReason::Exit | ExitReason::Interrupted | ExitReason::Eof => Ok(ExitCode::SUCCESS),
    }
}
