//! plinthd — the Plinth host daemon.
//!
//! Single binary that assembles the host: the TCP acceptor, the
//! managed pipeline, and the built-in hello application.
//!
//! # Usage
//!
//! ```text
//! plinthd serve --port 9091
//! ```

mod hello;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use plinth_server::{Acceptor, ServerConfig};

use crate::hello::HelloFactory;

#[derive(Parser)]
#[command(name = "plinthd", about = "Plinth host daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the built-in hello application over TCP.
    Serve {
        /// Config file (TOML). Flags override its values.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Host name to resolve for the listen address.
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on.
        #[arg(long)]
        port: Option<u16>,

        /// Seconds to wait for a handler before answering 400.
        #[arg(long)]
        dispatch_timeout: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,plinthd=debug,plinth_server=debug,plinth_pipeline=debug"
                    .parse()
                    .unwrap()
            }),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            host,
            port,
            dispatch_timeout,
        } => run_serve(config, host, port, dispatch_timeout).await,
    }
}

async fn run_serve(
    config_path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    dispatch_timeout: Option<u64>,
) -> anyhow::Result<()> {
    let mut config = match config_path {
        Some(path) => ServerConfig::from_file(&path)?,
        None => ServerConfig::default(),
    };
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(secs) = dispatch_timeout {
        config.dispatch_timeout_secs = secs;
    }

    info!(host = %config.host, port = config.port, "plinth host starting");

    let acceptor = Acceptor::bind(config).await?;

    // Graceful shutdown on Ctrl-C.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    acceptor.run(Arc::new(HelloFactory), shutdown_rx).await?;

    info!("plinth host stopped");
    Ok(())
}
