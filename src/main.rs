use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dotenvy::Error as DotenvError;
use rmcp::transport::stdio;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ddmon::app::AppContext;
use ddmon::backend::DatadogClient;
use ddmon::{config, server};

#[derive(Debug, Parser)]
#[command(author, version, about = "ddmon: Datadog alert analysis tools over stdio")]
struct Cli {
    /// Path to YAML configuration file. Defaults to env DDMON_CONFIG or built-in defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    let cli = Cli::parse();

    let config = config::load_config(cli.config.as_deref())?;
    let client = DatadogClient::new(&config.datadog_settings())
        .context("failed to build Datadog client")?;
    info!(api = client.v1_base(), "datadog client ready");

    let ctx = AppContext::new(config, Arc::new(client));

    tokio::select! {
        result = server::serve(ctx, stdio()) => {
            if let Err(err) = &result {
                error!(error = ?err, "server terminated with error");
            }
            result?;
        }
        _ = shutdown_signal() => {}
    }

    info!("ddmon stopped");
    Ok(())
}

fn load_env() {
    if let Err(err) = dotenvy::dotenv() {
        match err {
            DotenvError::Io(io_err) if io_err.kind() == ErrorKind::NotFound => {}
            other => eprintln!("warning: failed to load .env file: {other}"),
        }
    }
}

// stdout carries the protocol, so logs go to stderr.
fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ddmon=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .compact()
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
