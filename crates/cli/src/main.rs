//! release-relay entry point.
//!
//! Composition root: parses [`config::Args`], installs the `tracing`
//! subscriber, builds the GitHub and registry adapters, injects them into the
//! [`stages::PipelineExecutor`], and serves the webhook endpoint until
//! interrupted.

mod config;

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use github::GithubClient;
use pipeline::SignatureVerifier;
use registry::{FileCredentialStore, NpmRegistry};
use stages::{PipelineExecutor, Ports};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Args, LogFormat};

fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    }
    .map_err(|e| anyhow!("cannot install log subscriber: {e}"))
}

fn build_executor(args: &Args) -> Result<PipelineExecutor> {
    let config = args.pipeline_config()?;
    let github = Arc::new(GithubClient::new(args.github_config()?)?);
    let registry = NpmRegistry::new(args.registry_config()?)?;
    let ports = Ports {
        content: github.clone(),
        releases: github.clone(),
        assets: github,
        registry: Arc::new(registry),
        credentials: Arc::new(FileCredentialStore::new(&args.credentials_path)),
    };
    Ok(PipelineExecutor::new(
        config,
        SignatureVerifier::new(args.secret.as_str()),
        ports,
    ))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format)?;
    info!(config = ?args, "Starting release-relay");

    let executor = Arc::new(build_executor(&args).context("invalid configuration")?);
    let socket = TcpListener::bind(("0.0.0.0", args.port))
        .await
        .with_context(|| format!("cannot bind port {}", args.port))?;

    listener::serve(socket, executor, shutdown_signal())
        .await
        .context("webhook server failed")
}
