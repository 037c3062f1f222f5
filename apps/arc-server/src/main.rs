#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Gateway server: loads configuration, picks the credential store and serves
//! until Ctrl-C.
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use api_gateway::Gateway;
use clap::{Parser, ValueEnum};
use credential_store_sdk::CredentialStore;
use es_store_plugin::ElasticsearchStore;
use static_store_plugin::StaticStore;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod config;

use config::ServerConfig;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "arc-server", version, about = "Multi-tenant search gateway")]
struct Cli {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init(),
    }
}

fn credential_store(config: &ServerConfig) -> Result<Arc<dyn CredentialStore>> {
    if let Some(seed) = &config.static_store {
        tracing::warn!(
            tenants = seed.tenants.len(),
            "serving credentials from memory; changes are lost on restart"
        );
        return Ok(Arc::new(StaticStore::from_config(seed)));
    }
    let store = ElasticsearchStore::new(config.es_store())
        .context("failed to build elasticsearch credential store")?;
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let config = ServerConfig::load(cli.config.as_deref())?;
    tracing::info!(
        bind_addr = %config.gateway.bind_addr,
        multi_tenant = config.gateway.multi_tenant,
        backend = ?config.gateway.backend,
        "configuration loaded"
    );

    let store = credential_store(&config)?;
    let gateway = Gateway::new(config.gateway, store)?;

    let cancel = CancellationToken::new();
    let sync = tokio::spawn(Arc::new(gateway.sync_engine()).run(cancel.child_token()));

    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl-C");
            return;
        }
        tracing::info!("shutdown signal received");
        on_signal.cancel();
    });

    let served = gateway.serve(cancel.clone()).await;
    cancel.cancel();
    if let Err(err) = sync.await {
        tracing::warn!(error = %err, "cache sync task ended abnormally");
    }
    served
}
