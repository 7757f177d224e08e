mod amount;
mod config;
mod contract;
mod flows;
mod http;
mod models;
mod ownership;
mod resolver;
mod rpc;
mod state;

use std::sync::Arc;

use crate::config::ApiConfig;
use crate::contract::ShagunContract;
use crate::resolver::BasescanResolver;
use crate::rpc::RpcClient;
use crate::state::{AppState, FlowSettings, OwnershipSessions};
use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = ApiConfig::load().context("Failed to load configuration")?;

    let rpc_client = RpcClient::new(&config.chain.rpc_url, config.chain.request_timeout())
        .context("Failed to initialize RPC client")?;
    let contract_address = config
        .chain
        .contract_address()
        .context("Invalid contract address")?;
    let rpc_timeout = rpc_client.timeout();
    let contract = ShagunContract::new(rpc_client, contract_address);
    info!(
        contract = %contract.address(),
        rpc = %config.chain.rpc_url,
        timeout = ?rpc_timeout,
        "Using Shagun contract"
    );

    let resolver =
        BasescanResolver::new(&config.resolver).context("Failed to initialize name resolver")?;
    let settings = FlowSettings::from_config(&config).context("Invalid distribution settings")?;
    let sessions = Arc::new(OwnershipSessions::new(&config.sessions));
    let app_state = AppState::new(Arc::new(contract), Arc::new(resolver), sessions, settings);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let listener = TcpListener::bind(config.server.address())
        .await
        .context("Failed to bind HTTP listener")?;
    let local_addr = listener
        .local_addr()
        .context("Failed to obtain listener address")?;
    info!("Shagun API listening on {local_addr}");

    tokio::spawn(shutdown_signal(shutdown_tx));

    let router: Router = http::router(app_state);
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_rx.changed().await.ok();
        })
        .await
        .context("HTTP server exited with error")?;

    info!("Shagun API stopped");
    Ok(())
}

fn init_tracing() {
    let default_filter = "info";
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    assert!(!filter.is_empty(), "Tracing filter must not be empty");
    assert!(filter.len() < 256, "Tracing filter length exceeds bounds");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .compact()
        .init();
}

async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {err}");
        return;
    }
    shutdown_tx.send(true).ok();
    info!("Shutdown signal dispatched");
}
