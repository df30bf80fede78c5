//! EMP Monitoring Client
//!
//! Read-only monitor for an expiring multi-party position contract.
//! Features:
//! - Periodic full-state refresh of sponsors, positions and liquidations
//! - Atomic snapshot publication, readers never block on RPC
//! - Last-known-good snapshot kept across failed refresh cycles

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use emp_client_chain::AlloyGateway;
use emp_client_core::{fixed_point, ClientConfig, EmpClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Print startup banner
    print_banner();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,emp_client_core=debug,emp_client_chain=debug")),
        )
        .init();

    // EMP_CONFIG selects a TOML file, otherwise EMP_* variables are used
    let config = ClientConfig::from_env().context("Failed to load client configuration")?;
    config.log_config();

    let client = initialize_client(&config).await?;
    client.start();

    info!("Monitoring started, press Ctrl-C to stop");

    let mut summary = tokio::time::interval(config.poll_interval());
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for shutdown signal")?;
                info!("Shutdown signal received");
                break;
            }
            _ = summary.tick() => log_summary(&client),
        }
    }

    client.shutdown().await;
    info!("EMP client stopped");

    Ok(())
}

async fn initialize_client(config: &ClientConfig) -> Result<EmpClient> {
    info!("Initializing components...");

    let address = config.contract_address()?;

    let gateway = AlloyGateway::connect(&config.rpc_url, address)
        .await
        .with_context(|| format!("Failed to connect to {}", config.rpc_url))?
        .with_log_chunk_size(config.log_chunk_size);

    info!(emp = %address, "Gateway initialized");

    Ok(EmpClient::new(Arc::new(gateway), config))
}

fn log_summary(client: &EmpClient) {
    let Some(updated_at) = client.last_update_time() else {
        debug!("Waiting for first snapshot");
        return;
    };

    let snapshot = client.snapshot();
    info!(
        updated_at = updated_at,
        sponsors = snapshot.sponsors.len(),
        open_positions = snapshot.positions.len(),
        undisputed_liquidations = snapshot.undisputed_liquidations.len(),
        collateral_requirement =
            fixed_point::to_f64(snapshot.risk_parameters.collateral_requirement),
        liveness_secs = snapshot.risk_parameters.liquidation_liveness,
        "EMP snapshot summary"
    );
}

/// Print startup banner.
fn print_banner() {
    println!(
        r#"
    ╔═╗╔╦╗╔═╗  ╔╦╗┌─┐┌┐┌┬┌┬┐┌─┐┬─┐
    ║╣ ║║║╠═╝  ║║║│ │││││ │ │ │├┬┘
    ╚═╝╩ ╩╩    ╩ ╩└─┘┘└┘┴ ┴ └─┘┴└─
    EMP Monitoring Client v0.1.0
    "#
    );
}
