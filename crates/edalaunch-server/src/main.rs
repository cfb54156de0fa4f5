//! EDA launcher server.
//!
//! Configuration comes from `EDALAUNCH_*` environment variables; see
//! `LauncherConfig::from_env`.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

use edalaunch_bridge::{BridgePolicy, BridgeShell, ShellBridge};
use edalaunch_kernel::{BridgeMode, LauncherConfig};
use edalaunch_runtime::{build_router, seed_reference_data, startup_health_check, LauncherApiState};

fn build_bridge(config: &LauncherConfig) -> ShellBridge {
    let shell = match config.bridge_mode {
        BridgeMode::Wsl => BridgeShell::wsl(),
        BridgeMode::Native => BridgeShell::native(),
    };
    let policy = BridgePolicy {
        max_output_bytes: config.max_output_bytes,
        ..BridgePolicy::launcher_default()
    };
    ShellBridge::new(shell, policy)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,edalaunch_runtime=info,edalaunch_server=info")
        }))
        .init();

    let config = LauncherConfig::from_env().map_err(|e| anyhow!(e))?;
    let repo = startup_health_check(&config)
        .await
        .map_err(|e| anyhow!("startup health check failed: {}", e))?;
    let seeded = seed_reference_data(&repo)?;
    tracing::info!(
        "reference_data_seeded templates_inserted={} themes_inserted={} tools={}",
        seeded.templates_inserted,
        seeded.themes_inserted,
        seeded.tools
    );

    let bridge = build_bridge(&config);
    tracing::info!(
        "bridge_selected program={} timeout_secs={} diagnostics={:?}",
        bridge.shell().program,
        config.tool_timeout.as_secs(),
        config.diagnostics_policy
    );

    let addr = config.server_addr.clone();
    let state = LauncherApiState::new(Arc::new(repo), Arc::new(bridge), Arc::new(config));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("edalaunch server listening on http://{}", addr);
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
