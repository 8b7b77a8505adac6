//! Coordinator mode — the long-lived control plane on the access node.

use std::sync::Arc;

use tracing::{info, warn};

use flora_core::{FloradConfig, Layout};
use floragrid_api::{build_router, ApiState};
use floragrid_proxy::CaddyController;
use floragrid_slurm::SlurmClient;
use floragrid_state::StackStore;

pub async fn run_serve(
    host: Option<String>,
    port: Option<u16>,
    advertise: Option<String>,
) -> anyhow::Result<()> {
    info!("florad starting in coordinator mode");

    let layout = Layout::discover()?;
    layout.ensure()?;
    info!(root = %layout.root().display(), "layout ready");

    let config = FloradConfig::load_or_default(&layout.config_file())?;
    let server_config = config.server.unwrap_or_default();
    let host = host
        .or(server_config.host)
        .unwrap_or_else(|| "0.0.0.0".to_string());
    let port = port.or(server_config.port).unwrap_or(8080);
    let advertise = advertise
        .or(server_config.advertise_url)
        .unwrap_or_else(|| format!("http://{host}:{port}"));

    // Scheduler probe — absence is degraded mode, not fatal: health and
    // monitoring keep working, spin-up fails until the tools appear.
    let slurm = SlurmClient::new();
    match slurm.availability() {
        Ok(()) => info!("SLURM cluster detected"),
        Err(e) => warn!(error = %e, "scheduler not detected"),
    }

    let proxy = Arc::new(CaddyController::new(layout.caddy_bin(), layout.caddyfile()));
    proxy.ensure_caddyfile()?;
    if let Err(e) = proxy.ensure_started() {
        warn!(error = %e, "reverse proxy unavailable; external exposure disabled");
    }

    let state = ApiState {
        store: StackStore::new(),
        slurm,
        proxy,
        layout: Arc::new(layout),
        base_url: advertise.clone(),
    };
    let router = build_router(state);

    info!(%host, port, %advertise, "coordinator API starting");
    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            info!("shutdown signal received");
        })
        .await?;

    info!("coordinator stopped");
    Ok(())
}
