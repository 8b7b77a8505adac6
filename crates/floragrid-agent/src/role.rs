//! The agent skeleton shared by the server and client roles.

use std::time::Duration;

use tokio::net::lookup_host;
use tracing::{error, info, warn};

use flora_core::{Layout, API_SERVER_ENV};
use floragrid_state::{RegisterClientRequest, RegisterServerRequest};

use crate::coordinator::CoordinatorClient;
use crate::error::AgentError;
use crate::supervisor::{exit_code, spawn_daemon, supervise, DaemonSpec};

/// Gap between starting the link daemon and the exec daemon, giving the
/// first daemon's listening socket time to appear.
pub const DAEMON_QUIESCENCE: Duration = Duration::from_secs(5);

/// Everything a role needs to produce its launch plan.
pub struct AgentContext {
    /// Address reachable from inside the allocation.
    pub address: String,
    pub coordinator: CoordinatorClient,
    pub layout: Layout,
    /// Scheduler job id, `local` outside an allocation; names the log dir.
    pub job_id: String,
}

/// Registration payload, by role.
pub enum Registration {
    Server(RegisterServerRequest),
    Client(RegisterClientRequest),
}

/// Role-specific outcome of the bootstrap: what to run and how to announce it.
pub struct LaunchPlan {
    /// Transport daemon, started first.
    pub link: DaemonSpec,
    /// Plugin-exec daemon, started after the quiescence gap.
    pub exec: DaemonSpec,
    pub registration: Registration,
}

/// A node role. Server and client differ only in their port set, daemon
/// launch plan and registration payload.
#[allow(async_fn_in_trait)]
pub trait AgentRole {
    fn name(&self) -> &'static str;

    /// Build the launch plan. The client role blocks in here until the
    /// server descriptor is published.
    async fn plan(&self, ctx: &AgentContext) -> Result<LaunchPlan, AgentError>;
}

/// Shared agent bootstrap: resolve the local address, build the role's
/// plan, start both daemons, register with the coordinator, then supervise.
/// Returns the process exit code.
pub async fn run<R: AgentRole>(
    role: R,
    api_server: Option<String>,
    layout: Layout,
    quiescence: Duration,
) -> Result<i32, AgentError> {
    let base_url = api_server
        .or_else(|| std::env::var(API_SERVER_ENV).ok())
        .filter(|url| !url.is_empty())
        .ok_or(AgentError::MissingApiServer)?;

    let address = resolve_local_address().await;
    let job_id = std::env::var("SLURM_JOB_ID").unwrap_or_else(|_| "local".to_string());
    info!(role = role.name(), %address, %base_url, %job_id, "agent starting");

    let ctx = AgentContext {
        address,
        coordinator: CoordinatorClient::new(&base_url)?,
        layout,
        job_id,
    };

    let plan = role.plan(&ctx).await?;

    let link = spawn_daemon(&plan.link)?;
    tokio::time::sleep(quiescence).await;
    let exec = spawn_daemon(&plan.exec)?;

    match &plan.registration {
        Registration::Server(req) => ctx.coordinator.register_server(req).await?,
        Registration::Client(req) => ctx.coordinator.register_client(req).await?,
    }
    info!(role = role.name(), "registered with coordinator");

    let (name, status) = supervise(link, exec).await;
    let code = exit_code(&status);
    match &status {
        Ok(s) if s.success() => warn!(daemon = %name, "daemon exited"),
        Ok(s) => error!(daemon = %name, code = ?s.code(), "daemon exited with failure"),
        Err(e) => error!(daemon = %name, error = %e, "daemon wait failed"),
    }
    Ok(code)
}

/// Resolve the local hostname to an address reachable inside the
/// allocation; fall back to the raw hostname, which compute nodes resolve
/// among themselves.
pub async fn resolve_local_address() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "127.0.0.1".to_string());
    let resolved = lookup_host((host.as_str(), 0u16))
        .await
        .ok()
        .and_then(|mut addrs| addrs.next())
        .map(|addr| addr.ip().to_string());
    match resolved {
        Some(addr) => addr,
        None => host,
    }
}

/// Port override from the environment, with a default.
pub(crate) fn env_port(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
