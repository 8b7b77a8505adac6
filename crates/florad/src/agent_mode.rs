//! Agent modes — per-node supervisors launched by the batch scheduler.

use tracing::{error, info};

use flora_core::Layout;
use floragrid_agent::{run, AgentError, ClientRole, ServerRole, DAEMON_QUIESCENCE};

pub async fn run_server_agent(api_server: Option<String>) -> anyhow::Result<()> {
    info!("florad starting in server-agent mode");
    let layout = Layout::discover()?;
    finish(run(ServerRole, api_server, layout, DAEMON_QUIESCENCE).await)
}

pub async fn run_client_agent(api_server: Option<String>) -> anyhow::Result<()> {
    info!("florad starting in client-agent mode");
    let layout = Layout::discover()?;
    finish(run(ClientRole::default(), api_server, layout, DAEMON_QUIESCENCE).await)
}

/// Agents exit with the supervised child's status; any bootstrap failure is
/// fatal and non-zero.
fn finish(outcome: Result<i32, AgentError>) -> anyhow::Result<()> {
    match outcome {
        Ok(0) => Ok(()),
        Ok(code) => {
            error!(code, "supervised daemon failed");
            std::process::exit(code);
        }
        Err(e) => Err(e.into()),
    }
}
