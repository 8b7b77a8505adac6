//! Client role: supernode + clientapp superexec, started against the
//! server's fleet endpoint once the coordinator publishes it.

use std::time::Duration;

use tracing::info;

use floragrid_state::RegisterClientRequest;

use crate::error::AgentError;
use crate::role::{env_port, AgentContext, AgentRole, LaunchPlan, Registration};
use crate::supervisor::DaemonSpec;

/// Port-override environment variable honoured by the client agent.
pub const CLIENT_APP_IO_PORT_ENV: &str = "FLOWER_CLIENT_APP_IO_API_PORT";

const DEFAULT_CLIENT_APP_IO_PORT: u16 = 9094;

/// How often the coordinator is polled for the server descriptor.
const SERVER_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Hard deadline on the server rendezvous.
const SERVER_WAIT_DEADLINE: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy)]
pub struct ClientRole {
    poll_interval: Duration,
    wait_deadline: Duration,
}

impl Default for ClientRole {
    fn default() -> Self {
        Self {
            poll_interval: SERVER_POLL_INTERVAL,
            wait_deadline: SERVER_WAIT_DEADLINE,
        }
    }
}

impl ClientRole {
    /// Custom rendezvous pacing (tests shorten both).
    pub fn with_rendezvous(poll_interval: Duration, wait_deadline: Duration) -> Self {
        Self {
            poll_interval,
            wait_deadline,
        }
    }
}

impl AgentRole for ClientRole {
    fn name(&self) -> &'static str {
        "client-agent"
    }

    async fn plan(&self, ctx: &AgentContext) -> Result<LaunchPlan, AgentError> {
        info!("waiting for the server node to be ready");
        let server = ctx
            .coordinator
            .wait_for_server(self.poll_interval, self.wait_deadline)
            .await?;
        info!(
            server_ip = %server.ip,
            fleet_port = server.fleet_api_port,
            "server node ready"
        );

        let port = env_port(CLIENT_APP_IO_PORT_ENV, DEFAULT_CLIENT_APP_IO_PORT);
        let logs = ctx.layout.job_logs_dir(&ctx.job_id);
        let link = DaemonSpec {
            name: "flower-supernode".to_string(),
            program: ctx.layout.flower_daemon("flower-supernode"),
            args: vec![
                "--insecure".to_string(),
                format!("--superlink={}:{}", server.ip, server.fleet_api_port),
            ],
            log_path: logs.join(format!("flower-supernode-{}.log", ctx.address)),
        };
        let exec = DaemonSpec {
            name: "flower-superexec".to_string(),
            program: ctx.layout.flower_daemon("flower-superexec"),
            args: vec![
                "--insecure".to_string(),
                "--plugin-type=clientapp".to_string(),
                format!("--grpc-address={}:{}", ctx.address, port),
            ],
            log_path: logs.join(format!("flower-superexec-client-{}.log", ctx.address)),
        };
        let registration = Registration::Client(RegisterClientRequest {
            ip: ctx.address.clone(),
            port,
        });

        Ok(LaunchPlan {
            link,
            exec,
            registration,
        })
    }
}
