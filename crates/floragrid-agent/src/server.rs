//! Server role: superlink + serverapp superexec on the first allocated node.

use floragrid_state::RegisterServerRequest;

use crate::error::AgentError;
use crate::role::{env_port, AgentContext, AgentRole, LaunchPlan, Registration};
use crate::supervisor::DaemonSpec;

/// Port-override environment variables honoured by the server agent.
pub const SERVER_APP_IO_PORT_ENV: &str = "FLOWER_SERVER_APP_IO_API_PORT";
pub const FLEET_PORT_ENV: &str = "FLOWER_FLEET_API_PORT";
pub const CONTROL_PORT_ENV: &str = "FLOWER_CONTROL_API_PORT";

const DEFAULT_SERVER_APP_IO_PORT: u16 = 9091;
const DEFAULT_FLEET_PORT: u16 = 9092;
const DEFAULT_CONTROL_PORT: u16 = 9093;

#[derive(Debug, Clone, Copy, Default)]
pub struct ServerRole;

impl AgentRole for ServerRole {
    fn name(&self) -> &'static str {
        "server-agent"
    }

    async fn plan(&self, ctx: &AgentContext) -> Result<LaunchPlan, AgentError> {
        let server_app_io_port = env_port(SERVER_APP_IO_PORT_ENV, DEFAULT_SERVER_APP_IO_PORT);
        let fleet_port = env_port(FLEET_PORT_ENV, DEFAULT_FLEET_PORT);
        let control_port = env_port(CONTROL_PORT_ENV, DEFAULT_CONTROL_PORT);

        let logs = ctx.layout.job_logs_dir(&ctx.job_id);
        let link = DaemonSpec {
            name: "flower-superlink".to_string(),
            program: ctx.layout.flower_daemon("flower-superlink"),
            args: vec![
                "--insecure".to_string(),
                "--isolation".to_string(),
                "process".to_string(),
            ],
            log_path: logs.join("flower-superlink.log"),
        };
        let exec = DaemonSpec {
            name: "flower-superexec".to_string(),
            program: ctx.layout.flower_daemon("flower-superexec"),
            args: vec![
                "--insecure".to_string(),
                "--plugin-type=serverapp".to_string(),
                format!("--appio-api-address={}:{}", ctx.address, server_app_io_port),
            ],
            log_path: logs.join("flower-superexec-server.log"),
        };
        let registration = Registration::Server(RegisterServerRequest {
            ip: ctx.address.clone(),
            server_app_io_api_port: server_app_io_port,
            fleet_api_port: fleet_port,
            control_api_port: control_port,
        });

        Ok(LaunchPlan {
            link,
            exec,
            registration,
        })
    }
}
