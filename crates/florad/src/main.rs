//! florad — Flower federated-learning stacks on SLURM clusters.
//!
//! Single binary that can run in three modes:
//!
//! - **serve** — the long-lived coordinator on the cluster access node
//!   (REST API, batch-job submission, reverse-proxy control)
//! - **server-agent** — launched by the scheduler on the first allocated
//!   node; supervises superlink + superexec
//! - **client-agent** — launched on each remaining node; supervises
//!   supernode + superexec against the server's fleet endpoint
//!
//! # Usage
//!
//! ```text
//! florad serve --host 0.0.0.0 --port 8080
//! florad server-agent --api-server http://login01:8080
//! florad client-agent --api-server http://login01:8080
//! ```

mod agent_mode;
mod coordinator;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "florad", about = "Flower stack orchestration on SLURM", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the coordinator HTTP server.
    Serve {
        /// Bind host (default 0.0.0.0, or [server].host from florad.toml).
        #[arg(long)]
        host: Option<String>,

        /// Bind port (default 8080, or [server].port from florad.toml).
        #[arg(long)]
        port: Option<u16>,

        /// Externally reachable base URL handed to agents
        /// (default http://<host>:<port>).
        #[arg(long)]
        advertise: Option<String>,
    },

    /// Run the server-role agent on an allocated node.
    ServerAgent {
        /// Coordinator base URL (overrides FLORAD_API_SERVER).
        #[arg(long)]
        api_server: Option<String>,
    },

    /// Run a client-role agent on an allocated node.
    ClientAgent {
        /// Coordinator base URL (overrides FLORAD_API_SERVER).
        #[arg(long)]
        api_server: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,florad=debug,floragrid=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            host,
            port,
            advertise,
        } => coordinator::run_serve(host, port, advertise).await,
        Command::ServerAgent { api_server } => agent_mode::run_server_agent(api_server).await,
        Command::ClientAgent { api_server } => agent_mode::run_client_agent(api_server).await,
    }
}
