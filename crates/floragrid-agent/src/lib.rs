//! floragrid-agent — per-node supervisor for the Flower daemons.
//!
//! The batch scheduler launches one agent per allocated node: a server agent
//! on the first node, a client agent on each of the rest. Both roles share
//! one skeleton — resolve the local address, build a launch plan, start the
//! two daemons with a quiescence gap, register with the coordinator, then
//! supervise until the first daemon exits. The roles differ only in their
//! port set, daemon launch plan and registration payload.
//!
//! Agents recover from nothing: any abnormal condition becomes a process
//! exit, and recovery is left to the scheduler and the operator.

mod client;
mod coordinator;
mod error;
mod role;
mod server;
mod supervisor;

pub use client::ClientRole;
pub use coordinator::CoordinatorClient;
pub use error::AgentError;
pub use role::{run, AgentContext, AgentRole, LaunchPlan, Registration, DAEMON_QUIESCENCE};
pub use server::ServerRole;
pub use supervisor::{exit_code, spawn_daemon, supervise, DaemonSpec, RunningDaemon};
