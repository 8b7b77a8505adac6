//! Domain types for the Flower stack and the wire bodies shared between the
//! coordinator and the agents.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Stack ──────────────────────────────────────────────────────────

/// One coordinated deployment: one server role plus N client roles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlowerStack {
    /// Opaque id returned by the batch scheduler.
    pub job_id: String,
    pub status: StackStatus,
    /// Requested client-node count.
    pub num_nodes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_node: Option<ServerNode>,
    pub client_nodes: HashMap<String, ClientNode>,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,
    /// 1 server + N clients; fixed at spin-up.
    pub expected_nodes: u32,
    /// Number of descriptors currently in `ready` state.
    pub completed_nodes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackStatus {
    Pending,
    Starting,
    Running,
    Stopped,
    Failed,
}

impl StackStatus {
    /// A stack in one of these states blocks a new spin-up.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Starting | Self::Running)
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        })
    }
}

// ── Nodes ──────────────────────────────────────────────────────────

/// The server role: superlink + serverapp superexec on the first node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerNode {
    pub node_id: String,
    /// Address reachable from inside the allocation.
    pub ip: String,
    pub server_app_io_api_port: u16,
    pub fleet_api_port: u16,
    /// Authoritative for the external proxy route; otherwise opaque.
    pub control_api_port: u16,
    pub status: ServerStatus,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerStatus {
    Starting,
    Ready,
    Failed,
}

/// A client role: supernode + clientapp superexec on a worker node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientNode {
    pub node_id: String,
    pub ip: String,
    pub status: ClientStatus,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Waiting,
    Starting,
    Ready,
    Failed,
}

// ── Wire bodies ────────────────────────────────────────────────────

/// Body of `POST /api/flower/server`, sent by the server agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterServerRequest {
    pub ip: String,
    pub server_app_io_api_port: u16,
    pub fleet_api_port: u16,
    pub control_api_port: u16,
}

/// Body of `POST /api/flower/client`, sent by a client agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterClientRequest {
    pub ip: String,
    pub port: u16,
}

impl ServerNode {
    /// Descriptor for a server that has just announced itself ready.
    pub fn ready(req: &RegisterServerRequest) -> Self {
        Self {
            node_id: format!("server-{}", req.ip),
            ip: req.ip.clone(),
            server_app_io_api_port: req.server_app_io_api_port,
            fleet_api_port: req.fleet_api_port,
            control_api_port: req.control_api_port,
            status: ServerStatus::Ready,
            started_at: Utc::now(),
        }
    }
}

impl ClientNode {
    /// Descriptor for a client that has just announced itself ready.
    pub fn ready(ip: &str) -> Self {
        Self {
            node_id: format!("client-{ip}"),
            ip: ip.to_string(),
            status: ClientStatus::Ready,
            started_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&StackStatus::Pending).unwrap(), "\"pending\"");
        assert_eq!(serde_json::to_string(&ServerStatus::Ready).unwrap(), "\"ready\"");
        assert_eq!(serde_json::to_string(&ClientStatus::Waiting).unwrap(), "\"waiting\"");
    }

    #[test]
    fn node_ids_derive_from_the_address() {
        let server = ServerNode::ready(&RegisterServerRequest {
            ip: "10.0.0.1".to_string(),
            server_app_io_api_port: 9091,
            fleet_api_port: 9092,
            control_api_port: 9093,
        });
        assert_eq!(server.node_id, "server-10.0.0.1");
        assert_eq!(server.status, ServerStatus::Ready);

        let client = ClientNode::ready("10.0.0.2");
        assert_eq!(client.node_id, "client-10.0.0.2");
        assert_eq!(client.status, ClientStatus::Ready);
    }
}
