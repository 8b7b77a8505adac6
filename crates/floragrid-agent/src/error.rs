//! Error types for the agent bootstrap.

use std::time::Duration;

use thiserror::Error;

/// Errors that abort an agent before or during supervision. All of them are
/// fatal: the agent exits non-zero and the scheduler records the failure.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("coordinator URL not set (use --api-server or FLORAD_API_SERVER)")]
    MissingApiServer,

    #[error("no home directory to root the layout in")]
    NoHomeDir,

    #[error("timed out after {0:?} waiting for the server node")]
    ServerWaitTimeout(Duration),

    #[error("failed to start {daemon}: {source}")]
    DaemonSpawn {
        daemon: String,
        source: std::io::Error,
    },

    #[error("registration rejected with status {status}: {body}")]
    RegistrationRejected { status: u16, body: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
