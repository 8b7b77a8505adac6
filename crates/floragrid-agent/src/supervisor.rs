//! Child-daemon supervision.
//!
//! Daemons are long-lived; the agent's job after bootstrap is to wait on a
//! first-to-exit rendezvous and propagate the exit status. Cancellation
//! comes from the scheduler's signal delivery, not from here.

use std::fs::File;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, Command};
use tracing::info;

use crate::error::AgentError;

/// One daemon to launch and supervise.
#[derive(Debug, Clone)]
pub struct DaemonSpec {
    /// Short name used in logs and error reporting.
    pub name: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    /// stdout and stderr both go here; one writer per file.
    pub log_path: PathBuf,
}

/// A started daemon.
pub struct RunningDaemon {
    pub name: String,
    child: Child,
}

/// Launch a daemon with its output redirected to the per-role log file.
pub fn spawn_daemon(spec: &DaemonSpec) -> Result<RunningDaemon, AgentError> {
    if let Some(parent) = spec.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log = File::create(&spec.log_path)?;
    let log_err = log.try_clone()?;

    let child = Command::new(&spec.program)
        .args(&spec.args)
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err))
        // The surviving sibling goes down with the supervisor.
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| AgentError::DaemonSpawn {
            daemon: spec.name.clone(),
            source,
        })?;

    info!(
        daemon = %spec.name,
        pid = child.id(),
        log = %spec.log_path.display(),
        "daemon started"
    );
    Ok(RunningDaemon {
        name: spec.name.clone(),
        child,
    })
}

/// Two-way rendezvous: resolves when either daemon exits, first wins.
pub async fn supervise(
    mut first: RunningDaemon,
    mut second: RunningDaemon,
) -> (String, std::io::Result<ExitStatus>) {
    tokio::select! {
        status = first.child.wait() => (first.name, status),
        status = second.child.wait() => (second.name, status),
    }
}

/// The agent's exit code for a supervision outcome.
pub fn exit_code(status: &std::io::Result<ExitStatus>) -> i32 {
    match status {
        Ok(s) if s.success() => 0,
        Ok(s) => s.code().unwrap_or(1),
        Err(_) => 1,
    }
}
