//! Caddy controller — owns the Caddyfile and the proxy process.

use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ProxyError, ProxyResult};

/// Default Caddyfile: admin API on localhost, automatic TLS off.
const CADDYFILE_TEMPLATE: &str = "{\n\t# Global options\n\tadmin localhost:2019\n\tauto_https off\n}\n";

/// Marker line keyed on the external port; the de-duplication key for routes.
fn route_marker(port: u16) -> String {
    format!("# Flower Control API - Port {port}")
}

/// Proxy health as reported by the monitoring endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ProxyStatus {
    /// The caddy binary exists on disk.
    pub available: bool,
    /// The supervised process is alive.
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

struct ProcessState {
    child: Option<Child>,
    last_error: Option<String>,
}

/// Owns the Caddyfile and the supervised proxy process. All mutation — of
/// the file and of the process — serializes behind one lock.
pub struct CaddyController {
    caddy_bin: PathBuf,
    caddyfile: PathBuf,
    process: Mutex<ProcessState>,
}

impl CaddyController {
    pub fn new(caddy_bin: PathBuf, caddyfile: PathBuf) -> Self {
        Self {
            caddy_bin,
            caddyfile,
            process: Mutex::new(ProcessState {
                child: None,
                last_error: None,
            }),
        }
    }

    pub fn caddyfile(&self) -> &Path {
        &self.caddyfile
    }

    fn lock(&self) -> MutexGuard<'_, ProcessState> {
        self.process.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Write the default Caddyfile if none exists yet.
    pub fn ensure_caddyfile(&self) -> ProxyResult<()> {
        if self.caddyfile.is_file() {
            return Ok(());
        }
        if let Some(parent) = self.caddyfile.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.caddyfile, CADDYFILE_TEMPLATE)?;
        info!(path = %self.caddyfile.display(), "default Caddyfile created");
        Ok(())
    }

    /// Spawn the proxy with the Caddyfile as its argument. Idempotent: a
    /// live process is left alone, a dead one is replaced.
    pub fn ensure_started(&self) -> ProxyResult<()> {
        let mut state = self.lock();
        if let Some(child) = state.child.as_mut() {
            if child.try_wait()?.is_none() {
                return Ok(());
            }
        }
        let spawned = Command::new(&self.caddy_bin)
            .arg("run")
            .arg("--config")
            .arg(&self.caddyfile)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(child) => {
                info!(pid = child.id(), config = %self.caddyfile.display(), "caddy started");
                state.child = Some(child);
                Ok(())
            }
            Err(e) => {
                let err = self.classify_spawn_error(e);
                state.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Append a route forwarding `:<external_port>` to `<addr>:<port>`, then
    /// hot-reload the proxy. A route for the port already in the file wins;
    /// the call is then a no-op returning `false`.
    pub fn add_route(
        &self,
        external_port: u16,
        target_addr: &str,
        target_port: u16,
    ) -> ProxyResult<bool> {
        let mut state = self.lock();
        let content = fs::read_to_string(&self.caddyfile)?;
        let marker = route_marker(external_port);
        if content.lines().any(|line| line.contains(&marker)) {
            debug!(port = external_port, "route already present");
            return Ok(false);
        }

        let mut updated = content;
        updated.push_str(&format!(
            "\n{marker}\n:{external_port} {{\n\treverse_proxy {target_addr}:{target_port}\n}}\n"
        ));
        self.write_atomic(&updated)?;
        info!(
            port = external_port,
            target = %format!("{target_addr}:{target_port}"),
            "reverse-proxy route added"
        );

        self.reload_locked(&mut state)?;
        Ok(true)
    }

    /// Re-issue the proxy's reload command against the current Caddyfile.
    pub fn reload(&self) -> ProxyResult<()> {
        let mut state = self.lock();
        self.reload_locked(&mut state)
    }

    /// Start the proxy if needed, then publish one route. The coordinator's
    /// registration path calls this; failures degrade, they never abort a
    /// registration.
    pub fn expose(&self, external_port: u16, target_addr: &str, target_port: u16) -> ProxyResult<()> {
        self.ensure_started()?;
        self.add_route(external_port, target_addr, target_port)?;
        Ok(())
    }

    pub fn status(&self) -> ProxyStatus {
        let mut state = self.lock();
        let running = state
            .child
            .as_mut()
            .is_some_and(|child| matches!(child.try_wait(), Ok(None)));
        ProxyStatus {
            available: self.caddy_bin.is_file(),
            running,
            last_error: state.last_error.clone(),
        }
    }

    fn reload_locked(&self, state: &mut ProcessState) -> ProxyResult<()> {
        let output = Command::new(&self.caddy_bin)
            .arg("reload")
            .arg("--config")
            .arg(&self.caddyfile)
            .output()
            .map_err(|e| self.classify_spawn_error(e));
        let output = match output {
            Ok(output) => output,
            Err(e) => {
                state.last_error = Some(e.to_string());
                return Err(e);
            }
        };
        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            state.last_error = Some(combined.clone());
            return Err(ProxyError::ReloadFailed { output: combined });
        }
        state.last_error = None;
        debug!(config = %self.caddyfile.display(), "caddy configuration reloaded");
        Ok(())
    }

    fn classify_spawn_error(&self, e: io::Error) -> ProxyError {
        if e.kind() == io::ErrorKind::NotFound {
            ProxyError::BinaryMissing {
                path: self.caddy_bin.clone(),
            }
        } else {
            ProxyError::Io(e)
        }
    }

    fn write_atomic(&self, content: &str) -> ProxyResult<()> {
        let dir = self.caddyfile.parent().ok_or_else(|| ProxyError::InvalidPath {
            path: self.caddyfile.clone(),
        })?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.persist(&self.caddyfile)
            .map_err(|e| ProxyError::Io(e.error))?;
        Ok(())
    }
}
