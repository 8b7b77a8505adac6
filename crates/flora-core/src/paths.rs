//! Per-user filesystem layout.
//!
//! Shared clusters meter the host-wide temp directory per node, not per
//! user; scripts, logs and runtime state therefore live under the invoking
//! user's home quota. No path produced here may point into
//! `std::env::temp_dir()`.

use std::path::{Path, PathBuf};

use anyhow::Context;

/// Name of the layout root under the user's home directory.
const ROOT_DIR_NAME: &str = ".florad";

/// Name of the managed Python environment holding the Flower daemons.
const FLOWER_ENV: &str = "flowerai-env";

/// All paths the stack uses, derived from a single root.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    /// Layout rooted at `$HOME/.florad`.
    pub fn discover() -> anyhow::Result<Self> {
        let home = dirs::home_dir().context("cannot determine home directory")?;
        Ok(Self {
            root: home.join(ROOT_DIR_NAME),
        })
    }

    /// Layout rooted at an explicit directory (tests, unusual installs).
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.join("config")
    }

    pub fn venv_dir(&self) -> PathBuf {
        self.root.join("venv")
    }

    /// Directory holding the Flower daemon executables.
    pub fn flower_bin_dir(&self) -> PathBuf {
        self.venv_dir().join(FLOWER_ENV).join("bin")
    }

    /// Path of one Flower daemon executable by name.
    pub fn flower_daemon(&self, name: &str) -> PathBuf {
        self.flower_bin_dir().join(name)
    }

    pub fn florad_bin(&self) -> PathBuf {
        self.bin_dir().join("florad")
    }

    pub fn caddy_bin(&self) -> PathBuf {
        self.bin_dir().join("caddy")
    }

    pub fn caddyfile(&self) -> PathBuf {
        self.config_dir().join("Caddyfile")
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir().join("florad.toml")
    }

    /// Per-job log directory (`logs/<job id>`).
    pub fn job_logs_dir(&self, job_id: &str) -> PathBuf {
        self.logs_dir().join(job_id)
    }

    /// Create every directory of the layout.
    pub fn ensure(&self) -> std::io::Result<()> {
        for dir in [
            self.bin_dir(),
            self.tmp_dir(),
            self.data_dir(),
            self.logs_dir(),
            self.config_dir(),
            self.venv_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_hang_off_the_root() {
        let layout = Layout::from_root("/home/alice/.florad");
        assert_eq!(layout.bin_dir(), PathBuf::from("/home/alice/.florad/bin"));
        assert_eq!(layout.tmp_dir(), PathBuf::from("/home/alice/.florad/tmp"));
        assert_eq!(layout.caddyfile(), PathBuf::from("/home/alice/.florad/config/Caddyfile"));
        assert_eq!(
            layout.job_logs_dir("12345"),
            PathBuf::from("/home/alice/.florad/logs/12345")
        );
    }

    #[test]
    fn flower_daemons_resolve_inside_the_venv() {
        let layout = Layout::from_root("/home/alice/.florad");
        assert_eq!(
            layout.flower_daemon("flower-superlink"),
            PathBuf::from("/home/alice/.florad/venv/flowerai-env/bin/flower-superlink")
        );
    }

    #[test]
    fn no_path_points_into_the_host_temp_dir() {
        let layout = Layout::from_root("/home/alice/.florad");
        let temp = std::env::temp_dir();
        for path in [
            layout.root().to_path_buf(),
            layout.bin_dir(),
            layout.tmp_dir(),
            layout.data_dir(),
            layout.logs_dir(),
            layout.config_dir(),
            layout.venv_dir(),
            layout.flower_bin_dir(),
        ] {
            assert!(
                !path.starts_with(&temp),
                "{} is under the host temp dir {}",
                path.display(),
                temp.display()
            );
        }
    }

    #[test]
    fn ensure_creates_the_tree() {
        let root = tempfile::TempDir::new().unwrap();
        let layout = Layout::from_root(root.path().join(".florad"));
        layout.ensure().unwrap();
        assert!(layout.bin_dir().is_dir());
        assert!(layout.tmp_dir().is_dir());
        assert!(layout.logs_dir().is_dir());
        assert!(layout.config_dir().is_dir());
        assert!(layout.venv_dir().is_dir());
    }
}
