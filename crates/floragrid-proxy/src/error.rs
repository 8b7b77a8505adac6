//! Error types for proxy control.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for proxy operations.
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Errors that can occur while controlling the reverse proxy.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The proxy binary is absent — the coordinator keeps running without
    /// external exposure.
    #[error("caddy binary not found: {path}")]
    BinaryMissing { path: PathBuf },

    #[error("caddy reload failed:\n{output}")]
    ReloadFailed { output: String },

    #[error("invalid caddyfile path: {path}")]
    InvalidPath { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
