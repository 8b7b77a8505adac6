//! Error types for scheduler invocations.

use thiserror::Error;

/// Result type alias for scheduler operations.
pub type SlurmResult<T> = Result<T, SlurmError>;

/// Errors that can occur while driving the scheduler's programs.
#[derive(Debug, Error)]
pub enum SlurmError {
    /// The program is not installed or not on PATH — reported distinctly so
    /// the coordinator can start in degraded mode.
    #[error("{program} not found on PATH")]
    ProgramNotFound { program: String },

    #[error("`{command_line}` exited with status {code:?}:\n{output}")]
    CommandFailed {
        command_line: String,
        code: Option<i32>,
        output: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
