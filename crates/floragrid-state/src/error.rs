//! Error types for the stack store.

use thiserror::Error;

use crate::types::StackStatus;

/// Result type alias for stack store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during stack store operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("a stack is already active (status: {status})")]
    AlreadyActive { status: StackStatus },

    #[error("stack not initialized")]
    NotInitialized,

    #[error("timed out waiting for server node to be ready")]
    ServerReadyTimeout,
}
