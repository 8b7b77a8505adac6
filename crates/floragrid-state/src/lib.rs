//! floragrid-state — in-memory record of the current Flower stack.
//!
//! The coordinator owns exactly one stack at a time. This crate holds the
//! domain types, the wire bodies shared with the per-node agents, and the
//! `StackStore`: a thread-safe store whose readers get consistent deep-copy
//! snapshots and whose writers serialize. State does not survive a
//! coordinator restart by design; a restart abandons the running job.

mod error;
mod store;
mod types;

pub use error::{StateError, StateResult};
pub use store::StackStore;
pub use types::{
    ClientNode, ClientStatus, FlowerStack, RegisterClientRequest, RegisterServerRequest,
    ServerNode, ServerStatus, StackStatus,
};
