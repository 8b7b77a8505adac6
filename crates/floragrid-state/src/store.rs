//! StackStore — the coordinator's single source of truth.
//!
//! Readers take a consistent deep-copy snapshot; writers serialize behind
//! one lock. Registration calls only ever add or update descriptors; the
//! whole stack is cleared atomically on tear-down. The completion check in
//! here is the only transition into `running`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use tracing::info;

use crate::error::{StateError, StateResult};
use crate::types::{
    ClientNode, ClientStatus, FlowerStack, ServerNode, ServerStatus, StackStatus,
};

/// Poll interval for the server-ready rendezvous.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Thread-safe store for the (at most one) current stack.
#[derive(Clone, Default)]
pub struct StackStore {
    inner: Arc<RwLock<Option<FlowerStack>>>,
}

impl StackStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<FlowerStack>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<FlowerStack>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Create a fresh stack in `pending`. Fails while a stack is active.
    pub fn initialize(&self, job_id: &str, num_nodes: u32) -> StateResult<()> {
        let mut state = self.write();
        if let Some(stack) = state.as_ref() {
            if stack.status.is_active() {
                return Err(StateError::AlreadyActive { status: stack.status });
            }
        }
        *state = Some(FlowerStack {
            job_id: job_id.to_string(),
            status: StackStatus::Pending,
            num_nodes,
            server_node: None,
            client_nodes: HashMap::new(),
            start_time: Utc::now(),
            completion_time: None,
            expected_nodes: num_nodes + 1,
            completed_nodes: 0,
        });
        info!(%job_id, num_nodes, "stack initialized");
        Ok(())
    }

    /// Record the server descriptor. Moves a `pending` stack to `starting`;
    /// a ready descriptor counts toward completion exactly once.
    pub fn register_server(&self, node: ServerNode) -> StateResult<()> {
        let mut state = self.write();
        let stack = state.as_mut().ok_or(StateError::NotInitialized)?;

        let was_ready = stack
            .server_node
            .as_ref()
            .is_some_and(|n| n.status == ServerStatus::Ready);
        let now_ready = node.status == ServerStatus::Ready;

        info!(node_id = %node.node_id, ip = %node.ip, "server node registered");
        stack.server_node = Some(node);
        if stack.status == StackStatus::Pending {
            stack.status = StackStatus::Starting;
        }
        if now_ready && !was_ready {
            stack.completed_nodes += 1;
            check_completion(stack);
        }
        Ok(())
    }

    /// Insert or update a client descriptor, keyed by node id. A transition
    /// into `ready` counts toward completion exactly once per client.
    pub fn register_client(&self, node: ClientNode) -> StateResult<()> {
        let mut state = self.write();
        let stack = state.as_mut().ok_or(StateError::NotInitialized)?;

        let was_ready = stack
            .client_nodes
            .get(&node.node_id)
            .is_some_and(|n| n.status == ClientStatus::Ready);
        let now_ready = node.status == ClientStatus::Ready;

        info!(node_id = %node.node_id, ip = %node.ip, "client node registered");
        stack.client_nodes.insert(node.node_id.clone(), node);
        if now_ready && !was_ready {
            stack.completed_nodes += 1;
            check_completion(stack);
        }
        Ok(())
    }

    /// Deep copy of the current stack, if any.
    pub fn snapshot(&self) -> Option<FlowerStack> {
        self.read().clone()
    }

    /// The current job id, if a stack exists.
    pub fn job_id(&self) -> Option<String> {
        self.read().as_ref().map(|s| s.job_id.clone())
    }

    /// Discard the current stack unconditionally.
    pub fn clear(&self) {
        *self.write() = None;
        info!("stack state cleared");
    }

    /// True while the stack is `starting` or `running`.
    pub fn is_running(&self) -> bool {
        self.read()
            .as_ref()
            .is_some_and(|s| matches!(s.status, StackStatus::Starting | StackStatus::Running))
    }

    /// True while the stack is `pending`, `starting` or `running` — the
    /// states that block a new spin-up.
    pub fn is_active(&self) -> bool {
        self.read().as_ref().is_some_and(|s| s.status.is_active())
    }

    /// Block until the server descriptor is `ready`, or until `timeout`.
    ///
    /// Polls a read-lock snapshot; the lock is never held across an await.
    pub async fn wait_for_server_ready(&self, timeout: Duration) -> StateResult<ServerNode> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(node) = self.ready_server() {
                return Ok(node);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(StateError::ServerReadyTimeout);
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    fn ready_server(&self) -> Option<ServerNode> {
        let state = self.read();
        let node = state.as_ref()?.server_node.as_ref()?;
        (node.status == ServerStatus::Ready).then(|| node.clone())
    }
}

/// Sole transition into `running`: all expected descriptors are ready.
/// Idempotent; safe after every ready-increment.
fn check_completion(stack: &mut FlowerStack) {
    if stack.completed_nodes >= stack.expected_nodes && stack.status != StackStatus::Running {
        stack.status = StackStatus::Running;
        stack.completion_time = Some(Utc::now());
        info!(expected_nodes = stack.expected_nodes, "stack fully deployed, all nodes ready");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RegisterServerRequest;

    fn server_node(ip: &str) -> ServerNode {
        ServerNode::ready(&RegisterServerRequest {
            ip: ip.to_string(),
            server_app_io_api_port: 9091,
            fleet_api_port: 9092,
            control_api_port: 9093,
        })
    }

    /// ready_count must equal the number of ready descriptors at all times.
    fn assert_ready_count_invariant(stack: &FlowerStack) {
        let ready_clients = stack
            .client_nodes
            .values()
            .filter(|c| c.status == ClientStatus::Ready)
            .count() as u32;
        let ready_server = stack
            .server_node
            .as_ref()
            .is_some_and(|s| s.status == ServerStatus::Ready) as u32;
        assert_eq!(stack.completed_nodes, ready_clients + ready_server);
    }

    #[test]
    fn initialize_creates_a_pending_stack() {
        let store = StackStore::new();
        store.initialize("12345", 2).unwrap();

        let stack = store.snapshot().unwrap();
        assert_eq!(stack.job_id, "12345");
        assert_eq!(stack.status, StackStatus::Pending);
        assert_eq!(stack.expected_nodes, 3);
        assert_eq!(stack.completed_nodes, 0);
        assert!(stack.server_node.is_none());
        assert!(stack.client_nodes.is_empty());
        assert!(stack.completion_time.is_none());
        assert_ready_count_invariant(&stack);
    }

    #[test]
    fn initialize_conflicts_while_a_stack_is_active() {
        let store = StackStore::new();
        store.initialize("12345", 2).unwrap();

        let err = store.initialize("67890", 1).unwrap_err();
        assert_eq!(
            err,
            StateError::AlreadyActive {
                status: StackStatus::Pending
            }
        );
        // The original stack is untouched.
        assert_eq!(store.snapshot().unwrap().job_id, "12345");
    }

    #[test]
    fn initialize_then_clear_is_indistinguishable_from_empty() {
        let store = StackStore::new();
        store.initialize("12345", 2).unwrap();
        store.clear();

        assert!(store.snapshot().is_none());
        assert!(store.job_id().is_none());
        assert!(!store.is_running());
        assert!(!store.is_active());
        // A fresh initialize succeeds again.
        store.initialize("67890", 1).unwrap();
        assert_eq!(store.snapshot().unwrap().job_id, "67890");
    }

    #[test]
    fn registration_without_a_stack_fails() {
        let store = StackStore::new();
        assert_eq!(
            store.register_server(server_node("10.0.0.1")).unwrap_err(),
            StateError::NotInitialized
        );
        assert_eq!(
            store.register_client(ClientNode::ready("10.0.0.2")).unwrap_err(),
            StateError::NotInitialized
        );
    }

    #[test]
    fn server_registration_moves_pending_to_starting() {
        let store = StackStore::new();
        store.initialize("12345", 2).unwrap();
        store.register_server(server_node("10.0.0.1")).unwrap();

        let stack = store.snapshot().unwrap();
        assert_eq!(stack.status, StackStatus::Starting);
        assert_eq!(stack.completed_nodes, 1);
        assert!(store.is_running());
        assert_ready_count_invariant(&stack);
    }

    #[test]
    fn stack_runs_once_every_node_is_ready() {
        let store = StackStore::new();
        store.initialize("12345", 2).unwrap();
        store.register_server(server_node("10.0.0.1")).unwrap();
        store.register_client(ClientNode::ready("10.0.0.2")).unwrap();
        assert_eq!(store.snapshot().unwrap().status, StackStatus::Starting);

        store.register_client(ClientNode::ready("10.0.0.3")).unwrap();
        let stack = store.snapshot().unwrap();
        assert_eq!(stack.status, StackStatus::Running);
        assert_eq!(stack.completed_nodes, 3);
        assert_eq!(stack.client_nodes.len(), 2);
        assert!(stack.completion_time.is_some());
        assert_ready_count_invariant(&stack);
    }

    #[test]
    fn completion_triggers_on_the_server_when_it_registers_last() {
        let store = StackStore::new();
        store.initialize("12345", 2).unwrap();
        store.register_client(ClientNode::ready("10.0.0.2")).unwrap();
        store.register_client(ClientNode::ready("10.0.0.3")).unwrap();
        assert_eq!(store.snapshot().unwrap().status, StackStatus::Starting);

        store.register_server(server_node("10.0.0.1")).unwrap();
        assert_eq!(store.snapshot().unwrap().status, StackStatus::Running);
    }

    #[test]
    fn duplicate_ready_client_counts_once() {
        let store = StackStore::new();
        store.initialize("12345", 2).unwrap();
        store.register_client(ClientNode::ready("10.0.0.2")).unwrap();
        store.register_client(ClientNode::ready("10.0.0.2")).unwrap();

        let stack = store.snapshot().unwrap();
        assert_eq!(stack.completed_nodes, 1);
        assert_eq!(stack.client_nodes.len(), 1);
        assert_ready_count_invariant(&stack);
    }

    #[test]
    fn duplicate_ready_server_counts_once() {
        let store = StackStore::new();
        store.initialize("12345", 1).unwrap();
        store.register_server(server_node("10.0.0.1")).unwrap();
        store.register_server(server_node("10.0.0.1")).unwrap();

        let stack = store.snapshot().unwrap();
        assert_eq!(stack.completed_nodes, 1);
        assert_ready_count_invariant(&stack);
    }

    #[test]
    fn exactly_one_transition_into_running() {
        let store = StackStore::new();
        store.initialize("12345", 1).unwrap();
        store.register_server(server_node("10.0.0.1")).unwrap();
        store.register_client(ClientNode::ready("10.0.0.2")).unwrap();

        let first = store.snapshot().unwrap();
        assert_eq!(first.status, StackStatus::Running);

        // Re-registering after completion must not produce a second transition.
        store.register_client(ClientNode::ready("10.0.0.2")).unwrap();
        let second = store.snapshot().unwrap();
        assert_eq!(second.completion_time, first.completion_time);
        assert_eq!(second.completed_nodes, first.completed_nodes);
    }

    #[test]
    fn single_client_stack_expects_two_nodes() {
        let store = StackStore::new();
        store.initialize("12345", 1).unwrap();
        assert_eq!(store.snapshot().unwrap().expected_nodes, 2);

        store.register_server(server_node("10.0.0.1")).unwrap();
        store.register_client(ClientNode::ready("10.0.0.2")).unwrap();
        assert_eq!(store.snapshot().unwrap().status, StackStatus::Running);
    }

    #[test]
    fn snapshot_is_a_deep_copy() {
        let store = StackStore::new();
        store.initialize("12345", 1).unwrap();
        let before = store.snapshot().unwrap();

        store.register_server(server_node("10.0.0.1")).unwrap();
        // The earlier snapshot does not observe the later mutation.
        assert!(before.server_node.is_none());
        assert!(store.snapshot().unwrap().server_node.is_some());
    }

    #[tokio::test]
    async fn wait_for_server_ready_returns_the_published_descriptor() {
        let store = StackStore::new();
        store.initialize("12345", 1).unwrap();

        let writer = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            writer.register_server(server_node("10.0.0.1")).unwrap();
        });

        let node = store
            .wait_for_server_ready(Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(node.ip, "10.0.0.1");
        assert_eq!(node.status, ServerStatus::Ready);
        // The same descriptor a subsequent snapshot exposes.
        assert_eq!(store.snapshot().unwrap().server_node, Some(node));
    }

    #[tokio::test]
    async fn wait_for_server_ready_times_out_without_a_server() {
        let store = StackStore::new();
        store.initialize("12345", 1).unwrap();

        let err = store
            .wait_for_server_ready(Duration::from_millis(100))
            .await
            .unwrap_err();
        assert_eq!(err, StateError::ServerReadyTimeout);
    }
}
