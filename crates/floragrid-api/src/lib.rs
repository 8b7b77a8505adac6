//! floragrid-api — REST control plane for Flower stacks on SLURM.
//!
//! Provides axum route handlers for stack lifecycle, cluster monitoring and
//! the internal coordination endpoints the per-node agents call back into.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/health` | Health check |
//! | GET | `/api/monitoring` | Stack snapshot + scheduler + proxy status |
//! | POST | `/api/spin` | Spin up a Flower stack |
//! | GET | `/api/spin` | Current stack status |
//! | DELETE | `/api/spin` | Tear the stack down |
//! | POST | `/api/flower/server` | Server-agent registration (internal) |
//! | GET | `/api/flower/server` | Server descriptor, blocking until ready (internal) |
//! | POST | `/api/flower/client` | Client-agent registration (internal) |

pub mod handlers;
pub mod registration;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use flora_core::Layout;
use floragrid_proxy::CaddyController;
use floragrid_slurm::SlurmClient;
use floragrid_state::StackStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StackStore,
    pub slurm: SlurmClient,
    pub proxy: Arc<CaddyController>,
    pub layout: Arc<Layout>,
    /// Externally reachable base URL the agents are pointed at.
    pub base_url: String,
}

/// Build the complete coordinator router.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/monitoring", get(handlers::monitoring))
        .route(
            "/api/spin",
            post(handlers::spin_up)
                .get(handlers::spin_status)
                .delete(handlers::spin_down),
        )
        .route(
            "/api/flower/server",
            post(registration::register_server).get(registration::server_info),
        )
        .route("/api/flower/client", post(registration::register_client))
        .with_state(state)
}
