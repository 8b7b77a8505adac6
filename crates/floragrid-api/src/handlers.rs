//! Stack lifecycle handlers: health, monitoring, spin up/status/down.
//!
//! The handlers validate, act, and either commit or roll back by clearing
//! the store — nothing is recovered internally. External I/O (scheduler
//! invocations, proxy control) happens on the blocking pool, never under
//! the store lock.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use flora_core::Layout;
use floragrid_slurm::script::{render_stack_script, ScriptSpec};
use floragrid_slurm::SlurmClient;
use floragrid_state::FlowerStack;

use crate::ApiState;

/// squeue format used by the monitoring endpoint.
const SQUEUE_FORMAT: &str = "%.18i %.9P %.30j %.8T %.10M %.6D %R";

/// Body of `POST /api/spin`.
#[derive(Debug, Clone, Deserialize)]
pub struct SpinRequest {
    /// Number of client nodes; the server node comes on top.
    pub num_nodes: u32,
    #[serde(default)]
    pub partition: Option<String>,
    #[serde(default)]
    pub memory: Option<String>,
    #[serde(default)]
    pub time_limit: Option<String>,
}

/// Response envelope shared by the `/api/spin` methods.
#[derive(Debug, Serialize)]
pub struct SpinResponse {
    pub success: bool,
    pub job_id: Option<String>,
    pub message: String,
    pub state: Option<FlowerStack>,
}

fn error_response(
    status: StatusCode,
    message: impl Into<String>,
    state: Option<FlowerStack>,
) -> Response {
    let job_id = state.as_ref().map(|s| s.job_id.clone());
    (
        status,
        Json(SpinResponse {
            success: false,
            job_id,
            message: message.into(),
            state,
        }),
    )
        .into_response()
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// GET /api/monitoring
pub async fn monitoring(State(state): State<ApiState>) -> impl IntoResponse {
    let snapshot = state.store.snapshot();
    let job_id = snapshot.as_ref().map(|s| s.job_id.clone());

    let slurm = state.slurm.clone();
    let slurm_info = tokio::task::spawn_blocking(move || collect_slurm_info(&slurm, job_id))
        .await
        .unwrap_or_default();

    Json(serde_json::json!({
        "timestamp": Utc::now().to_rfc3339(),
        "flower_stack": snapshot,
        "slurm_info": slurm_info,
        "proxy": state.proxy.status(),
    }))
}

/// Best-effort scheduler queries; whatever fails is simply absent.
fn collect_slurm_info(
    slurm: &SlurmClient,
    current_job: Option<String>,
) -> serde_json::Map<String, serde_json::Value> {
    let mut info = serde_json::Map::new();
    if let Ok(result) = slurm.nodes() {
        info.insert("nodes".to_string(), result.output.into());
    }
    let user = std::env::var("USER").unwrap_or_default();
    if let Ok(result) = slurm.queue(Some(&user), Some(SQUEUE_FORMAT)) {
        info.insert("jobs".to_string(), result.output.into());
        info.insert("user".to_string(), user.into());
    }
    if let Ok(cluster) = slurm.cluster_status() {
        if let Ok(value) = serde_json::to_value(&cluster) {
            info.insert("cluster".to_string(), value);
        }
    }
    if let Some(job_id) = current_job {
        if let Ok(result) = slurm.job_detail(&job_id) {
            info.insert("current_job_detail".to_string(), result.output.into());
        }
    }
    info
}

/// POST /api/spin
pub async fn spin_up(
    State(state): State<ApiState>,
    payload: Result<Json<SpinRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Ok(Json(req)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "invalid request body", None);
    };
    if req.num_nodes < 1 {
        return error_response(StatusCode::BAD_REQUEST, "num_nodes must be at least 1", None);
    }
    if state.store.is_active() {
        return error_response(
            StatusCode::CONFLICT,
            "a Flower stack is already running",
            state.store.snapshot(),
        );
    }

    let script = render_stack_script(&ScriptSpec {
        num_nodes: req.num_nodes,
        partition: req.partition,
        memory: req.memory,
        time_limit: req.time_limit,
        api_url: state.base_url.clone(),
        florad_bin: state.layout.florad_bin(),
        logs_dir: state.layout.logs_dir(),
    });

    let layout = state.layout.clone();
    let slurm = state.slurm.clone();
    let submitted =
        tokio::task::spawn_blocking(move || submit_stack_script(&layout, &slurm, &script)).await;
    let job_id = match submitted {
        Ok(Ok(job_id)) => job_id,
        Ok(Err(e)) => {
            error!(error = %e, "stack submission failed");
            state.store.clear();
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to submit job: {e}"),
                None,
            );
        }
        Err(e) => {
            error!(error = %e, "submission task failed");
            state.store.clear();
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to submit job", None);
        }
    };

    if let Err(e) = state.store.initialize(&job_id, req.num_nodes) {
        error!(error = %e, %job_id, "stack initialization failed after submission");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), None);
    }

    info!(%job_id, num_nodes = req.num_nodes, "stack job submitted");
    Json(SpinResponse {
        success: true,
        job_id: Some(job_id.clone()),
        message: format!("Flower stack job {job_id} submitted successfully"),
        state: state.store.snapshot(),
    })
    .into_response()
}

/// Write the script under the per-user tmp dir and submit it. Never touches
/// the host-wide temp directory.
fn submit_stack_script(layout: &Layout, slurm: &SlurmClient, script: &str) -> anyhow::Result<String> {
    let epoch = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    let script_path = layout.tmp_dir().join(format!("flower-stack-{epoch}.sh"));
    std::fs::create_dir_all(layout.tmp_dir())?;
    std::fs::write(&script_path, script)?;

    let result = slurm.submit(&script_path)?;
    SlurmClient::parse_job_id(&result.output)
        .ok_or_else(|| anyhow::anyhow!("no job id in sbatch output: {}", result.output.trim()))
}

/// GET /api/spin
pub async fn spin_status(State(state): State<ApiState>) -> impl IntoResponse {
    let snapshot = state.store.snapshot();
    let message = match &snapshot {
        Some(stack) => format!("Stack status: {}", stack.status),
        None => "no Flower stack is currently running".to_string(),
    };
    Json(SpinResponse {
        success: true,
        job_id: snapshot.as_ref().map(|s| s.job_id.clone()),
        message,
        state: snapshot,
    })
}

/// DELETE /api/spin
pub async fn spin_down(State(state): State<ApiState>) -> impl IntoResponse {
    let Some(job_id) = state.store.job_id() else {
        return error_response(
            StatusCode::NOT_FOUND,
            "no Flower stack is currently running",
            None,
        );
    };

    let slurm = state.slurm.clone();
    let cancel_id = job_id.clone();
    let cancelled = tokio::task::spawn_blocking(move || slurm.cancel(&cancel_id)).await;
    match cancelled {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            // The stack stays as-is for operator inspection.
            error!(%job_id, error = %e, "job cancellation failed");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to cancel job: {e}"),
                None,
            );
        }
        Err(e) => {
            error!(%job_id, error = %e, "cancellation task failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to cancel job", None);
        }
    }

    state.store.clear();
    info!(%job_id, "stack job cancelled");
    Json(SpinResponse {
        success: true,
        job_id: Some(job_id.clone()),
        message: format!("Flower stack job {job_id} cancelled successfully"),
        state: None,
    })
    .into_response()
}
