//! HTTP client for the coordinator's internal endpoints.

use std::time::Duration;

use reqwest::Client as HttpClient;
use tracing::debug;

use floragrid_state::{RegisterClientRequest, RegisterServerRequest, ServerNode, ServerStatus};

use crate::error::AgentError;

/// Per-request timeout; registration and polling are both short calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Typed client over the coordinator's `/api/flower` surface.
#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    base_url: String,
    http: HttpClient,
}

impl CoordinatorClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, AgentError> {
        let http = HttpClient::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub async fn register_server(&self, req: &RegisterServerRequest) -> Result<(), AgentError> {
        self.post("api/flower/server", req).await
    }

    pub async fn register_client(&self, req: &RegisterClientRequest) -> Result<(), AgentError> {
        self.post("api/flower/client", req).await
    }

    async fn post<T: serde::Serialize>(&self, path: &str, body: &T) -> Result<(), AgentError> {
        let response = self.http.post(self.url(path)).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::RegistrationRejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    /// Fetch the server descriptor; `None` while the coordinator has nothing
    /// to hand out or the response does not parse.
    pub async fn server_node(&self) -> Option<ServerNode> {
        let response = self.http.get(self.url("api/flower/server")).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.json::<ServerNode>().await.ok()
    }

    /// Poll until the server descriptor is published as `ready`. Only a
    /// ready descriptor is accepted; the deadline is hard.
    pub async fn wait_for_server(
        &self,
        poll: Duration,
        deadline: Duration,
    ) -> Result<ServerNode, AgentError> {
        let limit = tokio::time::Instant::now() + deadline;
        loop {
            if let Some(node) = self.server_node().await {
                if node.status == ServerStatus::Ready {
                    return Ok(node);
                }
                debug!(status = ?node.status, "server node not ready yet");
            }
            if tokio::time::Instant::now() >= limit {
                return Err(AgentError::ServerWaitTimeout(deadline));
            }
            tokio::time::sleep(poll).await;
        }
    }
}
