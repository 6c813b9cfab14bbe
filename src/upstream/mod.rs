//! HTTP client for the upstream agent's streaming session API.
//!
//! Three operations against the agent: submit a query (streaming), resume a
//! paused execution after a human decision (streaming), and the unary
//! stop/health calls. The client holds no per-execution state — every call
//! opens its own upstream stream — so one client is safely shared across
//! concurrent executions.

pub mod sse;

use std::time::Duration;

use futures::Stream;
use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bridge::AgentEvent;
use crate::error::BridgeError;

/// Header correlating requests to one logical multi-step execution.
pub const THREAD_ID_HEADER: &str = "X-Thread-ID";

/// Connection settings for the upstream agent.
///
/// Passed in explicitly; the client keeps no ambient host/port state.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    /// Applied to the unary stop/health calls only — streaming requests run
    /// as long as the upstream keeps the connection open.
    pub request_timeout: Duration,
}

impl UpstreamConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Caller decision carried by a resume request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResumeAction {
    Approve,
    Reject,
    Modify,
}

/// Result of the upstream health probe. Never an error: any failure to reach
/// or satisfy the upstream reads as unhealthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Serialize)]
struct StreamRequest<'a> {
    query: &'a str,
}

#[derive(Serialize)]
struct ResumeRequest<'a> {
    action_id: &'a str,
    action: ResumeAction,
    modified_value: Option<&'a str>,
}

#[derive(Serialize)]
struct StopRequest<'a> {
    thread_id: &'a str,
}

/// Client for one upstream agent endpoint.
pub struct UpstreamClient {
    config: UpstreamConfig,
    client: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Submit a query and stream back the agent's events.
    pub async fn submit_query(
        &self,
        query: &str,
        thread_id: Option<&str>,
    ) -> Result<impl Stream<Item = Result<AgentEvent, BridgeError>>, BridgeError> {
        debug!("Submitting query to upstream (thread_id={:?})", thread_id);

        let mut request = self
            .client
            .post(format!("{}/stream", self.config.base_url))
            .header(header::ACCEPT, "text/event-stream")
            .json(&StreamRequest { query });
        if let Some(id) = thread_id {
            request = request.header(THREAD_ID_HEADER, id);
        }

        let response = request.send().await?;
        self.open_event_stream(response).await
    }

    /// Resume a paused execution with the caller's decision. The payload is
    /// keyed by the thread id, which the upstream uses to locate the paused
    /// execution.
    pub async fn resume(
        &self,
        thread_id: &str,
        action: ResumeAction,
        modified_value: Option<&str>,
    ) -> Result<impl Stream<Item = Result<AgentEvent, BridgeError>>, BridgeError> {
        info!("Resuming thread {} with {:?}", thread_id, action);

        let response = self
            .client
            .post(format!("{}/stream", self.config.base_url))
            .header(header::ACCEPT, "text/event-stream")
            .header(THREAD_ID_HEADER, thread_id)
            .json(&ResumeRequest {
                action_id: thread_id,
                action,
                modified_value,
            })
            .send()
            .await?;
        self.open_event_stream(response).await
    }

    /// Out-of-band stop signal. Any stream already open for the thread keeps
    /// draining until the upstream itself ends it (typically with a
    /// `stopped` event).
    pub async fn stop(&self, thread_id: &str) -> Result<(), BridgeError> {
        info!("Requesting stop of thread {}", thread_id);

        let response = self
            .client
            .post(format!("{}/stop", self.config.base_url))
            .timeout(self.config.request_timeout)
            .json(&StopRequest { thread_id })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::UpstreamRejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    /// Probe the upstream. Degrades to `Unhealthy` on any failure — this
    /// call never fails loudly.
    pub async fn health(&self) -> HealthStatus {
        let request = self
            .client
            .get(format!("{}/", self.config.base_url))
            .timeout(self.config.request_timeout);

        match request.send().await {
            Ok(response) if response.status().is_success() => HealthStatus::Healthy,
            Ok(response) => {
                warn!("Upstream health probe returned {}", response.status());
                HealthStatus::Unhealthy
            }
            Err(e) => {
                warn!("Upstream health probe failed: {}", e);
                HealthStatus::Unhealthy
            }
        }
    }

    async fn open_event_stream(
        &self,
        response: reqwest::Response,
    ) -> Result<impl Stream<Item = Result<AgentEvent, BridgeError>>, BridgeError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::UpstreamRejected {
                status: status.as_u16(),
                body,
            });
        }
        // A declared empty body can never produce events; fail fast instead
        // of handing back a stream that ends immediately.
        if response.content_length() == Some(0) {
            return Err(BridgeError::UpstreamEmptyBody);
        }
        Ok(sse::event_stream(response))
    }
}
