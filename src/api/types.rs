//! Request and response bodies for the bridge API.

use serde::{Deserialize, Serialize};

use crate::upstream::{HealthStatus, ResumeAction};

/// Body for the query endpoints. A missing thread id gets a generated one.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// How the caller wants a resumed execution delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResumeMode {
    /// Drain and return one aggregate result.
    #[default]
    Result,
    /// Stream text fragments as they become ready.
    Stream,
}

#[derive(Debug, Deserialize)]
pub struct ResumeRequest {
    pub thread_id: String,
    pub action: ResumeAction,
    #[serde(default)]
    pub modified_value: Option<String>,
    #[serde(default)]
    pub mode: ResumeMode,
}

#[derive(Debug, Deserialize)]
pub struct StopRequest {
    pub thread_id: String,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub stopped: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
}
