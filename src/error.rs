//! Error taxonomy for the upstream session boundary.
//!
//! Only network/protocol-level failures live here. Framing problems and
//! unparsable payloads are recovered where they occur (record dropped,
//! documented fallback applied) and never surface as errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// The upstream agent answered with a non-success status.
    #[error("Upstream rejected request: HTTP {status}: {body}")]
    UpstreamRejected { status: u16, body: String },

    /// The upstream response carried no body to stream from.
    #[error("Upstream response had no body")]
    UpstreamEmptyBody,

    /// The event stream ended or failed mid-read before a terminal event.
    #[error("Upstream stream interrupted: {0}")]
    TransportInterrupted(String),

    /// The outbound request itself failed (connect, timeout, ...).
    #[error("Upstream request failed: {0}")]
    Request(#[from] reqwest::Error),
}
