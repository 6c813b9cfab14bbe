//! # agent-bridge
//!
//! Streaming bridge between a multi-step agent backend and synchronous
//! callers.
//!
//! The upstream agent emits a flat sequence of named events over a text
//! event-stream. This library reconstructs a typed, cumulative execution
//! state from that sequence — task decomposition, tool calls, browser
//! automation steps, code executions, human-in-the-loop interrupts — and
//! re-projects it into three downstream shapes.
//!
//! ## Architecture
//!
//! ```text
//!   UpstreamClient ──▶ FrameDecoder ──▶ transform + StateAccumulator
//!                                              │
//!                       ┌──────────────────────┼──────────────────────┐
//!                       ▼                      ▼                      ▼
//!                collect_result         text_fragments           snapshots
//!              (aggregate result)    (incremental text)    (state per step)
//! ```
//!
//! ## Modules
//! - `upstream`: session client and wire-format reader
//! - `bridge`: event vocabulary, state model, transform, adapters
//! - `api`: thin HTTP surface exposing the three projections
//! - `config`: environment-driven server configuration

pub mod api;
pub mod bridge;
pub mod config;
pub mod error;
pub mod upstream;

pub use bridge::{
    collect_result, snapshots, text_fragments, AgentEvent, EventTag, ExecutionResult,
    ExecutionState, ExecutionStatus, StateSnapshot, TextFragment,
};
pub use config::Config;
pub use error::BridgeError;
pub use upstream::{HealthStatus, ResumeAction, UpstreamClient, UpstreamConfig};
