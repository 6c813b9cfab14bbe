//! HTTP API for the bridge.
//!
//! ## Endpoints
//!
//! - `POST /api/query` - Submit a query, block for the aggregate result
//! - `POST /api/query/stream` - Submit a query, stream text fragments via SSE
//! - `POST /api/query/snapshots` - Submit a query, stream full state snapshots via SSE
//! - `POST /api/resume` - Resume a paused execution with a human decision
//! - `POST /api/stop` - Ask the upstream to stop a thread
//! - `GET /api/health` - Mirror the upstream health probe

mod routes;
pub mod types;

pub use routes::serve;
pub use types::*;
