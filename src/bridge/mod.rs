//! Event-to-state transformation engine and its consumption adapters.
//!
//! `events` names the upstream vocabulary, `transform` turns one event into a
//! partial update, `state` owns the cumulative snapshot, and `adapters`
//! projects the folded stream into the three downstream shapes.

pub mod adapters;
pub mod events;
pub mod state;
pub mod transform;

pub use adapters::{
    collect_result, snapshots, text_fragments, EventFold, ExecutionResult, FragmentKind,
    StateSnapshot, TextFragment,
};
pub use events::{AgentEvent, EventTag};
pub use state::{ExecutionState, ExecutionStatus, StateAccumulator, StateUpdate};
pub use transform::transform;
