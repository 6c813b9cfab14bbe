//! The three consumption strategies over one upstream event stream.
//!
//! All three adapters fold events through the same [`EventFold`]
//! (transform + accumulator) and differ only in what they project out:
//!
//! - [`collect_result`] drains the whole stream and returns one composed
//!   [`ExecutionResult`],
//! - [`text_fragments`] yields text as it becomes ready, for token-oriented
//!   consumers,
//! - [`snapshots`] yields the full state after every event.
//!
//! Keeping the fold shared is deliberate: the transform semantics live in
//! exactly one place and the projections cannot drift from each other.

use std::collections::HashMap;

use futures::{Stream, StreamExt};
use serde::Serialize;
use tracing::debug;

use crate::error::BridgeError;

use super::events::{AgentEvent, EventTag};
use super::state::{
    BrowserSnapshot, CodeExecution, ExecutionState, ExecutionStatus, StateAccumulator, StateUpdate,
    Subtask, VariableInfo,
};
use super::transform::transform;

/// Error recorded when the stream ends before a terminal event.
const INTERRUPTED: &str = "Upstream stream ended before a terminal event";

/// Fallback fragment text when an interrupt carries no pending request.
const HITL_FALLBACK: &str = "Human input required";

/// One transform + accumulator pair, folding events in arrival order.
pub struct EventFold {
    acc: StateAccumulator,
}

impl EventFold {
    pub fn new(seed: ExecutionState) -> Self {
        Self {
            acc: StateAccumulator::new(seed),
        }
    }

    /// Apply one event and return the new snapshot.
    pub fn push(&mut self, event: &AgentEvent) -> &ExecutionState {
        let update = transform(event, self.acc.state());
        self.acc.apply(update)
    }

    pub fn state(&self) -> &ExecutionState {
        self.acc.state()
    }

    /// Record a stream-level failure: the error lands in the state and the
    /// status becomes terminal.
    pub fn record_stream_error(&mut self, message: String) {
        self.acc.apply(StateUpdate {
            error: Some(message),
            status: Some(ExecutionStatus::Failed),
            ..Default::default()
        });
    }

    pub fn take_streaming_content(&mut self) -> String {
        self.acc.take_streaming_content()
    }

    pub fn into_state(self) -> ExecutionState {
        self.acc.into_state()
    }
}

// ── Aggregate adapter ─────────────────────────────────────────────

/// The composed result of one fully drained execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// Final answer text, or `"Error: <reason>"` when no answer was produced.
    pub answer: String,
    pub variables: HashMap<String, VariableInfo>,
    pub thread_id: String,
    pub subtasks: Vec<Subtask>,
    pub code_executions: Vec<CodeExecution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_snapshot: Option<BrowserSnapshot>,
    pub reasoning: String,
    pub status: ExecutionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Drain the entire event sequence and compose one result.
///
/// The whole sequence is consumed even when an answer arrives early: later
/// events (code executions, subtask updates) still belong in the composed
/// result. A transport failure mid-stream produces a best-effort result with
/// the interruption recorded as the error, never a raised error.
pub async fn collect_result<S>(events: S, seed: ExecutionState) -> ExecutionResult
where
    S: Stream<Item = Result<AgentEvent, BridgeError>>,
{
    let mut fold = EventFold::new(seed);
    let mut events = std::pin::pin!(events);

    while let Some(item) = events.next().await {
        match item {
            Ok(event) => {
                fold.push(&event);
            }
            Err(e) => {
                debug!("Event stream failed mid-read: {}", e);
                fold.record_stream_error(e.to_string());
                break;
            }
        }
    }

    if !fold.state().status.is_terminal() {
        fold.record_stream_error(INTERRUPTED.to_string());
    }

    let state = fold.into_state();
    let answer = match &state.final_answer {
        Some(answer) => answer.clone(),
        None => format!(
            "Error: {}",
            state.error.as_deref().unwrap_or("no answer produced")
        ),
    };

    ExecutionResult {
        answer,
        variables: state.variables,
        thread_id: state.thread_id,
        subtasks: state.subtasks,
        code_executions: state.code_executions,
        browser_snapshot: state.browser_snapshot,
        reasoning: state.reasoning,
        status: state.status,
        error: state.error,
    }
}

// ── Incremental text adapter ──────────────────────────────────────

/// Kind of a downstream text fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    Content,
    Error,
    Hitl,
}

impl FragmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FragmentKind::Content => "content",
            FragmentKind::Error => "error",
            FragmentKind::Hitl => "hitl",
        }
    }
}

/// One fragment of the incremental text stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextFragment {
    pub kind: FragmentKind,
    pub text: String,
}

impl TextFragment {
    fn content(text: String) -> Self {
        Self {
            kind: FragmentKind::Content,
            text,
        }
    }

    fn error(text: String) -> Self {
        Self {
            kind: FragmentKind::Error,
            text,
        }
    }

    fn hitl(text: String) -> Self {
        Self {
            kind: FragmentKind::Hitl,
            text,
        }
    }
}

/// Project the event stream into text fragments.
///
/// An answer yields the final answer text and ends the stream; a stop yields
/// an error fragment and ends the stream; an interrupt yields a fragment
/// carrying the first pending HITL message and the stream continues. Any
/// other event that grew the streaming buffer flushes it as one content
/// fragment (the buffer is cleared after each flush, so fragments never
/// repeat). A transport failure surfaces as an explicit error fragment
/// rather than a silent close.
pub fn text_fragments<S>(events: S, seed: ExecutionState) -> impl Stream<Item = TextFragment>
where
    S: Stream<Item = Result<AgentEvent, BridgeError>>,
{
    async_stream::stream! {
        let mut fold = EventFold::new(seed);
        let mut events = std::pin::pin!(events);

        while let Some(item) = events.next().await {
            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    yield TextFragment::error(e.to_string());
                    return;
                }
            };

            fold.push(&event);

            match &event.tag {
                EventTag::Answer => {
                    let text = fold.state().final_answer.clone().unwrap_or_default();
                    yield TextFragment::content(text);
                    return;
                }
                EventTag::Stopped => {
                    let text = fold
                        .state()
                        .error
                        .clone()
                        .unwrap_or_else(|| "Execution stopped".to_string());
                    yield TextFragment::error(text);
                    return;
                }
                EventTag::Interrupt => {
                    let message = fold
                        .state()
                        .hitl_requests
                        .iter()
                        .find(|r| r.pending)
                        .map(|r| r.message.clone())
                        .unwrap_or_else(|| HITL_FALLBACK.to_string());
                    yield TextFragment::hitl(message);
                }
                _ => {
                    if !fold.state().streaming_content.is_empty() {
                        yield TextFragment::content(fold.take_streaming_content());
                    }
                }
            }
        }
    }
}

// ── Snapshot adapter ──────────────────────────────────────────────

/// The full execution state after one event.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub step_name: String,
    pub state: ExecutionState,
    pub is_final: bool,
}

/// Project the event stream into one full-state snapshot per event.
///
/// `is_final` is set exactly on the answer event. The adapter never stops
/// silently: a transport failure, or a stream that ends without reaching a
/// terminal state, yields one closing snapshot carrying the error with
/// `is_final = true`. A stream that ends on a non-answer terminal event
/// (a stop) likewise gets a closing snapshot so consumers always observe a
/// final one.
pub fn snapshots<S>(events: S, seed: ExecutionState) -> impl Stream<Item = StateSnapshot>
where
    S: Stream<Item = Result<AgentEvent, BridgeError>>,
{
    async_stream::stream! {
        let mut fold = EventFold::new(seed);
        let mut events = std::pin::pin!(events);
        let mut saw_final = false;

        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    let is_final = event.tag == EventTag::Answer;
                    saw_final |= is_final;
                    let state = fold.push(&event).clone();
                    yield StateSnapshot {
                        step_name: event.tag.wire_name().to_string(),
                        state,
                        is_final,
                    };
                }
                Err(e) => {
                    fold.record_stream_error(e.to_string());
                    let state = fold.state().clone();
                    yield StateSnapshot {
                        step_name: state.current_node.clone(),
                        state,
                        is_final: true,
                    };
                    return;
                }
            }
        }

        if !saw_final {
            if !fold.state().status.is_terminal() {
                fold.record_stream_error(INTERRUPTED.to_string());
            }
            let state = fold.state().clone();
            yield StateSnapshot {
                step_name: state.current_node.clone(),
                state,
                is_final: true,
            };
        }
    }
}
