//! Cumulative execution state for one bridged query.
//!
//! One [`ExecutionState`] exists per streamed execution. It is built up by
//! applying [`StateUpdate`]s produced by the event transform; the
//! [`StateAccumulator`] owns the instance and performs the shallow
//! field-by-field overwrite. Merge policy for nested structures (subtask
//! list, variables map, code-execution list) belongs to the transform, which
//! constructs the already-merged value — the accumulator never merges.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Overall status of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Idle,
    Planning,
    Executing,
    WaitingHitl,
    Complete,
    Failed,
}

impl ExecutionStatus {
    /// Whether this status ends the execution.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Complete | ExecutionStatus::Failed)
    }
}

/// Status of a single subtask in the decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    Pending,
    Running,
    Complete,
    Failed,
    Skipped,
}

impl SubtaskStatus {
    /// Parse a wire-level status string. Accepts the common aliases the
    /// upstream has been observed to emit; anything else is `None`.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SubtaskStatus::Pending),
            "running" | "in_progress" => Some(SubtaskStatus::Running),
            "complete" | "completed" => Some(SubtaskStatus::Complete),
            "failed" => Some(SubtaskStatus::Failed),
            "skipped" => Some(SubtaskStatus::Skipped),
            _ => None,
        }
    }
}

/// One unit of the decomposed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub description: String,
    pub status: SubtaskStatus,
    /// Application the subtask targets, when the upstream names one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    /// Subtask kind (`api`, `browser`, ...) as emitted by the upstream.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// An extracted variable attached to the final answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableInfo {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Kind of human-in-the-loop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitlKind {
    Approval,
    Input,
    Confirmation,
    Selection,
}

impl HitlKind {
    /// Parse a wire-level kind, defaulting to `Approval` for anything
    /// unrecognized.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "input" => HitlKind::Input,
            "confirmation" => HitlKind::Confirmation,
            "selection" => HitlKind::Selection,
            _ => HitlKind::Approval,
        }
    }
}

/// A pause point requiring human input before the upstream continues.
///
/// Requests only accumulate during an execution; resolution happens through
/// the resume operation and is not reflected back into this list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitlRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: HitlKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub pending: bool,
}

/// Latest browser page snapshot reported by the upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserSnapshot {
    pub screenshot: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub elements: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Value>,
}

/// Status of an in-flight browser action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserActionStatus {
    Pending,
    Executing,
    Complete,
    Failed,
}

impl BrowserActionStatus {
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BrowserActionStatus::Pending),
            "executing" => Some(BrowserActionStatus::Executing),
            "complete" | "completed" => Some(BrowserActionStatus::Complete),
            "failed" => Some(BrowserActionStatus::Failed),
            _ => None,
        }
    }
}

/// The browser action currently being executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub status: BrowserActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Status of a code execution record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeExecutionStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

impl CodeExecutionStatus {
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(CodeExecutionStatus::Pending),
            "running" => Some(CodeExecutionStatus::Running),
            "complete" | "completed" => Some(CodeExecutionStatus::Complete),
            "failed" => Some(CodeExecutionStatus::Failed),
            _ => None,
        }
    }
}

/// One code execution reported by the upstream. Keyed by `id`: a later
/// record with the same id replaces the earlier one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeExecution {
    pub id: String,
    pub code: String,
    pub language: String,
    pub status: CodeExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<String>,
}

/// The full cumulative state of one execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionState {
    pub thread_id: String,
    pub query: String,
    /// Name of the upstream step that produced the most recent event.
    pub current_node: String,
    /// Running text buffer. Append-only within an execution, except that an
    /// answer event replaces it with the final answer text.
    pub streaming_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,
    pub variables: HashMap<String, VariableInfo>,
    /// Subtasks in first-seen order. Updates match by id and replace changed
    /// fields only.
    pub subtasks: Vec<Subtask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_subtask_id: Option<String>,
    pub pending_tool_calls: Vec<Value>,
    pub hitl_requests: Vec<HitlRequest>,
    pub needs_approval: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_snapshot: Option<BrowserSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_action: Option<BrowserAction>,
    pub code_executions: Vec<CodeExecution>,
    pub reasoning: String,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionState {
    /// Fresh state for a new execution (or a resume seeded with the caller's
    /// thread id).
    pub fn new(thread_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            query: query.into(),
            current_node: String::new(),
            streaming_content: String::new(),
            final_answer: None,
            variables: HashMap::new(),
            subtasks: Vec::new(),
            current_subtask_id: None,
            pending_tool_calls: Vec::new(),
            hitl_requests: Vec::new(),
            needs_approval: false,
            browser_snapshot: None,
            browser_action: None,
            code_executions: Vec::new(),
            reasoning: String::new(),
            status: ExecutionStatus::Idle,
            error: None,
        }
    }
}

/// Partial update produced by the event transform.
///
/// A `Some` field replaces the corresponding state field wholesale; `None`
/// leaves it untouched. Fields holding collections carry the complete merged
/// value — the transform clones and edits the prior collection itself.
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub current_node: Option<String>,
    pub streaming_content: Option<String>,
    pub final_answer: Option<String>,
    pub variables: Option<HashMap<String, VariableInfo>>,
    pub subtasks: Option<Vec<Subtask>>,
    pub current_subtask_id: Option<String>,
    pub pending_tool_calls: Option<Vec<Value>>,
    pub hitl_requests: Option<Vec<HitlRequest>>,
    pub needs_approval: Option<bool>,
    pub browser_snapshot: Option<BrowserSnapshot>,
    pub browser_action: Option<BrowserAction>,
    pub code_executions: Option<Vec<CodeExecution>>,
    pub reasoning: Option<String>,
    pub status: Option<ExecutionStatus>,
    pub error: Option<String>,
}

/// Owns one `ExecutionState` and applies successive partial updates.
#[derive(Debug)]
pub struct StateAccumulator {
    state: ExecutionState,
}

impl StateAccumulator {
    pub fn new(state: ExecutionState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    /// Shallow field-wise overwrite: each `Some` field in the update replaces
    /// the state field, nothing else changes.
    pub fn apply(&mut self, update: StateUpdate) -> &ExecutionState {
        if let Some(v) = update.current_node {
            self.state.current_node = v;
        }
        if let Some(v) = update.streaming_content {
            self.state.streaming_content = v;
        }
        if let Some(v) = update.final_answer {
            self.state.final_answer = Some(v);
        }
        if let Some(v) = update.variables {
            self.state.variables = v;
        }
        if let Some(v) = update.subtasks {
            self.state.subtasks = v;
        }
        if let Some(v) = update.current_subtask_id {
            self.state.current_subtask_id = Some(v);
        }
        if let Some(v) = update.pending_tool_calls {
            self.state.pending_tool_calls = v;
        }
        if let Some(v) = update.hitl_requests {
            self.state.hitl_requests = v;
        }
        if let Some(v) = update.needs_approval {
            self.state.needs_approval = v;
        }
        if let Some(v) = update.browser_snapshot {
            self.state.browser_snapshot = Some(v);
        }
        if let Some(v) = update.browser_action {
            self.state.browser_action = Some(v);
        }
        if let Some(v) = update.code_executions {
            self.state.code_executions = v;
        }
        if let Some(v) = update.reasoning {
            self.state.reasoning = v;
        }
        if let Some(v) = update.status {
            self.state.status = v;
        }
        if let Some(v) = update.error {
            self.state.error = Some(v);
        }
        &self.state
    }

    /// Drain the streaming buffer. Used by the incremental text adapter to
    /// implement its emit-then-clear contract.
    pub fn take_streaming_content(&mut self) -> String {
        std::mem::take(&mut self.state.streaming_content)
    }

    pub fn into_state(self) -> ExecutionState {
        self.state
    }
}
