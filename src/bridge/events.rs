//! Named events emitted by the upstream agent.
//!
//! The upstream stream is a flat sequence of `event:`/`data:` records. Event
//! names are a closed set of agent step names plus raw telemetry channels,
//! but the upstream adds names over time, so unrecognized names are carried
//! through as [`EventTag::Other`] instead of being dropped.

/// Tag identifying one kind of upstream event.
///
/// Payload shapes differ per tag and are not guaranteed to be JSON; the
/// transform layer owns all payload interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTag {
    /// Task analysis step (free-form reasoning text).
    TaskAnalyzer,
    /// Task decomposition step (subtask list).
    TaskDecomposition,
    /// Plan controller step (current subtask / subtask status updates).
    PlanController,
    /// Browser planning step (may carry a page snapshot or an action).
    BrowserPlanner,
    /// Browser action step (same payload shape as `BrowserPlanner`).
    ActionAgent,
    /// API/code execution step.
    ApiAgent,
    /// Pending tool-call list replacement.
    ToolCall,
    /// Single extracted-variable update.
    VariableUpdate,
    /// Final answer; terminates the logical execution.
    Answer,
    /// Execution stopped by the user.
    Stopped,
    /// Human-in-the-loop interrupt.
    Interrupt,
    /// Raw telemetry: browser page snapshot.
    BrowserScreenshot,
    /// Raw telemetry: in-flight browser action.
    BrowserAction,
    /// Raw telemetry: code execution record.
    CodeExecution,
    /// Any event name this bridge does not recognize.
    Other(String),
}

impl EventTag {
    /// Map a wire-level event name onto its tag.
    pub fn from_wire(name: &str) -> Self {
        match name {
            "TaskAnalyzerAgent" => EventTag::TaskAnalyzer,
            "TaskDecompositionAgent" => EventTag::TaskDecomposition,
            "PlanControllerAgent" => EventTag::PlanController,
            "BrowserPlannerAgent" => EventTag::BrowserPlanner,
            "ActionAgent" => EventTag::ActionAgent,
            "APIAgent" => EventTag::ApiAgent,
            "tool_call" => EventTag::ToolCall,
            "variable_update" => EventTag::VariableUpdate,
            "Answer" => EventTag::Answer,
            "stopped" => EventTag::Stopped,
            "__interrupt__" => EventTag::Interrupt,
            "browser_screenshot" => EventTag::BrowserScreenshot,
            "browser_action" => EventTag::BrowserAction,
            "code_execution" => EventTag::CodeExecution,
            other => EventTag::Other(other.to_string()),
        }
    }

    /// The wire-level name this tag was parsed from.
    pub fn wire_name(&self) -> &str {
        match self {
            EventTag::TaskAnalyzer => "TaskAnalyzerAgent",
            EventTag::TaskDecomposition => "TaskDecompositionAgent",
            EventTag::PlanController => "PlanControllerAgent",
            EventTag::BrowserPlanner => "BrowserPlannerAgent",
            EventTag::ActionAgent => "ActionAgent",
            EventTag::ApiAgent => "APIAgent",
            EventTag::ToolCall => "tool_call",
            EventTag::VariableUpdate => "variable_update",
            EventTag::Answer => "Answer",
            EventTag::Stopped => "stopped",
            EventTag::Interrupt => "__interrupt__",
            EventTag::BrowserScreenshot => "browser_screenshot",
            EventTag::BrowserAction => "browser_action",
            EventTag::CodeExecution => "code_execution",
            EventTag::Other(name) => name,
        }
    }
}

/// One framed event from the upstream stream: a name and an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentEvent {
    pub tag: EventTag,
    pub payload: String,
}

impl AgentEvent {
    pub fn new(name: &str, payload: impl Into<String>) -> Self {
        Self {
            tag: EventTag::from_wire(name),
            payload: payload.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_round_trip() {
        for name in [
            "TaskAnalyzerAgent",
            "TaskDecompositionAgent",
            "PlanControllerAgent",
            "BrowserPlannerAgent",
            "ActionAgent",
            "APIAgent",
            "tool_call",
            "variable_update",
            "Answer",
            "stopped",
            "__interrupt__",
            "browser_screenshot",
            "browser_action",
            "code_execution",
        ] {
            let tag = EventTag::from_wire(name);
            assert!(!matches!(tag, EventTag::Other(_)), "{} fell through", name);
            assert_eq!(tag.wire_name(), name);
        }
    }

    #[test]
    fn unknown_name_carries_raw_string() {
        let tag = EventTag::from_wire("ShortlisterAgent");
        assert_eq!(tag, EventTag::Other("ShortlisterAgent".to_string()));
        assert_eq!(tag.wire_name(), "ShortlisterAgent");
    }
}
