//! Pure transform from one upstream event to a partial state update.
//!
//! The upstream emits a heterogeneous mix of structured and unstructured
//! payloads; a transform failure must never abort an in-progress execution.
//! Every handler therefore degrades on a JSON parse failure instead of
//! erroring: step events fall back to raw text accumulation, telemetry
//! events log and drop, and `tool_call` leaves the pending list unchanged.
//!
//! The transform reads the prior state snapshot but never mutates it; merged
//! collections (subtask list, variables map, code-execution list) are cloned
//! and edited here, then handed to the accumulator as whole-field
//! replacements.

use serde_json::Value;
use tracing::{debug, warn};

use super::events::{AgentEvent, EventTag};
use super::state::{
    BrowserAction, BrowserActionStatus, BrowserSnapshot, CodeExecution, CodeExecutionStatus,
    ExecutionState, ExecutionStatus, HitlKind, HitlRequest, StateUpdate, Subtask, SubtaskStatus,
};

/// Message used when an interrupt payload carries no `message` field.
const DEFAULT_HITL_PROMPT: &str = "The agent is waiting for your approval to continue";

/// Error recorded when the upstream reports a user-initiated stop.
pub const STOPPED_BY_USER: &str = "Execution stopped by user";

/// Compute the partial update for one event against the current state.
pub fn transform(event: &AgentEvent, state: &ExecutionState) -> StateUpdate {
    let mut update = StateUpdate {
        current_node: Some(event.tag.wire_name().to_string()),
        ..Default::default()
    };

    match &event.tag {
        EventTag::Answer => apply_answer(&event.payload, state, &mut update),
        EventTag::ToolCall => apply_tool_call(&event.payload, &mut update),
        EventTag::Interrupt => apply_interrupt(&event.payload, state, &mut update),
        EventTag::Stopped => {
            update.error = Some(STOPPED_BY_USER.to_string());
            update.status = Some(ExecutionStatus::Failed);
        }
        EventTag::TaskAnalyzer => {
            update.status = Some(ExecutionStatus::Planning);
            update.reasoning = Some(event.payload.clone());
        }
        EventTag::TaskDecomposition => apply_decomposition(&event.payload, state, &mut update),
        EventTag::PlanController => apply_plan_controller(&event.payload, state, &mut update),
        EventTag::BrowserPlanner | EventTag::ActionAgent => {
            apply_browser_step(&event.payload, state, &mut update)
        }
        EventTag::BrowserScreenshot => apply_screenshot_telemetry(&event.payload, state, &mut update),
        EventTag::BrowserAction => apply_action_telemetry(&event.payload, &mut update),
        EventTag::CodeExecution => apply_code_telemetry(&event.payload, state, &mut update),
        EventTag::VariableUpdate => apply_variable_update(&event.payload, state, &mut update),
        EventTag::ApiAgent => apply_api_step(&event.payload, state, &mut update),
        EventTag::Other(name) => {
            if !event.payload.is_empty() {
                debug!("Unrecognized event '{}', appending payload to content", name);
                update.streaming_content =
                    Some(format!("{}\n{}", state.streaming_content, event.payload));
            }
        }
    }

    update
}

fn apply_answer(payload: &str, state: &ExecutionState, update: &mut StateUpdate) {
    update.status = Some(ExecutionStatus::Complete);

    let parsed: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(_) => {
            // Plain-text answer.
            update.final_answer = Some(payload.to_string());
            update.streaming_content = Some(payload.to_string());
            return;
        }
    };

    let text = match parsed.get("data") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => payload.to_string(),
    };
    update.final_answer = Some(text.clone());
    update.streaming_content = Some(text);

    if let Some(vars) = parsed.get("variables").and_then(Value::as_object) {
        let mut merged = state.variables.clone();
        for (name, raw) in vars {
            merged.insert(name.clone(), variable_info(raw));
        }
        update.variables = Some(merged);
    }
}

fn apply_tool_call(payload: &str, update: &mut StateUpdate) {
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Array(calls)) => update.pending_tool_calls = Some(calls),
        Ok(other) => warn!("tool_call payload was not an array: {}", other),
        Err(e) => warn!("Failed to parse tool_call payload: {}", e),
    }
}

fn apply_interrupt(payload: &str, state: &ExecutionState, update: &mut StateUpdate) {
    let request = match serde_json::from_str::<Value>(payload) {
        Ok(v) => HitlRequest {
            id: format!("hitl-{}", now_ms()),
            kind: v
                .get("type")
                .and_then(Value::as_str)
                .map(HitlKind::from_wire)
                .unwrap_or(HitlKind::Approval),
            message: v
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_HITL_PROMPT)
                .to_string(),
            context: v.get("context").cloned(),
            risk: v.get("risk").and_then(Value::as_str).map(String::from),
            options: v.get("options").and_then(Value::as_array).map(|opts| {
                opts.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            }),
            pending: true,
        },
        Err(_) => HitlRequest {
            id: format!("hitl-{}", now_ms()),
            kind: HitlKind::Approval,
            message: if payload.is_empty() {
                DEFAULT_HITL_PROMPT.to_string()
            } else {
                payload.to_string()
            },
            context: None,
            risk: None,
            options: None,
            pending: true,
        },
    };

    let mut requests = state.hitl_requests.clone();
    requests.push(request);
    update.hitl_requests = Some(requests);
    update.needs_approval = Some(true);
    update.status = Some(ExecutionStatus::WaitingHitl);
}

fn apply_decomposition(payload: &str, state: &ExecutionState, update: &mut StateUpdate) {
    let parsed: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(_) => {
            update.streaming_content = Some(append(state, payload));
            return;
        }
    };

    // Subtasks arrive either at the top level or nested under a
    // decomposition object.
    let entries = parsed
        .get("subtasks")
        .and_then(Value::as_array)
        .or_else(|| {
            parsed
                .get("decomposition")
                .and_then(|d| d.get("subtasks"))
                .and_then(Value::as_array)
        });

    match entries {
        Some(entries) => {
            let subtasks = entries
                .iter()
                .enumerate()
                .map(|(i, entry)| normalize_subtask(entry, i))
                .collect();
            update.subtasks = Some(subtasks);
            update.status = Some(ExecutionStatus::Planning);
        }
        None => update.streaming_content = Some(append(state, payload)),
    }
}

fn normalize_subtask(entry: &Value, index: usize) -> Subtask {
    Subtask {
        id: entry
            .get("id")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| format!("subtask-{}", index)),
        description: entry
            .get("description")
            .or_else(|| entry.get("task"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        status: entry
            .get("status")
            .and_then(Value::as_str)
            .and_then(SubtaskStatus::from_wire)
            .unwrap_or(SubtaskStatus::Pending),
        app: entry.get("app").and_then(Value::as_str).map(String::from),
        kind: entry.get("type").and_then(Value::as_str).map(String::from),
        parent_id: entry
            .get("parent_id")
            .and_then(Value::as_str)
            .map(String::from),
        duration_ms: None,
        error: None,
    }
}

fn apply_plan_controller(payload: &str, state: &ExecutionState, update: &mut StateUpdate) {
    // Malformed controller payloads are swallowed entirely.
    let parsed: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => {
            debug!("Ignoring unparsable plan-controller payload: {}", e);
            return;
        }
    };

    update.status = Some(ExecutionStatus::Executing);

    // The upstream reports the active subtask and status changes through two
    // separate fields of the same payload; both are honored independently.
    if let Some(current) = parsed.get("current_subtask_id").and_then(Value::as_str) {
        update.current_subtask_id = Some(current.to_string());
    }

    let target = parsed.get("subtask_id").and_then(Value::as_str);
    let new_status = parsed
        .get("subtask_status")
        .and_then(Value::as_str)
        .and_then(SubtaskStatus::from_wire);
    if let (Some(target), Some(new_status)) = (target, new_status) {
        let mut subtasks = state.subtasks.clone();
        let mut matched = false;
        for subtask in &mut subtasks {
            if subtask.id == target {
                subtask.status = new_status;
                matched = true;
            }
        }
        if matched {
            update.subtasks = Some(subtasks);
        } else {
            debug!("Plan controller referenced unknown subtask '{}'", target);
        }
    }
}

fn apply_browser_step(payload: &str, state: &ExecutionState, update: &mut StateUpdate) {
    let parsed: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(_) => {
            update.streaming_content = Some(append(state, payload));
            return;
        }
    };

    update.status = Some(ExecutionStatus::Executing);

    if parsed.get("screenshot").and_then(Value::as_str).is_some() {
        update.browser_snapshot = Some(browser_snapshot(&parsed, state));
    }
    if let Some(action) = parsed.get("action") {
        update.browser_action = Some(browser_action(action));
    }
}

fn apply_screenshot_telemetry(payload: &str, state: &ExecutionState, update: &mut StateUpdate) {
    match serde_json::from_str::<Value>(payload) {
        Ok(v) if v.get("screenshot").and_then(Value::as_str).is_some() => {
            update.browser_snapshot = Some(browser_snapshot(&v, state));
        }
        Ok(_) => warn!("browser_screenshot payload had no screenshot field"),
        Err(e) => warn!("Failed to parse browser_screenshot payload: {}", e),
    }
}

fn apply_action_telemetry(payload: &str, update: &mut StateUpdate) {
    match serde_json::from_str::<Value>(payload) {
        Ok(v) => update.browser_action = Some(browser_action(&v)),
        Err(e) => warn!("Failed to parse browser_action payload: {}", e),
    }
}

fn apply_code_telemetry(payload: &str, state: &ExecutionState, update: &mut StateUpdate) {
    match serde_json::from_str::<Value>(payload) {
        Ok(v) => {
            let record = code_execution(&v);
            update.code_executions = Some(upsert_code_execution(&state.code_executions, record));
        }
        Err(e) => warn!("Failed to parse code_execution payload: {}", e),
    }
}

fn apply_variable_update(payload: &str, state: &ExecutionState, update: &mut StateUpdate) {
    match serde_json::from_str::<Value>(payload) {
        Ok(v) => {
            let Some(name) = v.get("name").and_then(Value::as_str) else {
                warn!("variable_update payload had no name field");
                return;
            };
            let mut variables = state.variables.clone();
            variables.insert(name.to_string(), variable_info(&v));
            update.variables = Some(variables);
        }
        Err(e) => warn!("Failed to parse variable_update payload: {}", e),
    }
}

fn apply_api_step(payload: &str, state: &ExecutionState, update: &mut StateUpdate) {
    let parsed: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(_) => {
            update.streaming_content = Some(append(state, payload));
            return;
        }
    };

    update.status = Some(ExecutionStatus::Executing);

    if parsed.get("code").and_then(Value::as_str).is_some() {
        let record = code_execution(&parsed);
        update.code_executions = Some(upsert_code_execution(&state.code_executions, record));
    }
}

// ── Payload pieces ────────────────────────────────────────────────

fn variable_info(raw: &Value) -> super::state::VariableInfo {
    super::state::VariableInfo {
        kind: raw.get("type").and_then(Value::as_str).map(String::from),
        value: raw.get("value").cloned().unwrap_or(Value::Null),
        description: raw
            .get("description")
            .and_then(Value::as_str)
            .map(String::from),
    }
}

fn browser_snapshot(v: &Value, state: &ExecutionState) -> BrowserSnapshot {
    BrowserSnapshot {
        screenshot: v
            .get("screenshot")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        // A snapshot without a url keeps the previously seen one.
        url: v
            .get("url")
            .and_then(Value::as_str)
            .map(String::from)
            .or_else(|| state.browser_snapshot.as_ref().and_then(|s| s.url.clone())),
        elements: v
            .get("elements")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        viewport: v.get("viewport").cloned(),
    }
}

fn browser_action(v: &Value) -> BrowserAction {
    BrowserAction {
        kind: v
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        element_id: v
            .get("element_id")
            .and_then(Value::as_str)
            .map(String::from),
        value: v.get("value").and_then(Value::as_str).map(String::from),
        status: v
            .get("status")
            .and_then(Value::as_str)
            .and_then(BrowserActionStatus::from_wire)
            .unwrap_or(BrowserActionStatus::Executing),
        error: v.get("error").and_then(Value::as_str).map(String::from),
    }
}

fn code_execution(v: &Value) -> CodeExecution {
    CodeExecution {
        id: v
            .get("id")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| format!("exec-{}", now_ms())),
        code: v
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        language: v
            .get("language")
            .and_then(Value::as_str)
            .unwrap_or("python")
            .to_string(),
        status: v
            .get("status")
            .and_then(Value::as_str)
            .and_then(CodeExecutionStatus::from_wire)
            .unwrap_or(CodeExecutionStatus::Running),
        output: v.get("output").and_then(Value::as_str).map(String::from),
        error: v.get("error").and_then(Value::as_str).map(String::from),
        duration_ms: v.get("duration_ms").and_then(Value::as_u64),
        sandbox: v.get("sandbox").and_then(Value::as_str).map(String::from),
    }
}

/// Replace an existing record with the same id, or append. At most one live
/// record per id.
fn upsert_code_execution(existing: &[CodeExecution], record: CodeExecution) -> Vec<CodeExecution> {
    let mut out = existing.to_vec();
    match out.iter_mut().find(|c| c.id == record.id) {
        Some(slot) => *slot = record,
        None => out.push(record),
    }
    out
}

fn append(state: &ExecutionState, payload: &str) -> String {
    format!("{}{}", state.streaming_content, payload)
}

/// HITL and generated code-execution ids derive from wall-clock time. Rapid
/// successive events can collide; callers treat the id as advisory.
fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(name: &str, payload: &str) -> AgentEvent {
        AgentEvent::new(name, payload)
    }

    fn fresh() -> ExecutionState {
        ExecutionState::new("t1", "query")
    }

    #[test]
    fn every_event_sets_current_node() {
        let update = transform(&event("SomeFutureAgent", ""), &fresh());
        assert_eq!(update.current_node.as_deref(), Some("SomeFutureAgent"));
    }

    // ── answer ─────────────────────────────────────────────────────

    #[test]
    fn answer_with_json_payload() {
        let payload = json!({
            "data": "Done",
            "variables": {
                "count": {"type": "number", "value": 50, "description": "account count"}
            }
        })
        .to_string();
        let update = transform(&event("Answer", &payload), &fresh());

        assert_eq!(update.final_answer.as_deref(), Some("Done"));
        assert_eq!(update.streaming_content.as_deref(), Some("Done"));
        assert_eq!(update.status, Some(ExecutionStatus::Complete));
        let vars = update.variables.unwrap();
        assert_eq!(vars["count"].kind.as_deref(), Some("number"));
        assert_eq!(vars["count"].value, json!(50));
    }

    #[test]
    fn answer_with_plain_text_payload() {
        let update = transform(&event("Answer", "just the answer"), &fresh());
        assert_eq!(update.final_answer.as_deref(), Some("just the answer"));
        assert_eq!(update.streaming_content.as_deref(), Some("just the answer"));
        assert_eq!(update.status, Some(ExecutionStatus::Complete));
        assert!(update.variables.is_none());
    }

    #[test]
    fn answer_replaces_streaming_content() {
        let mut state = fresh();
        state.streaming_content = "intermediate chatter".to_string();
        let update = transform(&event("Answer", r#"{"data":"Final"}"#), &state);
        assert_eq!(update.streaming_content.as_deref(), Some("Final"));
    }

    #[test]
    fn answer_merges_variables_over_existing() {
        let mut state = fresh();
        state.variables.insert(
            "earlier".to_string(),
            super::super::state::VariableInfo {
                kind: Some("string".to_string()),
                value: json!("kept"),
                description: None,
            },
        );
        let payload = json!({"data": "ok", "variables": {"late": {"value": 1}}}).to_string();
        let update = transform(&event("Answer", &payload), &state);
        let vars = update.variables.unwrap();
        assert!(vars.contains_key("earlier"));
        assert!(vars.contains_key("late"));
    }

    // ── tool_call ──────────────────────────────────────────────────

    #[test]
    fn tool_call_replaces_pending_list() {
        let payload = json!([{"name": "get_accounts", "args": {}}]).to_string();
        let update = transform(&event("tool_call", &payload), &fresh());
        assert_eq!(update.pending_tool_calls.unwrap().len(), 1);
    }

    #[test]
    fn tool_call_malformed_payload_leaves_list_unchanged() {
        let update = transform(&event("tool_call", "not-json"), &fresh());
        assert!(update.pending_tool_calls.is_none());
    }

    #[test]
    fn tool_call_non_array_json_leaves_list_unchanged() {
        let update = transform(&event("tool_call", r#"{"name":"x"}"#), &fresh());
        assert!(update.pending_tool_calls.is_none());
    }

    // ── interrupt ──────────────────────────────────────────────────

    #[test]
    fn interrupt_appends_hitl_request() {
        let payload = json!({"type": "confirmation", "message": "Proceed?"}).to_string();
        let update = transform(&event("__interrupt__", &payload), &fresh());

        assert_eq!(update.status, Some(ExecutionStatus::WaitingHitl));
        assert_eq!(update.needs_approval, Some(true));
        let requests = update.hitl_requests.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].kind, HitlKind::Confirmation);
        assert_eq!(requests[0].message, "Proceed?");
        assert!(requests[0].pending);
    }

    #[test]
    fn interrupt_preserves_earlier_requests() {
        let mut state = fresh();
        let first = transform(&event("__interrupt__", r#"{"message":"first"}"#), &state);
        state.hitl_requests = first.hitl_requests.unwrap();
        let second = transform(&event("__interrupt__", r#"{"message":"second"}"#), &state);
        let requests = second.hitl_requests.unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].message, "first");
        assert_eq!(requests[1].message, "second");
    }

    #[test]
    fn interrupt_with_plain_text_uses_payload_as_message() {
        let update = transform(&event("__interrupt__", "need a human"), &fresh());
        let requests = update.hitl_requests.unwrap();
        assert_eq!(requests[0].message, "need a human");
        assert_eq!(requests[0].kind, HitlKind::Approval);
    }

    #[test]
    fn interrupt_defaults_type_and_message() {
        let update = transform(&event("__interrupt__", "{}"), &fresh());
        let requests = update.hitl_requests.unwrap();
        assert_eq!(requests[0].kind, HitlKind::Approval);
        assert_eq!(requests[0].message, DEFAULT_HITL_PROMPT);
    }

    // ── stopped ────────────────────────────────────────────────────

    #[test]
    fn stopped_records_error_and_fails() {
        let update = transform(&event("stopped", ""), &fresh());
        assert_eq!(update.error.as_deref(), Some(STOPPED_BY_USER));
        assert_eq!(update.status, Some(ExecutionStatus::Failed));
    }

    // ── task analysis ──────────────────────────────────────────────

    #[test]
    fn task_analyzer_captures_reasoning() {
        let update = transform(&event("TaskAnalyzerAgent", "the task needs two apps"), &fresh());
        assert_eq!(update.status, Some(ExecutionStatus::Planning));
        assert_eq!(update.reasoning.as_deref(), Some("the task needs two apps"));
    }

    // ── decomposition ──────────────────────────────────────────────

    #[test]
    fn decomposition_normalizes_subtasks() {
        let payload = json!({
            "subtasks": [
                {"id": "s1", "description": "find user", "app": "crm", "type": "api"},
                {"task": "open page", "status": "running"}
            ]
        })
        .to_string();
        let update = transform(&event("TaskDecompositionAgent", &payload), &fresh());

        assert_eq!(update.status, Some(ExecutionStatus::Planning));
        let subtasks = update.subtasks.unwrap();
        assert_eq!(subtasks.len(), 2);
        assert_eq!(subtasks[0].id, "s1");
        assert_eq!(subtasks[0].description, "find user");
        assert_eq!(subtasks[0].app.as_deref(), Some("crm"));
        assert_eq!(subtasks[0].status, SubtaskStatus::Pending);
        // Positional id and `task` description fallback.
        assert_eq!(subtasks[1].id, "subtask-1");
        assert_eq!(subtasks[1].description, "open page");
        assert_eq!(subtasks[1].status, SubtaskStatus::Running);
    }

    #[test]
    fn decomposition_accepts_nested_shape() {
        let payload = json!({
            "decomposition": {"subtasks": [{"id": "s1", "description": "only one"}]}
        })
        .to_string();
        let update = transform(&event("TaskDecompositionAgent", &payload), &fresh());
        assert_eq!(update.subtasks.unwrap().len(), 1);
    }

    #[test]
    fn decomposition_without_subtasks_appends_to_content() {
        let mut state = fresh();
        state.streaming_content = "before ".to_string();
        let update = transform(&event("TaskDecompositionAgent", "free text"), &state);
        assert_eq!(update.streaming_content.as_deref(), Some("before free text"));
        assert!(update.subtasks.is_none());
        assert!(update.status.is_none());
    }

    // ── plan controller ────────────────────────────────────────────

    #[test]
    fn plan_controller_updates_only_matched_subtask() {
        let mut state = fresh();
        for id in ["s1", "s2", "s3"] {
            state.subtasks.push(Subtask {
                id: id.to_string(),
                description: format!("step {}", id),
                status: SubtaskStatus::Pending,
                app: None,
                kind: None,
                parent_id: None,
                duration_ms: None,
                error: None,
            });
        }

        let payload = json!({"subtask_id": "s2", "subtask_status": "complete"}).to_string();
        let update = transform(&event("PlanControllerAgent", &payload), &state);

        assert_eq!(update.status, Some(ExecutionStatus::Executing));
        let subtasks = update.subtasks.unwrap();
        let ids: Vec<&str> = subtasks.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["s1", "s2", "s3"]);
        assert_eq!(subtasks[0].status, SubtaskStatus::Pending);
        assert_eq!(subtasks[1].status, SubtaskStatus::Complete);
        assert_eq!(subtasks[2].status, SubtaskStatus::Pending);
    }

    #[test]
    fn plan_controller_reads_current_id_from_its_own_field() {
        // `current_subtask_id` and `subtask_id` are distinct wire fields and
        // are honored independently.
        let payload = json!({"current_subtask_id": "s7"}).to_string();
        let update = transform(&event("PlanControllerAgent", &payload), &fresh());
        assert_eq!(update.current_subtask_id.as_deref(), Some("s7"));
        assert!(update.subtasks.is_none());
    }

    #[test]
    fn plan_controller_swallows_malformed_payload() {
        let update = transform(&event("PlanControllerAgent", "garbage"), &fresh());
        assert!(update.status.is_none());
        assert!(update.subtasks.is_none());
        assert!(update.current_subtask_id.is_none());
        assert!(update.streaming_content.is_none());
    }

    #[test]
    fn plan_controller_ignores_unknown_subtask_id() {
        let payload = json!({"subtask_id": "nope", "subtask_status": "complete"}).to_string();
        let update = transform(&event("PlanControllerAgent", &payload), &fresh());
        assert!(update.subtasks.is_none());
    }

    // ── browser steps ──────────────────────────────────────────────

    #[test]
    fn browser_step_replaces_snapshot() {
        let payload = json!({
            "screenshot": "base64-image",
            "url": "https://example.com",
            "elements": [{"id": 1}],
            "viewport": {"width": 1280, "height": 720}
        })
        .to_string();
        let update = transform(&event("BrowserPlannerAgent", &payload), &fresh());

        assert_eq!(update.status, Some(ExecutionStatus::Executing));
        let snapshot = update.browser_snapshot.unwrap();
        assert_eq!(snapshot.screenshot, "base64-image");
        assert_eq!(snapshot.url.as_deref(), Some("https://example.com"));
        assert_eq!(snapshot.elements.len(), 1);
    }

    #[test]
    fn browser_step_snapshot_keeps_prior_url() {
        let mut state = fresh();
        state.browser_snapshot = Some(BrowserSnapshot {
            screenshot: "old".to_string(),
            url: Some("https://kept.example".to_string()),
            elements: vec![],
            viewport: None,
        });
        let payload = json!({"screenshot": "new"}).to_string();
        let update = transform(&event("ActionAgent", &payload), &state);
        let snapshot = update.browser_snapshot.unwrap();
        assert_eq!(snapshot.screenshot, "new");
        assert_eq!(snapshot.url.as_deref(), Some("https://kept.example"));
    }

    #[test]
    fn browser_step_sets_inflight_action() {
        let payload = json!({
            "action": {"type": "click", "element_id": "el-3", "value": null}
        })
        .to_string();
        let update = transform(&event("ActionAgent", &payload), &fresh());
        let action = update.browser_action.unwrap();
        assert_eq!(action.kind, "click");
        assert_eq!(action.element_id.as_deref(), Some("el-3"));
        assert_eq!(action.status, BrowserActionStatus::Executing);
    }

    #[test]
    fn browser_step_plain_text_appends_to_content() {
        let update = transform(&event("BrowserPlannerAgent", "narration"), &fresh());
        assert_eq!(update.streaming_content.as_deref(), Some("narration"));
        assert!(update.browser_snapshot.is_none());
    }

    // ── raw telemetry ──────────────────────────────────────────────

    #[test]
    fn screenshot_telemetry_replaces_snapshot() {
        let payload = json!({"screenshot": "img", "url": "https://a.example"}).to_string();
        let update = transform(&event("browser_screenshot", &payload), &fresh());
        assert_eq!(update.browser_snapshot.unwrap().screenshot, "img");
        // Telemetry does not advance the overall status.
        assert!(update.status.is_none());
    }

    #[test]
    fn screenshot_telemetry_malformed_is_dropped() {
        let update = transform(&event("browser_screenshot", "not json"), &fresh());
        assert!(update.browser_snapshot.is_none());
        assert!(update.streaming_content.is_none());
    }

    #[test]
    fn action_telemetry_carries_error() {
        let payload = json!({
            "type": "type_text", "element_id": "el-9",
            "status": "failed", "error": "element not found"
        })
        .to_string();
        let update = transform(&event("browser_action", &payload), &fresh());
        let action = update.browser_action.unwrap();
        assert_eq!(action.status, BrowserActionStatus::Failed);
        assert_eq!(action.error.as_deref(), Some("element not found"));
    }

    #[test]
    fn code_telemetry_upserts_by_id() {
        let mut state = fresh();
        let first = json!({"id": "c1", "code": "print(1)", "status": "running"}).to_string();
        let update = transform(&event("code_execution", &first), &state);
        state.code_executions = update.code_executions.unwrap();

        let second = json!({
            "id": "c1", "code": "print(1)", "status": "complete", "output": "1"
        })
        .to_string();
        let update = transform(&event("code_execution", &second), &state);
        let executions = update.code_executions.unwrap();

        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].id, "c1");
        assert_eq!(executions[0].status, CodeExecutionStatus::Complete);
        assert_eq!(executions[0].output.as_deref(), Some("1"));
    }

    #[test]
    fn code_telemetry_generates_id_when_absent() {
        let payload = json!({"code": "x = 1"}).to_string();
        let update = transform(&event("code_execution", &payload), &fresh());
        let executions = update.code_executions.unwrap();
        assert!(executions[0].id.starts_with("exec-"));
        assert_eq!(executions[0].language, "python");
    }

    #[test]
    fn variable_update_merges_single_variable() {
        let mut state = fresh();
        state.variables.insert(
            "kept".to_string(),
            super::super::state::VariableInfo {
                kind: None,
                value: json!(true),
                description: None,
            },
        );
        let payload = json!({
            "name": "total", "type": "number", "value": 42, "description": "sum"
        })
        .to_string();
        let update = transform(&event("variable_update", &payload), &state);
        let vars = update.variables.unwrap();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars["total"].value, json!(42));
        assert_eq!(vars["total"].description.as_deref(), Some("sum"));
    }

    #[test]
    fn variable_update_without_name_is_dropped() {
        let update = transform(&event("variable_update", r#"{"value": 1}"#), &fresh());
        assert!(update.variables.is_none());
    }

    // ── api agent ──────────────────────────────────────────────────

    #[test]
    fn api_step_upserts_code_execution() {
        let payload = json!({"code": "resp = call()", "id": "api-1"}).to_string();
        let update = transform(&event("APIAgent", &payload), &fresh());
        assert_eq!(update.status, Some(ExecutionStatus::Executing));
        let executions = update.code_executions.unwrap();
        assert_eq!(executions[0].id, "api-1");
        assert_eq!(executions[0].language, "python");
    }

    #[test]
    fn api_step_without_code_only_marks_executing() {
        let update = transform(&event("APIAgent", r#"{"plan": "call crm"}"#), &fresh());
        assert_eq!(update.status, Some(ExecutionStatus::Executing));
        assert!(update.code_executions.is_none());
    }

    #[test]
    fn api_step_plain_text_appends() {
        let update = transform(&event("APIAgent", "thinking about apis"), &fresh());
        assert_eq!(
            update.streaming_content.as_deref(),
            Some("thinking about apis")
        );
    }

    // ── unknown events ─────────────────────────────────────────────

    #[test]
    fn unknown_event_appends_with_newline() {
        let mut state = fresh();
        state.streaming_content = "so far".to_string();
        let update = transform(&event("ShortlisterAgent", "candidates: 3"), &state);
        assert_eq!(
            update.streaming_content.as_deref(),
            Some("so far\ncandidates: 3")
        );
    }

    #[test]
    fn unknown_event_with_empty_payload_is_inert() {
        let update = transform(&event("HeartbeatAgent", ""), &fresh());
        assert!(update.streaming_content.is_none());
        assert_eq!(update.current_node.as_deref(), Some("HeartbeatAgent"));
    }
}
