//! Deciding which task callbacks need a human decision, and normalizing them.
//!
//! The orchestration platform sends the same callback shape for every task
//! completion and has no structural "needs review" flag, so reviewability is
//! decided from the task name. Field names also vary between webhook kinds,
//! hence the fallback chains below.

use regex::Regex;
use serde_json::{Map, Value};

use crate::approval::{PendingApproval, DEFAULT_TASK_ID, NO_OUTPUT_PLACEHOLDER};

pub const DEFAULT_REVIEW_MARKER: &str = "review";

/// Decides whether a task callback represents a step awaiting human review.
pub trait ReviewClassifier: Send + Sync {
    fn is_review_task(&self, payload: &Map<String, Value>) -> bool;
}

/// Matches when the task name contains a marker, ignoring case.
#[derive(Debug, Clone)]
pub struct MarkerClassifier {
    pattern: Regex,
}

impl MarkerClassifier {
    /// A blank marker falls back to `DEFAULT_REVIEW_MARKER`.
    pub fn new(marker: &str) -> Self {
        let marker = match marker.trim() {
            "" => DEFAULT_REVIEW_MARKER,
            trimmed => trimmed,
        };
        let pattern = Regex::new(&format!("(?i){}", regex::escape(marker)))
            .unwrap_or_else(|_| default_marker_pattern());
        Self { pattern }
    }
}

impl Default for MarkerClassifier {
    fn default() -> Self {
        Self {
            pattern: default_marker_pattern(),
        }
    }
}

impl ReviewClassifier for MarkerClassifier {
    fn is_review_task(&self, payload: &Map<String, Value>) -> bool {
        let name = task_name(payload).unwrap_or_default();
        self.pattern.is_match(&name)
    }
}

fn default_marker_pattern() -> Regex {
    Regex::new("(?i)review").expect("static review pattern")
}

/// Matches only task names from a fixed list (trimmed, case-insensitive).
#[derive(Debug, Clone, Default)]
pub struct TaskNameAllowlist {
    names: Vec<String>,
}

impl TaskNameAllowlist {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|name| name.as_ref().trim().to_ascii_lowercase())
            .filter(|name| !name.is_empty())
            .collect();
        Self { names }
    }
}

impl ReviewClassifier for TaskNameAllowlist {
    fn is_review_task(&self, payload: &Map<String, Value>) -> bool {
        let Some(name) = task_name(payload) else {
            return false;
        };
        let name = name.trim().to_ascii_lowercase();
        self.names.iter().any(|allowed| *allowed == name)
    }
}

/// Parse a callback body. Anything that is not a JSON object is an empty payload.
pub fn payload_from_body(body: &[u8]) -> Map<String, Value> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Build the pending approval for a review callback.
///
/// Returns `None` when neither `kickoff_id` nor `execution_id` is present.
pub fn extract_pending_approval(payload: &Map<String, Value>) -> Option<PendingApproval> {
    let execution_id = first_present(payload, &["kickoff_id", "execution_id"])
        .map(scalar_text)
        .filter(|value| !value.is_empty())?;
    let task_id = task_name(payload).unwrap_or_else(|| DEFAULT_TASK_ID.to_string());
    let content = first_present(payload, &["output", "summary"])
        .map(render_content)
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| NO_OUTPUT_PLACEHOLDER.to_string());

    Some(PendingApproval {
        execution_id,
        task_id,
        content,
        raw: payload.clone(),
    })
}

fn task_name(payload: &Map<String, Value>) -> Option<String> {
    first_present(payload, &["name", "task_id"]).map(scalar_text)
}

fn first_present<'a>(payload: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| payload.get(*key))
        .find(|value| is_present(value))
}

// Null, false, zero and empty strings/collections count as absent.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(true),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn render_content(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Object(_) | Value::Array(_) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        other => other.to_string(),
    }
}
