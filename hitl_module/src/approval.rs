//! Pending review requests captured from task-completion callbacks.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Task id recorded when the callback names no task.
pub const DEFAULT_TASK_ID: &str = "request_review";

/// Content recorded when the callback carries neither `output` nor `summary`.
pub const NO_OUTPUT_PLACEHOLDER: &str = "(No output in task webhook)";

/// A review request waiting for a human decision.
///
/// Keyed by `(execution_id, task_id)`; the store holds at most one record per key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingApproval {
    pub execution_id: String,
    pub task_id: String,
    pub content: String,
    /// The full callback payload as delivered.
    #[serde(default)]
    pub raw: Map<String, Value>,
}

impl PendingApproval {
    pub fn matches(&self, execution_id: &str, task_id: &str) -> bool {
        self.execution_id == execution_id && self.task_id == task_id
    }

    pub fn same_key(&self, other: &PendingApproval) -> bool {
        self.matches(&other.execution_id, &other.task_id)
    }
}
