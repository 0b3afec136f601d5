//! Operations for the process that shows pending approvals to a human.
//!
//! Resuming the paused flow happens on the orchestration platform; this side
//! only has to make sure a decided request does not show up again.

use std::fmt;

use tracing::info;

use crate::approval::PendingApproval;
use crate::approval_store::{ApprovalStore, ApprovalStoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Approve => write!(f, "approved"),
            Decision::Reject => write!(f, "rejected"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionOutcome {
    pub decision: Decision,
    /// False when the request had already been handled or never arrived.
    pub was_pending: bool,
}

pub fn get_pending_approvals(
    store: &ApprovalStore,
) -> Result<Vec<PendingApproval>, ApprovalStoreError> {
    store.read_all()
}

pub fn remove_approval(
    store: &ApprovalStore,
    execution_id: &str,
    task_id: &str,
) -> Result<bool, ApprovalStoreError> {
    store.remove(execution_id, task_id)
}

/// Record that a human decided on a request by clearing it from the store.
pub fn record_decision(
    store: &ApprovalStore,
    execution_id: &str,
    task_id: &str,
    decision: Decision,
) -> Result<DecisionOutcome, ApprovalStoreError> {
    let was_pending = remove_approval(store, execution_id, task_id)?;
    info!(
        "review {} execution_id={} task_id={} was_pending={}",
        decision, execution_id, task_id, was_pending
    );
    Ok(DecisionOutcome {
        decision,
        was_pending,
    })
}
