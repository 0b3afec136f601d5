//! File-backed store of pending HITL approvals.
//!
//! The JSON file is shared between the webhook listener and any reviewer
//! process. Every call re-reads it; nothing is cached between operations.
//! Writes replace the whole file without locking, so concurrent writers are
//! last-writer-wins.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::warn;

use crate::approval::PendingApproval;

/// How `read_all` treats a store file that exists but cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadPolicy {
    /// Unreadable or malformed files read as an empty store.
    #[default]
    Lenient,
    /// Unreadable or malformed files are reported to the caller.
    Strict,
}

impl std::str::FromStr for ReadPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(ReadPolicy::Lenient),
            "strict" => Ok(ReadPolicy::Strict),
            other => Err(format!("unknown store read policy: {}", other)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApprovalStoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt approval store {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
}

#[derive(Debug, Clone)]
pub struct ApprovalStore {
    path: PathBuf,
    read_policy: ReadPolicy,
}

impl ApprovalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            read_policy: ReadPolicy::default(),
        }
    }

    pub fn with_read_policy(mut self, read_policy: ReadPolicy) -> Self {
        self.read_policy = read_policy;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_policy(&self) -> ReadPolicy {
        self.read_policy
    }

    /// Read every pending approval. A missing file is an empty store.
    pub fn read_all(&self) -> Result<Vec<PendingApproval>, ApprovalStoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return match self.read_policy {
                    ReadPolicy::Lenient => {
                        warn!(
                            "approval store {} unreadable, treating as empty: {}",
                            self.path.display(),
                            err
                        );
                        Ok(Vec::new())
                    }
                    ReadPolicy::Strict => Err(ApprovalStoreError::Io(err)),
                };
            }
        };

        let records = match serde_json::from_str::<Vec<Value>>(&content) {
            Ok(records) => records,
            Err(err) => return self.malformed(err.to_string()),
        };

        let mut approvals = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            match serde_json::from_value::<PendingApproval>(record) {
                Ok(approval) => approvals.push(approval),
                Err(err) => match self.read_policy {
                    // Keep the rest of a hand-edited file usable.
                    ReadPolicy::Lenient => warn!(
                        "approval store {} record {} skipped: {}",
                        self.path.display(),
                        index,
                        err
                    ),
                    ReadPolicy::Strict => {
                        return Err(ApprovalStoreError::Corrupt {
                            path: self.path.clone(),
                            reason: format!("record {}: {}", index, err),
                        })
                    }
                },
            }
        }
        Ok(approvals)
    }

    fn malformed(&self, reason: String) -> Result<Vec<PendingApproval>, ApprovalStoreError> {
        match self.read_policy {
            ReadPolicy::Lenient => {
                warn!(
                    "approval store {} malformed, treating as empty: {}",
                    self.path.display(),
                    reason
                );
                Ok(Vec::new())
            }
            ReadPolicy::Strict => Err(ApprovalStoreError::Corrupt {
                path: self.path.clone(),
                reason,
            }),
        }
    }

    /// Overwrite the store with `approvals`, pretty-printed for hand inspection.
    pub fn write_all(&self, approvals: &[PendingApproval]) -> Result<(), ApprovalStoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let payload = serde_json::to_string_pretty(approvals)?;
        fs::write(&self.path, payload)?;
        Ok(())
    }

    /// Insert `approval`, replacing any record with the same key.
    pub fn upsert(&self, approval: PendingApproval) -> Result<(), ApprovalStoreError> {
        let mut approvals = self.read_all()?;
        approvals.retain(|existing| !existing.same_key(&approval));
        approvals.push(approval);
        self.write_all(&approvals)
    }

    /// Drop the record for `(execution_id, task_id)`. Returns whether one existed.
    pub fn remove(&self, execution_id: &str, task_id: &str) -> Result<bool, ApprovalStoreError> {
        let mut approvals = self.read_all()?;
        let before = approvals.len();
        approvals.retain(|existing| !existing.matches(execution_id, task_id));
        let removed = approvals.len() != before;
        self.write_all(&approvals)?;
        Ok(removed)
    }

    pub fn get(
        &self,
        execution_id: &str,
        task_id: &str,
    ) -> Result<Option<PendingApproval>, ApprovalStoreError> {
        Ok(self
            .read_all()?
            .into_iter()
            .find(|approval| approval.matches(execution_id, task_id)))
    }
}
