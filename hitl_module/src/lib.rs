pub mod approval;
pub mod approval_store;
pub mod classifier;
pub mod config;
pub mod kickoff;
pub mod lifecycle;
pub mod review;
pub mod webhook;

pub use approval::{PendingApproval, DEFAULT_TASK_ID, NO_OUTPUT_PLACEHOLDER};
pub use approval_store::{ApprovalStore, ApprovalStoreError, ReadPolicy};
pub use classifier::{
    extract_pending_approval, payload_from_body, MarkerClassifier, ReviewClassifier,
    TaskNameAllowlist,
};
pub use config::HitlConfig;
pub use kickoff::{KickoffClient, KickoffError, KickoffRequest, KickoffResult};
pub use lifecycle::WebhookServer;
pub use review::{
    get_pending_approvals, record_decision, remove_approval, Decision, DecisionOutcome,
};
pub use webhook::{build_router, WebhookState};
