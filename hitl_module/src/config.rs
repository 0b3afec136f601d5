use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;

use crate::approval_store::{ApprovalStore, ReadPolicy};
use crate::classifier::{MarkerClassifier, ReviewClassifier, TaskNameAllowlist, DEFAULT_REVIEW_MARKER};

pub const DEFAULT_STORE_PATH: &str = "./pending_hitl_approvals.json";
pub const DEFAULT_WEBHOOK_HOST: &str = "0.0.0.0";
pub const DEFAULT_WEBHOOK_PORT: u16 = 5050;
pub const DEFAULT_WEBHOOK_MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct HitlConfig {
    pub host: String,
    pub port: u16,
    pub store_path: PathBuf,
    pub store_read_policy: ReadPolicy,
    pub review_marker: String,
    /// When non-empty, only these task names are treated as review steps.
    pub review_task_names: Vec<String>,
    pub max_body_bytes: usize,
    /// Base URL of the deployed flow, used by the kickoff trigger.
    pub amp_url: Option<String>,
    pub bearer_token: Option<String>,
    /// Public URL that reaches this listener (e.g. an ngrok tunnel).
    pub webhook_base_url: Option<String>,
}

impl Default for HitlConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_WEBHOOK_HOST.to_string(),
            port: DEFAULT_WEBHOOK_PORT,
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            store_read_policy: ReadPolicy::default(),
            review_marker: DEFAULT_REVIEW_MARKER.to_string(),
            review_task_names: Vec::new(),
            max_body_bytes: DEFAULT_WEBHOOK_MAX_BODY_BYTES,
            amp_url: None,
            bearer_token: None,
            webhook_base_url: None,
        }
    }
}

impl HitlConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let host = env_value("HITL_WEBHOOK_HOST").unwrap_or(defaults.host);
        let port = env_value("HITL_WEBHOOK_PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(defaults.port);
        let store_path = env_value("HITL_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.store_path);
        let store_read_policy = match env_value("HITL_STORE_READ_POLICY") {
            Some(value) => value.parse::<ReadPolicy>().unwrap_or_else(|err| {
                warn!("{}; falling back to lenient", err);
                ReadPolicy::Lenient
            }),
            None => defaults.store_read_policy,
        };
        let review_marker = env_value("HITL_REVIEW_MARKER").unwrap_or(defaults.review_marker);
        let review_task_names = env_value("HITL_REVIEW_TASKS")
            .map(|value| parse_list(&value))
            .unwrap_or_default();
        let max_body_bytes = env_value("HITL_WEBHOOK_MAX_BODY_BYTES")
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(defaults.max_body_bytes);

        Self {
            host,
            port,
            store_path,
            store_read_policy,
            review_marker,
            review_task_names,
            max_body_bytes,
            amp_url: env_value("CREWAI_AMP_URL"),
            bearer_token: env_value("CREWAI_BEARER_TOKEN"),
            webhook_base_url: env_value("CREWAI_WEBHOOK_BASE_URL"),
        }
    }

    pub fn approval_store(&self) -> ApprovalStore {
        ApprovalStore::new(&self.store_path).with_read_policy(self.store_read_policy)
    }

    pub fn review_classifier(&self) -> Arc<dyn ReviewClassifier> {
        if self.review_task_names.is_empty() {
            Arc::new(MarkerClassifier::new(&self.review_marker))
        } else {
            Arc::new(TaskNameAllowlist::new(&self.review_task_names))
        }
    }
}

fn env_value(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
