//! Trigger the deployed support-email flow on CrewAI AMP.
//!
//! When a public webhook base URL is known, the kickoff asks AMP to deliver
//! task, step and crew callbacks to this service's listener.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::config::HitlConfig;

const KICKOFF_TIMEOUT: Duration = Duration::from_secs(30);
const ERROR_BODY_LIMIT: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum KickoffError {
    #[error("missing AMP base URL (set CREWAI_AMP_URL)")]
    MissingUrl,
    #[error("missing bearer token (set CREWAI_BEARER_TOKEN)")]
    MissingToken,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("kickoff rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KickoffRequest {
    #[serde(rename = "taskWebhookUrl", skip_serializing_if = "Option::is_none")]
    pub task_webhook_url: Option<String>,
    #[serde(rename = "stepWebhookUrl", skip_serializing_if = "Option::is_none")]
    pub step_webhook_url: Option<String>,
    #[serde(rename = "crewWebhookUrl", skip_serializing_if = "Option::is_none")]
    pub crew_webhook_url: Option<String>,
}

impl KickoffRequest {
    pub fn with_webhook_base(base_url: Option<&str>) -> Self {
        let Some(base) = base_url
            .map(|value| value.trim().trim_end_matches('/'))
            .filter(|value| !value.is_empty())
        else {
            return Self::default();
        };
        Self {
            task_webhook_url: Some(format!("{}/task", base)),
            step_webhook_url: Some(format!("{}/step", base)),
            crew_webhook_url: Some(format!("{}/crew", base)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KickoffResult {
    pub kickoff_id: Option<String>,
    pub response: Value,
}

#[derive(Debug, Clone)]
pub struct KickoffClient {
    base_url: String,
    bearer_token: String,
}

impl KickoffClient {
    pub fn new(base_url: &str, bearer_token: &str) -> Result<Self, KickoffError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(KickoffError::MissingUrl);
        }
        let bearer_token = bearer_token.trim().to_string();
        if bearer_token.is_empty() {
            return Err(KickoffError::MissingToken);
        }
        Ok(Self {
            base_url,
            bearer_token,
        })
    }

    pub fn from_config(config: &HitlConfig) -> Result<Self, KickoffError> {
        let base_url = config.amp_url.as_deref().ok_or(KickoffError::MissingUrl)?;
        let token = config
            .bearer_token
            .as_deref()
            .ok_or(KickoffError::MissingToken)?;
        Self::new(base_url, token)
    }

    pub fn kickoff(&self, request: &KickoffRequest) -> Result<KickoffResult, KickoffError> {
        let url = format!("{}/kickoff", self.base_url);
        let client = reqwest::blocking::Client::builder()
            .timeout(KICKOFF_TIMEOUT)
            .build()?;
        let response = client
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .json(request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(KickoffError::Rejected {
                status: status.as_u16(),
                body: truncate_chars(&body, ERROR_BODY_LIMIT),
            });
        }

        let response: Value = response.json()?;
        let kickoff_id = ["id", "kickoff_id", "execution_id"]
            .iter()
            .filter_map(|key| response.get(*key))
            .find_map(|value| match value {
                Value::String(text) if !text.is_empty() => Some(text.clone()),
                Value::Number(number) => Some(number.to_string()),
                _ => None,
            });
        info!("flow kickoff accepted kickoff_id={:?}", kickoff_id);
        Ok(KickoffResult {
            kickoff_id,
            response,
        })
    }

    pub fn status_url(&self, kickoff_id: &str) -> String {
        format!("{}/{}/status", self.base_url, kickoff_id)
    }
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}
