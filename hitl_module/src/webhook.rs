//! HTTP surface that receives CrewAI AMP webhook deliveries.
//!
//! Kickoff payloads point `taskWebhookUrl` at `/task`, `stepWebhookUrl` at
//! `/step` and `crewWebhookUrl` at `/crew`. Only `/task` can create a pending
//! approval.

mod handlers;

use std::any::Any;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::error;

use crate::approval_store::ApprovalStore;
use crate::classifier::ReviewClassifier;
use crate::config::DEFAULT_WEBHOOK_MAX_BODY_BYTES;

use handlers::{crew, health, step, task};

#[derive(Clone)]
pub struct WebhookState {
    pub store: ApprovalStore,
    pub classifier: Arc<dyn ReviewClassifier>,
    pub max_body_bytes: usize,
}

impl WebhookState {
    pub fn new(store: ApprovalStore, classifier: Arc<dyn ReviewClassifier>) -> Self {
        Self {
            store,
            classifier,
            max_body_bytes: DEFAULT_WEBHOOK_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

pub fn build_router(state: WebhookState) -> Router {
    let max_body_bytes = state.max_body_bytes;
    Router::new()
        .route("/task", post(task))
        .route("/step", post(step))
        .route("/crew", post(crew))
        .route("/health", get(health))
        .with_state(Arc::new(state))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CatchPanicLayer::custom(panic_response))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else if let Some(text) = panic.downcast_ref::<&str>() {
        text.to_string()
    } else {
        "webhook handler panicked".to_string()
    };
    error!("webhook handler panicked: {}", message);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "application/json")],
        json!({"ok": false, "message": message}).to_string(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    use crate::classifier::MarkerClassifier;

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    async fn exploding_handler() -> &'static str {
        panic!("store exploded")
    }

    #[tokio::test]
    async fn handler_panic_becomes_json_error() {
        let router = Router::new()
            .route("/task", post(exploding_handler))
            .layer(CatchPanicLayer::custom(panic_response));
        let request = Request::builder()
            .method("POST")
            .uri("/task")
            .body(Body::empty())
            .expect("request");

        let response = router.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await,
            json!({"ok": false, "message": "store exploded"})
        );
    }

    #[tokio::test]
    async fn oversized_task_body_gets_json_rejection() {
        let temp = TempDir::new().expect("tempdir");
        let store = ApprovalStore::new(temp.path().join("approvals.json"));
        let state = WebhookState::new(store.clone(), Arc::new(MarkerClassifier::default()))
            .with_max_body_bytes(16);
        let body = json!({"kickoff_id": "k1", "name": "request_review", "output": "long draft"});
        let request = Request::builder()
            .method("POST")
            .uri("/task")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");

        let response = build_router(state).oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = json_body(response).await;
        assert_eq!(body["ok"], json!(false));
        assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
        assert!(!store.path().exists());
    }
}
