use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tokio::task::spawn_blocking;
use tracing::{debug, error, info};

use crate::classifier::{extract_pending_approval, payload_from_body};

use super::WebhookState;

pub(super) async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

/// Fired by the platform on every task completion.
pub(super) async fn task(
    State(state): State<Arc<WebhookState>>,
    body: Result<Bytes, BytesRejection>,
) -> (StatusCode, Json<serde_json::Value>) {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            info!("task webhook body rejected: {}", rejection.body_text());
            return (
                rejection.status(),
                Json(json!({"ok": false, "message": rejection.body_text()})),
            );
        }
    };
    let payload = payload_from_body(&body);

    if !state.classifier.is_review_task(&payload) {
        debug!(
            "task webhook ignored name={:?}",
            payload.get("name").or_else(|| payload.get("task_id"))
        );
        return (
            StatusCode::OK,
            Json(json!({"ok": true, "message": "Task received (not a review task, ignored)"})),
        );
    }

    let Some(approval) = extract_pending_approval(&payload) else {
        info!("task webhook rejected: review task without kickoff_id");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"ok": false, "message": "Missing kickoff_id"})),
        );
    };

    let execution_id = approval.execution_id.clone();
    let task_id = approval.task_id.clone();
    let store = state.store.clone();
    match spawn_blocking(move || store.upsert(approval)).await {
        Ok(Ok(())) => {
            info!(
                "review task stored execution_id={} task_id={}",
                execution_id, task_id
            );
            (
                StatusCode::OK,
                Json(json!({"ok": true, "message": "Review task stored for approval"})),
            )
        }
        Ok(Err(err)) => {
            error!(
                "failed to store review task execution_id={} task_id={}: {}",
                execution_id, task_id, err
            );
            internal_error(err.to_string())
        }
        Err(err) => {
            error!("review task store worker failed: {}", err);
            internal_error(err.to_string())
        }
    }
}

pub(super) async fn step() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"ok": true})))
}

pub(super) async fn crew() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"ok": true})))
}

fn internal_error(message: String) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"ok": false, "message": message})),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    use crate::approval_store::ApprovalStore;
    use crate::classifier::MarkerClassifier;
    use crate::webhook::{build_router, WebhookState};

    fn test_router() -> (TempDir, ApprovalStore, axum::Router) {
        let temp = TempDir::new().expect("tempdir");
        let store = ApprovalStore::new(temp.path().join("approvals.json"));
        let state = WebhookState::new(store.clone(), Arc::new(MarkerClassifier::default()));
        (temp, store, build_router(state))
    }

    async fn post(router: axum::Router, path: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");
        let response = router.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn stores_review_task() {
        let (_temp, store, router) = test_router();
        let (status, body) = post(
            router,
            "/task",
            r#"{"kickoff_id": "k1", "name": "request_review", "output": "Hi"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], json!(true));
        let approvals = store.read_all().expect("read");
        assert_eq!(approvals.len(), 1);
        assert_eq!(approvals[0].execution_id, "k1");
        assert_eq!(approvals[0].content, "Hi");
    }

    #[tokio::test]
    async fn ignores_non_review_task() {
        let (_temp, store, router) = test_router();
        let (status, body) = post(router, "/task", r#"{"name": "send_reply"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"ok": true, "message": "Task received (not a review task, ignored)"})
        );
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn malformed_body_is_ignored() {
        let (_temp, store, router) = test_router();
        let (status, body) = post(router, "/task", "{{{").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], json!(true));
        assert!(store.read_all().expect("read").is_empty());
    }

    #[tokio::test]
    async fn review_task_without_kickoff_id_is_rejected() {
        let (_temp, store, router) = test_router();
        let (status, body) = post(router, "/task", r#"{"name": "request_review"}"#).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"ok": false, "message": "Missing kickoff_id"}));
        assert!(store.read_all().expect("read").is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_internal_error() {
        let temp = TempDir::new().expect("tempdir");
        // A directory at the store path makes every write fail.
        let store = ApprovalStore::new(temp.path().to_path_buf());
        let state = WebhookState::new(store, Arc::new(MarkerClassifier::default()));
        let (status, body) = post(
            build_router(state),
            "/task",
            r#"{"kickoff_id": "k1", "name": "request_review"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["ok"], json!(false));
        assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
    }

    #[tokio::test]
    async fn step_and_crew_acknowledge_without_storing() {
        let (_temp, store, router) = test_router();
        let review = r#"{"kickoff_id": "k1", "name": "request_review", "output": "Hi"}"#;

        let (status, body) = post(router.clone(), "/step", review).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true}));

        let (status, body) = post(router, "/crew", "not json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true}));

        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (_temp, _store, router) = test_router();
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .expect("request");
        let response = router.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let body: Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(body, json!({"status": "ok"}));
    }
}
