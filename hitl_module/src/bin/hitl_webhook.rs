use tracing::info;

use hitl_module::{build_router, HitlConfig, WebhookState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = HitlConfig::from_env();
    let store = config.approval_store();
    let state = WebhookState::new(store, config.review_classifier())
        .with_max_body_bytes(config.max_body_bytes);
    let app = build_router(state);

    info!(
        "hitl webhook store={} read_policy={:?}",
        config.store_path.display(),
        config.store_read_policy
    );
    if let Some(base) = config.webhook_base_url.as_deref() {
        info!("point taskWebhookUrl at {}/task", base.trim_end_matches('/'));
    }
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!("hitl webhook listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
