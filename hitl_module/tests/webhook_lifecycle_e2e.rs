mod test_support;

use std::net::TcpListener;
use std::time::Duration;

use hitl_module::{ApprovalStore, WebhookServer};
use serde_json::{json, Value};
use tempfile::TempDir;

use test_support::local_config;

fn client() -> reqwest::blocking::Client {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("client")
}

#[test]
fn start_is_idempotent_and_serves_callbacks() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let config = local_config(&temp);
    let store = ApprovalStore::new(&config.store_path);
    let server = WebhookServer::new(config);

    assert!(!server.is_running());
    assert!(server.start(None));
    let addr = server.local_addr().expect("bound address");
    assert!(server.is_running());

    assert!(server.start(None));
    assert_eq!(server.local_addr(), Some(addr));

    let base = format!("http://{}", addr);
    let client = client();

    let health: Value = client.get(format!("{}/health", base)).send()?.json()?;
    assert_eq!(health, json!({"status": "ok"}));

    let response = client
        .post(format!("{}/task", base))
        .json(&json!({"kickoff_id": "k1", "name": "request_review", "output": "first"}))
        .send()?;
    assert_eq!(response.status().as_u16(), 200);

    let response = client
        .post(format!("{}/task", base))
        .json(&json!({"kickoff_id": "k1", "name": "request_review", "output": "second"}))
        .send()?;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json()?;
    assert_eq!(body["ok"], json!(true));

    let approvals = store.read_all()?;
    assert_eq!(approvals.len(), 1);
    assert_eq!(approvals[0].execution_id, "k1");
    assert_eq!(approvals[0].content, "second");

    let response = client
        .post(format!("{}/crew", base))
        .json(&json!({"kickoff_id": "k2", "name": "request_review"}))
        .send()?;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(store.read_all()?.len(), 1);

    Ok(())
}

#[test]
fn start_fails_when_port_is_taken() -> Result<(), Box<dyn std::error::Error>> {
    let occupied = TcpListener::bind("127.0.0.1:0")?;
    let port = occupied.local_addr()?.port();

    let temp = TempDir::new()?;
    let server = WebhookServer::new(local_config(&temp));

    assert!(!server.start(Some(port)));
    assert!(!server.is_running());
    assert!(server.local_addr().is_none());
    Ok(())
}

#[test]
fn independent_handles_run_side_by_side() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let first = WebhookServer::new(local_config(&temp));
    let second = WebhookServer::new(local_config(&temp));

    assert!(first.start(None));
    assert!(second.start(None));
    assert_ne!(first.local_addr(), second.local_addr());
    Ok(())
}

#[test]
fn hostname_host_is_resolved() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let mut config = local_config(&temp);
    config.host = "localhost".to_string();
    let server = WebhookServer::new(config);

    assert!(server.start(None));
    let addr = server.local_addr().expect("bound address");
    assert!(addr.ip().is_loopback());

    let health: Value = client()
        .get(format!("http://{}/health", addr))
        .send()?
        .json()?;
    assert_eq!(health, json!({"status": "ok"}));
    Ok(())
}
