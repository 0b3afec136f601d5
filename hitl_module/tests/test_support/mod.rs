#![allow(dead_code)]

use std::path::PathBuf;

use hitl_module::HitlConfig;
use tempfile::TempDir;

pub fn local_config(temp: &TempDir) -> HitlConfig {
    HitlConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        store_path: store_path(temp),
        ..HitlConfig::default()
    }
}

pub fn store_path(temp: &TempDir) -> PathBuf {
    temp.path().join("pending_hitl_approvals.json")
}
