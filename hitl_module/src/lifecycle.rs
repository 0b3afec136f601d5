//! Start-once management of the webhook listener.

use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use tracing::{error, info};

use crate::classifier::ReviewClassifier;
use crate::config::HitlConfig;
use crate::webhook::{build_router, WebhookState};

struct RunningServer {
    addr: SocketAddr,
    handle: thread::JoinHandle<()>,
}

/// Owns at most one background webhook listener.
///
/// The listener runs on a detached OS thread with its own tokio runtime, so it
/// neither blocks the caller nor keeps the process alive. There is no
/// shutdown: once started it serves until the process exits.
pub struct WebhookServer {
    config: HitlConfig,
    classifier: Arc<dyn ReviewClassifier>,
    running: Mutex<Option<RunningServer>>,
}

impl WebhookServer {
    pub fn new(config: HitlConfig) -> Self {
        let classifier = config.review_classifier();
        Self {
            config,
            classifier,
            running: Mutex::new(None),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ReviewClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Start the listener on `port`, or the configured port when `None`.
    ///
    /// Returns `true` if a listener from this handle is already running or was
    /// started now, `false` if binding or spawning failed.
    pub fn start(&self, port: Option<u16>) -> bool {
        let mut running = self.lock_running();
        if let Some(server) = running.as_ref() {
            if !server.handle.is_finished() {
                return true;
            }
        }

        let port = port.unwrap_or(self.config.port);
        let listener = match TcpListener::bind((self.config.host.as_str(), port)) {
            Ok(listener) => listener,
            Err(err) => {
                error!(
                    "hitl webhook failed to bind {}:{}: {}",
                    self.config.host, port, err
                );
                return false;
            }
        };
        let addr = match listener
            .set_nonblocking(true)
            .and_then(|_| listener.local_addr())
        {
            Ok(addr) => addr,
            Err(err) => {
                error!("hitl webhook listener setup failed: {}", err);
                return false;
            }
        };
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                error!("hitl webhook runtime failed to start: {}", err);
                return false;
            }
        };

        let state = WebhookState::new(self.config.approval_store(), self.classifier.clone())
            .with_max_body_bytes(self.config.max_body_bytes);
        let app = build_router(state);

        let spawned = thread::Builder::new()
            .name("hitl-webhook".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    let listener = match tokio::net::TcpListener::from_std(listener) {
                        Ok(listener) => listener,
                        Err(err) => {
                            error!("hitl webhook listener handoff failed: {}", err);
                            return;
                        }
                    };
                    if let Err(err) = axum::serve(listener, app).await {
                        error!("hitl webhook server stopped: {}", err);
                    }
                });
            });

        match spawned {
            Ok(handle) => {
                info!(
                    "hitl webhook listening on {} store={}",
                    addr,
                    self.config.store_path.display()
                );
                *running = Some(RunningServer { addr, handle });
                true
            }
            Err(err) => {
                error!("hitl webhook thread failed to spawn: {}", err);
                false
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_running()
            .as_ref()
            .is_some_and(|server| !server.handle.is_finished())
    }

    /// Address the running listener is bound to.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock_running()
            .as_ref()
            .filter(|server| !server.handle.is_finished())
            .map(|server| server.addr)
    }

    fn lock_running(&self) -> MutexGuard<'_, Option<RunningServer>> {
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
