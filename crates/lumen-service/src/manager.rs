use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lumen_core::{AppContext, LumenError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::process::Child;

use crate::api::{HealthResponse, HEALTH};
use crate::launcher::{LaunchError, ProcessLauncher, ServiceLauncher};
use crate::ports::{next_port, seed_port};

/// Online state of the retrieval service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthStatus {
    pub online: bool,
    pub port: Option<u16>,
}

/// Sole owner of the supervised retrieval process.
///
/// At most one start attempt runs at a time. Callers that arrive while an
/// attempt is running wait for it and share its outcome.
pub struct ServiceManager {
    ctx: Arc<AppContext>,
    http: reqwest::Client,
    launcher: Arc<dyn ServiceLauncher>,
    expected_version: String,
    max_port_retries: u32,
    health_timeout: Duration,
    seed_port: u16,
    start_lock: tokio::sync::Mutex<()>,
    /// Number of finished start attempts.
    attempts: AtomicU64,
    last_start_ok: AtomicBool,
    child: Mutex<Option<Child>>,
}

impl std::fmt::Debug for ServiceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceManager")
            .field("expected_version", &self.expected_version)
            .field("seed_port", &self.seed_port)
            .field("port", &self.port())
            .finish_non_exhaustive()
    }
}

impl ServiceManager {
    /// A manager that launches the configured executable.
    pub fn new(ctx: Arc<AppContext>) -> Self {
        let launcher = Arc::new(ProcessLauncher::new(&ctx.config().service));
        Self::with_launcher(ctx, launcher)
    }

    /// A manager that starts the service through `launcher`.
    pub fn with_launcher(ctx: Arc<AppContext>, launcher: Arc<dyn ServiceLauncher>) -> Self {
        let config = ctx.config().service;
        Self {
            ctx,
            http: reqwest::Client::new(),
            launcher,
            expected_version: config.version,
            max_port_retries: config.max_port_retries,
            health_timeout: Duration::from_millis(config.start_timeout_ms),
            seed_port: seed_port(&mut rand::rng()),
            start_lock: tokio::sync::Mutex::new(()),
            attempts: AtomicU64::new(0),
            last_start_ok: AtomicBool::new(false),
            child: Mutex::new(None),
        }
    }

    /// The remembered port, if a service was ever started.
    pub fn port(&self) -> Option<u16> {
        self.ctx.state().rag_port()
    }

    fn base_url(&self) -> String {
        let port = self.port().unwrap_or(self.seed_port);
        format!("http://127.0.0.1:{port}")
    }

    /// Whether a service with the expected version answers on the
    /// remembered port.
    pub async fn is_healthy(&self) -> bool {
        if self.port().is_none() {
            return false;
        }
        let url = format!("{}{HEALTH}", self.base_url());
        let response = match self
            .http
            .get(&url)
            .timeout(self.health_timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "health check failed");
                return false;
            }
        };
        if response.status() != reqwest::StatusCode::OK {
            tracing::debug!(status = %response.status(), "health check rejected");
            return false;
        }
        match response.json::<HealthResponse>().await {
            Ok(health) if health.version == self.expected_version => true,
            Ok(health) => {
                tracing::info!(
                    found = %health.version,
                    expected = %self.expected_version,
                    "stale retrieval service, restarting"
                );
                false
            }
            Err(e) => {
                tracing::debug!(error = %e, "unreadable health response");
                false
            }
        }
    }

    pub async fn health(&self) -> HealthStatus {
        HealthStatus {
            online: self.is_healthy().await,
            port: self.port(),
        }
    }

    /// Make sure a healthy, version-matched service is running, starting
    /// one if needed.
    pub async fn ensure_online(&self) -> bool {
        if self.is_healthy().await {
            return true;
        }
        let observed = self.attempts.load(Ordering::SeqCst);
        let _guard = self.start_lock.lock().await;
        if self.attempts.load(Ordering::SeqCst) != observed {
            // Another caller finished an attempt while we waited.
            return self.last_start_ok.load(Ordering::SeqCst);
        }
        let ok = self.start().await;
        self.last_start_ok.store(ok, Ordering::SeqCst);
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if ok {
            tracing::info!(port = ?self.port(), "retrieval service is online");
        } else {
            tracing::error!("failed to start retrieval service");
        }
        ok
    }

    async fn start(&self) -> bool {
        let mut port = self.seed_port;
        let mut attempt = 0;
        loop {
            // Replacing the old child kills it.
            self.replace_child(None);
            match self.launcher.launch(port).await {
                Ok(launched) => {
                    if let Err(e) = self.ctx.state().set_rag_port(launched.port) {
                        tracing::warn!(error = %e, "could not persist service port");
                    }
                    self.replace_child(launched.child);
                    return true;
                }
                Err(LaunchError::AddrInUse(_)) if attempt < self.max_port_retries => {
                    attempt += 1;
                    let next = next_port(port, &mut rand::rng());
                    tracing::warn!(port, next, attempt, "port in use, retrying");
                    port = next;
                }
                Err(e) => {
                    tracing::error!(port, attempt, error = %e, "retrieval service start failed");
                    return false;
                }
            }
        }
    }

    fn replace_child(&self, child: Option<Child>) {
        let mut guard = match self.child.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(mut old) = std::mem::replace(&mut *guard, child) {
            if let Err(e) = old.start_kill() {
                tracing::debug!(error = %e, "service process already gone");
            }
        }
    }

    /// POST `payload` to `endpoint` after making sure the service is up.
    ///
    /// # Errors
    ///
    /// Returns [`LumenError::Service`] when the service cannot be started or
    /// answers with a non-success status, [`LumenError::Http`] on transport
    /// failures.
    pub async fn invoke<Req, Resp>(&self, endpoint: &str, payload: &Req) -> Result<Resp, LumenError>
    where
        Req: Serialize + ?Sized + Sync,
        Resp: DeserializeOwned,
    {
        if !self.ensure_online().await {
            return Err(LumenError::Service("retrieval service is offline".into()));
        }
        let url = format!("{}{endpoint}", self.base_url());
        let response = self
            .http
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| LumenError::Http(format!("{endpoint}: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".into());
            return Err(LumenError::Service(format!(
                "{endpoint} returned {status}: {body}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| LumenError::Http(format!("{endpoint}: {e}")))?;
        // Maintenance endpoints may answer with an empty body.
        let body: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
            b"null"
        } else {
            &bytes
        };
        Ok(serde_json::from_slice(body)?)
    }

    /// Terminate the supervised process, if this manager owns one.
    pub fn shutdown(&self) {
        let had_child = self
            .child
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false);
        self.replace_child(None);
        if had_child {
            tracing::info!("retrieval service stopped");
        }
    }
}

impl Drop for ServiceManager {
    fn drop(&mut self) {
        self.replace_child(None);
    }
}
