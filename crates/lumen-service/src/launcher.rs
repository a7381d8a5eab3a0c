use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use lumen_core::ServiceConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};

use crate::api::ReadyMessage;

/// Why a launch attempt did not produce a ready service.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    /// The candidate port is taken; retry with another one.
    #[error("port {0} already in use")]
    AddrInUse(u16),
    /// No readiness message arrived in time.
    #[error("service not ready after {0:?}")]
    TimedOut(Duration),
    /// The process closed its stdout before reporting readiness.
    #[error("service exited before becoming ready")]
    Exited,
    /// The process reported a startup failure.
    #[error("service failed to start: {0}")]
    Failed(String),
    /// The executable could not be spawned.
    #[error("failed to spawn service: {0}")]
    Spawn(#[from] std::io::Error),
}

/// A service that reported readiness.
#[derive(Debug)]
pub struct LaunchedService {
    /// Port the service is listening on.
    pub port: u16,
    /// The supervised child, when the launcher owns one.
    pub child: Option<Child>,
}

/// Starts the retrieval service on a candidate port.
#[async_trait]
pub trait ServiceLauncher: Send + Sync {
    async fn launch(&self, port: u16) -> Result<LaunchedService, LaunchError>;
}

/// Launches the configured executable as a child process.
///
/// Runs `program [args..] --port=<port> --env=<env>` and waits for a JSON
/// readiness line on stdout, e.g. `{"success": true}`.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: String,
    args: Vec<String>,
    env: String,
    timeout: Duration,
}

impl ProcessLauncher {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            env: config.env.clone(),
            timeout: Duration::from_millis(config.start_timeout_ms),
        }
    }
}

#[async_trait]
impl ServiceLauncher for ProcessLauncher {
    async fn launch(&self, port: u16) -> Result<LaunchedService, LaunchError> {
        tracing::info!(program = %self.program, port, "starting retrieval service");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(format!("--port={port}"))
            .arg(format!("--env={}", self.env))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child.stdout.take().ok_or(LaunchError::Exited)?;
        let mut lines = BufReader::new(stdout).lines();

        let ready = tokio::time::timeout(self.timeout, wait_ready(&mut lines, port)).await;

        // Dropping `child` on any error path kills the process.
        match ready {
            Ok(Ok(())) => {
                drain(lines);
                Ok(LaunchedService {
                    port,
                    child: Some(child),
                })
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(LaunchError::TimedOut(self.timeout)),
        }
    }
}

async fn wait_ready(
    lines: &mut tokio::io::Lines<BufReader<ChildStdout>>,
    port: u16,
) -> Result<(), LaunchError> {
    while let Some(line) = lines.next_line().await? {
        if let Some(outcome) = readiness(&line, port) {
            return outcome;
        }
        tracing::debug!(line = %line, "service output");
    }
    Err(LaunchError::Exited)
}

/// Interpret one stdout line. Non-JSON lines are not readiness messages.
fn readiness(line: &str, port: u16) -> Option<Result<(), LaunchError>> {
    let message: ReadyMessage = serde_json::from_str(line.trim()).ok()?;
    if message.success {
        return Some(Ok(()));
    }
    let error = message.error.unwrap_or_default();
    if is_addr_in_use(&error) {
        Some(Err(LaunchError::AddrInUse(port)))
    } else {
        Some(Err(LaunchError::Failed(error)))
    }
}

fn is_addr_in_use(message: &str) -> bool {
    message.contains("EADDRINUSE") || message.to_lowercase().contains("address already in use")
}

/// Keep reading the child's stdout so it never blocks on a full pipe.
fn drain(mut lines: tokio::io::Lines<BufReader<ChildStdout>>) {
    tokio::spawn(async move {
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(line = %line, "service output");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_line_is_ready() {
        assert!(matches!(readiness(r#"{"success":true}"#, 1), Some(Ok(()))));
    }

    #[test]
    fn addr_in_use_is_recognized() {
        let line = r#"{"success":false,"error":"listen EADDRINUSE: address already in use :::4000"}"#;
        assert!(matches!(
            readiness(line, 4000),
            Some(Err(LaunchError::AddrInUse(4000)))
        ));
        assert!(is_addr_in_use("Address already in use (os error 98)"));
    }

    #[test]
    fn other_failures_are_reported() {
        let line = r#"{"success":false,"error":"bad config"}"#;
        match readiness(line, 1) {
            Some(Err(LaunchError::Failed(msg))) => assert_eq!(msg, "bad config"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn log_lines_are_not_readiness() {
        assert!(readiness("booting...", 1).is_none());
        assert!(readiness("{\"level\":\"info\"}", 1).is_none());
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let config = ServiceConfig {
            program: "/nonexistent/lumen-agent-for-tests".into(),
            ..ServiceConfig::default()
        };
        let result = ProcessLauncher::new(&config).launch(12000).await;
        assert!(matches!(result, Err(LaunchError::Spawn(_))));
    }
}
