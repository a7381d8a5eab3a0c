//! Supervision of the out-of-process retrieval service.
//!
//! [`ServiceManager`] owns the child process: it health-checks the
//! remembered port, starts a fresh process on a negotiated port when the
//! service is missing or stale, and serializes start attempts.
//! [`RetrievalClient`] is the capability handed to callers; its search
//! methods fail softly and resolve to empty results.

pub mod api;
mod client;
pub mod launcher;
mod manager;
pub mod ports;

pub use client::RetrievalClient;
pub use launcher::{LaunchError, LaunchedService, ProcessLauncher, ServiceLauncher};
pub use manager::{HealthStatus, ServiceManager};
