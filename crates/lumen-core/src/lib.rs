//! Core types, configuration, and error handling for Lumen.
//!
//! This crate provides the shared foundation used by all other Lumen crates:
//! - [`LumenError`]: unified error type using `thiserror`
//! - [`LumenConfig`]: configuration loaded from `.lumen.toml`
//! - [`AppContext`]: the process-wide context handed to every component
//! - Shared types: [`CodeReference`], [`RecallRecord`], [`ChatTurn`],
//!   [`Functionality`], [`OutputFormat`]
//! - Typed publish/subscribe [`events`] channels

mod config;
mod context;
mod error;
pub mod events;
pub mod language;
mod state;
mod types;

use std::path::Path;

use sha2::{Digest, Sha256};

pub use config::{
    IndexConfig, LlmConfig, LumenConfig, RecallConfig, ServiceConfig, StorageConfig,
};
pub use context::AppContext;
pub use error::LumenError;
pub use state::GlobalState;
pub use types::{
    ChatMode, ChatTurn, CodeReference, Functionality, OutputFormat, RecallRecord, RecallStatus,
    RecallStep,
};

/// A convenience `Result` type for Lumen operations.
pub type Result<T> = std::result::Result<T, LumenError>;

/// Name of the directory, under the storage root, that holds local-RAG state.
pub const LOCAL_RAG_STORE_DIR: &str = "local_rag";

/// Replace characters that are unsafe in a single path component.
///
/// Colons, slashes, backslashes, whitespace and dots all become `_`, so an
/// absolute project path becomes one flat, filesystem-safe name.
///
/// # Examples
///
/// ```
/// use lumen_core::sanitize_file_path;
///
/// assert_eq!(sanitize_file_path("/home/me/my app.v2"), "_home_me_my_app_v2");
/// assert_eq!(sanitize_file_path(r"C:\work\proj"), "C__work_proj");
/// ```
pub fn sanitize_file_path(path: &str) -> String {
    path.chars()
        .map(|c| match c {
            ':' | '\\' | '/' | '.' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

/// Storage and service key for the project rooted at `root`.
///
/// The sanitized path keeps the key readable; the digest suffix keeps roots
/// that sanitize alike (`/w/a/b`, `/w/a_b`, `/w/a.b`) apart.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use lumen_core::project_key;
///
/// let key = project_key(Path::new("/work/my.app"));
/// assert!(key.starts_with("_work_my_app_"));
/// assert_ne!(key, project_key(Path::new("/work/my_app")));
/// ```
pub fn project_key(root: &Path) -> String {
    let path = root.to_string_lossy();
    let digest = format!("{:x}", Sha256::digest(path.as_bytes()));
    format!("{}_{}", sanitize_file_path(&path), &digest[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_keys_separate_roots_that_sanitize_alike() {
        let keys: Vec<String> = ["/w/a/b", "/w/a_b", "/w/a.b", "/w/a b"]
            .iter()
            .map(|p| project_key(Path::new(p)))
            .collect();
        for (i, a) in keys.iter().enumerate() {
            assert!(a.starts_with("_w_a_b_"), "{a}");
            for b in &keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(keys[0], project_key(Path::new("/w/a/b")));
    }
}
