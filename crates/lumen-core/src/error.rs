use std::path::PathBuf;

/// Errors that can occur across Lumen.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the binary crate converts to `miette` diagnostics at the boundary.
///
/// # Examples
///
/// ```
/// use lumen_core::LumenError;
///
/// let err = LumenError::Config("missing service program".into());
/// assert!(err.to_string().contains("missing service program"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum LumenError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Source code parsing failure.
    #[error("parse error: {0}")]
    Parse(String),

    /// The supervised retrieval service is offline or rejected a call.
    #[error("retrieval service error: {0}")]
    Service(String),

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Chat provider API or response error.
    #[error("LLM error: {0}")]
    Llm(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The operation observed its cancellation signal.
    #[error("operation cancelled")]
    Cancelled,
}

impl LumenError {
    /// Whether this error is a cooperative stop rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LumenError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: LumenError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = LumenError::Config("bad value".into());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn file_not_found_shows_path() {
        let err = LumenError::FileNotFound(PathBuf::from("/tmp/missing.ts"));
        assert!(err.to_string().contains("/tmp/missing.ts"));
    }

    #[test]
    fn cancelled_is_not_a_failure_kind() {
        assert!(LumenError::Cancelled.is_cancelled());
        assert!(!LumenError::Service("offline".into()).is_cancelled());
    }
}
