use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::LumenError;

/// Top-level configuration loaded from `.lumen.toml`.
///
/// # Examples
///
/// ```
/// use lumen_core::LumenConfig;
///
/// let config = LumenConfig::default();
/// assert!(config.recall.local_rag);
/// assert_eq!(config.index.batch_files, 10);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LumenConfig {
    /// Recall orchestration settings.
    #[serde(default)]
    pub recall: RecallConfig,
    /// Index builder and scheduler settings.
    #[serde(default)]
    pub index: IndexConfig,
    /// Supervised retrieval service settings.
    #[serde(default)]
    pub service: ServiceConfig,
    /// Chat provider settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Where persistent state lives.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl LumenConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LumenError::Io`] if the file cannot be read, or
    /// [`LumenError::Toml`] if the content is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, LumenError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`LumenError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use lumen_core::LumenConfig;
    ///
    /// let toml = r#"
    /// [recall]
    /// local_rag = false
    /// "#;
    /// let config = LumenConfig::from_toml(toml).unwrap();
    /// assert!(!config.recall.local_rag);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, LumenError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Load `path` when given, otherwise `.lumen.toml` in the current
    /// directory when it exists, otherwise defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self, LumenError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(".lumen.toml");
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

/// Recall orchestration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallConfig {
    /// Enables the scheduled indexer and the local-RAG recall branch.
    #[serde(default = "default_true")]
    pub local_rag: bool,
    /// Cap on symbol-prediction calls, in milliseconds (default: 5000).
    #[serde(default = "default_predict_timeout_ms")]
    pub predict_timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_predict_timeout_ms() -> u64 {
    5000
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            local_rag: true,
            predict_timeout_ms: default_predict_timeout_ms(),
        }
    }
}

/// Index builder configuration.
///
/// # Examples
///
/// ```
/// use lumen_core::IndexConfig;
///
/// let config = IndexConfig::default();
/// assert_eq!(config.interval_secs, 900);
/// assert_eq!(config.rearm_delay_secs, 5);
/// assert_eq!(config.max_folder_entries, 100);
/// assert_eq!(config.ignore_file, ".lumenignore");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Seconds between scheduled index passes (default: 900).
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Delay before the first pass after indexing is re-enabled (default: 5).
    #[serde(default = "default_rearm_delay_secs")]
    pub rearm_delay_secs: u64,
    /// Number of file records buffered before a submission (default: 10).
    #[serde(default = "default_batch_files")]
    pub batch_files: usize,
    /// Directories with more entries than this are not descended (default: 100).
    #[serde(default = "default_max_folder_entries")]
    pub max_folder_entries: usize,
    /// Tool ignore file read after `.gitignore` (default: `.lumenignore`).
    #[serde(default = "default_ignore_file")]
    pub ignore_file: String,
    /// Folder names skipped in addition to the built-in deny-list.
    #[serde(default)]
    pub extra_ignored_folders: Vec<String>,
}

fn default_interval_secs() -> u64 {
    15 * 60
}

fn default_rearm_delay_secs() -> u64 {
    5
}

fn default_batch_files() -> usize {
    10
}

fn default_max_folder_entries() -> usize {
    100
}

fn default_ignore_file() -> String {
    ".lumenignore".into()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            rearm_delay_secs: default_rearm_delay_secs(),
            batch_files: default_batch_files(),
            max_folder_entries: default_max_folder_entries(),
            ignore_file: default_ignore_file(),
            extra_ignored_folders: Vec::new(),
        }
    }
}

/// Supervised retrieval service configuration.
///
/// # Examples
///
/// ```
/// use lumen_core::ServiceConfig;
///
/// let config = ServiceConfig::default();
/// assert_eq!(config.version, "1.1.0");
/// assert_eq!(config.start_timeout_ms, 3000);
/// assert_eq!(config.max_port_retries, 5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Executable that runs the retrieval service.
    #[serde(default = "default_program")]
    pub program: String,
    /// Extra arguments passed before `--port`.
    #[serde(default)]
    pub args: Vec<String>,
    /// Exact version the health endpoint must report.
    #[serde(default = "default_service_version")]
    pub version: String,
    /// How long to wait for the readiness signal, in milliseconds.
    #[serde(default = "default_start_timeout_ms")]
    pub start_timeout_ms: u64,
    /// Retries with a fresh port after a port conflict.
    #[serde(default = "default_max_port_retries")]
    pub max_port_retries: u32,
    /// Value for the `--env` flag (`prd` or `test`).
    #[serde(default = "default_service_env")]
    pub env: String,
}

fn default_program() -> String {
    "lumen-agent".into()
}

fn default_service_version() -> String {
    "1.1.0".into()
}

fn default_start_timeout_ms() -> u64 {
    3000
}

fn default_max_port_retries() -> u32 {
    5
}

fn default_service_env() -> String {
    "prd".into()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            version: default_service_version(),
            start_timeout_ms: default_start_timeout_ms(),
            max_port_retries: default_max_port_retries(),
            env: default_service_env(),
        }
    }
}

/// Chat provider configuration.
///
/// # Examples
///
/// ```
/// use lumen_core::LlmConfig;
///
/// let config = LlmConfig::default();
/// assert_eq!(config.provider, "openai");
/// assert_eq!(config.model, "gpt-4o-mini");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name (`"openai"` or `"ollama"`).
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// API key for the provider.
    pub api_key: Option<String>,
    /// Custom base URL for API requests.
    pub base_url: Option<String>,
}

fn default_provider() -> String {
    "openai".into()
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            base_url: None,
        }
    }
}

/// Storage location configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Global storage root; defaults to the platform data dir plus `lumen`.
    pub dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolve the storage root, falling back to the platform data dir.
    pub fn resolve(&self) -> PathBuf {
        if let Some(dir) = &self.dir {
            return dir.clone();
        }
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("lumen")
    }
}
