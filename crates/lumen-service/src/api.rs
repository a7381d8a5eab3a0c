//! Request and response bodies of the retrieval service endpoints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const HEALTH: &str = "/health";
pub const LOCAL_RAG: &str = "/local-rag";
pub const REMOTE_RAG: &str = "/rag";
pub const EMBEDDING: &str = "/embedding";
pub const SUBMIT_CHUNKS: &str = "/submitChunks";
pub const DELETE_CHUNKS: &str = "/deleteChunks";
pub const RESET_INDEX: &str = "/reset-index";
pub const INSTRUCT_COMPLETION: &str = "/instruct-completion";

/// `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub status: String,
    pub version: String,
}

/// Identity of a project in the local index.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectParams {
    /// Local-RAG storage directory.
    pub home_dir: String,
    /// Sanitized absolute project path.
    pub project_name: String,
    /// Absolute project path.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub project_location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_repo: Option<String>,
}

/// `POST /local-rag`
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalRagRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_code: Option<String>,
    pub project_name: String,
    pub home_dir: String,
}

impl LocalRagRequest {
    /// Whether there is anything to search for.
    pub fn has_query(&self) -> bool {
        let present = |s: &Option<String>| s.as_deref().is_some_and(|s| !s.is_empty());
        present(&self.content) || present(&self.selected_code)
    }
}

/// One local search hit, pointing at a byte range of a project file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocalRagHit {
    /// Path relative to the project root.
    pub file_path: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub start_line: u32,
    pub end_line: u32,
    pub start_column: u32,
    pub end_column: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalRagResponse {
    #[serde(default)]
    pub hits_data: Vec<LocalRagHit>,
}

/// `POST /rag`
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRagRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_code: Option<String>,
    pub project_type: String,
    /// SHA-256 of the workspace root, empty when there is none.
    pub project_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction_comments: Option<String>,
}

/// One remote search hit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteRagHit {
    pub file: String,
    pub code: String,
    pub file_path: String,
    pub file_name: String,
}

/// `POST /embedding`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingRequest {
    pub original_inputs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingItem {
    pub embedding: Vec<f32>,
    pub index: usize,
    #[serde(default)]
    pub object: String,
}

/// One function-level chunk submitted for indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedRecord {
    pub record_id: String,
    pub file_path: String,
    pub file_hash: String,
    pub chunk_hash: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub start_line: u32,
    pub end_line: u32,
    pub start_column: u32,
    pub end_column: u32,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

/// `POST /submitChunks`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitChunksRequest {
    pub batch_id: String,
    #[serde(flatten)]
    pub project: ProjectParams,
    /// Set on the final, empty submission of a pass.
    pub submit_end: bool,
    /// File path to the chunks of that file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_records: Option<BTreeMap<String, Vec<ChangedRecord>>>,
}

/// `POST /deleteChunks`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteChunksRequest {
    #[serde(flatten)]
    pub project: ProjectParams,
    pub deleted_files: Vec<String>,
}

/// `POST /reset-index`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetIndexRequest {
    #[serde(flatten)]
    pub project: ProjectParams,
}

/// Extra code shown to the completion model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalContextItem {
    pub scode: u8,
    /// Absolute path of the file the code came from.
    pub file_path: String,
    pub code: String,
}

impl AdditionalContextItem {
    pub fn new(file_path: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            scode: 1,
            file_path: file_path.into(),
            code: code.into(),
        }
    }
}

/// `POST /instruct-completion`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub document: String,
    pub file_path: String,
    pub language: String,
    /// Cursor offset into `document`.
    pub position: usize,
    pub completion_type: String,
    pub additional_context: Vec<AdditionalContextItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub content: String,
}

/// Readiness line printed by the service on stdout.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadyMessage {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}
