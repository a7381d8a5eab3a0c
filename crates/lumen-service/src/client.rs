use std::sync::Arc;

use lumen_core::LumenError;

use crate::api::{
    self, CompletionRequest, CompletionResponse, DeleteChunksRequest, EmbeddingItem,
    EmbeddingRequest, LocalRagHit, LocalRagRequest, LocalRagResponse, RemoteRagHit,
    RemoteRagRequest, ResetIndexRequest, SubmitChunksRequest,
};
use crate::manager::{HealthStatus, ServiceManager};

/// Typed access to the retrieval service endpoints.
///
/// Search, embedding and completion calls fail softly: errors are logged
/// and resolve to empty results. Index maintenance calls return their
/// errors so the index builder can count failed submissions.
#[derive(Debug, Clone)]
pub struct RetrievalClient {
    manager: Arc<ServiceManager>,
}

impl RetrievalClient {
    pub fn new(manager: Arc<ServiceManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<ServiceManager> {
        &self.manager
    }

    pub async fn ensure_online(&self) -> bool {
        self.manager.ensure_online().await
    }

    pub async fn health(&self) -> HealthStatus {
        self.manager.health().await
    }

    /// Semantic search over the local index. Makes no call when the
    /// request carries neither text nor code.
    pub async fn local_rag(&self, request: &LocalRagRequest) -> Vec<LocalRagHit> {
        if !request.has_query() {
            return Vec::new();
        }
        match self
            .manager
            .invoke::<_, LocalRagResponse>(api::LOCAL_RAG, request)
            .await
        {
            Ok(response) => response.hits_data,
            Err(e) => {
                tracing::warn!(error = %e, "local RAG failed");
                Vec::new()
            }
        }
    }

    /// Semantic search over the shared corpus.
    pub async fn remote_rag(&self, request: &RemoteRagRequest) -> Vec<RemoteRagHit> {
        match self
            .manager
            .invoke::<_, Option<Vec<RemoteRagHit>>>(api::REMOTE_RAG, request)
            .await
        {
            Ok(hits) => hits.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "remote RAG failed");
                Vec::new()
            }
        }
    }

    /// Embed a batch of texts. An empty batch makes no call.
    pub async fn embed(&self, inputs: Vec<String>) -> Vec<EmbeddingItem> {
        if inputs.is_empty() {
            return Vec::new();
        }
        let request = EmbeddingRequest {
            original_inputs: inputs,
        };
        match self
            .manager
            .invoke::<_, Option<Vec<EmbeddingItem>>>(api::EMBEDDING, &request)
            .await
        {
            Ok(items) => items.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "embedding failed");
                Vec::new()
            }
        }
    }

    pub async fn submit_chunks(&self, request: &SubmitChunksRequest) -> Result<(), LumenError> {
        self.manager
            .invoke::<_, serde_json::Value>(api::SUBMIT_CHUNKS, request)
            .await
            .map(|_| ())
    }

    pub async fn delete_chunks(&self, request: &DeleteChunksRequest) -> Result<(), LumenError> {
        self.manager
            .invoke::<_, serde_json::Value>(api::DELETE_CHUNKS, request)
            .await
            .map(|_| ())
    }

    pub async fn reset_index(&self, request: &ResetIndexRequest) -> Result<(), LumenError> {
        self.manager
            .invoke::<_, serde_json::Value>(api::RESET_INDEX, request)
            .await
            .map(|_| ())
    }

    /// Ask the service for an inline completion.
    pub async fn instruct_completion(
        &self,
        request: &CompletionRequest,
    ) -> Option<CompletionResponse> {
        match self
            .manager
            .invoke::<_, CompletionResponse>(api::INSTRUCT_COMPLETION, request)
            .await
        {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!(error = %e, "inline completion failed");
                None
            }
        }
    }
}
