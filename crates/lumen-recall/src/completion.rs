//! Inline completion with context gathered from predicted symbols.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::OptionFuture;
use lumen_core::events::CompletionLifecycle;
use lumen_core::language::is_frontend_language;
use lumen_core::{project_key, AppContext};
use lumen_service::api::{AdditionalContextItem, CompletionRequest, LocalRagRequest};
use lumen_service::RetrievalClient;
use tokio_util::sync::CancellationToken;

use crate::llm::ChatProvider;
use crate::orchestrator::{local_search, predict};
use crate::prompt::build_completion_prediction_messages;
use crate::symbols::{SymbolQuery, SymbolResolver};

/// Completion type sent to the service.
const COMPLETION_TYPE: &str = "comment";

/// What started a completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionTrigger {
    /// Typing paused; no context is gathered.
    #[default]
    Automatic,
    /// Explicitly requested by the user.
    Manual,
}

/// One inline completion request.
#[derive(Debug, Clone)]
pub struct InlineRequest {
    pub document: String,
    /// Absolute path of the document.
    pub file_path: PathBuf,
    pub language_id: String,
    /// Cursor byte offset into `document`.
    pub position: usize,
    pub trigger: CompletionTrigger,
}

/// Requests inline completions, one at a time.
pub struct InlineCompleter {
    ctx: Arc<AppContext>,
    client: RetrievalClient,
    chat: Arc<ChatProvider>,
    resolver: Arc<dyn SymbolResolver>,
    workspace_root: Option<PathBuf>,
    predict_timeout: Duration,
    current: Mutex<Option<CancellationToken>>,
}

impl std::fmt::Debug for InlineCompleter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InlineCompleter")
            .field("workspace_root", &self.workspace_root)
            .finish_non_exhaustive()
    }
}

impl InlineCompleter {
    pub fn new(
        ctx: Arc<AppContext>,
        client: RetrievalClient,
        chat: Arc<ChatProvider>,
        resolver: Arc<dyn SymbolResolver>,
        workspace_root: Option<PathBuf>,
    ) -> Self {
        let predict_timeout = Duration::from_millis(ctx.config().recall.predict_timeout_ms);
        Self {
            ctx,
            client,
            chat,
            resolver,
            workspace_root,
            predict_timeout,
            current: Mutex::new(None),
        }
    }

    /// Complete the code at the cursor of `request`.
    ///
    /// A later call cancels this one. Returns `None` when cancelled, when
    /// the service is unavailable or when the suggestion is empty.
    pub async fn complete(
        &self,
        request: &InlineRequest,
        cancel: &CancellationToken,
    ) -> Option<String> {
        let token = self.supersede(cancel);
        self.ctx.events().completion.publish(&CompletionLifecycle::Start);
        let suggestion = tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!(path = %request.file_path.display(), "completion superseded");
                None
            }
            suggestion = self.request_completion(request, &token) => suggestion,
        };
        self.ctx.events().completion.publish(&CompletionLifecycle::End);
        suggestion
    }

    fn supersede(&self, cancel: &CancellationToken) -> CancellationToken {
        let token = cancel.child_token();
        let mut current = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = current.replace(token.clone()) {
            previous.cancel();
        }
        token
    }

    async fn request_completion(
        &self,
        request: &InlineRequest,
        cancel: &CancellationToken,
    ) -> Option<String> {
        let additional_context = if request.trigger == CompletionTrigger::Manual
            && is_frontend_language(&request.language_id)
        {
            self.gather_context(request, cancel).await
        } else {
            Vec::new()
        };

        let completion = CompletionRequest {
            document: request.document.clone(),
            file_path: self.display_path(&request.file_path),
            language: request.language_id.clone(),
            position: request.position,
            completion_type: COMPLETION_TYPE.to_string(),
            additional_context,
        };
        let response = self.client.instruct_completion(&completion).await?;
        let content = response.content.trim_start();
        (!content.is_empty()).then(|| content.to_string())
    }

    async fn gather_context(
        &self,
        request: &InlineRequest,
        cancel: &CancellationToken,
    ) -> Vec<AdditionalContextItem> {
        let messages = build_completion_prediction_messages(
            &self.display_path(&request.file_path),
            &request.document,
            request.position,
        );
        let Some(prediction) = predict(&self.chat, &messages, self.predict_timeout, cancel).await
        else {
            return Vec::new();
        };
        if prediction.references.is_empty() {
            return Vec::new();
        }

        let query = SymbolQuery {
            symbols: prediction.references.clone(),
            current_file: request.file_path.clone(),
            document: Some(request.document.clone()),
        };
        let expansion = self
            .workspace_root
            .clone()
            .filter(|_| self.ctx.local_rag_enabled())
            .zip(prediction.comment().map(str::to_string))
            .map(|(root, comment)| {
                let search = LocalRagRequest {
                    content: Some(comment),
                    selected_code: None,
                    project_name: project_key(&root),
                    home_dir: self.ctx.local_rag_dir().to_string_lossy().into_owned(),
                };
                local_search(self.client.clone(), search, root)
            });

        let (definitions, expanded) = tokio::join!(
            self.resolver.resolve(&query, cancel),
            OptionFuture::from(expansion)
        );

        let mut items: Vec<AdditionalContextItem> = definitions
            .into_iter()
            .filter(|d| !request.document.contains(&d.source_code))
            .map(|d| AdditionalContextItem::new(d.file_path.to_string_lossy(), d.source_code))
            .collect();
        items.extend(
            expanded
                .unwrap_or_default()
                .into_iter()
                .map(|r| AdditionalContextItem::new(r.file_url, r.source_code)),
        );
        tracing::debug!(count = items.len(), "completion context gathered");
        items
    }

    /// `<workspace name>/<relative path>` for files inside the workspace.
    fn display_path(&self, file: &Path) -> String {
        let relative = self
            .workspace_root
            .as_deref()
            .and_then(|root| Some((root.file_name()?, file.strip_prefix(root).ok()?)));
        match relative {
            Some((name, rel)) => Path::new(name).join(rel).to_string_lossy().replace('\\', "/"),
            None => file.to_string_lossy().into_owned(),
        }
    }
}
