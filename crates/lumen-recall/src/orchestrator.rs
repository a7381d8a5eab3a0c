use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::OptionFuture;
use lumen_core::events::RecallUpdate;
use lumen_core::{project_key, AppContext, ChatMode, ChatTurn, CodeReference, RecallRecord};
use lumen_service::api::{LocalRagRequest, RemoteRagRequest};
use lumen_service::RetrievalClient;
use tokio_util::sync::CancellationToken;

use crate::llm::{ChatMessage, ChatProvider};
use crate::prompt::{build_prediction_messages, parse_prediction, Prediction};
use crate::references::{
    definitions_to_refs, find_predictable_code_refs, local_hits_to_refs, project_id,
    project_type, remote_hits_to_refs,
};
use crate::symbols::{SymbolQuery, SymbolResolver};
use crate::task_group::TaskGroup;

/// How the recall of one chat turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecallOutcome {
    /// The turn did not qualify for recall. Nothing was sent anywhere.
    NoRecall,
    /// The turn was cancelled. The record keeps what was merged before.
    Aborted(RecallRecord),
    Merged(RecallRecord),
}

impl RecallOutcome {
    pub fn record(&self) -> Option<&RecallRecord> {
        match self {
            RecallOutcome::NoRecall => None,
            RecallOutcome::Aborted(record) | RecallOutcome::Merged(record) => Some(record),
        }
    }
}

/// Identity and cancellation signal of one chat turn.
#[derive(Debug, Clone)]
pub struct TurnHandle {
    pub id: u64,
    pub cancel: CancellationToken,
}

/// Gathers context for chat turns from symbol definitions, the local index
/// and the remote corpus.
///
/// Three branches run under the turn's cancellation signal: local search,
/// symbol prediction and resolution, and remote search. The record
/// published on [`lumen_core::events::Events::recall`] moves through three
/// stages: prediction finished, symbol and remote references settled, local
/// search settled.
pub struct RecallOrchestrator {
    ctx: Arc<AppContext>,
    client: RetrievalClient,
    chat: Arc<ChatProvider>,
    resolver: Arc<dyn SymbolResolver>,
    workspace_root: Option<PathBuf>,
    predict_timeout: Duration,
    turns: AtomicU64,
    current: Mutex<Option<CancellationToken>>,
}

impl std::fmt::Debug for RecallOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecallOrchestrator")
            .field("workspace_root", &self.workspace_root)
            .field("predict_timeout", &self.predict_timeout)
            .field("provider", &self.chat.name())
            .finish_non_exhaustive()
    }
}

impl RecallOrchestrator {
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
            turns: AtomicU64::new(0),
            current: Mutex::new(None),
        }
    }

    pub fn workspace_root(&self) -> Option<&Path> {
        self.workspace_root.as_deref()
    }

    /// Start a new turn, cancelling the previous one.
    pub fn begin_turn(&self) -> TurnHandle {
        let id = self.turns.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        let mut current = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = current.replace(cancel.clone()) {
            previous.cancel();
        }
        TurnHandle { id, cancel }
    }

    /// Cancel the running turn, if any.
    pub fn cancel_current(&self) {
        let current = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(token) = current.as_ref() {
            token.cancel();
        }
    }

    /// Gather context for `turn`.
    pub async fn recall(&self, turn: &ChatTurn, handle: &TurnHandle) -> RecallOutcome {
        if turn.mode == ChatMode::Raw {
            return RecallOutcome::NoRecall;
        }
        let predictable = find_predictable_code_refs(&turn.code_refs);
        let has_local_recall = !predictable.is_empty();
        let has_remote_recall = turn.functionality.is_free_chat()
            && (turn.text().is_some() || has_local_recall);
        if !has_local_recall && !has_remote_recall {
            return RecallOutcome::NoRecall;
        }
        tracing::info!(
            turn = handle.id,
            local = has_local_recall,
            remote = has_remote_recall,
            "recall started"
        );

        let mut record = RecallRecord::new();
        self.publish(handle.id, &record);

        let finished = tokio::select! {
            biased;
            _ = handle.cancel.cancelled() => false,
            _ = self.collect(turn, &predictable, has_remote_recall, handle, &mut record) => true,
        };

        if finished {
            tracing::info!(
                turn = handle.id,
                local_refs = record.local_refs.as_ref().map_or(0, Vec::len),
                remote_refs = record.remote_refs.as_ref().map_or(0, Vec::len),
                "recall merged"
            );
            RecallOutcome::Merged(record)
        } else {
            tracing::info!(turn = handle.id, "recall aborted");
            if record.terminate() {
                self.publish(handle.id, &record);
            }
            RecallOutcome::Aborted(record)
        }
    }

    async fn collect(
        &self,
        turn: &ChatTurn,
        predictable: &[&CodeReference],
        has_remote_recall: bool,
        handle: &TurnHandle,
        record: &mut RecallRecord,
    ) {
        let group = TaskGroup::new(&handle.cancel);
        let last = turn.last_code_ref();
        let selected_code = last.map(|r| r.source_code.clone());
        let local_root = self.local_root();

        // Independent of everything else, so it goes first.
        let local_task = local_root.clone().map(|root| {
            let request = self.local_request(&root, turn.text(), selected_code.clone());
            let client = self.client.clone();
            group.spawn(async move { local_search(client, request, root).await })
        });
        let remote_task = has_remote_recall.then(|| {
            let request = RemoteRagRequest {
                content: turn.text().map(str::to_string),
                selected_code: selected_code.clone(),
                project_type: project_type(last.map(|r| r.file_name.as_str())),
                project_name: project_id(self.workspace_root.as_deref()),
                prediction_comments: None,
            };
            let client = self.client.clone();
            group.spawn(async move {
                let hits = client.remote_rag(&request).await;
                remote_hits_to_refs(&hits)
            })
        });

        if let Some(anchor) = predictable.last() {
            let messages = build_prediction_messages(predictable, turn.functionality, turn.text());
            let prediction =
                predict(&self.chat, &messages, self.predict_timeout, group.token()).await;
            if record.advance(1) {
                self.publish(handle.id, record);
            }
            if let Some(prediction) = prediction.filter(|p| !p.references.is_empty()) {
                let refs = self
                    .symbol_refs(&prediction, anchor, local_root.as_deref(), group.token())
                    .await;
                record.push_local_refs(refs);
            }
        }

        let remote = OptionFuture::from(remote_task.map(|t| t.join())).await.flatten();
        if let Some(remote) = remote.filter(|r| !r.is_empty()) {
            record.remote_refs = Some(remote);
        }
        if record.advance(2) {
            self.publish(handle.id, record);
        }

        let local = OptionFuture::from(local_task.map(|t| t.join())).await.flatten();
        if let Some(local) = local {
            record.push_local_refs(local);
        }
        if record.advance(3) {
            self.publish(handle.id, record);
        }
    }

    /// The workspace root, if local search is possible and enabled.
    fn local_root(&self) -> Option<PathBuf> {
        self.workspace_root
            .clone()
            .filter(|_| self.ctx.local_rag_enabled())
    }

    fn local_request(
        &self,
        root: &Path,
        content: Option<&str>,
        selected_code: Option<String>,
    ) -> LocalRagRequest {
        LocalRagRequest {
            content: content.map(str::to_string),
            selected_code,
            project_name: project_key(root),
            home_dir: self.ctx.local_rag_dir().to_string_lossy().into_owned(),
        }
    }

    /// Resolve predicted symbols while expanding the predicted comment into
    /// local hits.
    async fn symbol_refs(
        &self,
        prediction: &Prediction,
        anchor: &CodeReference,
        local_root: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Vec<CodeReference> {
        let document = anchor.document.as_deref().unwrap_or(&anchor.source_code);
        let query = SymbolQuery {
            symbols: prediction.references.clone(),
            current_file: PathBuf::from(&anchor.file_url),
            document: anchor.document.clone(),
        };
        let expansion = local_root.zip(prediction.comment()).map(|(root, comment)| {
            let request = self.local_request(root, Some(comment), None);
            local_search(self.client.clone(), request, root.to_path_buf())
        });

        let (definitions, expanded) = tokio::join!(
            self.resolver.resolve(&query, cancel),
            OptionFuture::from(expansion)
        );

        let definitions: Vec<_> = definitions
            .into_iter()
            .filter(|d| !document.contains(&d.source_code))
            .collect();
        tracing::debug!(count = definitions.len(), "resolved definitions");
        let mut refs = definitions_to_refs(&definitions);
        refs.extend(expanded.unwrap_or_default());
        refs
    }

    fn publish(&self, turn: u64, record: &RecallRecord) {
        self.ctx.events().recall.publish(&RecallUpdate {
            turn,
            record: record.clone(),
        });
    }
}

/// Ask the chat channel for symbols, giving up after `timeout`.
pub(crate) async fn predict(
    chat: &ChatProvider,
    messages: &[ChatMessage],
    timeout: Duration,
    cancel: &CancellationToken,
) -> Option<Prediction> {
    match tokio::time::timeout(timeout, chat.complete(messages, cancel)).await {
        Ok(Ok(reply)) => {
            let prediction = parse_prediction(&reply);
            tracing::debug!(?prediction, "predicted symbols");
            prediction
        }
        Ok(Err(e)) if e.is_cancelled() => None,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "symbol prediction failed");
            None
        }
        Err(_) => {
            tracing::warn!(?timeout, "symbol prediction timed out");
            None
        }
    }
}

pub(crate) async fn local_search(
    client: RetrievalClient,
    request: LocalRagRequest,
    root: PathBuf,
) -> Vec<CodeReference> {
    let hits = client.local_rag(&request).await;
    if hits.is_empty() {
        return Vec::new();
    }
    tokio::task::spawn_blocking(move || local_hits_to_refs(&root, &hits))
        .await
        .unwrap_or_default()
}
