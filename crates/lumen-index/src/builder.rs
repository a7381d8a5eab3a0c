use std::collections::{BTreeMap, HashMap};
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use lumen_chunker::{parse_file, Block, FileRecord, SkipReason};
use lumen_core::events::IndexProgress;
use lumen_core::{project_key, AppContext, LumenError};
use lumen_service::api::{
    ChangedRecord, DeleteChunksRequest, ProjectParams, ResetIndexRequest, SubmitChunksRequest,
};
use lumen_service::RetrievalClient;
use uuid::Uuid;

use crate::manifest::{compute_deletions, IndexManifest, IndexedFile, ManifestStore};
use crate::walker::{walk_project, WalkOptions};

/// Counters of one finished index pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub indexed_files: usize,
    pub submitted_chunks: usize,
    pub deleted_files: usize,
    pub failed_submissions: usize,
    pub skipped_files: usize,
}

/// How an index pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Completed(BuildReport),
    /// An automatic pass was requested while one was running for the same
    /// project.
    AlreadyRunning,
    /// The retrieval service could not be brought online. Nothing was
    /// written.
    ServiceOffline,
}

type ChunkBatch = BTreeMap<String, Vec<ChangedRecord>>;

/// Builds and maintains the local-RAG index of projects.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    ctx: Arc<AppContext>,
    client: RetrievalClient,
    store: ManifestStore,
    running: Arc<Mutex<HashMap<PathBuf, usize>>>,
}

/// Marks a project as being indexed until dropped.
struct RunGuard {
    running: Arc<Mutex<HashMap<PathBuf, usize>>>,
    root: PathBuf,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut running = match self.running.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(count) = running.get_mut(&self.root) {
            *count -= 1;
            if *count == 0 {
                running.remove(&self.root);
            }
        }
    }
}

impl IndexBuilder {
    pub fn new(ctx: Arc<AppContext>, client: RetrievalClient) -> Self {
        let store = ManifestStore::new(ctx.local_rag_dir());
        Self {
            ctx,
            client,
            store,
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    pub fn client(&self) -> &RetrievalClient {
        &self.client
    }

    /// Where the manifest of the project at `root` lives.
    pub fn manifest_path(&self, root: &Path) -> Result<PathBuf, LumenError> {
        Ok(self.store.path_for(&canonical(root)?))
    }

    /// Whether a pass is running for the project at `root`.
    pub fn is_running(&self, root: &Path) -> bool {
        let Ok(root) = canonical(root) else {
            return false;
        };
        let running = match self.running.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        running.contains_key(&root)
    }

    fn try_enter(&self, root: &Path, manual: bool) -> Option<RunGuard> {
        let mut running = match self.running.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let count = running.entry(root.to_path_buf()).or_insert(0);
        if *count > 0 && !manual {
            return None;
        }
        *count += 1;
        Some(RunGuard {
            running: self.running.clone(),
            root: root.to_path_buf(),
        })
    }

    /// Run one index pass over the project at `root`.
    ///
    /// Automatic passes (`manual == false`) are skipped while another pass
    /// for the same project is running. Per-file failures are skipped and
    /// submission failures are counted, neither aborts the pass.
    ///
    /// # Errors
    ///
    /// Returns [`LumenError::Io`] if `root` cannot be resolved or read.
    pub async fn build(&self, root: &Path, manual: bool) -> Result<BuildOutcome, LumenError> {
        let root = canonical(root)?;
        let Some(_guard) = self.try_enter(&root, manual) else {
            tracing::debug!(path = %root.display(), "index pass already running");
            return Ok(BuildOutcome::AlreadyRunning);
        };

        let display = display_name(&root);
        self.progress(&display, format!("initializing {display}"));
        tracing::info!(path = %root.display(), manual, "starting index pass");

        let git_task = tokio::task::spawn_blocking({
            let root = root.clone();
            move || git_remote_url(&root)
        });
        let online = self.client.ensure_online().await;
        let git_repo = git_task.await.unwrap_or_default();
        if !online {
            tracing::error!("retrieval service offline, index pass skipped");
            return Ok(BuildOutcome::ServiceOffline);
        }

        let project = ProjectParams {
            home_dir: self.ctx.local_rag_dir().to_string_lossy().into_owned(),
            project_name: project_key(&root),
            project_location: root.to_string_lossy().into_owned(),
            git_repo: git_repo.clone(),
        };
        let config = self.ctx.config().index;
        let batch_files = config.batch_files.max(1);
        let options = WalkOptions::from_config(&config);

        let files = {
            let root = root.clone();
            tokio::task::spawn_blocking(move || walk_project(&root, &options))
                .await
                .map_err(|e| LumenError::Io(std::io::Error::other(e)))??
        };

        let mut report = BuildReport::default();
        let mut manifest = IndexManifest::new(project.project_name.clone(), git_repo);
        let mut batch = ChunkBatch::new();

        for relative in files {
            let rel_display = relative.to_string_lossy().replace('\\', "/");
            self.progress(&display, format!("generating {rel_display}"));

            let parsed = {
                let root = root.clone();
                let relative = relative.clone();
                tokio::task::spawn_blocking(move || parse_file(&root, &relative)).await
            };
            let record = match parsed {
                Ok(Ok(record)) => record,
                Ok(Err(reason)) => {
                    log_skip(&rel_display, &reason);
                    report.skipped_files += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(file = %rel_display, error = %e, "parse task failed");
                    report.skipped_files += 1;
                    continue;
                }
            };

            let records = changed_records(&record);
            if !records.is_empty() {
                batch.insert(record.file_path.clone(), records);
            }
            if batch.len() >= batch_files {
                self.flush(&project, &mut batch, &mut report).await;
            }

            manifest.indexed_files.push(IndexedFile {
                file_name: record.file_name,
                file_path: record.file_path,
                file_type: record.language_id,
                file_hash: record.hash,
            });
            report.indexed_files += 1;
        }

        if !batch.is_empty() {
            self.flush(&project, &mut batch, &mut report).await;
        }

        let manifest_path = self.store.path_for(&root);
        let previous = self.store.read(&manifest_path);
        let deleted = compute_deletions(previous.as_ref(), &manifest);
        if !deleted.is_empty() {
            report.deleted_files = deleted.len();
            let request = DeleteChunksRequest {
                project: project.clone(),
                deleted_files: deleted,
            };
            if let Err(e) = self.client.delete_chunks(&request).await {
                tracing::error!(error = %e, "failed to report deleted files");
                report.failed_submissions += 1;
            }
        }

        let end = SubmitChunksRequest {
            batch_id: Uuid::new_v4().to_string(),
            project,
            submit_end: true,
            changed_records: None,
        };
        if let Err(e) = self.client.submit_chunks(&end).await {
            tracing::error!(error = %e, "failed to end submission");
            report.failed_submissions += 1;
        }

        self.store.write(&manifest_path, &manifest).await;
        self.progress(&display, format!("done {display}"));
        tracing::info!(
            path = %root.display(),
            indexed = report.indexed_files,
            chunks = report.submitted_chunks,
            deleted = report.deleted_files,
            failed = report.failed_submissions,
            skipped = report.skipped_files,
            "index pass finished"
        );
        Ok(BuildOutcome::Completed(report))
    }

    /// Drop the service-side index of the project at `root` and its
    /// manifest, so the next pass starts from scratch.
    ///
    /// # Errors
    ///
    /// Returns the service error if the reset call fails. The manifest is
    /// kept in that case.
    pub async fn reset(&self, root: &Path) -> Result<(), LumenError> {
        let root = canonical(root)?;
        let request = ResetIndexRequest {
            project: ProjectParams {
                home_dir: self.ctx.local_rag_dir().to_string_lossy().into_owned(),
                project_name: project_key(&root),
                project_location: root.to_string_lossy().into_owned(),
                git_repo: None,
            },
        };
        self.client.reset_index(&request).await?;
        self.store.remove(&self.store.path_for(&root)).await;
        tracing::info!(path = %root.display(), "index reset");
        Ok(())
    }

    async fn flush(&self, project: &ProjectParams, batch: &mut ChunkBatch, report: &mut BuildReport) {
        let records = mem::take(batch);
        let chunks: usize = records.values().map(Vec::len).sum();
        let request = SubmitChunksRequest {
            batch_id: Uuid::new_v4().to_string(),
            project: project.clone(),
            submit_end: false,
            changed_records: Some(records),
        };
        match self.client.submit_chunks(&request).await {
            Ok(()) => report.submitted_chunks += chunks,
            Err(e) => {
                tracing::error!(error = %e, chunks, "chunk submission failed");
                report.failed_submissions += 1;
            }
        }
    }

    fn progress(&self, project: &str, message: String) {
        self.ctx.events().index_progress.publish(&IndexProgress {
            project: project.to_string(),
            message,
        });
    }
}

fn changed_records(record: &FileRecord) -> Vec<ChangedRecord> {
    record
        .function_blocks()
        .map(|block| changed_record(record, block))
        .collect()
}

fn changed_record(record: &FileRecord, block: &Block) -> ChangedRecord {
    ChangedRecord {
        record_id: Uuid::new_v4().to_string(),
        file_path: record.file_path.clone(),
        file_hash: record.hash.clone(),
        chunk_hash: block.chunk_hash(),
        start_offset: block.start_index,
        end_offset: block.end_index,
        start_line: block.start_position.row,
        end_line: block.end_position.row,
        start_column: block.start_position.column,
        end_column: block.end_position.column,
        code: block.code.clone(),
        comments: block.comment.clone(),
    }
}

fn log_skip(file: &str, reason: &SkipReason) {
    match reason {
        SkipReason::Unreadable(_) | SkipReason::ParseFailed => {
            tracing::warn!(file, reason = %reason, "file skipped")
        }
        _ => tracing::debug!(file, reason = %reason, "file skipped"),
    }
}

fn canonical(root: &Path) -> Result<PathBuf, LumenError> {
    match std::fs::canonicalize(root) {
        Ok(path) => Ok(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(LumenError::FileNotFound(root.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

fn display_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.to_string_lossy().into_owned())
}

/// URL of the `origin` remote of the repository containing `root`.
fn git_remote_url(root: &Path) -> Option<String> {
    let repo = git2::Repository::discover(root).ok()?;
    let remote = repo.find_remote("origin").ok()?;
    remote.url().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_chunker::parse;

    #[test]
    fn records_cover_functions_and_methods() {
        let source = "/** adds */\nfunction add(a, b) { return a + b }\n\
                      class Cart {\n  total() { return 0 }\n  clear() {}\n}\n\
                      const limit = 3;\n";
        let mut record = parse(source, "typescript").unwrap();
        record.file_path = "src/cart.ts".into();
        let records = changed_records(&record);

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.file_path == "src/cart.ts"));
        assert!(records.iter().all(|r| r.file_hash == record.hash));
        assert_eq!(records[0].comments.as_deref(), Some("/** adds */"));
        assert_eq!(records[0].chunk_hash, record.functions[0].chunk_hash());
        assert!(records[1].code.starts_with("total()"));
        assert_ne!(records[0].record_id, records[1].record_id);
    }

    #[test]
    fn offsets_and_positions_come_from_the_block() {
        let mut record = parse("\n\nfunction f() {}\n", "javascript").unwrap();
        record.file_path = "f.js".into();
        let r = &changed_records(&record)[0];
        assert_eq!(r.start_line, 2);
        assert_eq!(r.start_offset, 2);
        assert_eq!(r.end_offset, r.start_offset + "function f() {}".len());
    }

    #[test]
    fn display_name_is_the_last_component() {
        assert_eq!(display_name(Path::new("/work/shop")), "shop");
    }

    #[test]
    fn no_remote_outside_git() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(git_remote_url(dir.path()), None);
    }
}
