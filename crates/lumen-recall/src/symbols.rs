//! Resolving predicted symbol names to their definitions.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lumen_chunker::{parse, parse_file, FileRecord};
use lumen_core::language::file_language_id;
use lumen_index::{walk_project, WalkOptions};
use tokio_util::sync::CancellationToken;

/// Where a symbol is defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub symbol: String,
    /// Absolute path of the defining file.
    pub file_path: PathBuf,
    pub language_id: String,
    /// Full text of the defining declaration, leading comment excluded.
    pub source_code: String,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

/// A batch of symbols to resolve from one document.
#[derive(Debug, Clone)]
pub struct SymbolQuery {
    pub symbols: Vec<String>,
    /// Absolute path of the document the symbols were predicted from.
    pub current_file: PathBuf,
    /// Text of that document, when it differs from what is on disk.
    pub document: Option<String>,
}

/// Finds definitions of symbol names.
///
/// This is the seam for an editor's definition provider. Implementations
/// return what they found before `cancel` fired and never fail: unresolved
/// names are simply missing from the result.
#[async_trait]
pub trait SymbolResolver: Send + Sync {
    async fn resolve(&self, query: &SymbolQuery, cancel: &CancellationToken) -> Vec<Definition>;
}

/// Resolves names against the declarations the chunker extracts.
///
/// Each name is looked up in the current document first, then in the other
/// supported files of its directory, then in the rest of the workspace.
/// The first declaration found wins.
#[derive(Debug, Clone)]
pub struct WorkspaceSymbolResolver {
    root: Option<PathBuf>,
    options: WalkOptions,
}

impl WorkspaceSymbolResolver {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root,
            options: WalkOptions::default(),
        }
    }

    pub fn with_options(root: Option<PathBuf>, options: WalkOptions) -> Self {
        Self { root, options }
    }
}

#[async_trait]
impl SymbolResolver for WorkspaceSymbolResolver {
    async fn resolve(&self, query: &SymbolQuery, cancel: &CancellationToken) -> Vec<Definition> {
        if query.symbols.is_empty() {
            return Vec::new();
        }
        let root = self.root.clone();
        let options = self.options.clone();
        let query = query.clone();
        let cancel = cancel.clone();
        match tokio::task::spawn_blocking(move || {
            resolve_blocking(root.as_deref(), &options, &query, &cancel)
        })
        .await
        {
            Ok(definitions) => definitions,
            Err(e) => {
                tracing::warn!(error = %e, "symbol resolution failed");
                Vec::new()
            }
        }
    }
}

fn resolve_blocking(
    root: Option<&Path>,
    options: &WalkOptions,
    query: &SymbolQuery,
    cancel: &CancellationToken,
) -> Vec<Definition> {
    let mut wanted: BTreeSet<&str> = query.symbols.iter().map(String::as_str).collect();
    let mut found: HashMap<String, Definition> = HashMap::new();

    let current = match &query.document {
        Some(text) => parse(text, file_language_id(&query.current_file)).ok(),
        None => query
            .current_file
            .parent()
            .zip(query.current_file.file_name())
            .and_then(|(dir, name)| parse_file(dir, Path::new(name)).ok()),
    };
    if let Some(record) = &current {
        collect(record, &query.current_file, &mut wanted, &mut found);
    }

    for path in candidates(root, options, &query.current_file) {
        if wanted.is_empty() || cancel.is_cancelled() {
            break;
        }
        let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
            continue;
        };
        match parse_file(dir, Path::new(name)) {
            Ok(record) => collect(&record, &path, &mut wanted, &mut found),
            Err(reason) => tracing::trace!(path = %path.display(), %reason, "not searched"),
        }
    }

    // Keep the order in which the symbols were asked for.
    query
        .symbols
        .iter()
        .filter_map(|s| found.remove(s))
        .collect()
}

/// Files to search after the current one: same directory first, then the
/// rest of the workspace.
fn candidates(root: Option<&Path>, options: &WalkOptions, current: &Path) -> Vec<PathBuf> {
    let mut siblings = Vec::new();
    if let Some(dir) = current.parent() {
        if let Ok(entries) = std::fs::read_dir(dir) {
            siblings = entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && p != current)
                .filter(|p| lumen_chunker::language::is_supported_path(p))
                .collect();
            siblings.sort();
        }
    }

    let mut rest = Vec::new();
    if let Some(root) = root {
        match walk_project(root, options) {
            Ok(files) => {
                rest = files
                    .into_iter()
                    .map(|rel| root.join(rel))
                    .filter(|p| p != current && !siblings.contains(p))
                    .collect();
            }
            Err(e) => tracing::debug!(error = %e, "workspace walk failed"),
        }
    }
    siblings.extend(rest);
    siblings
}

fn collect(
    record: &FileRecord,
    path: &Path,
    wanted: &mut BTreeSet<&str>,
    found: &mut HashMap<String, Definition>,
) {
    for block in record.named_blocks() {
        let Some(name) = block.name.as_deref() else {
            continue;
        };
        if !wanted.remove(name) {
            continue;
        }
        found.insert(
            name.to_string(),
            Definition {
                symbol: name.to_string(),
                file_path: path.to_path_buf(),
                language_id: record.language_id.clone(),
                source_code: block.code.clone(),
                start_line: block.start_position.row,
                start_column: block.start_position.column,
                end_line: block.end_position.row,
                end_column: block.end_position.column,
            },
        );
    }
}
