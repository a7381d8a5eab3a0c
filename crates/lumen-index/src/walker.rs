use std::path::{Path, PathBuf};

use lumen_chunker::language::is_supported_path;
use lumen_core::{IndexConfig, LumenError};

/// Folder names that are never descended into.
pub const IGNORED_FOLDERS: &[&str] = &["node_modules", "dist", "__tests__", "coverage", ".umi"];

/// What the project walk skips.
///
/// # Examples
///
/// ```
/// use lumen_core::IndexConfig;
/// use lumen_index::WalkOptions;
///
/// let options = WalkOptions::from_config(&IndexConfig::default());
/// assert!(options.ignored_folders.iter().any(|f| f == "node_modules"));
/// assert_eq!(options.max_folder_entries, 100);
/// ```
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Tool ignore file read after `.gitignore`.
    pub ignore_file: String,
    pub ignored_folders: Vec<String>,
    /// Directories with more entries than this are skipped entirely.
    pub max_folder_entries: usize,
}

impl WalkOptions {
    pub fn from_config(config: &IndexConfig) -> Self {
        let mut ignored_folders: Vec<String> =
            IGNORED_FOLDERS.iter().map(|f| f.to_string()).collect();
        ignored_folders.extend(config.extra_ignored_folders.iter().cloned());
        Self {
            ignore_file: config.ignore_file.clone(),
            ignored_folders,
            max_folder_entries: config.max_folder_entries,
        }
    }
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self::from_config(&IndexConfig::default())
    }
}

/// List the supported source files of a project, relative to `root`.
///
/// The walk is depth-first in lexical order. It skips dot-prefixed
/// entries, paths matched by `.gitignore` or the tool ignore file (whose
/// rules take precedence, so `!pattern` re-includes), deny-listed folders,
/// and any directory with more than `max_folder_entries` entries.
///
/// # Errors
///
/// Returns [`LumenError::Io`] if `root` cannot be read.
pub fn walk_project(root: &Path, options: &WalkOptions) -> Result<Vec<PathBuf>, LumenError> {
    if count_entries(root)? > options.max_folder_entries {
        tracing::info!(path = %root.display(), "project root too large, skipping");
        return Ok(Vec::new());
    }

    let ignored = options.ignored_folders.clone();
    let max_entries = options.max_folder_entries;

    let mut builder = ignore::WalkBuilder::new(root);
    builder
        .hidden(true)
        .parents(false)
        .ignore(false)
        .git_global(false)
        .git_exclude(false)
        .git_ignore(true)
        .require_git(false)
        .add_custom_ignore_filename(&options.ignore_file)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| {
            if !entry.file_type().is_some_and(|t| t.is_dir()) {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            if ignored.iter().any(|f| *f == name) {
                return false;
            }
            match count_entries(entry.path()) {
                Ok(n) if n > max_entries => {
                    tracing::debug!(path = %entry.path().display(), entries = n, "skipping large folder");
                    false
                }
                Ok(_) => true,
                Err(_) => false,
            }
        });

    let mut files = Vec::new();
    for entry in builder.build() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!(error = %e, "walk error");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        if !is_supported_path(path) {
            continue;
        }
        let relative = match path.strip_prefix(root) {
            Ok(r) => r.to_path_buf(),
            Err(_) => path.to_path_buf(),
        };
        files.push(relative);
    }
    Ok(files)
}

fn count_entries(dir: &Path) -> Result<usize, LumenError> {
    Ok(std::fs::read_dir(dir)?.count())
}
