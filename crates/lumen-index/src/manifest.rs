//! Persisted per-project index manifests.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use lumen_core::project_key;
use serde::{Deserialize, Serialize};

/// Version of the manifest layout written by this build.
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// One indexed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedFile {
    pub file_name: String,
    /// Path relative to the project root, `/`-separated.
    pub file_path: String,
    /// Language id.
    pub file_type: String,
    pub file_hash: String,
}

/// Which files of a project were indexed, and at which content version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexManifest {
    pub version: u32,
    pub project_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_repo: Option<String>,
    #[serde(default)]
    pub indexed_files: Vec<IndexedFile>,
}

impl IndexManifest {
    pub fn new(project_name: impl Into<String>, git_repo: Option<String>) -> Self {
        Self {
            version: MANIFEST_SCHEMA_VERSION,
            project_name: project_name.into(),
            git_repo,
            indexed_files: Vec::new(),
        }
    }
}

/// Paths indexed in `old` that are absent from `new`, each listed once,
/// in `old`'s order.
///
/// # Examples
///
/// ```
/// use lumen_index::{compute_deletions, IndexManifest, IndexedFile};
///
/// let file = |p: &str| IndexedFile {
///     file_name: p.into(),
///     file_path: p.into(),
///     file_type: "typescript".into(),
///     file_hash: "h".into(),
/// };
/// let mut old = IndexManifest::new("p", None);
/// old.indexed_files = vec![file("a.ts"), file("b.ts")];
/// let mut new = IndexManifest::new("p", None);
/// new.indexed_files = vec![file("a.ts")];
/// assert_eq!(compute_deletions(Some(&old), &new), vec!["b.ts"]);
/// assert!(compute_deletions(None, &new).is_empty());
/// ```
pub fn compute_deletions(old: Option<&IndexManifest>, new: &IndexManifest) -> Vec<String> {
    let Some(old) = old else {
        return Vec::new();
    };
    let current: HashSet<&str> = new
        .indexed_files
        .iter()
        .map(|f| f.file_path.as_str())
        .collect();
    let mut seen = HashSet::new();
    old.indexed_files
        .iter()
        .map(|f| f.file_path.as_str())
        .filter(|p| !current.contains(p) && seen.insert(*p))
        .map(str::to_string)
        .collect()
}

/// Reads and writes manifests under `<local_rag>/index/<project>/index.json`.
///
/// `<project>` is [`project_key`] of the absolute project path, so every distinct
/// project location gets its own manifest.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    root: PathBuf,
}

impl ManifestStore {
    /// A store rooted at the local-RAG directory.
    pub fn new(local_rag_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: local_rag_dir.into(),
        }
    }

    /// Manifest path for the project at `project_root` (absolute).
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::Path;
    /// use lumen_index::ManifestStore;
    ///
    /// let store = ManifestStore::new("/data/local_rag");
    /// let path = store.path_for(Path::new("/work/my.app"));
    /// assert!(path.starts_with("/data/local_rag/index"));
    /// assert!(path.ends_with("index.json"));
    /// ```
    pub fn path_for(&self, project_root: &Path) -> PathBuf {
        self.root
            .join("index")
            .join(project_key(project_root))
            .join("index.json")
    }

    /// Read a manifest. Missing or unreadable manifests read as `None`.
    pub fn read(&self, path: &Path) -> Option<IndexManifest> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read manifest");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt manifest ignored");
                None
            }
        }
    }

    /// Write a manifest through a temporary file and a rename. Failures are
    /// logged, not returned.
    pub async fn write(&self, path: &Path, manifest: &IndexManifest) {
        if let Err(e) = write_atomic(path, manifest).await {
            tracing::error!(path = %path.display(), error = %e, "failed to save manifest");
        }
    }

    /// Delete a manifest, if present.
    pub async fn remove(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove manifest"),
        }
    }
}

async fn write_atomic(path: &Path, manifest: &IndexManifest) -> Result<(), lumen_core::LumenError> {
    let content = serde_json::to_string_pretty(manifest)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, content).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, hash: &str) -> IndexedFile {
        IndexedFile {
            file_name: path.rsplit('/').next().unwrap().into(),
            file_path: path.into(),
            file_type: "typescript".into(),
            file_hash: hash.into(),
        }
    }

    fn manifest(paths: &[&str]) -> IndexManifest {
        let mut m = IndexManifest::new("_p", None);
        m.indexed_files = paths.iter().map(|p| file(p, "h")).collect();
        m
    }

    #[test]
    fn deletions_list_every_vanished_path_once() {
        let old = manifest(&["a.ts", "b.ts", "c.ts", "b.ts"]);
        let new = manifest(&["c.ts", "d.ts"]);
        assert_eq!(compute_deletions(Some(&old), &new), vec!["a.ts", "b.ts"]);
    }

    #[test]
    fn changed_hash_is_not_a_deletion() {
        let old = manifest(&["a.ts"]);
        let mut new = manifest(&[]);
        new.indexed_files.push(file("a.ts", "other"));
        assert!(compute_deletions(Some(&old), &new).is_empty());
    }

    #[test]
    fn deletions_hold_for_many_pairs() {
        let universe = ["a", "b", "c", "d", "e"];
        for old_mask in 0u32..32 {
            for new_mask in 0u32..32 {
                let pick = |mask: u32| -> Vec<&str> {
                    universe
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| mask & (1 << i) != 0)
                        .map(|(_, p)| *p)
                        .collect()
                };
                let old = manifest(&pick(old_mask));
                let new = manifest(&pick(new_mask));
                let deleted = compute_deletions(Some(&old), &new);
                for (i, p) in universe.iter().enumerate() {
                    let in_old = old_mask & (1 << i) != 0;
                    let in_new = new_mask & (1 << i) != 0;
                    let count = deleted.iter().filter(|d| d == p).count();
                    assert_eq!(count, usize::from(in_old && !in_new), "{p}");
                }
            }
        }
    }

    #[tokio::test]
    async fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::new(dir.path());
        let path = store.path_for(Path::new("/work/app"));
        let m = manifest(&["src/a.ts"]);
        store.write(&path, &m).await;
        assert_eq!(store.read(&path), Some(m));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_manifest_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManifestStore::new(dir.path());
        let path = store.path_for(Path::new("/work/app"));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        assert!(store.read(&path).is_none());
        store.remove(&path).await;
        assert!(!path.exists());
    }

    #[test]
    fn distinct_locations_get_distinct_paths() {
        let store = ManifestStore::new("/s");
        assert_ne!(
            store.path_for(Path::new("/a/proj")),
            store.path_for(Path::new("/b/proj"))
        );
    }

    #[test]
    fn roots_that_sanitize_alike_keep_separate_manifests() {
        let store = ManifestStore::new("/s");
        let paths: Vec<PathBuf> = ["/w/a/b", "/w/a_b", "/w/a.b"]
            .iter()
            .map(|p| store.path_for(Path::new(p)))
            .collect();
        assert_ne!(paths[0], paths[1]);
        assert_ne!(paths[0], paths[2]);
        assert_ne!(paths[1], paths[2]);
        assert_eq!(paths[0], store.path_for(Path::new("/w/a/b")));
    }
}
