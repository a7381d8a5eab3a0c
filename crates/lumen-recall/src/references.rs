//! Conversions between retrieval hits, definitions and code references,
//! and the prompt context rendered from them.

use std::path::Path;
use std::sync::OnceLock;

use lumen_core::language::{
    file_language_id, is_frontend_language, language_for_extension, markdown_language, PLAINTEXT,
};
use lumen_core::CodeReference;
use lumen_service::api::{LocalRagHit, RemoteRagHit};
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::prompt::wrap_code_ref;
use crate::symbols::Definition;

/// Project type sent with remote searches when nothing more specific is known.
pub const DEFAULT_PROJECT_TYPE: &str = "javascript";

fn bare_identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_$]+$").expect("Invalid identifier regex"))
}

/// Whether `code` is a single identifier with nothing around it.
///
/// # Examples
///
/// ```
/// use lumen_recall::references::is_bare_identifier;
///
/// assert!(is_bare_identifier("  useCart "));
/// assert!(!is_bare_identifier("useCart()"));
/// ```
pub fn is_bare_identifier(code: &str) -> bool {
    bare_identifier_regex().is_match(code.trim())
}

/// References worth predicting symbols from: front-end sources that are
/// more than a bare identifier.
pub fn find_predictable_code_refs(refs: &[CodeReference]) -> Vec<&CodeReference> {
    refs.iter()
        .filter(|r| is_frontend_language(&r.language_id) && !is_bare_identifier(&r.source_code))
        .collect()
}

/// Project type of a remote search, from the file name of the last
/// reference.
///
/// # Examples
///
/// ```
/// use lumen_recall::references::project_type;
///
/// assert_eq!(project_type(Some("App.tsx")), "javascript");
/// assert_eq!(project_type(Some("main.py")), "python");
/// assert_eq!(project_type(Some("Makefile")), "javascript");
/// assert_eq!(project_type(None), "javascript");
/// ```
pub fn project_type(file_name: Option<&str>) -> String {
    let Some(ext) = file_name.and_then(|n| n.rsplit_once('.')).map(|(_, ext)| ext) else {
        return DEFAULT_PROJECT_TYPE.to_string();
    };
    let language = language_for_extension(ext);
    if is_frontend_language(language) || language == PLAINTEXT {
        DEFAULT_PROJECT_TYPE.to_string()
    } else {
        language.to_string()
    }
}

/// Hashed workspace identity for remote searches; empty without a workspace.
pub fn project_id(root: Option<&Path>) -> String {
    match root {
        Some(root) => format!("{:x}", Sha256::digest(root.to_string_lossy().as_bytes())),
        None => String::new(),
    }
}

/// The `[start, end)` byte range of the file at `path`.
///
/// Unreadable files, ranges outside the file and ranges that do not fall on
/// UTF-8 boundaries read as `None`, as do empty ranges.
pub fn read_partly(path: &Path, start: usize, end: usize) -> Option<String> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "hit file unreadable");
            return None;
        }
    };
    if start >= end || end > bytes.len() {
        tracing::debug!(path = %path.display(), start, end, "hit range out of bounds");
        return None;
    }
    String::from_utf8(bytes[start..end].to_vec()).ok()
}

/// Turn local search hits into references by reading each hit's byte range
/// from `<root>/<filePath>`. Hits that cannot be read are dropped.
pub fn local_hits_to_refs(root: &Path, hits: &[LocalRagHit]) -> Vec<CodeReference> {
    hits.iter()
        .filter_map(|hit| {
            let path = root.join(&hit.file_path);
            let code = read_partly(&path, hit.start_offset, hit.end_offset)?;
            let file_name = Path::new(&hit.file_path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| hit.file_path.clone());
            Some(CodeReference {
                language_id: file_language_id(&path).to_string(),
                file_url: path.to_string_lossy().into_owned(),
                file_path: Some(hit.file_path.clone()),
                file_name,
                document: None,
                source_code: code,
                selected_start_line: hit.start_line,
                selected_start_column: hit.start_column,
                selected_end_line: hit.end_line,
                selected_end_column: hit.end_column,
            })
        })
        .collect()
}

/// Turn remote hits into references, keeping the first hit of each
/// distinct source text.
pub fn remote_hits_to_refs(hits: &[RemoteRagHit]) -> Vec<CodeReference> {
    let mut refs: Vec<CodeReference> = Vec::new();
    for hit in hits {
        if refs.iter().any(|r| r.source_code == hit.code) {
            continue;
        }
        let language = if hit.file_name.is_empty() {
            PLAINTEXT
        } else {
            file_language_id(Path::new(&hit.file_name))
        };
        refs.push(CodeReference {
            language_id: markdown_language(language).to_string(),
            file_url: hit.file_path.clone(),
            file_name: hit.file_name.clone(),
            source_code: hit.code.clone(),
            ..CodeReference::default()
        });
    }
    refs
}

/// Turn resolved definitions into references.
pub fn definitions_to_refs(definitions: &[Definition]) -> Vec<CodeReference> {
    definitions
        .iter()
        .map(|d| CodeReference {
            language_id: d.language_id.clone(),
            file_url: d.file_path.to_string_lossy().into_owned(),
            file_path: None,
            file_name: d
                .file_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            document: None,
            source_code: d.source_code.clone(),
            selected_start_line: d.start_line,
            selected_start_column: d.start_column,
            selected_end_line: d.end_line,
            selected_end_column: d.end_column,
        })
        .collect()
}

/// Drop references whose text is already covered by another reference.
///
/// A reference goes when an earlier kept reference contains its text, or
/// when a later reference strictly contains it. Of exact duplicates the
/// first is kept.
///
/// # Examples
///
/// ```
/// use lumen_core::CodeReference;
/// use lumen_recall::references::remove_duplications;
///
/// let r = |code: &str| CodeReference::snippet("typescript", "/w/a.ts", code);
/// let kept = remove_duplications(vec![r("total()"), r("function f() { total() }"), r("total()")]);
/// assert_eq!(kept.len(), 1);
/// assert_eq!(kept[0].source_code, "function f() { total() }");
/// ```
pub fn remove_duplications(refs: Vec<CodeReference>) -> Vec<CodeReference> {
    let mut kept: Vec<CodeReference> = Vec::new();
    for (i, candidate) in refs.iter().enumerate() {
        let code = candidate.source_code.as_str();
        let covered_before = kept.iter().any(|k| k.source_code.contains(code));
        let covered_after = refs[i + 1..]
            .iter()
            .any(|later| later.source_code.len() > code.len() && later.source_code.contains(code));
        if !covered_before && !covered_after {
            kept.push(candidate.clone());
        }
    }
    kept
}

/// Render local references as numbered code blocks for the chat prompt.
pub fn related_context(local_refs: &[CodeReference]) -> Option<String> {
    let refs = remove_duplications(local_refs.to_vec());
    if refs.is_empty() {
        return None;
    }
    let mut out = String::from("Related code from the current project:\n");
    for (i, r) in refs.iter().enumerate() {
        let location = r.file_path.as_deref().unwrap_or(&r.file_url);
        out.push_str(&format!("\n{}. {location}\n{}\n", i + 1, wrap_code_ref(r)));
    }
    Some(out)
}

/// Render remote references, each prefixed with where it came from.
pub fn additional_related_context(remote_refs: &[CodeReference]) -> Option<String> {
    if remote_refs.is_empty() {
        return None;
    }
    let mut out = String::from("Related code from other codebases:\n");
    for r in remote_refs {
        out.push_str(&format!("\nfrom codebase: {}\n{}\n", r.file_url, wrap_code_ref(r)));
    }
    Some(out)
}
