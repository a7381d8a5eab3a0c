use std::path::Path;

/// File extensions the chunker parses.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "cjs", "ts", "tsx"];

/// The tree-sitter grammar used for a source file.
///
/// # Examples
///
/// ```
/// use lumen_chunker::Grammar;
///
/// assert_eq!(Grammar::from_language_id("typescriptreact"), Some(Grammar::Tsx));
/// assert_eq!(Grammar::from_language_id("javascriptreact"), Some(Grammar::JavaScript));
/// assert_eq!(Grammar::from_language_id("python"), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grammar {
    /// JavaScript, JSX included.
    JavaScript,
    TypeScript,
    Tsx,
}

impl Grammar {
    pub fn from_language_id(language_id: &str) -> Option<Self> {
        match language_id {
            "javascript" | "javascriptreact" => Some(Grammar::JavaScript),
            "typescript" => Some(Grammar::TypeScript),
            "typescriptreact" => Some(Grammar::Tsx),
            _ => None,
        }
    }

    /// Grammar for a path, by extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "js" | "jsx" | "mjs" | "cjs" => Some(Grammar::JavaScript),
            "ts" => Some(Grammar::TypeScript),
            "tsx" => Some(Grammar::Tsx),
            _ => None,
        }
    }

    pub fn tree_sitter_language(self) -> tree_sitter::Language {
        match self {
            Grammar::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Grammar::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Grammar::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

/// Whether the chunker handles files with this path's extension.
pub fn is_supported_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
}
