//! Editor language identifiers.
//!
//! Maps file extensions to the language ids used by editors (e.g.
//! `typescriptreact`) and back to markdown fence names.

use std::path::Path;

/// Language id used when an extension is unknown.
pub const PLAINTEXT: &str = "plaintext";

/// Language ids eligible for symbol prediction and local recall.
pub const FRONTEND_LANGUAGES: &[&str] =
    &["javascript", "typescript", "typescriptreact", "javascriptreact"];

const EXTENSION_LANGUAGES: &[(&str, &str)] = &[
    ("bat", "bat"),
    ("c", "c"),
    ("cjs", "javascript"),
    ("clj", "clojure"),
    ("cljc", "clojure"),
    ("cljs", "clojure"),
    ("coffee", "coffeescript"),
    ("cpp", "cpp"),
    ("cs", "csharp"),
    ("css", "css"),
    ("dockerfile", "dockerfile"),
    ("f", "fortran"),
    ("fs", "fsharp"),
    ("go", "go"),
    ("groovy", "groovy"),
    ("h", "c"),
    ("handlebars", "handlebars"),
    ("hbs", "handlebars"),
    ("htm", "html"),
    ("html", "html"),
    ("ini", "ini"),
    ("java", "java"),
    ("js", "javascript"),
    ("json", "json"),
    ("jsx", "javascriptreact"),
    ("kt", "kotlin"),
    ("less", "less"),
    ("lua", "lua"),
    ("md", "markdown"),
    ("mjs", "javascript"),
    ("php", "php"),
    ("pl", "perl"),
    ("ps1", "powershell"),
    ("py", "python"),
    ("r", "r"),
    ("rb", "ruby"),
    ("rs", "rust"),
    ("sass", "sass"),
    ("scala", "scala"),
    ("scss", "scss"),
    ("sh", "shellscript"),
    ("sql", "sql"),
    ("styl", "stylus"),
    ("swift", "swift"),
    ("ts", "typescript"),
    ("tsx", "typescriptreact"),
    ("vb", "vb"),
    ("xml", "xml"),
    ("yaml", "yaml"),
    ("yml", "yaml"),
];

/// Language id for a file extension, with or without the leading dot.
///
/// # Examples
///
/// ```
/// use lumen_core::language::language_for_extension;
///
/// assert_eq!(language_for_extension(".TSX"), "typescriptreact");
/// assert_eq!(language_for_extension("js"), "javascript");
/// assert_eq!(language_for_extension("zz"), "plaintext");
/// ```
pub fn language_for_extension(extension: &str) -> &'static str {
    let ext = extension.trim_start_matches('.').to_lowercase();
    EXTENSION_LANGUAGES
        .binary_search_by(|(e, _)| (*e).cmp(ext.as_str()))
        .map(|i| EXTENSION_LANGUAGES[i].1)
        .unwrap_or(PLAINTEXT)
}

/// Language id for a path, or `plaintext` when it has no known extension.
pub fn file_language_id(path: &Path) -> &'static str {
    path.extension()
        .and_then(|e| e.to_str())
        .map(language_for_extension)
        .unwrap_or(PLAINTEXT)
}

/// Markdown fence name for a language id.
///
/// # Examples
///
/// ```
/// use lumen_core::language::markdown_language;
///
/// assert_eq!(markdown_language("typescriptreact"), "tsx");
/// assert_eq!(markdown_language("python"), "python");
/// ```
pub fn markdown_language(language_id: &str) -> &str {
    match language_id {
        "javascriptreact" => "jsx",
        "typescriptreact" => "tsx",
        other => other,
    }
}

pub fn is_frontend_language(language_id: &str) -> bool {
    FRONTEND_LANGUAGES.contains(&language_id)
}
