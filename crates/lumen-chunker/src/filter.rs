//! Heuristics that reject generated sources before they are parsed.

use std::sync::OnceLock;

use regex::Regex;

/// Non-blank line count above which a file is treated as generated.
pub const MAX_LINES: usize = 2000;

/// Any line longer than this marks the file as minified.
pub const MAX_LINE_LEN: usize = 500;

/// Files shorter than this skip the line-count and density heuristics.
/// The [`MAX_LINE_LEN`] rule applies to every file.
pub const MIN_JUDGED_LEN: usize = 1024;

const MAX_SHORT_IDENT_RATIO: f64 = 0.05;
const MIN_WHITESPACE_RATIO: f64 = 0.1;

const BUNDLE_MARKERS: &[&str] = &[
    "__webpack_require__",
    ".webpackChunk_",
    "window[\"webpackJsonp\"]",
    "window.webpackJsonp",
    "Object.defineProperty(exports, '__esModule', { value: true });",
];

fn source_map_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"//#\s*sourceMappingURL=.+\.js\.map").expect("Invalid source map regex")
    })
}

fn line_comment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)//.*$").expect("Invalid line comment regex"))
}

fn block_comment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/\*[\s\S]*?\*/").expect("Invalid block comment regex"))
}

/// Words of one or two letters, the typical output of a mangler.
fn short_ident_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b[a-z]{1,2}\b").expect("Invalid identifier regex"))
}

/// Whether `code` looks like bundler output.
///
/// A `sourceMappingURL` trailer is checked on the raw text; the bundler
/// markers are matched after comments are stripped.
///
/// # Examples
///
/// ```
/// use lumen_chunker::filter::is_build_bundle;
///
/// assert!(is_build_bundle("var m = __webpack_require__(12);"));
/// assert!(!is_build_bundle("// __webpack_require__ is mentioned only here\nexport {};"));
/// ```
pub fn is_build_bundle(code: &str) -> bool {
    if source_map_regex().is_match(code) {
        return true;
    }
    let stripped = line_comment_regex().replace_all(code, "");
    let stripped = block_comment_regex().replace_all(&stripped, "");
    BUNDLE_MARKERS.iter().any(|m| stripped.contains(m))
}

/// Whether `code` looks minified.
///
/// Any line longer than [`MAX_LINE_LEN`] marks a file of any size. Files of
/// at least [`MIN_JUDGED_LEN`] bytes are also minified when they have at most
/// one or more than [`MAX_LINES`] non-blank lines, more than 5% short
/// identifiers per character, or less than 10% whitespace.
pub fn is_minified(code: &str) -> bool {
    let lines: Vec<&str> = code
        .split(['\r', '\n'])
        .filter(|l| !l.trim().is_empty())
        .collect();
    if lines.iter().any(|l| l.chars().count() > MAX_LINE_LEN) {
        return true;
    }
    if code.len() < MIN_JUDGED_LEN {
        return false;
    }
    if lines.len() <= 1 || lines.len() > MAX_LINES {
        return true;
    }

    let total = code.chars().count() as f64;
    let short = short_ident_regex().find_iter(code).count() as f64;
    if short / total > MAX_SHORT_IDENT_RATIO {
        return true;
    }

    let whitespace = code.chars().filter(|c| c.is_whitespace()).count() as f64;
    whitespace / total < MIN_WHITESPACE_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handwritten(functions: usize) -> String {
        (0..functions)
            .map(|n| {
                format!(
                    "/** Computes the order total for variant {n}. */\n\
                     export function computeTotal{n}(quantity: number, unitPrice: number): number {{\n\
                     \x20 const subtotal = quantity * unitPrice;\n\
                     \x20 return subtotal + shippingCost;\n\
                     }}\n\n"
                )
            })
            .collect()
    }

    #[test]
    fn source_map_trailer_is_bundle() {
        let code = "export const a = 1;\n//# sourceMappingURL=main.3f2a.js.map\n";
        assert!(is_build_bundle(code));
    }

    #[test]
    fn webpack_markers_are_bundles() {
        assert!(is_build_bundle("(self.webpackChunk_app = self.webpackChunk_app || [])"));
        assert!(is_build_bundle("window[\"webpackJsonp\"].push([])"));
        assert!(is_build_bundle(
            "\"use strict\";\nObject.defineProperty(exports, '__esModule', { value: true });"
        ));
    }

    #[test]
    fn markers_inside_comments_are_ignored() {
        let code = "/* window.webpackJsonp was used by the old build */\nexport const ok = true;\n";
        assert!(!is_build_bundle(code));
    }

    #[test]
    fn handwritten_file_is_not_minified() {
        let code = handwritten(20);
        assert!(code.len() > MIN_JUDGED_LEN);
        assert!(!is_minified(&code));
        assert!(!is_build_bundle(&code));
    }

    #[test]
    fn small_files_are_not_judged() {
        assert!(!is_minified("function add(a,b){return a+b}"));
    }

    #[test]
    fn long_line_in_small_file_is_minified() {
        let code = format!(
            "export const LOOKUP = \"{}\";\nexport const size = 1;\n",
            "x".repeat(MAX_LINE_LEN + 100)
        );
        assert!(code.len() < MIN_JUDGED_LEN);
        assert!(is_minified(&code));
    }

    #[test]
    fn single_long_line_is_minified() {
        let code = "var x=1;".repeat(200);
        assert!(is_minified(&code));
    }

    #[test]
    fn overlong_line_is_minified() {
        let mut code = handwritten(10);
        code.push_str(&format!("export const table = [{}];\n", "1000,".repeat(120)));
        assert!(is_minified(&code));
    }

    #[test]
    fn too_many_lines_is_minified() {
        let code = "export const value = computeSomething();\n".repeat(MAX_LINES + 1);
        assert!(is_minified(&code));
    }

    #[test]
    fn dense_short_identifiers_are_minified() {
        let code = "a = b + c;\nd = e * f;\n".repeat(100);
        assert!(is_minified(&code));
    }

    #[test]
    fn low_whitespace_is_minified() {
        let code = "functionCall(argumentOne,argumentTwo);\n".repeat(60);
        assert!(is_minified(&code));
    }
}
