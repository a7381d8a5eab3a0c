//! Semantic block extraction using tree-sitter.
//!
//! Walks the top-level declarations of a JavaScript or TypeScript file
//! (unwrapping `export` wrappers) and classifies each one into imports,
//! fields, functions, classes or expressions. Every block carries the run
//! of comments directly above it, and its span starts at the first of them.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tree_sitter::{Node, Parser, Point};

use crate::filter::{is_build_bundle, is_minified};
use crate::language::Grammar;

const FUNCTION_VALUE_KINDS: &[&str] = &["arrow_function", "function_expression", "function"];
const TYPE_DECLARATION_KINDS: &[&str] = &[
    "enum_declaration",
    "type_alias_declaration",
    "interface_declaration",
];
const CLASS_KINDS: &[&str] = &["class_declaration", "abstract_class_declaration"];

/// Why a file produced no [`FileRecord`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    #[error("looks like bundler output")]
    Bundle,
    #[error("looks minified")]
    Minified,
    #[error("unsupported language: {0}")]
    Unsupported(String),
    #[error("parser produced no tree")]
    ParseFailed,
    #[error("unreadable: {0}")]
    Unreadable(String),
}

/// What a [`Block`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Import,
    Field,
    Function,
    Class,
    Expression,
}

/// A zero-indexed line and column, matching tree-sitter's `Point`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub row: u32,
    pub column: u32,
}

impl From<Point> for Position {
    fn from(p: Point) -> Self {
        Self {
            row: p.row as u32,
            column: p.column as u32,
        }
    }
}

/// A semantic unit of source code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub kind: BlockKind,
    /// tree-sitter node kind the block was classified from.
    pub ast_type: String,
    /// Declared identifier, when the declaration has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Byte offset of the first leading comment, or of the node itself.
    pub start_index: usize,
    pub end_index: usize,
    pub start_position: Position,
    pub end_position: Position,
    /// Text of the declaration, without its leading comment.
    pub code: String,
    /// Leading comments joined by `\n`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Parameter list text, absent for an empty list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    /// Return type annotation without the leading colon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Block>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<Block>,
}

impl Block {
    /// SHA-256 over the comment followed by the code.
    pub fn chunk_hash(&self) -> String {
        let mut hasher = Sha256::new();
        if let Some(comment) = &self.comment {
            hasher.update(comment.as_bytes());
        }
        hasher.update(self.code.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// One parsed source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Path relative to the project root; empty until the caller sets it.
    pub file_path: String,
    pub file_name: String,
    /// Lowercase hex SHA-256 of the file text.
    pub hash: String,
    pub language_id: String,
    /// Every top-level import statement, joined by `\n`.
    pub imports: String,
    pub fields: Vec<Block>,
    pub functions: Vec<Block>,
    pub classes: Vec<Block>,
    pub expressions: Vec<Block>,
}

impl FileRecord {
    /// Top-level functions followed by the methods of every class.
    pub fn function_blocks(&self) -> impl Iterator<Item = &Block> {
        self.functions
            .iter()
            .chain(self.classes.iter().flat_map(|c| c.methods.iter()))
    }

    /// Every block that declares a name, class members included.
    pub fn named_blocks(&self) -> impl Iterator<Item = &Block> {
        self.fields
            .iter()
            .chain(self.functions.iter())
            .chain(self.classes.iter())
            .chain(
                self.classes
                    .iter()
                    .flat_map(|c| c.fields.iter().chain(c.methods.iter())),
            )
            .filter(|b| b.name.is_some())
    }
}

/// Lowercase hex SHA-256 of `text`.
///
/// # Examples
///
/// ```
/// assert_eq!(
///     lumen_chunker::chunker::content_hash(""),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Parse `text` into a [`FileRecord`].
///
/// Bundles and minified files are rejected before parsing. The returned
/// record has an empty `file_path` and `file_name`; see [`parse_file`].
///
/// # Examples
///
/// ```
/// use lumen_chunker::parse;
///
/// let record = parse("function add(a, b) { return a + b }", "typescript").unwrap();
/// assert_eq!(record.functions.len(), 1);
/// assert_eq!(record.functions[0].name.as_deref(), Some("add"));
/// assert_eq!(record.functions[0].arguments.as_deref(), Some("(a, b)"));
/// ```
pub fn parse(text: &str, language_id: &str) -> Result<FileRecord, SkipReason> {
    let grammar = Grammar::from_language_id(language_id)
        .ok_or_else(|| SkipReason::Unsupported(language_id.to_string()))?;
    if is_build_bundle(text) {
        return Err(SkipReason::Bundle);
    }
    if is_minified(text) {
        return Err(SkipReason::Minified);
    }

    let mut parser = Parser::new();
    parser
        .set_language(&grammar.tree_sitter_language())
        .map_err(|_| SkipReason::ParseFailed)?;
    let tree = parser.parse(text, None).ok_or(SkipReason::ParseFailed)?;

    let mut record = FileRecord {
        file_path: String::new(),
        file_name: String::new(),
        hash: content_hash(text),
        language_id: language_id.to_string(),
        imports: String::new(),
        fields: Vec::new(),
        functions: Vec::new(),
        classes: Vec::new(),
        expressions: Vec::new(),
    };
    collect_file(tree.root_node(), text.as_bytes(), &mut record);
    Ok(record)
}

/// Read and parse the file at `root/relative`.
///
/// The language is taken from the extension, and the record's path is set
/// to `relative` with `/` separators.
pub fn parse_file(root: &Path, relative: &Path) -> Result<FileRecord, SkipReason> {
    let full = root.join(relative);
    let language_id = lumen_core::language::file_language_id(&full);
    if Grammar::from_language_id(language_id).is_none() {
        return Err(SkipReason::Unsupported(language_id.to_string()));
    }
    let text =
        std::fs::read_to_string(&full).map_err(|e| SkipReason::Unreadable(e.to_string()))?;
    let mut record = parse(&text, language_id)?;
    record.file_path = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    record.file_name = relative
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(record)
}

fn collect_file(root: Node, source: &[u8], record: &mut FileRecord) {
    let mut imports = Vec::new();
    let mut cursor = root.walk();
    for node in root.children(&mut cursor) {
        match node.kind() {
            "import_statement" => imports.push(node_text(&node, source)),
            "export_statement" => {
                if let Some(declaration) = node.child_by_field_name("declaration") {
                    classify(declaration, node, source, record);
                }
            }
            _ => classify(node, node, source, record),
        }
    }
    record.imports = imports.join("\n");
}

/// Classify `node`, attributing comments and span to `outer` (the export
/// statement when there is one).
fn classify(node: Node, outer: Node, source: &[u8], record: &mut FileRecord) {
    let kind = node.kind();
    match kind {
        "lexical_declaration" | "variable_declaration" => {
            let declarator = first_child_of_kind(&node, "variable_declarator");
            let value = declarator.and_then(|d| d.child_by_field_name("value"));
            let name = declarator
                .and_then(|d| d.child_by_field_name("name"))
                .map(|n| node_text(&n, source));
            match value {
                Some(value) if FUNCTION_VALUE_KINDS.contains(&value.kind()) => {
                    let mut block = function_block(outer, value, source);
                    block.name = name;
                    record.functions.push(block);
                }
                _ => {
                    let mut block = plain_block(BlockKind::Field, outer, node, source);
                    block.name = name;
                    record.fields.push(block);
                }
            }
        }
        k if TYPE_DECLARATION_KINDS.contains(&k) => {
            let mut block = plain_block(BlockKind::Field, outer, node, source);
            block.name = field_text(&node, "name", source);
            record.fields.push(block);
        }
        "function_declaration" | "generator_function_declaration" => {
            let mut block = function_block(outer, node, source);
            block.name = field_text(&node, "name", source);
            record.functions.push(block);
        }
        k if CLASS_KINDS.contains(&k) => {
            if let Some(body) = node.child_by_field_name("body") {
                let mut block = class_block(outer, node, body, source);
                block.name = field_text(&node, "name", source);
                record.classes.push(block);
            }
        }
        "expression_statement" => {
            record
                .expressions
                .push(plain_block(BlockKind::Expression, outer, node, source));
        }
        _ => {}
    }
}

fn class_block(outer: Node, class: Node, body: Node, source: &[u8]) -> Block {
    let mut fields = Vec::new();
    let mut methods = Vec::new();

    let mut cursor = body.walk();
    for member in body.children(&mut cursor) {
        let kind = member.kind();
        if kind.ends_with("field_definition") {
            let name = field_text(&member, "name", source)
                .or_else(|| field_text(&member, "property", source));
            match member.child_by_field_name("value") {
                Some(value) if FUNCTION_VALUE_KINDS.contains(&value.kind()) => {
                    let mut block = function_block(member, value, source);
                    block.name = name;
                    methods.push(block);
                }
                _ => {
                    let mut block = plain_block(BlockKind::Field, member, member, source);
                    block.name = name;
                    fields.push(block);
                }
            }
        } else if kind == "method_definition" {
            let mut block = function_block(member, member, source);
            block.name = field_text(&member, "name", source);
            methods.push(block);
        }
    }

    let mut block = plain_block(BlockKind::Class, outer, class, source);
    block.fields = fields;
    block.methods = methods;
    block
}

/// A function block spanning `outer`, with signature details read from
/// `function` (the declaration itself or a function-valued initializer).
fn function_block(outer: Node, function: Node, source: &[u8]) -> Block {
    let mut block = plain_block(BlockKind::Function, outer, function, source);
    block.arguments = match function.child_by_field_name("parameters") {
        // "(" and ")" alone mean an empty list.
        Some(params) if params.child_count() > 2 => Some(node_text(&params, source)),
        Some(_) => None,
        None => field_text(&function, "parameter", source),
    };
    block.return_type = function.child_by_field_name("return_type").map(|rt| {
        node_text(&rt, source)
            .trim_start_matches(':')
            .trim_start()
            .to_string()
    });
    block
}

fn plain_block(kind: BlockKind, outer: Node, classified: Node, source: &[u8]) -> Block {
    let (first_comment, comment) = leading_comments(outer, source);
    let start = first_comment.unwrap_or(outer);
    Block {
        kind,
        ast_type: classified.kind().to_string(),
        name: None,
        start_index: start.start_byte(),
        end_index: outer.end_byte(),
        start_position: start.start_position().into(),
        end_position: outer.end_position().into(),
        code: node_text(&outer, source),
        comment,
        arguments: None,
        return_type: None,
        fields: Vec::new(),
        methods: Vec::new(),
    }
}

/// The run of comment siblings directly before `node`, oldest first.
fn leading_comments<'t>(node: Node<'t>, source: &[u8]) -> (Option<Node<'t>>, Option<String>) {
    let mut comments = Vec::new();
    let mut current = node;
    while let Some(prev) = current.prev_sibling() {
        if prev.kind() != "comment" {
            break;
        }
        comments.push(prev);
        current = prev;
    }
    if comments.is_empty() {
        return (None, None);
    }
    comments.reverse();
    let text = comments
        .iter()
        .map(|c| node_text(c, source))
        .collect::<Vec<_>>()
        .join("\n");
    (comments.first().copied(), Some(text))
}

fn first_child_of_kind<'t>(node: &Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == kind);
    found
}

fn field_text(node: &Node, field: &str, source: &[u8]) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| node_text(&n, source))
        .filter(|t| !t.is_empty())
}

fn node_text(node: &Node, source: &[u8]) -> String {
    let start = node.start_byte();
    let end = node.end_byte();
    if start > end || end > source.len() {
        return String::new();
    }
    String::from_utf8_lossy(&source[start..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(code: &str) -> FileRecord {
        parse(code, "typescript").unwrap()
    }

    #[test]
    fn function_declaration_is_a_function_block() {
        let record = ts("function add(a: number, b: number): number {\n  return a + b;\n}\n");
        assert_eq!(record.functions.len(), 1);
        let add = &record.functions[0];
        assert_eq!(add.kind, BlockKind::Function);
        assert_eq!(add.ast_type, "function_declaration");
        assert_eq!(add.name.as_deref(), Some("add"));
        assert_eq!(add.arguments.as_deref(), Some("(a: number, b: number)"));
        assert_eq!(add.return_type.as_deref(), Some("number"));
        assert!(add.comment.is_none());
        assert_eq!(add.start_index, 0);
    }

    #[test]
    fn empty_parameter_list_has_no_arguments() {
        let record = ts("function now() { return Date.now(); }\n");
        assert!(record.functions[0].arguments.is_none());
        assert!(record.functions[0].return_type.is_none());
    }

    #[test]
    fn arrow_function_constant_is_a_function() {
        let record = ts("export const double = (value: number) => value * 2;\n");
        assert_eq!(record.functions.len(), 1);
        let block = &record.functions[0];
        assert_eq!(block.ast_type, "arrow_function");
        assert_eq!(block.name.as_deref(), Some("double"));
        assert!(block.code.starts_with("export const double"));
        assert!(record.fields.is_empty());
    }

    #[test]
    fn other_declarations_are_fields() {
        let record = ts(
            "const limit = 10;\n\
             type Mode = 'a' | 'b';\n\
             interface Point { x: number }\n\
             enum Color { Red, Green }\n",
        );
        let names: Vec<_> = record
            .fields
            .iter()
            .map(|f| f.name.clone().unwrap_or_default())
            .collect();
        assert_eq!(names, vec!["limit", "Mode", "Point", "Color"]);
        assert!(record.fields.iter().all(|f| f.kind == BlockKind::Field));
    }

    #[test]
    fn leading_comments_extend_the_span() {
        let code = "const a = 1;\n// first\n/* second */\nfunction run() {}\n";
        let record = ts(code);
        let run = &record.functions[0];
        assert_eq!(run.comment.as_deref(), Some("// first\n/* second */"));
        assert_eq!(run.start_index, code.find("// first").unwrap());
        assert_eq!(run.start_position, Position { row: 1, column: 0 });
        assert_eq!(run.code, "function run() {}");
        assert!(record.fields[0].comment.is_none());
    }

    #[test]
    fn comment_before_export_belongs_to_the_export() {
        let code = "/** Greets. */\nexport function greet(name: string) { return name; }\n";
        let record = ts(code);
        let greet = &record.functions[0];
        assert_eq!(greet.comment.as_deref(), Some("/** Greets. */"));
        assert!(greet.code.starts_with("export function greet"));
        assert_eq!(greet.start_index, 0);
    }

    #[test]
    fn class_members_are_split() {
        let code = r#"
export class Cart {
  items: string[] = [];
  total = 0;
  // adds one
  add = (item: string) => { this.items.push(item); };
  clear() { this.items = []; }
}
"#;
        let record = ts(code);
        assert_eq!(record.classes.len(), 1);
        let cart = &record.classes[0];
        assert_eq!(cart.name.as_deref(), Some("Cart"));
        let fields: Vec<_> = cart.fields.iter().filter_map(|f| f.name.as_deref()).collect();
        assert_eq!(fields, vec!["items", "total"]);
        let methods: Vec<_> = cart.methods.iter().filter_map(|m| m.name.as_deref()).collect();
        assert_eq!(methods, vec!["add", "clear"]);
        assert_eq!(cart.methods[0].comment.as_deref(), Some("// adds one"));
        assert_eq!(cart.methods[0].arguments.as_deref(), Some("(item: string)"));
    }

    #[test]
    fn function_blocks_include_methods() {
        let code = "function a1() {}\nclass K { m() {} }\n";
        let record = ts(code);
        let names: Vec<_> = record
            .function_blocks()
            .filter_map(|b| b.name.as_deref())
            .collect();
        assert_eq!(names, vec!["a1", "m"]);
    }

    #[test]
    fn imports_and_expressions() {
        let code = "import a from 'a';\nimport { b } from 'b';\nsetup();\n";
        let record = ts(code);
        assert_eq!(record.imports, "import a from 'a';\nimport { b } from 'b';");
        assert_eq!(record.expressions.len(), 1);
        assert_eq!(record.expressions[0].code, "setup();");
    }

    #[test]
    fn tsx_and_jsx_parse() {
        let tsx = parse(
            "export const App = () => <div className=\"app\">hi</div>;\n",
            "typescriptreact",
        )
        .unwrap();
        assert_eq!(tsx.functions[0].name.as_deref(), Some("App"));

        let jsx = parse(
            "export function Button(props) { return <button>{props.label}</button>; }\n",
            "javascriptreact",
        )
        .unwrap();
        assert_eq!(jsx.functions[0].name.as_deref(), Some("Button"));
    }

    #[test]
    fn skips_bundles_and_unsupported_languages() {
        assert_eq!(
            parse("var x = __webpack_require__(1);\nx();\n", "javascript"),
            Err(SkipReason::Bundle)
        );
        assert_eq!(
            parse("def f(): pass", "python"),
            Err(SkipReason::Unsupported("python".into()))
        );
    }

    #[test]
    fn skips_minified() {
        let code = "var q=1;".repeat(300);
        assert_eq!(parse(&code, "javascript"), Err(SkipReason::Minified));
    }

    #[test]
    fn file_hash_is_sha256_of_text() {
        let code = "function add(a,b){return a+b}";
        let record = ts(code);
        assert_eq!(record.hash, content_hash(code));
        assert_eq!(record.hash.len(), 64);
    }

    #[test]
    fn chunk_hash_covers_comment_and_code() {
        let with_comment = ts("// doc\nfunction f() {}\n");
        let without = ts("function f() {}\n");
        assert_eq!(without.functions[0].chunk_hash(), content_hash("function f() {}"));
        assert_eq!(
            with_comment.functions[0].chunk_hash(),
            content_hash("// docfunction f() {}")
        );
    }

    #[test]
    fn parse_file_sets_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/util")).unwrap();
        std::fs::write(dir.path().join("src/util/math.ts"), "function add(a,b){return a+b}").unwrap();
        let record = parse_file(dir.path(), Path::new("src/util/math.ts")).unwrap();
        assert_eq!(record.file_path, "src/util/math.ts");
        assert_eq!(record.file_name, "math.ts");
        assert_eq!(record.language_id, "typescript");
    }

    #[test]
    fn parse_file_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let result = parse_file(dir.path(), Path::new("gone.ts"));
        assert!(matches!(result, Err(SkipReason::Unreadable(_))));
    }
}
