//! AST-aware chunking of JavaScript and TypeScript sources.
//!
//! Parses one file into semantic blocks (imports, fields, functions,
//! classes with their members, free expressions), attaches leading
//! comments, and rejects bundled or minified output before parsing.

pub mod chunker;
pub mod filter;
pub mod language;

pub use chunker::{parse, parse_file, Block, BlockKind, FileRecord, Position, SkipReason};
pub use language::Grammar;
