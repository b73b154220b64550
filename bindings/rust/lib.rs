//! Rust bindings for the `tree-sitter-metta` grammar.
//!
//! This follows the standard layout used by Tree-sitter grammars so that
//! consumers can link the generated parser and obtain a `tree_sitter::Language`
//! handle. On top of the raw binding, [`verify`] checks that the linked grammar
//! is actually usable by the host library, [`outline`] extracts definitions
//! and syntax diagnostics from parsed Metta sources, and [`semantic`] turns
//! the highlight query into editor semantic tokens.

use tree_sitter::Language;

pub mod outline;
pub mod semantic;
pub mod verify;

pub use outline::{
    completions, definitions, diagnostics, symbol_at, Definition, DefinitionKind, Diagnostic,
    OutlineError, ScanConfig, SymbolIndex,
};
pub use semantic::{SemanticToken, SemanticTokens, TOKEN_TYPES};
pub use verify::{
    metta_parser, verify_grammar_loads, verify_with, FnProvider, GrammarProvider, LoadError, Metta,
};

extern "C" {
    fn tree_sitter_metta() -> *const tree_sitter::ffi::TSLanguage;
}

/// Returns the raw language descriptor exported by the compiled grammar.
pub(crate) fn raw_language() -> *const tree_sitter::ffi::TSLanguage {
    unsafe { tree_sitter_metta() }
}

/// Returns the Tree-sitter [`Language`] for this grammar.
pub fn language() -> Language {
    unsafe { Language::from_raw(raw_language()) }
}

/// File extension used by Metta sources.
pub const FILE_EXTENSION: &str = "metta";

/// The content of the [`node-types.json`][] file for this grammar.
///
/// [`node-types.json`]: https://tree-sitter.github.io/tree-sitter/using-parsers#static-node-types
pub const NODE_TYPES: &str = include_str!("../../src/node-types.json");

/// The syntax highlighting query for this language.
pub const HIGHLIGHTS_QUERY: &str = include_str!("../../queries/highlights.scm");
