//! Definitions, diagnostics and a workspace symbol index built on top of the grammar.
//!
//! A Metta definition is a list headed by `=` (an equation) or `:` (a type
//! declaration). The defined name is the first argument when it is a symbol,
//! or the head symbol of the first argument when that argument is a list:
//!
//! ```text
//! (: double (-> Number Number))
//! (= (double $x) (* $x 2))
//! ```

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};
use tree_sitter::{Node, Parser, Point, Tree};
use walkdir::WalkDir;

use crate::verify::{metta_parser, LoadError};

/// Built-in forms offered by [`completions`] before any indexed name.
pub const KEYWORDS: &[&str] = &[
    "if", "let", "let*", "match", "case", "collapse", "superpose", "Cons", "Nil", "True", "False",
    "empty", "Error",
];

#[derive(Error, Debug)]
pub enum OutlineError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("parser produced no tree")]
    Parse,

    #[error("invalid query: {0}")]
    Query(#[from] tree_sitter::QueryError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefinitionKind {
    /// `(= ...)`
    Equation,
    /// `(: ...)`
    TypeDeclaration,
}

impl DefinitionKind {
    fn from_operator(op: &str) -> Option<Self> {
        match op {
            "=" => Some(Self::Equation),
            ":" => Some(Self::TypeDeclaration),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub name: String,
    pub kind: DefinitionKind,
    pub start: Point,
    pub end: Point,
    /// Source text of the innermost list enclosing the name.
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub start: Point,
    pub end: Point,
}

/// Directory scan settings for [`SymbolIndex::scan_workspace`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    pub extension: String,
    pub skip_dirs: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extension: crate::FILE_EXTENSION.to_string(),
            skip_dirs: ["node_modules", ".git", "vscode-metta"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl ScanConfig {
    fn skips(&self, name: &str) -> bool {
        self.skip_dirs.iter().any(|dir| dir == name)
    }
}

/// Visits every visible node in document order.
fn preorder<'t>(tree: &'t Tree, mut visit: impl FnMut(Node<'t>)) {
    let mut cursor = tree.walk();
    loop {
        visit(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

fn text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    &source[node.byte_range()]
}

/// The symbol wrapped by an `atom` node, if that is what it wraps.
fn atom_symbol(node: Node<'_>) -> Option<Node<'_>> {
    if node.kind() != "atom" {
        return None;
    }
    node.named_child(0).filter(|child| child.kind() == "symbol")
}

fn defined_name(argument: Node<'_>) -> Option<Node<'_>> {
    match argument.kind() {
        "atom" => atom_symbol(argument),
        "list" => argument.child_by_field_name("head").and_then(atom_symbol),
        _ => None,
    }
}

fn enclosing_list(node: Node<'_>) -> Option<Node<'_>> {
    let mut parent = node.parent();
    while let Some(candidate) = parent {
        if candidate.kind() == "list" {
            return Some(candidate);
        }
        parent = candidate.parent();
    }
    None
}

fn definition_of(list: Node<'_>, source: &str) -> Option<Definition> {
    let op = list.child_by_field_name("head").and_then(atom_symbol)?;
    let kind = DefinitionKind::from_operator(text(op, source))?;
    let name = defined_name(list.child_by_field_name("argument")?)?;
    let context = enclosing_list(name).unwrap_or(name);

    Some(Definition {
        name: text(name, source).to_string(),
        kind,
        start: name.start_position(),
        end: name.end_position(),
        context: text(context, source).to_string(),
    })
}

/// Collects every `=` and `:` definition in `tree`, in document order.
pub fn definitions(tree: &Tree, source: &str) -> Vec<Definition> {
    let mut found = Vec::new();
    preorder(tree, |node| {
        if node.kind() == "list" {
            found.extend(definition_of(node, source));
        }
    });
    found
}

/// One diagnostic per `ERROR` or missing node.
pub fn diagnostics(tree: &Tree) -> Vec<Diagnostic> {
    let mut found = Vec::new();
    preorder(tree, |node| {
        let message = if node.is_error() {
            "Syntax error".to_string()
        } else if node.is_missing() {
            format!("Missing node: {}", node.kind())
        } else {
            return;
        };
        found.push(Diagnostic {
            message,
            start: node.start_position(),
            end: node.end_position(),
        });
    });
    found
}

/// Name of the `symbol` or `variable` under `byte`, if any.
pub fn symbol_at<'s>(tree: &Tree, source: &'s str, byte: usize) -> Option<&'s str> {
    let node = tree.root_node().descendant_for_byte_range(byte, byte)?;
    matches!(node.kind(), "symbol" | "variable").then(|| text(node, source))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    Keyword,
    Definition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub label: String,
    pub kind: CompletionKind,
}

/// Keywords followed by every indexed name, without duplicates.
pub fn completions(index: &SymbolIndex) -> Vec<Completion> {
    let keywords = KEYWORDS.iter().map(|label| (*label, CompletionKind::Keyword));
    let names = index.names().into_iter().map(|label| (label, CompletionKind::Definition));

    let mut seen = HashSet::new();
    keywords
        .chain(names)
        .filter(|(label, _)| seen.insert(*label))
        .map(|(label, kind)| Completion {
            label: label.to_string(),
            kind,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub uri: String,
    pub definition: Definition,
}

/// Definitions across documents, keyed by name.
pub struct SymbolIndex {
    parser: Parser,
    entries: HashMap<String, Vec<IndexEntry>>,
}

impl SymbolIndex {
    pub fn new() -> Result<Self, OutlineError> {
        Ok(Self {
            parser: metta_parser()?,
            entries: HashMap::new(),
        })
    }

    pub fn parse(&mut self, source: &str) -> Result<Tree, OutlineError> {
        self.parser.parse(source, None).ok_or(OutlineError::Parse)
    }

    /// Replaces everything known about `uri` with the definitions in `source`.
    pub fn index_document(&mut self, uri: &str, source: &str) -> Result<usize, OutlineError> {
        let tree = self.parse(source)?;
        let found = definitions(&tree, source);

        self.remove_document(uri);
        let count = found.len();
        for definition in found {
            self.entries
                .entry(definition.name.clone())
                .or_default()
                .push(IndexEntry {
                    uri: uri.to_string(),
                    definition,
                });
        }

        debug!(uri, definitions = count, "indexed document");
        Ok(count)
    }

    pub fn remove_document(&mut self, uri: &str) {
        self.entries.retain(|_, entries| {
            entries.retain(|entry| entry.uri != uri);
            !entries.is_empty()
        });
    }

    pub fn lookup(&self, name: &str) -> &[IndexEntry] {
        self.entries.get(name).map_or(&[], Vec::as_slice)
    }

    /// Picks the entry to describe `name` from inside `uri`: a type
    /// declaration in the same document, then any type declaration, then
    /// anything in the same document, then whatever was indexed first.
    pub fn hover(&self, name: &str, uri: &str) -> Option<&IndexEntry> {
        let entries = self.lookup(name);
        let is_type = |entry: &&IndexEntry| entry.definition.kind == DefinitionKind::TypeDeclaration;
        let is_local = |entry: &&IndexEntry| entry.uri == uri;

        entries
            .iter()
            .find(|entry| is_type(entry) && is_local(entry))
            .or_else(|| entries.iter().find(is_type))
            .or_else(|| entries.iter().find(is_local))
            .or_else(|| entries.first())
    }

    /// Indexed names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Indexes every matching file below `root`. Unreadable entries are
    /// logged and skipped; returns the number of files indexed.
    pub fn scan_workspace(&mut self, root: &Path, config: &ScanConfig) -> Result<usize, OutlineError> {
        fs::metadata(root).map_err(|source| OutlineError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        info!(root = %root.display(), "scanning workspace");

        let walker = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !config.skips(&entry.file_name().to_string_lossy())
            });

        let mut indexed = 0;
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file()
                || !path.extension().is_some_and(|ext| ext == config.extension.as_str())
            {
                continue;
            }

            let source = match fs::read_to_string(path) {
                Ok(source) => source,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable file");
                    continue;
                }
            };
            self.index_document(&path_to_uri(path), &source)?;
            indexed += 1;
        }

        info!(root = %root.display(), files = indexed, "workspace scan finished");
        Ok(indexed)
    }
}

pub fn path_to_uri(path: &Path) -> String {
    let path = path.to_string_lossy().replace('\\', "/");
    if path.starts_with('/') {
        format!("file://{path}")
    } else {
        format!("file:///{path}")
    }
}
