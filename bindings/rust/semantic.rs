//! Semantic tokens derived from the highlight query.
//!
//! Tokens use the LSP relative encoding: five integers per token,
//! `[delta_line, delta_start, length, token_type, modifiers]`, positions in
//! tree-sitter columns (bytes).

use tree_sitter::{Point, Query, QueryCursor, Tree};

use crate::outline::OutlineError;

/// Token type legend; a token's type is an index into this list.
pub const TOKEN_TYPES: &[&str] = &[
    "comment",
    "string",
    "keyword",
    "number",
    "operator",
    "variable",
    "function",
    "regexp",
    "type",
    "boolean",
    "punctuation",
    "parameter",
    "property",
];

/// Maps a highlight capture name onto [`TOKEN_TYPES`].
pub fn token_type(capture: &str) -> Option<u32> {
    let index = match capture {
        "comment" => 0,
        "string" => 1,
        "keyword" => 2,
        "number" => 3,
        "operator" => 4,
        "variable" | "symbol" => 5,
        "function.call" | "function.definition" => 6,
        "boolean" => 9,
        "punctuation.bracket" => 10,
        "parameter" => 11,
        "constant" => 12,
        _ => return None,
    };
    Some(index)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemanticToken {
    pub delta_line: u32,
    pub delta_start: u32,
    pub length: u32,
    pub token_type: u32,
}

pub struct SemanticTokens {
    query: Query,
}

impl SemanticTokens {
    pub fn new() -> Result<Self, OutlineError> {
        let query = Query::new(&crate::language(), crate::HIGHLIGHTS_QUERY)?;
        Ok(Self { query })
    }

    /// Captures sorted by position, then by capture index, so that earlier
    /// patterns in the query win when several capture the same node.
    /// Multi-line, zero-length and overlapping captures are dropped.
    pub fn tokens(&self, tree: &Tree, source: &str) -> Vec<SemanticToken> {
        let names = self.query.capture_names();
        let mut cursor = QueryCursor::new();
        let mut captures: Vec<(Point, usize, u32, u32)> = Vec::new();

        for (found, index) in cursor.captures(&self.query, tree.root_node(), source.as_bytes()) {
            let capture = found.captures[index];
            let Some(kind) = token_type(&names[capture.index as usize]) else {
                continue;
            };
            let (start, end) = (capture.node.start_position(), capture.node.end_position());
            if start.row != end.row || end.column <= start.column {
                continue;
            }
            captures.push((start, (end.column - start.column), capture.index, kind));
        }
        captures.sort_by_key(|&(start, _, index, _)| (start.row, start.column, index));

        let mut tokens = Vec::with_capacity(captures.len());
        let mut previous: Option<Point> = None;
        for (start, length, _, kind) in captures {
            let (delta_line, delta_start) = match previous {
                None => (start.row, start.column),
                Some(prev) if start.row > prev.row => (start.row - prev.row, start.column),
                Some(prev) if start.row == prev.row && start.column > prev.column => {
                    (0, start.column - prev.column)
                }
                Some(_) => continue,
            };
            tokens.push(SemanticToken {
                delta_line: delta_line as u32,
                delta_start: delta_start as u32,
                length: length as u32,
                token_type: kind,
            });
            previous = Some(start);
        }
        tokens
    }

    /// Flattens [`tokens`](Self::tokens) into the five-integer wire form.
    pub fn encode(&self, tree: &Tree, source: &str) -> Vec<u32> {
        self.tokens(tree, source)
            .into_iter()
            .flat_map(|t| [t.delta_line, t.delta_start, t.length, t.token_type, 0])
            .collect()
    }
}
