//! Node selectors
//!
//! A small path language for finding nodes by key:
//!
//! - `call` selects every node keyed `call` (tokens match by kind or text)
//! - `class/function` selects `function` nodes whose parent is a `class`
//! - `/import` selects `import` nodes directly below the root
//! - `a,b` selects nodes matching `a` or `b`
//! - `*` matches any key
//!
//! Keys compare case-insensitively.

use super::tree::{NodeId, SyntaxTree};

#[derive(Debug, Clone, PartialEq, Eq)]
struct SelectorPath {
    absolute: bool,
    segments: Vec<String>,
}

/// A parsed selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    paths: Vec<SelectorPath>,
}

fn segment_matches(tree: &SyntaxTree, node: NodeId, segment: &str) -> bool {
    if segment == "*" {
        return true;
    }
    let data = tree.node(node);
    match data.as_token() {
        Some(token) => {
            token.kind.eq_ignore_ascii_case(segment) || token.code.as_str() == segment
        }
        None => data.key().eq_ignore_ascii_case(segment),
    }
}

impl SelectorPath {
    fn matches(&self, tree: &SyntaxTree, node: NodeId) -> bool {
        let mut current = Some(node);
        for segment in self.segments.iter().rev() {
            let Some(n) = current else {
                return false;
            };
            if !segment_matches(tree, n, segment) {
                return false;
            }
            current = tree.parent(n);
        }
        !self.absolute || current.is_some_and(|p| Some(p) == tree.root())
    }
}

impl Selector {
    /// Parse a selector; empty alternatives are ignored
    pub fn parse(source: &str) -> Self {
        let paths = source
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| SelectorPath {
                absolute: p.starts_with('/'),
                segments: p
                    .split('/')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            })
            .filter(|p| !p.segments.is_empty())
            .collect();
        Self { paths }
    }

    /// Whether `node` is selected
    pub fn matches(&self, tree: &SyntaxTree, node: NodeId) -> bool {
        self.paths.iter().any(|p| p.matches(tree, node))
    }

    /// Nodes below `from` (excluding it) that are selected, in pre-order
    pub fn select(&self, tree: &SyntaxTree, from: NodeId) -> Vec<NodeId> {
        tree.iterate(from)
            .into_iter()
            .skip(1)
            .filter(|&n| self.matches(tree, n))
            .collect()
    }

    /// First selected node below `from`
    pub fn select_first(&self, tree: &SyntaxTree, from: NodeId) -> Option<NodeId> {
        tree.iterate(from)
            .into_iter()
            .skip(1)
            .find(|&n| self.matches(tree, n))
    }
}
