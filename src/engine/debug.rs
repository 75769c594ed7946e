//! Debugging tools
//!
//! - [`TreePrinter`] renders a syntax tree one node per line
//! - [`GrammarVisualizer`] renders a pattern table as a Mermaid or DOT graph

use super::pattern::{Grammar, Pattern, PatternId};
use super::tree::{NodeId, SyntaxTree};
use std::fmt::Write;

/// Longest code excerpt shown per node
const EXCERPT_CHARS: usize = 40;

/// Syntax tree pretty printer
///
/// Each line shows the row of the node, then the node indented by depth:
/// branches by grammar key, tokens by kind, followed by the trimmed code.
/// Trivia is shown with a `~` marker.
///
/// ```text
///    1 root  "import os"
///    1   import  "import os"
///    1     T_IMPORT  "import"
///    1     T_NAME  "os"
/// ```
pub struct TreePrinter {
    indent: String,
    max_depth: Option<usize>,
    trivia: bool,
}

impl TreePrinter {
    /// Create a new tree printer
    pub fn new() -> Self {
        Self {
            indent: "  ".to_string(),
            max_depth: None,
            trivia: false,
        }
    }

    /// Set the indentation string
    pub fn indent(mut self, indent: &str) -> Self {
        self.indent = indent.to_string();
        self
    }

    /// Set the maximum depth to print
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Also print trivia nodes
    pub fn with_trivia(mut self, trivia: bool) -> Self {
        self.trivia = trivia;
        self
    }

    /// Render the subtree at `node`
    pub fn print(&self, tree: &SyntaxTree, node: NodeId) -> String {
        let mut output = String::new();
        self.print_node(tree, node, 0, false, &mut output);
        output
    }

    /// Render the whole tree
    pub fn print_tree(&self, tree: &SyntaxTree) -> String {
        tree.root()
            .map(|root| self.print(tree, root))
            .unwrap_or_default()
    }

    fn print_node(
        &self,
        tree: &SyntaxTree,
        id: NodeId,
        depth: usize,
        is_trivia: bool,
        output: &mut String,
    ) {
        let indent = self.indent.repeat(depth);
        let row = tree.position(id).map_or(0, |p| p.row);

        if self.max_depth.is_some_and(|max| depth > max) {
            let _ = writeln!(output, "{:>4} {}...", row, indent);
            return;
        }

        let node = tree.node(id);
        let label = match node.as_token() {
            Some(token) => token.kind.as_str(),
            None => node.key(),
        };
        let marker = if is_trivia { "~" } else { "" };
        let _ = writeln!(
            output,
            "{:>4} {}{}{}  {:?}",
            row,
            indent,
            marker,
            label,
            excerpt(&tree.reconstruct_code(id))
        );

        if self.trivia {
            for &t in node.prepended() {
                self.print_node(tree, t, depth + 1, true, output);
            }
        }
        for &child in node.children() {
            self.print_node(tree, child, depth + 1, false, output);
        }
        if self.trivia {
            for &t in node.appended() {
                self.print_node(tree, t, depth + 1, true, output);
            }
        }
    }
}

impl Default for TreePrinter {
    fn default() -> Self {
        Self::new()
    }
}

fn excerpt(code: &str) -> String {
    let trimmed = code.trim();
    if trimmed.chars().count() <= EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let mut short: String = trimmed.chars().take(EXCERPT_CHARS).collect();
    short.push_str("...");
    short
}

/// Grammar visualizer
pub struct GrammarVisualizer<'a> {
    grammar: &'a Grammar,
}

impl<'a> GrammarVisualizer<'a> {
    /// Create a new grammar visualizer
    pub fn new(grammar: &'a Grammar) -> Self {
        Self { grammar }
    }

    fn edges(&self) -> Vec<(usize, Vec<PatternId>, String)> {
        self.grammar
            .patterns()
            .iter()
            .enumerate()
            .map(|(i, pattern)| {
                let targets = match pattern {
                    Pattern::Token { .. } => Vec::new(),
                    Pattern::Sequence { elements, .. } => elements.clone(),
                    Pattern::Alternation { alternatives, .. } => alternatives.clone(),
                    Pattern::Repetition { inner, .. } | Pattern::Optional { inner } => vec![*inner],
                    Pattern::Lazy { target, .. } => target.iter().copied().collect(),
                };
                (i, targets, label(pattern))
            })
            .collect()
    }

    /// Generate a Mermaid diagram
    pub fn to_mermaid(&self) -> String {
        let mut output = String::from("graph TD\n");
        for (i, targets, label) in self.edges() {
            let _ = writeln!(output, "  p{}[\"{}: {}\"]", i, i, label.replace('"', "#quot;"));
            for target in targets {
                let _ = writeln!(output, "  p{} --> p{}", i, target.index());
            }
        }
        for &rule in self.grammar.rules() {
            let _ = writeln!(output, "  rules --> p{}", rule.index());
        }
        output
    }

    /// Generate a GraphViz DOT diagram
    pub fn to_dot(&self) -> String {
        let mut output = String::from("digraph Grammar {\n  rankdir=TB;\n  node [shape=box];\n");
        for (i, targets, label) in self.edges() {
            let _ = writeln!(output, "  p{} [label={:?}];", i, format!("{}: {}", i, label));
            for target in targets {
                let _ = writeln!(output, "  p{} -> p{};", i, target.index());
            }
        }
        output.push_str("}\n");
        output
    }
}

fn label(pattern: &Pattern) -> String {
    match pattern {
        Pattern::Token { target } => format!("token {}", target),
        Pattern::Sequence { key, .. } => format!("sequence {}", key),
        Pattern::Repetition { key, optional, .. } => {
            format!("{} {}", key, if *optional { "*" } else { "+" })
        }
        Pattern::Optional { .. } => "optional".to_string(),
        Pattern::Alternation { key, .. } => format!("alternation {}", key),
        Pattern::Lazy { key, .. } => format!("ref {}", key),
    }
}
