//! Partitions
//!
//! A partition is an independently parsed byte range of a file. The
//! [`PartitionedFile`](super::PartitionedFile) asks a [`PartitionFactory`]
//! to create partitions for uncovered ranges and to combine adjacent ones.
//!
//! # Boundary Merge
//!
//! Two adjacent parsed partitions are combined without re-parsing either of
//! them. Only the last token of the left tree and the first token of the
//! right tree are re-lexed together, since a token may have been cut at the
//! boundary (`"ab" | "cd"` becomes `"abcd"`). The branches on the paths from
//! both roots down to those two tokens are opened up and the token chains
//! are spliced around the re-lexed tokens. The grammar then runs over a
//! window: the opened nodes plus [`MERGE_NEIGHBOURS`] untouched top-level
//! nodes on each side of the seam. Top-level nodes outside the window are
//! kept as they are, node ids included, so the cost follows the depth of
//! the trees at the boundary rather than their size.
//!
//! Only the two boundary tokens are re-lexed. A cut inside a delimited
//! literal or a comment therefore stays split into the re-lexed seam token
//! and the rest of the right side's first literal; the code is unchanged.

use super::coded::{CodedBuffer, TextEncoding};
use super::parser::Parser;
use super::position::Position;
use super::tree::{NodeId, SyntaxTree, NULL_KIND};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Untouched top-level nodes on each side of a seam that are reduced again
/// together with the opened boundary paths
pub const MERGE_NEIGHBOURS: usize = 2;

/// A materialized byte range of a file
pub trait Partition {
    /// Whether the content was edited since it was read
    fn is_modified(&self) -> bool;

    /// Current bytes, edits included
    fn current_content(&self) -> Vec<u8>;

    /// Discard edits and rebuild from `bytes`, which start at `start`
    fn reset_to(&mut self, bytes: &[u8], start: Position, encoding: TextEncoding);
}

/// Creates and combines partitions
pub trait PartitionFactory {
    /// Partition type
    type Partition: Partition;

    /// Partition over `bytes`, which start at `start`
    fn create(&self, bytes: &[u8], start: Position, encoding: TextEncoding) -> Self::Partition;

    /// Combine two partitions whose areas are directly adjacent, `left`
    /// first
    fn combine(&self, left: Self::Partition, right: Self::Partition) -> Self::Partition;
}

/// A partition holding a syntax tree
pub struct ParsedPartition {
    tree: SyntaxTree,
    encoding: TextEncoding,
    parser: Arc<Parser>,
}

impl ParsedPartition {
    /// Tree of this partition
    pub fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    /// Mutable tree, for edits
    pub fn tree_mut(&mut self) -> &mut SyntaxTree {
        &mut self.tree
    }

    /// Root of the tree
    pub fn root(&self) -> Option<NodeId> {
        self.tree.root()
    }

    /// Encoding the bytes were decoded with
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Decoded current content
    pub fn code(&self) -> String {
        self.root()
            .map(|r| self.tree.reconstruct_code(r))
            .unwrap_or_default()
    }
}

impl Partition for ParsedPartition {
    fn is_modified(&self) -> bool {
        self.tree.is_modified()
    }

    fn current_content(&self) -> Vec<u8> {
        self.root()
            .map(|r| self.tree.reconstruct_bytes(r))
            .unwrap_or_default()
    }

    fn reset_to(&mut self, bytes: &[u8], start: Position, encoding: TextEncoding) {
        let buffer = CodedBuffer::decode(bytes, encoding);
        self.tree = self.parser.parse(self.tree.path(), &buffer, start);
        self.encoding = encoding;
    }
}

/// Parses partitions of one file with one parser
#[derive(Clone)]
pub struct PartitionParser {
    parser: Arc<Parser>,
    path: PathBuf,
}

impl PartitionParser {
    /// Factory for partitions of the file at `path`
    pub fn new(parser: Arc<Parser>, path: impl Into<PathBuf>) -> Self {
        Self {
            parser,
            path: path.into(),
        }
    }

    /// Path the trees are bound to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parser used for every partition
    pub fn parser(&self) -> &Arc<Parser> {
        &self.parser
    }
}

impl PartitionFactory for PartitionParser {
    type Partition = ParsedPartition;

    fn create(&self, bytes: &[u8], start: Position, encoding: TextEncoding) -> ParsedPartition {
        let buffer = CodedBuffer::decode(bytes, encoding);
        log_debug!("parsing partition of {} bytes at {}", bytes.len(), start);
        ParsedPartition {
            tree: self.parser.parse(&self.path, &buffer, start),
            encoding,
            parser: Arc::clone(&self.parser),
        }
    }

    fn combine(&self, left: ParsedPartition, right: ParsedPartition) -> ParsedPartition {
        let modified = left.is_modified() || right.is_modified();
        let encoding = left.encoding;

        let left_edge = left
            .root()
            .and_then(|r| Some((r, left.tree.last_token(r)?)));
        let right_edge = right
            .root()
            .and_then(|r| Some((r, right.tree.first_token(r)?)));
        let Some(((left_root, left_last), (right_root, right_first))) = left_edge.zip(right_edge)
        else {
            // only hand-built trees lack a root or a token
            return self.reparse_joined(left, right);
        };

        let mut tree = left.tree;
        let shift = tree.absorb(right.tree);
        let right_root = NodeId::from_index(right_root.index() + shift);
        let right_first = NodeId::from_index(right_first.index() + shift);

        let (kept_before, left_window, left_after) = open_spine(&mut tree, left_root, left_last);
        let (right_before, right_window, kept_after) =
            open_spine(&mut tree, right_root, right_first);

        let start = tree.position(left_last).unwrap_or_default();
        let mut seam = tree.reconstruct_bytes(left_last);
        seam.extend(tree.reconstruct_bytes(right_first));
        let relexed = self
            .parser
            .lex(&CodedBuffer::decode(&seam, encoding), start);
        let fresh = tree.add_lexed(&relexed);

        let chain = tree.chain_mut();
        chain.append(left_last, right_first);
        if let Some(&first_fresh) = fresh.first() {
            chain.insert_after(left_last, first_fresh);
        }
        chain.remove(left_last);
        chain.remove(right_first);

        let mut window = Vec::with_capacity(
            left_window.len()
                + left_after.len()
                + fresh.len()
                + right_before.len()
                + right_window.len(),
        );
        window.extend(
            left_window
                .into_iter()
                .chain(left_after)
                .filter(|&n| n != left_last),
        );
        window.extend(fresh);
        window.extend(
            right_before
                .into_iter()
                .chain(right_window)
                .filter(|&n| n != right_first),
        );

        log_debug!(
            "merging partitions: {} seam bytes re-lexed into {} tokens, {} window nodes, {} kept",
            seam.len(),
            relexed.len(),
            window.len(),
            kept_before.len() + kept_after.len()
        );

        let reduced = self.parser.parse_nodes(&mut tree, window);
        let mut top = Vec::with_capacity(kept_before.len() + reduced.len() + kept_after.len());
        top.extend(kept_before);
        top.extend_from_slice(&reduced);
        top.extend(kept_after);
        if top.is_empty() {
            top.push(tree.add_token(NULL_KIND, CodedBuffer::empty(encoding), start));
        }

        let root = self.parser.finish_window(&mut tree, top, &reduced);
        if modified {
            tree.mark_dirty(root);
        }

        ParsedPartition {
            tree,
            encoding,
            parser: Arc::clone(&self.parser),
        }
    }
}

impl PartitionParser {
    /// Parse the joined content of both partitions from scratch
    fn reparse_joined(&self, left: ParsedPartition, right: ParsedPartition) -> ParsedPartition {
        let start = left
            .root()
            .and_then(|r| left.tree.position(r))
            .or_else(|| right.root().and_then(|r| right.tree.position(r)))
            .unwrap_or_default();
        let mut bytes = left.current_content();
        bytes.extend(right.current_content());

        let mut joined = self.create(&bytes, start, left.encoding);
        if left.is_modified() || right.is_modified() {
            if let Some(root) = joined.root() {
                joined.tree.mark_dirty(root);
            }
        }
        joined
    }
}

/// Open the branches from `root` down to `boundary`
///
/// Returns the top-level nodes of `root` as three runs in code order:
/// untouched nodes before the window, the window, and untouched nodes after
/// it. The window holds the opened path, with `boundary` as a top-level node
/// carrying no trivia, plus up to [`MERGE_NEIGHBOURS`] untouched nodes on
/// either side.
fn open_spine(
    tree: &mut SyntaxTree,
    root: NodeId,
    boundary: NodeId,
) -> (Vec<NodeId>, Vec<NodeId>, Vec<NodeId>) {
    let mut path = Vec::new();
    let mut current = Some(boundary);
    while let Some(node) = current.filter(|&n| n != root) {
        path.push(node);
        current = tree.parent(node);
    }

    let mut before = tree.dissolve(root);
    let outer = path
        .last()
        .and_then(|top| before.iter().position(|n| n == top));
    let Some(at) = outer else {
        return (Vec::new(), before, Vec::new());
    };
    let end = (at + 1 + MERGE_NEIGHBOURS).min(before.len());
    let after = before.split_off(end);
    let mut window = before.split_off(at.saturating_sub(MERGE_NEIGHBOURS));

    for &node in path.iter().rev() {
        if let Some(at) = window.iter().position(|&n| n == node) {
            let parts = tree.dissolve(node);
            window.splice(at..=at, parts);
        }
    }
    (before, window, after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::language::{plain_text, python, Language};

    fn factory(language: Language) -> PartitionParser {
        PartitionParser::new(Arc::new(Parser::new(Arc::new(language))), "t")
    }

    fn split(factory: &PartitionParser, text: &str, at: usize) -> ParsedPartition {
        let utf8 = TextEncoding::utf8();
        let left = factory.create(&text.as_bytes()[..at], Position::start(), utf8);
        let right_start = Position::start().advance(&text[..at], at);
        let right = factory.create(&text.as_bytes()[at..], right_start, utf8);
        factory.combine(left, right)
    }

    fn token_texts(partition: &ParsedPartition) -> Vec<String> {
        let tree = partition.tree();
        let first = tree.first_token(partition.root().unwrap()).unwrap();
        tree.chain()
            .iter_from(first)
            .map(|t| tree.token(t).unwrap().code.as_str().to_string())
            .collect()
    }

    #[test]
    fn test_merge_rejoins_cut_token() {
        let f = factory(plain_text());
        let merged = split(&f, "hello world", 3);
        assert_eq!(merged.code(), "hello world");
        assert_eq!(token_texts(&merged), vec!["hello", " ", "world"]);
        assert!(!merged.is_modified());
    }

    #[test]
    fn test_merge_reapplies_grammar() {
        let f = factory(python());
        let text = "import os\nimport sys\n";
        let merged = split(&f, text, 18);
        assert_eq!(merged.code(), text);

        let tree = merged.tree();
        let keys: Vec<&str> = tree
            .children(merged.root().unwrap())
            .iter()
            .map(|&n| tree.node(n).key())
            .collect();
        assert_eq!(keys, vec!["import", "import"]);

        let direct = f.create(text.as_bytes(), Position::start(), TextEncoding::utf8());
        assert_eq!(token_texts(&merged), token_texts(&direct));
    }

    #[test]
    fn test_merge_inside_expression() {
        // reductions made without the other side's context may stay split,
        // the code and token order do not
        let f = factory(python());
        let text = "import os\nf(x.y)\n";
        let merged = split(&f, text, 13);
        assert_eq!(merged.code(), text);
        let direct = f.create(text.as_bytes(), Position::start(), TextEncoding::utf8());
        assert_eq!(token_texts(&merged), token_texts(&direct));
    }

    #[test]
    fn test_merge_positions() {
        let f = factory(plain_text());
        let merged = split(&f, "ab\ncd ef", 5);
        let tree = merged.tree();
        let ef = tree.find_at_offset(7).unwrap();
        let data = tree.token(ef).unwrap();
        assert_eq!(data.code.as_str(), "ef");
        assert_eq!((data.position.row, data.position.column), (2, 4));
    }

    #[test]
    fn test_merge_with_empty_side() {
        let f = factory(plain_text());
        let utf8 = TextEncoding::utf8();
        let left = f.create(b"", Position::start(), utf8);
        let right = f.create(b"abc", Position::start(), utf8);
        let merged = f.combine(left, right);
        assert_eq!(merged.code(), "abc");

        let empty = f.combine(
            f.create(b"", Position::start(), utf8),
            f.create(b"", Position::start(), utf8),
        );
        assert_eq!(empty.current_content(), b"");
    }

    #[test]
    fn test_merge_keeps_edits() {
        let f = factory(plain_text());
        let utf8 = TextEncoding::utf8();
        let mut left = f.create(b"one ", Position::start(), utf8);
        let token = left.tree().first_token(left.root().unwrap()).unwrap();
        left.tree_mut()
            .replace_token(token, CodedBuffer::decode(b"ONE", utf8));
        assert!(left.is_modified());

        let right = f.create(b"two", Position::new(1, 5, 4), utf8);
        let merged = f.combine(left, right);
        assert!(merged.is_modified());
        assert_eq!(merged.current_content(), b"ONE two");

        let mut merged = merged;
        merged.reset_to(b"one two", Position::start(), utf8);
        assert!(!merged.is_modified());
        assert_eq!(merged.code(), "one two");
    }

    #[test]
    fn test_merge_keeps_nodes_off_the_seam() {
        let f = factory(python());
        let utf8 = TextEncoding::utf8();
        let left_lines: String = (0..6).map(|i| format!("import a{i}\n")).collect();
        let right_lines: String = (0..6).map(|i| format!("import d{i}\n")).collect();
        let left_text = format!("{left_lines}import b");
        let right_text = format!("c\n{right_lines}");
        let left = f.create(left_text.as_bytes(), Position::start(), utf8);
        let right_start = Position::start().advance(&left_text, left_text.len());
        let right = f.create(right_text.as_bytes(), right_start, utf8);

        let left_top = left.tree().children(left.root().unwrap()).to_vec();
        let right_top = right.tree().children(right.root().unwrap()).to_vec();
        let shift = left.tree().len();
        assert_eq!(left_top.len(), 7);
        assert_eq!(right_top.len(), 7);

        let merged = f.combine(left, right);
        assert_eq!(merged.code(), format!("{left_text}{right_text}"));
        let tree = merged.tree();
        let top = tree.children(merged.root().unwrap());
        assert_eq!(top.len(), 13);
        assert!(top.iter().all(|&n| tree.node(n).key() == "import"));

        let kept_left = &left_top[..left_top.len() - 1 - MERGE_NEIGHBOURS];
        assert_eq!(&top[..kept_left.len()], kept_left);
        let kept_right: Vec<NodeId> = right_top[1 + MERGE_NEIGHBOURS..]
            .iter()
            .map(|n| NodeId::from_index(n.index() + shift))
            .collect();
        assert_eq!(&top[top.len() - kept_right.len()..], &kept_right[..]);
    }

    #[test]
    fn test_split_inside_string() {
        // the seam token runs to the cut; the right side keeps its own
        // literal from the closing quote on
        let f = factory(python());
        let text = "x = 'abcd'\n";
        let merged = split(&f, text, 7);
        assert_eq!(merged.code(), text);
        assert_eq!(token_texts(&merged), vec!["x", " ", "=", " ", "'abcd", "'\n"]);

        let direct = f.create(text.as_bytes(), Position::start(), TextEncoding::utf8());
        assert_eq!(token_texts(&direct), vec!["x", " ", "=", " ", "'abcd'", "\n"]);
    }

    #[test]
    fn test_split_inside_comment() {
        let f = factory(python());
        let text = "a # one two\nb";
        let merged = split(&f, text, 7);
        assert_eq!(merged.code(), text);
        assert_eq!(token_texts(&merged), vec!["a", " ", "# one ", "two", "\n", "b"]);
        let kinds: Vec<String> = {
            let tree = merged.tree();
            let first = tree.first_token(merged.root().unwrap()).unwrap();
            tree.chain()
                .iter_from(first)
                .map(|t| tree.token(t).unwrap().kind.clone())
                .collect()
        };
        assert_eq!(kinds[2], "T_COMMENT");
        assert_eq!(kinds[3], "T_NAME");
    }

    #[test]
    fn test_rootless_partition_is_reparsed() {
        let f = factory(plain_text());
        let utf8 = TextEncoding::utf8();
        let rootless = ParsedPartition {
            tree: SyntaxTree::new("t"),
            encoding: utf8,
            parser: Arc::clone(f.parser()),
        };
        let right = f.create(b"abc def", Position::start(), utf8);

        let merged = f.combine(rootless, right);
        assert_eq!(merged.code(), "abc def");
        assert_eq!(token_texts(&merged), vec!["abc", " ", "def"]);
        assert!(!merged.is_modified());
    }
}
