//! Parse pipeline
//!
//! bytes → [`CodedBuffer`] → tokens → trivia attachment → grammar
//! application → root branch → semantic annotation.
//!
//! Both the token list and the finished tree are memoized by content, so
//! re-parsing unchanged text (for example a partition that is reset after a
//! commit) is a cache lookup.

use super::cache::ContentCache;
use super::coded::{CodedBuffer, TextEncoding};
use super::language::Language;
use super::lexer::{Lexer, TokenList};
use super::position::Position;
use super::rewrite::{apply_grammar, attach_trivia};
use super::tree::{NodeId, SyntaxTree, ROOT_KEY};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

/// Default number of entries per memo cache
pub const DEFAULT_MAX_CACHE_ENTRIES: usize = 256;

/// Parser configuration
///
/// # Example
///
/// ```rust
/// use codeseam::engine::ParserConfig;
///
/// let config = ParserConfig::default()
///     .with_parse_cache(false)
///     .with_max_cache_entries(64);
/// assert!(config.lex_cache);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    /// Memoize token lists
    pub lex_cache: bool,

    /// Memoize finished trees
    pub parse_cache: bool,

    /// Entries per cache before it is flushed
    pub max_cache_entries: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            lex_cache: true,
            parse_cache: true,
            max_cache_entries: DEFAULT_MAX_CACHE_ENTRIES,
        }
    }
}

impl ParserConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the token cache
    pub fn with_lex_cache(mut self, enabled: bool) -> Self {
        self.lex_cache = enabled;
        self
    }

    /// Enable or disable the tree cache
    pub fn with_parse_cache(mut self, enabled: bool) -> Self {
        self.parse_cache = enabled;
        self
    }

    /// Set the cache size limit
    pub fn with_max_cache_entries(mut self, entries: usize) -> Self {
        self.max_cache_entries = entries;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ParseKey {
    start: Position,
    encoding: TextEncoding,
}

/// Parser for one language
pub struct Parser {
    language: Arc<Language>,
    config: ParserConfig,
    lexer: Lexer,
    trees: Option<Mutex<ContentCache<ParseKey, SyntaxTree>>>,
}

impl Parser {
    /// Parser with the default configuration
    pub fn new(language: Arc<Language>) -> Self {
        Self::with_config(language, ParserConfig::default())
    }

    /// Parser with an explicit configuration
    pub fn with_config(language: Arc<Language>, config: ParserConfig) -> Self {
        let mut lexer = Lexer::new(language.matchers().to_vec());
        if config.lex_cache {
            lexer = lexer.with_cache(config.max_cache_entries);
        }
        let trees = config
            .parse_cache
            .then(|| Mutex::new(ContentCache::new(config.max_cache_entries)));

        Self {
            language,
            config,
            lexer,
            trees,
        }
    }

    /// Language this parser parses
    pub fn language(&self) -> &Arc<Language> {
        &self.language
    }

    /// Configuration
    pub fn config(&self) -> ParserConfig {
        self.config
    }

    /// Tokens of `buffer`, whose first character is at `start`
    pub fn lex(&self, buffer: &CodedBuffer, start: Position) -> TokenList {
        self.lexer.lex(buffer, start)
    }

    /// Parse `buffer` into a tree bound to `path`
    ///
    /// Text without tokens yields a tree holding one empty placeholder token.
    pub fn parse(&self, path: &Path, buffer: &CodedBuffer, start: Position) -> SyntaxTree {
        let Some(trees) = &self.trees else {
            return self.parse_uncached(path, buffer, start);
        };

        let key = ParseKey {
            start,
            encoding: buffer.encoding(),
        };
        if let Some(mut tree) = trees.lock().get(buffer.as_bytes(), &key) {
            log_debug!("parse cache hit: {} bytes at {}", buffer.byte_len(), start);
            tree.set_path(path);
            return tree;
        }

        let tree = self.parse_uncached(path, buffer, start);
        trees.lock().insert(buffer.as_bytes(), key, tree.clone());
        tree
    }

    fn parse_uncached(&self, path: &Path, buffer: &CodedBuffer, start: Position) -> SyntaxTree {
        let tokens = self.lex(buffer, start);
        if tokens.is_empty() {
            return SyntaxTree::placeholder(path, buffer.encoding(), start);
        }

        let mut tree = SyntaxTree::new(path);
        let nodes = tree.add_lexed(&tokens);
        let top = self.parse_nodes(&mut tree, nodes);
        self.finish(&mut tree, top);
        tree
    }

    /// Attach trivia and apply the grammar to a list of top-level nodes
    pub fn parse_nodes(&self, tree: &mut SyntaxTree, nodes: Vec<NodeId>) -> Vec<NodeId> {
        let language = &self.language;
        let relevant = attach_trivia(tree, nodes, |t, n| language.is_relevant(t, n));
        apply_grammar(tree, relevant, language.grammar())
    }

    /// Make a root over `top` and annotate it
    pub fn finish(&self, tree: &mut SyntaxTree, top: Vec<NodeId>) -> NodeId {
        let root = tree.add_branch(ROOT_KEY, top);
        tree.set_root(root);
        self.language.annotate(tree, root);
        root
    }

    /// Make a root over `top`, annotating only the `reduced` subtrees
    ///
    /// For trees whose other top-level nodes were annotated before.
    pub fn finish_window(
        &self,
        tree: &mut SyntaxTree,
        top: Vec<NodeId>,
        reduced: &[NodeId],
    ) -> NodeId {
        let root = tree.add_branch(ROOT_KEY, top);
        tree.set_root(root);
        for &node in reduced {
            self.language.annotate(tree, node);
        }
        root
    }

    /// (hits, misses, hit rate) of the token and tree caches
    pub fn cache_stats(&self) -> (Option<(u64, u64, f64)>, Option<(u64, u64, f64)>) {
        (
            self.lexer.cache_stats(),
            self.trees.as_ref().map(|t| t.lock().stats()),
        )
    }
}
