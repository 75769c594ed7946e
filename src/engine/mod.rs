//! Editing engine
//!
//! Decoding, lexing, grammar rewriting and lazily partitioned files.
//!
//! # Module Organization
//!
//! ## Text
//! - [`coded`] - Decoded text that keeps every character's original bytes
//! - [`position`] - Row, column and byte offset
//! - [`charset`] - Charset detection
//!
//! ## Lexing
//! - [`matcher`] - Token matchers
//! - [`lexer`] - Priority-ordered lexer with a content cache
//! - [`cache`] - Content-addressed memo cache
//!
//! ## Trees and Grammars
//! - [`tree`] - Arena-backed syntax trees
//! - [`chain`] - Token chains with union-find endpoints
//! - [`pattern`] - Node patterns and grammars
//! - [`rewrite`] - Trivia attachment and fixpoint grammar application
//! - [`selector`] - Path selectors over trees
//! - [`language`] - Languages and language selection
//! - [`parser`] - The parse pipeline
//!
//! ## Files
//! - [`area`] - Byte-range algebra
//! - [`handle`] - Idle-closing file handles
//! - [`line_index`] - Row and column lookup for byte offsets
//! - [`partition`] - Partitions and the boundary merge
//! - [`partitioned_file`] - Lazily partitioned files with commit and rollback

/// Logging macros - no-op when logging feature is disabled
#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

/// Logging macros - use log crate when logging feature is enabled
#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

#[cfg(not(feature = "logging"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "logging")]
macro_rules! log_warn {
    ($($arg:tt)*) => { log::warn!($($arg)*) };
}

#[cfg(not(feature = "logging"))]
macro_rules! log_error {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "logging")]
macro_rules! log_error {
    ($($arg:tt)*) => { log::error!($($arg)*) };
}

// ============================================================================
// Module Declarations
// ============================================================================

pub mod area;
pub mod cache;
pub mod chain;
pub mod charset;
pub mod coded;
pub mod debug;
pub mod error;
pub mod handle;
pub mod language;
pub mod lexer;
pub mod line_index;
pub mod matcher;
pub mod parser;
pub mod partition;
pub mod partitioned_file;
pub mod pattern;
pub mod position;
pub mod regex_cache;
pub mod rewrite;
pub mod selector;
pub mod tree;

// ============================================================================
// Text
// ============================================================================

pub use charset::{CharsetDetector, CharsetState, DefaultDetector};
pub use coded::{CodedBuffer, CodedChar, TextEncoding};
pub use position::Position;

// ============================================================================
// Lexing
// ============================================================================

pub use cache::ContentCache;
pub use lexer::{LexedToken, Lexer, TokenList};
pub use matcher::{MatchResult, TokenMatcher, INVALID_KIND};

// ============================================================================
// Trees and Grammars
// ============================================================================

pub use chain::TokenChain;
pub use pattern::{Grammar, GrammarBuilder, Matched, Pattern, PatternId, Plan};
pub use rewrite::{apply_grammar, attach_trivia};
pub use selector::Selector;
pub use tree::{Node, NodeId, NodeKind, Semantic, SyntaxTree, TokenData, NULL_KIND, ROOT_KEY};

// ============================================================================
// Languages and Parsing
// ============================================================================

pub use language::{
    java, plain_text, python, Language, LanguageDefinition, LanguageRegistry, PatternDefinition,
    SemanticRule,
};
pub use parser::{Parser, ParserConfig};

// ============================================================================
// Files
// ============================================================================

pub use area::Area;
pub use handle::FileHandles;
pub use line_index::LineIndex;
pub use partition::{ParsedPartition, Partition, PartitionFactory, PartitionParser};
pub use partitioned_file::{FileConfig, PartitionAtArea, PartitionedFile};

// ============================================================================
// Errors and Debugging
// ============================================================================

pub use debug::{GrammarVisualizer, TreePrinter};
pub use error::{AreaError, DefinitionError, FileError, FileResult};
