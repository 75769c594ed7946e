//! Prelude module for convenient imports
//!
//! ```
//! use codeseam::prelude::*;
//! ```
//!
//! # Re-exported Items
//!
//! ## Text
//! - [`CodedBuffer`] - Decoded text with original bytes
//! - [`TextEncoding`] - Charset or binary
//! - [`Position`] - Row, column and byte offset
//!
//! ## Parsing
//! - [`Language`] - Matchers, grammar, trivia and semantics
//! - [`Parser`] - The parse pipeline
//! - [`SyntaxTree`] - Arena-backed tree
//! - [`GrammarBuilder`] - Builder for pattern grammars
//! - [`TokenMatcher`] - Lexer matchers
//!
//! ## Files
//! - [`PartitionedFile`] - Lazily partitioned file
//! - [`Partition`] - Trait for partitions
//! - [`Area`] - Byte range

// ============================================================================
// Text
// ============================================================================

pub use crate::engine::{CodedBuffer, Position, TextEncoding};

// ============================================================================
// Parsing
// ============================================================================

pub use crate::engine::{
    GrammarBuilder, Language, LanguageRegistry, NodeId, Parser, ParserConfig, Selector,
    SyntaxTree, TokenMatcher,
};

// ============================================================================
// Files
// ============================================================================

pub use crate::engine::{
    Area, FileConfig, FileError, Partition, PartitionFactory, PartitionParser, PartitionedFile,
};
