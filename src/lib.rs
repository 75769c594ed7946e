//! Codeseam - Partitioned Source Editing Engine
//!
//! The core of a source-code editor that works on files too large to parse
//! at once. It provides:
//! - Decoding that keeps every character's original bytes, so unchanged text
//!   always round-trips exactly, invalid bytes included
//! - A priority-ordered lexer with content-addressed memoization
//! - A pattern grammar applied by fixpoint rewriting, recursive rules
//!   included
//! - Syntax trees in an arena, with a token chain spliceable in amortized
//!   constant time
//! - Lazily materialized file partitions that merge at their boundaries by
//!   re-lexing only the tokens there
//! - Commit and rollback of edits, with charset detection and idle-closing
//!   file handles
//!
//! ## Quick Start
//!
//! ```rust
//! use codeseam::engine::{python, CodedBuffer, Parser, Position, TextEncoding};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let parser = Parser::new(Arc::new(python()));
//! let text = CodedBuffer::decode(b"import os\nos.path.join(a, b)\n", TextEncoding::utf8());
//! let tree = parser.parse(Path::new("main.py"), &text, Position::start());
//!
//! let root = tree.root().unwrap();
//! assert_eq!(tree.reconstruct_code(root), "import os\nos.path.join(a, b)\n");
//! ```
//!
//! ## Languages from JSON
//!
//! ```rust
//! use codeseam::engine::Language;
//!
//! let language = Language::from_json(r#"{
//!     "name": "pairs",
//!     "matchers": [
//!         {"type": "regex", "pattern": "\\s+", "kind": "T_SPACE"},
//!         {"type": "regex", "pattern": "[a-z]+", "kind": "T_WORD"},
//!         {"type": "literal", "texts": ["="]}
//!     ],
//!     "trivia": ["T_SPACE"],
//!     "patterns": [
//!         {"type": "sequence", "key": "pair", "elements": ["T_WORD", "=", "T_WORD"]}
//!     ]
//! }"#).unwrap();
//! assert_eq!(language.grammar().rules().len(), 1);
//! ```
//!
//! ## Feature Flags
//!
//! - `logging` - Enable debug logging using the `log` crate (default)

// Lint configuration for production quality
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]
#![allow(clippy::module_inception)]

// Prelude module for convenient imports
pub mod prelude;

// The engine
pub mod engine;

/// Re-export commonly used types for convenience
pub use engine::{
    Area, CodedBuffer, FileConfig, FileError, Grammar, GrammarBuilder, Language,
    LanguageRegistry, NodeId, Parser, ParserConfig, PartitionParser, PartitionedFile, Position,
    SyntaxTree, TextEncoding, TokenMatcher,
};
