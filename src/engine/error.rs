//! Error types
//!
//! Only I/O and definition loading can fail. Decoding, lexing and grammar
//! application degrade gracefully instead: invalid bytes become marked
//! characters, unmatched characters become invalid tokens and unmatched nodes
//! stay unreduced.

use super::area::Area;
use thiserror::Error;

/// Failure of a partitioned-file operation
#[derive(Debug, Error)]
pub enum FileError {
    /// Reading, writing or resizing the underlying file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Two areas that had to be merged were not adjacent
    #[error(transparent)]
    Area(#[from] AreaError),

    /// A request could not be mapped onto any partition
    #[error("no partition covers {area}")]
    NotCovered {
        /// The requested area
        area: Area,
    },
}

/// Result alias for partitioned-file operations
pub type FileResult<T> = Result<T, FileError>;

/// Area algebra violation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AreaError {
    /// `extend` was called on areas that do not touch
    #[error("areas {left} and {right} are not adjacent")]
    NotAdjacent {
        /// Receiver of the extend call
        left: Area,
        /// Argument of the extend call
        right: Area,
    },
}

/// Failure while building a language from a definition
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The definition is not valid JSON or has the wrong shape
    #[error("invalid language definition: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular-expression matcher does not compile
    #[error("invalid regular expression `{pattern}`: {message}")]
    InvalidRegex {
        /// Offending pattern
        pattern: String,
        /// Compiler message
        message: String,
    },

    /// A grammar rule names a pattern that is not defined
    #[error("grammar references unknown pattern `{name}`")]
    UnknownPattern {
        /// Referenced name
        name: String,
    },

    /// A forward reference was never given a definition
    #[error("lazy pattern `{key}` was never defined")]
    UndefinedLazy {
        /// Key of the lazy pattern
        key: String,
    },
}
