//! Token positions
//!
//! Rows and columns are 1-based and count decoded characters. The offset is
//! the absolute byte offset in the underlying file, so positions stay valid
//! for partitions that start in the middle of a file.

use memchr::{memchr_iter, memrchr};
use std::fmt;

/// A position in a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    /// Row (1-based)
    pub row: usize,
    /// Column (1-based, in characters)
    pub column: usize,
    /// Byte offset from the start of the file
    pub offset: u64,
}

impl Position {
    /// Create a position
    #[inline]
    pub fn new(row: usize, column: usize, offset: u64) -> Self {
        Self {
            row,
            column,
            offset,
        }
    }

    /// Position of the first byte of a file
    #[inline]
    pub fn start() -> Self {
        Self::new(1, 1, 0)
    }

    /// Position after consuming `text`, which was decoded from `byte_len`
    /// original bytes
    pub fn advance(&self, text: &str, byte_len: usize) -> Self {
        let bytes = text.as_bytes();
        let newlines = memchr_iter(b'\n', bytes).count();
        let column = match memrchr(b'\n', bytes) {
            Some(last) => text[last + 1..].chars().count() + 1,
            None => self.column + text.chars().count(),
        };

        Self {
            row: self.row + newlines,
            column,
            offset: self.offset + byte_len as u64,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.column)
    }
}
