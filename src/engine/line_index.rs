//! Row and column lookup for byte offsets
//!
//! Partitions can start anywhere in a file, so their first token needs the
//! row and column of an arbitrary byte offset. The index remembers the start
//! of every `milestone`th line it has scanned past, and answers lookups by
//! decoding forward from the nearest milestone at or before the offset.

use super::coded::{CodedBuffer, TextEncoding, MAX_CHAR_BYTES};
use super::position::Position;
use memchr::memchr_iter;
use std::io;

const CHUNK: usize = 64 * 1024;

/// Line-start milestones of one file
#[derive(Debug, Clone)]
pub struct LineIndex {
    milestone: usize,
    marks: Vec<Position>,
    chunk: usize,
}

impl LineIndex {
    /// Index recording every `milestone`th line start
    pub fn new(milestone: usize) -> Self {
        Self {
            milestone: milestone.max(1),
            marks: vec![Position::start()],
            chunk: CHUNK,
        }
    }

    /// Number of recorded milestones, including the file start
    pub fn milestones(&self) -> usize {
        self.marks.len()
    }

    /// Forget milestones after `offset`, whose bytes may have changed
    pub fn invalidate_from(&mut self, offset: u64) {
        self.marks.retain(|m| m.offset <= offset);
    }

    /// Position of byte `offset`
    ///
    /// `read(at, len)` must return up to `len` bytes of the file starting at
    /// `at`. Reading stops early at the end of the file.
    pub fn position_at<R>(
        &mut self,
        offset: u64,
        encoding: TextEncoding,
        mut read: R,
    ) -> io::Result<Position>
    where
        R: FnMut(u64, usize) -> io::Result<Vec<u8>>,
    {
        let nearest = self.marks.partition_point(|m| m.offset <= offset);
        let mut pos = self.marks[nearest.saturating_sub(1)];

        while pos.offset < offset {
            let want = ((offset - pos.offset) as usize).min(self.chunk);
            let bytes = read(pos.offset, want + MAX_CHAR_BYTES)?;
            if bytes.is_empty() {
                break;
            }

            let buffer = CodedBuffer::decode(&bytes, encoding);
            let count = buffer.chars().partition_point(|c| c.byte_start < want);
            let text = &buffer.as_str()[..buffer.text_offset_of(count)];
            let consumed = buffer.byte_offset_of(count);
            if consumed == 0 {
                break;
            }

            for (k, nl) in memchr_iter(b'\n', text.as_bytes()).enumerate() {
                let row = pos.row + k + 1;
                if (row - 1) % self.milestone != 0 {
                    continue;
                }
                let line_start = pos.offset
                    + buffer.byte_offset_of(buffer.char_index_of_text(nl + 1)) as u64;
                if self.marks.last().is_some_and(|m| m.offset < line_start) {
                    self.marks.push(Position::new(row, 1, line_start));
                }
            }

            pos = pos.advance(text, consumed);
        }

        pos.offset = offset;
        Ok(pos)
    }
}
