//! Coded text: decoded characters that remember their original bytes
//!
//! A [`CodedBuffer`] is produced by decoding raw bytes with a charset. Every
//! character keeps the byte span it came from, so substrings and
//! reconstructions are byte-exact even through invalid input:
//! `CodedBuffer::decode(b, e).to_bytes() == b` for every `b` and `e`.
//!
//! Decoding scans forward and, at each byte, tries to decode 1 to 8 bytes.
//! The first length that yields exactly one scalar value wins. When none
//! does, the single byte becomes an invalid character carrying a
//! placeholder value.

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Longest byte sequence tried for a single character
pub const MAX_CHAR_BYTES: usize = 8;

/// Value carried by characters that could not be decoded
pub const PLACEHOLDER: char = '\u{FFFD}';

/// How bytes map to characters
#[derive(Debug, Clone, Copy)]
pub enum TextEncoding {
    /// Text in a known charset
    Charset(&'static Encoding),
    /// Raw bytes, one character per byte
    Binary,
}

impl TextEncoding {
    /// UTF-8 text
    pub fn utf8() -> Self {
        TextEncoding::Charset(UTF_8)
    }

    /// Charset name, or `"binary"`
    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Charset(encoding) => encoding.name(),
            TextEncoding::Binary => "binary",
        }
    }

    /// Whether bytes are taken as-is
    pub fn is_binary(&self) -> bool {
        matches!(self, TextEncoding::Binary)
    }
}

impl PartialEq for TextEncoding {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for TextEncoding {}

impl Hash for TextEncoding {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name().hash(state);
    }
}

/// One decoded character and the bytes it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodedChar {
    /// Offset of the first byte inside the owning buffer
    pub byte_start: usize,
    /// Number of original bytes
    pub byte_len: u8,
    /// Decoded value, [`PLACEHOLDER`] when invalid
    pub value: char,
    /// Whether the bytes formed a valid character
    pub valid: bool,
}

impl CodedChar {
    /// Byte range inside the owning buffer
    #[inline]
    pub fn byte_range(&self) -> std::ops::Range<usize> {
        self.byte_start..self.byte_start + self.byte_len as usize
    }
}

/// Decoded text with exact byte round-trip
#[derive(Clone, PartialEq, Eq)]
pub struct CodedBuffer {
    encoding: TextEncoding,
    bytes: Vec<u8>,
    chars: Vec<CodedChar>,
    /// Decoded values concatenated, used for matching
    text: String,
    /// Start of each character in `text`, plus the end
    text_offsets: Vec<usize>,
}

impl CodedBuffer {
    /// Empty buffer for an encoding
    pub fn empty(encoding: TextEncoding) -> Self {
        Self {
            encoding,
            bytes: Vec::new(),
            chars: Vec::new(),
            text: String::new(),
            text_offsets: vec![0],
        }
    }

    /// Decode bytes; never fails
    pub fn decode(bytes: &[u8], encoding: TextEncoding) -> Self {
        let mut buffer = Self::empty(encoding);
        buffer.bytes = bytes.to_vec();
        buffer.chars.reserve(bytes.len());
        buffer.text.reserve(bytes.len());

        let mut pos = 0;
        while pos < bytes.len() {
            let (len, value, valid) = match encoding {
                TextEncoding::Binary => (1, bytes[pos] as char, true),
                TextEncoding::Charset(charset) => match decode_one(charset, &bytes[pos..]) {
                    Some((len, value)) => (len, value, true),
                    None => (1, PLACEHOLDER, false),
                },
            };
            buffer.push_char(CodedChar {
                byte_start: pos,
                byte_len: len as u8,
                value,
                valid,
            });
            pos += len;
        }
        buffer
    }

    /// Encode text and decode the result again
    ///
    /// Characters the charset cannot represent are replaced the way the
    /// charset's encoder does it. In binary mode, characters above U+00FF
    /// become `?`.
    pub fn encode(text: &str, encoding: TextEncoding) -> Self {
        let bytes: Cow<'_, [u8]> = match encoding {
            TextEncoding::Binary => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect::<Vec<_>>()
                .into(),
            TextEncoding::Charset(charset) if charset == UTF_16LE => text
                .encode_utf16()
                .flat_map(u16::to_le_bytes)
                .collect::<Vec<_>>()
                .into(),
            TextEncoding::Charset(charset) if charset == UTF_16BE => text
                .encode_utf16()
                .flat_map(u16::to_be_bytes)
                .collect::<Vec<_>>()
                .into(),
            TextEncoding::Charset(charset) => charset.encode(text).0,
        };
        Self::decode(&bytes, encoding)
    }

    fn push_char(&mut self, ch: CodedChar) {
        self.text.push(ch.value);
        self.text_offsets.push(self.text.len());
        self.chars.push(ch);
    }

    /// Encoding used to decode this buffer
    #[inline]
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Number of characters
    #[inline]
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Whether the buffer has no characters
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Number of original bytes
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Character at index `i`
    #[inline]
    pub fn char_at(&self, i: usize) -> Option<CodedChar> {
        self.chars.get(i).copied()
    }

    /// All characters in order
    pub fn chars(&self) -> &[CodedChar] {
        &self.chars
    }

    /// Number of characters that failed to decode
    pub fn invalid_count(&self) -> usize {
        self.chars.iter().filter(|c| !c.valid).count()
    }

    /// Decoded text, with placeholders for invalid characters
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Original bytes
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Original bytes, owned
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    /// Byte offset of character `index`; `len()` maps to `byte_len()`
    pub fn byte_offset_of(&self, index: usize) -> usize {
        self.chars
            .get(index)
            .map_or(self.bytes.len(), |c| c.byte_start)
    }

    /// Index of the character containing byte `offset`
    pub fn char_index_of_byte(&self, offset: usize) -> usize {
        self.chars
            .partition_point(|c| c.byte_start + c.byte_len as usize <= offset)
    }

    /// Offset of character `index` inside [`as_str`](Self::as_str)
    pub fn text_offset_of(&self, index: usize) -> usize {
        self.text_offsets[index.min(self.chars.len())]
    }

    /// Index of the character starting at `offset` inside [`as_str`](Self::as_str)
    pub fn char_index_of_text(&self, offset: usize) -> usize {
        self.text_offsets.partition_point(|&o| o < offset)
    }

    /// Characters `[start, end)` as a new buffer
    ///
    /// Bounds are clamped to the buffer.
    pub fn substring(&self, start: usize, end: usize) -> CodedBuffer {
        let end = end.min(self.chars.len());
        let start = start.min(end);
        let byte_start = self.byte_offset_of(start);
        let byte_end = self.byte_offset_of(end);
        let text_start = self.text_offsets[start];
        let text_end = self.text_offsets[end];

        CodedBuffer {
            encoding: self.encoding,
            bytes: self.bytes[byte_start..byte_end].to_vec(),
            chars: self.chars[start..end]
                .iter()
                .map(|c| CodedChar {
                    byte_start: c.byte_start - byte_start,
                    ..*c
                })
                .collect(),
            text: self.text[text_start..text_end].to_string(),
            text_offsets: self.text_offsets[start..=end]
                .iter()
                .map(|o| o - text_start)
                .collect(),
        }
    }
}

/// Decode the first character of `bytes`, returning its byte length
fn decode_one(charset: &'static Encoding, bytes: &[u8]) -> Option<(usize, char)> {
    let max = bytes.len().min(MAX_CHAR_BYTES);
    for len in 1..=max {
        let chunk = &bytes[..len];
        let decoded = if charset == UTF_8 {
            std::str::from_utf8(chunk).ok().map(Cow::Borrowed)
        } else {
            charset.decode_without_bom_handling_and_without_replacement(chunk)
        };
        if let Some(text) = decoded {
            let mut values = text.chars();
            if let (Some(value), None) = (values.next(), values.next()) {
                return Some((len, value));
            }
        }
    }
    None
}

impl fmt::Debug for CodedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodedBuffer")
            .field("encoding", &self.encoding.name())
            .field("text", &self.text)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl fmt::Display for CodedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
