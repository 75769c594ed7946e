//! Charset detection
//!
//! A file's encoding is detected once, from the first non-empty read, and
//! then pinned for the lifetime of the file. Detection is pluggable through
//! [`CharsetDetector`]; [`DefaultDetector`] checks for a byte-order mark,
//! then for binary content, then for valid UTF-8, and finally asks
//! `chardetng` for a guess. NUL and other control bytes are valid UTF-8,
//! so binary content has to be ruled out first.

use super::coded::TextEncoding;
use encoding_rs::{Encoding, UTF_8};

/// Guesses the encoding of a byte sample
pub trait CharsetDetector: Send {
    /// Encoding of `sample`, or `None` for binary content
    fn detect(&mut self, sample: &[u8]) -> Option<&'static Encoding>;
}

/// Share of control bytes above which a sample counts as binary
const BINARY_CONTROL_RATIO: f64 = 0.1;

/// BOM, binary heuristics, UTF-8, then statistical guessing
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultDetector;

impl DefaultDetector {
    fn looks_binary(sample: &[u8]) -> bool {
        if memchr::memchr(0, sample).is_some() {
            return true;
        }
        let control = sample
            .iter()
            .filter(|&&b| b < 0x20 && !matches!(b, b'\n' | b'\r' | b'\t' | 0x0c))
            .count();
        control as f64 > sample.len() as f64 * BINARY_CONTROL_RATIO
    }
}

impl CharsetDetector for DefaultDetector {
    fn detect(&mut self, sample: &[u8]) -> Option<&'static Encoding> {
        if let Some((encoding, _)) = Encoding::for_bom(sample) {
            return Some(encoding);
        }
        if Self::looks_binary(sample) {
            return None;
        }
        match std::str::from_utf8(sample) {
            Ok(_) => return Some(UTF_8),
            // a multi-byte character cut off at the end of the sample
            Err(e) if e.error_len().is_none() => return Some(UTF_8),
            Err(_) => {}
        }

        let mut detector = chardetng::EncodingDetector::new();
        detector.feed(sample, true);
        Some(detector.guess(None, true))
    }
}

/// Detection state of one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CharsetState {
    /// Nothing has been read yet
    #[default]
    Undetected,
    /// Detected and fixed
    Pinned(TextEncoding),
}

impl CharsetState {
    /// Encoding for bytes read from the file
    ///
    /// The first non-empty `sample` runs the detector and pins the result;
    /// afterwards the detector is never consulted again. Empty samples
    /// decode as UTF-8 without pinning anything.
    pub fn resolve(&mut self, detector: &mut dyn CharsetDetector, sample: &[u8]) -> TextEncoding {
        match *self {
            CharsetState::Pinned(encoding) => encoding,
            CharsetState::Undetected if sample.is_empty() => TextEncoding::utf8(),
            CharsetState::Undetected => {
                let encoding = match detector.detect(sample) {
                    Some(charset) => TextEncoding::Charset(charset),
                    None => TextEncoding::Binary,
                };
                log_debug!("detected charset {}", encoding.name());
                *self = CharsetState::Pinned(encoding);
                encoding
            }
        }
    }

    /// Pinned encoding, if detection has happened
    pub fn pinned(&self) -> Option<TextEncoding> {
        match self {
            CharsetState::Pinned(encoding) => Some(*encoding),
            CharsetState::Undetected => None,
        }
    }
}
