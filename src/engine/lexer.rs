//! Lexer
//!
//! Turns a [`CodedBuffer`] into tokens using matchers in priority order.
//! The first matcher that claims the current position wins. A character no
//! matcher claims becomes a one-character [`INVALID_KIND`] token, so lexing
//! always terminates after at most `buffer.len()` steps.
//!
//! Results are memoized by content: lexing identical bytes, in the same
//! encoding, from the same start position returns the same shared token
//! list.

use super::cache::ContentCache;
use super::coded::{CodedBuffer, TextEncoding};
use super::matcher::{MatchResult, TokenMatcher, INVALID_KIND};
use super::position::Position;
use parking_lot::Mutex;
use std::sync::Arc;

/// A token produced by the lexer, before it is placed in a tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexedToken {
    /// Token kind
    pub kind: String,
    /// Characters of the token
    pub code: CodedBuffer,
    /// Position of the first character
    pub position: Position,
}

/// Memo key besides the content bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LexKey {
    start: Position,
    encoding: TextEncoding,
}

/// Shared token list
pub type TokenList = Arc<[LexedToken]>;

/// Matcher-driven lexer with a content cache
pub struct Lexer {
    matchers: Vec<TokenMatcher>,
    cache: Option<Mutex<ContentCache<LexKey, TokenList>>>,
}

impl Lexer {
    /// Create a lexer without memoization
    pub fn new(matchers: Vec<TokenMatcher>) -> Self {
        Self {
            matchers,
            cache: None,
        }
    }

    /// Enable memoization of up to `max_entries` results
    pub fn with_cache(mut self, max_entries: usize) -> Self {
        self.cache = Some(Mutex::new(ContentCache::new(max_entries)));
        self
    }

    /// Matchers in priority order
    pub fn matchers(&self) -> &[TokenMatcher] {
        &self.matchers
    }

    /// Lex `buffer`, whose first character is at `start`
    pub fn lex(&self, buffer: &CodedBuffer, start: Position) -> TokenList {
        let Some(cache) = &self.cache else {
            return self.lex_uncached(buffer, start).into();
        };

        let key = LexKey {
            start,
            encoding: buffer.encoding(),
        };
        if let Some(tokens) = cache.lock().get(buffer.as_bytes(), &key) {
            log_debug!("lex cache hit: {} bytes at {}", buffer.byte_len(), start);
            return tokens;
        }

        let tokens: TokenList = self.lex_uncached(buffer, start).into();
        cache
            .lock()
            .insert(buffer.as_bytes(), key, Arc::clone(&tokens));
        tokens
    }

    /// Lex without consulting or filling the cache
    pub fn lex_uncached(&self, buffer: &CodedBuffer, start: Position) -> Vec<LexedToken> {
        let mut tokens = Vec::new();
        let mut index = 0;
        let mut position = start;

        while index < buffer.len() {
            let MatchResult { len, kind } = self
                .matchers
                .iter()
                .find_map(|m| m.match_at(buffer, index))
                .filter(|m| m.len > 0)
                .unwrap_or_else(|| MatchResult {
                    len: 1,
                    kind: INVALID_KIND.to_string(),
                });

            let code = buffer.substring(index, index + len);
            let next = position.advance(code.as_str(), code.byte_len());
            tokens.push(LexedToken {
                kind,
                code,
                position,
            });
            position = next;
            index += len;
        }

        tokens
    }

    /// (hits, misses, hit rate) of the content cache
    pub fn cache_stats(&self) -> Option<(u64, u64, f64)> {
        self.cache.as_ref().map(|c| c.lock().stats())
    }
}
