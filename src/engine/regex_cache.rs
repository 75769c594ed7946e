//! Thread-local cache of anchored token patterns
//!
//! Regular-expression matchers only ever match at the current lexer
//! position, so every pattern is compiled as `^(?:pattern)`. Compiled
//! patterns are kept per thread and keyed by the source pattern.

use hashbrown::HashMap;
use regex::Regex;
use std::cell::RefCell;

thread_local! {
    static ANCHORED: RefCell<HashMap<String, Regex>> = RefCell::new(HashMap::new());
}

/// Wrap a pattern so it only matches at the start of the haystack
pub fn anchor(pattern: &str) -> String {
    format!("^(?:{pattern})")
}

/// Get or compile the anchored form of `pattern`
///
/// Returns `None` if the pattern does not compile.
#[inline]
pub fn anchored(pattern: &str) -> Option<Regex> {
    ANCHORED.with(|cache| {
        if let Some(regex) = cache.borrow().get(pattern) {
            return Some(regex.clone());
        }

        let regex = Regex::new(&anchor(pattern)).ok()?;
        cache
            .borrow_mut()
            .insert(pattern.to_string(), regex.clone());
        Some(regex)
    })
}

/// Check that `pattern` compiles, returning the compiler message otherwise
pub fn validate(pattern: &str) -> Result<(), String> {
    Regex::new(&anchor(pattern))
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Drop all compiled patterns of this thread
pub fn clear_cache() {
    ANCHORED.with(|cache| cache.borrow_mut().clear());
}

/// Number of compiled patterns held by this thread
pub fn cache_size() -> usize {
    ANCHORED.with(|cache| cache.borrow().len())
}
