//! Token matchers
//!
//! A matcher looks at the current lexer position and either claims a
//! non-empty run of characters, naming the token kind, or declines.
//! Matchers are plain data so languages can be loaded from JSON.

use super::coded::CodedBuffer;
use super::regex_cache;
use serde::{Deserialize, Serialize};

/// Kind of tokens emitted for characters no matcher claims
pub const INVALID_KIND: &str = "T_INVALID";

/// Escape character inside delimited literals
const ESCAPE: char = '\\';

/// A lexer rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenMatcher {
    /// One of several fixed texts, longest first
    ///
    /// Without an explicit kind, the token kind is the matched text itself.
    Literal {
        /// Candidate texts
        texts: Vec<String>,
        /// Kind of the produced token
        #[serde(default)]
        kind: Option<String>,
    },

    /// Case-insensitive keywords, producing kind `T_<KEYWORD>`
    ///
    /// A keyword only matches when it is not directly followed by an
    /// identifier character.
    Keywords {
        /// Keyword list
        keywords: Vec<String>,
    },

    /// Text enclosed in a delimiter, such as a string literal
    ///
    /// Runs to the next unescaped delimiter, or to the end of input.
    Delimited {
        /// Opening and closing character
        delimiter: char,
        /// Kind of the produced token
        kind: String,
    },

    /// Regular expression anchored at the current position
    Regex {
        /// Pattern source, without anchor
        pattern: String,
        /// Kind of the produced token
        kind: String,
        /// Capture group whose end bounds the token (0 for the whole match)
        #[serde(default)]
        group: usize,
    },
}

/// What a matcher claimed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Number of characters consumed
    pub len: usize,
    /// Kind of the token
    pub kind: String,
}

impl TokenMatcher {
    /// Literal matcher whose tokens are named after their text
    pub fn symbols<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TokenMatcher::Literal {
            texts: texts.into_iter().map(Into::into).collect(),
            kind: None,
        }
    }

    /// Literal matcher with a fixed kind
    pub fn literal<I, S>(texts: I, kind: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TokenMatcher::Literal {
            texts: texts.into_iter().map(Into::into).collect(),
            kind: Some(kind.to_string()),
        }
    }

    /// Keyword matcher
    pub fn keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TokenMatcher::Keywords {
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }

    /// Delimited literal matcher
    pub fn delimited(delimiter: char, kind: &str) -> Self {
        TokenMatcher::Delimited {
            delimiter,
            kind: kind.to_string(),
        }
    }

    /// Regular-expression matcher over the whole match
    pub fn regex(pattern: &str, kind: &str) -> Self {
        TokenMatcher::Regex {
            pattern: pattern.to_string(),
            kind: kind.to_string(),
            group: 0,
        }
    }

    /// Try to match at character index `start`
    pub fn match_at(&self, buffer: &CodedBuffer, start: usize) -> Option<MatchResult> {
        let rest = &buffer.as_str()[buffer.text_offset_of(start)..];
        if rest.is_empty() {
            return None;
        }

        match self {
            TokenMatcher::Literal { texts, kind } => texts
                .iter()
                .filter(|t| !t.is_empty() && rest.starts_with(t.as_str()))
                .max_by_key(|t| t.len())
                .map(|t| MatchResult {
                    len: t.chars().count(),
                    kind: kind.clone().unwrap_or_else(|| t.clone()),
                }),

            TokenMatcher::Keywords { keywords } => keywords
                .iter()
                .filter(|k| !k.is_empty() && keyword_at(rest, k))
                .max_by_key(|k| k.len())
                .map(|k| MatchResult {
                    len: k.chars().count(),
                    kind: format!("T_{}", k.to_uppercase()),
                }),

            TokenMatcher::Delimited { delimiter, kind } => {
                delimited_len(rest, *delimiter).map(|len| MatchResult {
                    len,
                    kind: kind.clone(),
                })
            }

            TokenMatcher::Regex {
                pattern,
                kind,
                group,
            } => {
                let regex = regex_cache::anchored(pattern)?;
                let captures = regex.captures(rest)?;
                let end = captures.get(*group)?.end();
                if end == 0 {
                    return None;
                }
                let start_text = buffer.text_offset_of(start);
                let end_index = buffer.char_index_of_text(start_text + end);
                Some(MatchResult {
                    len: end_index - start,
                    kind: kind.clone(),
                })
            }
        }
    }
}

/// Whether `rest` starts with `keyword` (ignoring case) at a word boundary
fn keyword_at(rest: &str, keyword: &str) -> bool {
    let mut chars = rest.chars();
    for expected in keyword.chars() {
        match chars.next() {
            Some(c) if c.to_lowercase().eq(expected.to_lowercase()) => {}
            _ => return false,
        }
    }
    !matches!(chars.next(), Some(c) if c.is_alphanumeric() || c == '_')
}

/// Character length of a delimited literal at the start of `rest`
fn delimited_len(rest: &str, delimiter: char) -> Option<usize> {
    let mut chars = rest.chars();
    if chars.next()? != delimiter {
        return None;
    }

    let mut len = 1;
    let mut escaped = false;
    for c in chars {
        len += 1;
        if escaped {
            escaped = false;
        } else if c == ESCAPE {
            escaped = true;
        } else if c == delimiter {
            break;
        }
    }
    Some(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::coded::TextEncoding;

    fn buffer(text: &str) -> CodedBuffer {
        CodedBuffer::decode(text.as_bytes(), TextEncoding::utf8())
    }

    #[test]
    fn test_literal_longest_wins() {
        let matcher = TokenMatcher::symbols(["=", "=="]);
        let m = matcher.match_at(&buffer("== 1"), 0).unwrap();
        assert_eq!(m.len, 2);
        assert_eq!(m.kind, "==");

        let matcher = TokenMatcher::literal(["//"], "T_COMMENT_START");
        assert_eq!(
            matcher.match_at(&buffer("a//"), 1).unwrap().kind,
            "T_COMMENT_START"
        );
        assert!(matcher.match_at(&buffer("a//"), 0).is_none());
    }

    #[test]
    fn test_keywords() {
        let matcher = TokenMatcher::keywords(["if", "while"]);
        let m = matcher.match_at(&buffer("IF (x)"), 0).unwrap();
        assert_eq!(m, MatchResult { len: 2, kind: "T_IF".into() });
        assert!(matcher.match_at(&buffer("iffy"), 0).is_none());
        assert!(matcher.match_at(&buffer("whil"), 0).is_none());
        assert_eq!(matcher.match_at(&buffer("while"), 0).unwrap().len, 5);
    }

    #[test]
    fn test_delimited() {
        let matcher = TokenMatcher::delimited('"', "T_STRING");
        let text = r#""a\"b" rest"#;
        assert_eq!(matcher.match_at(&buffer(text), 0).unwrap().len, 6);

        // unterminated runs to the end
        assert_eq!(matcher.match_at(&buffer("\"abc"), 0).unwrap().len, 4);
        assert!(matcher.match_at(&buffer("abc"), 0).is_none());
    }

    #[test]
    fn test_regex_multibyte() {
        let matcher = TokenMatcher::regex("[\\p{L}_][\\p{L}0-9_]*", "T_SYMBOL");
        let m = matcher.match_at(&buffer("x=élan2 "), 2).unwrap();
        assert_eq!(m.len, 5);
        assert!(matcher.match_at(&buffer("1abc"), 0).is_none());
    }

    #[test]
    fn test_regex_group() {
        let matcher = TokenMatcher::Regex {
            pattern: "([0-9]+)\\.\\.".into(),
            kind: "T_NUMBER".into(),
            group: 1,
        };
        let m = matcher.match_at(&buffer("12..5"), 0).unwrap();
        assert_eq!(m.len, 2);
    }

    #[test]
    fn test_regex_rejects_empty_match() {
        let matcher = TokenMatcher::regex("[0-9]*", "T_NUMBER");
        assert!(matcher.match_at(&buffer("abc"), 0).is_none());
    }

    #[test]
    fn test_serde_shape() {
        let json = r#"[
            {"type": "regex", "pattern": "\\s+", "kind": "T_SPACE"},
            {"type": "keywords", "keywords": ["if"]},
            {"type": "literal", "texts": ["(", ")"]},
            {"type": "delimited", "delimiter": "'", "kind": "T_CHAR"}
        ]"#;
        let matchers: Vec<TokenMatcher> = serde_json::from_str(json).unwrap();
        assert_eq!(matchers.len(), 4);
        assert_eq!(matchers[0], TokenMatcher::regex("\\s+", "T_SPACE"));
        assert_eq!(matchers[2], TokenMatcher::symbols(["(", ")"]));
    }
}
