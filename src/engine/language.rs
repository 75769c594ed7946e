//! Languages
//!
//! A [`Language`] bundles everything the parse pipeline needs for one
//! source language: token matchers, a grammar, the token kinds that count
//! as trivia, and semantic rules that annotate finished trees. Languages
//! can be built in code or loaded from a JSON [`LanguageDefinition`].
//!
//! The shipped languages (plain text, Java, Python) are illustrative: they
//! tokenize faithfully but their grammars only recognize a few constructs.
//!
//! # JSON Definitions
//!
//! Grammar references inside a definition are strings:
//!
//! - `"T_NAME"` or `"("` matches one token by kind or text
//! - `"@expression"` refers to the pattern defined with key `expression`
//! - a trailing `?` makes the reference optional
//!
//! Every defined pattern can be referenced before its definition, so
//! recursive rules need no special syntax.

use super::error::DefinitionError;
use super::matcher::TokenMatcher;
use super::pattern::{Grammar, GrammarBuilder, PatternId};
use super::regex_cache;
use super::selector::Selector;
use super::tree::{NodeId, Semantic, SyntaxTree};
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Attach a [`Semantic`] to every branch with a given key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticRule {
    /// Grammar key of annotated branches
    pub key: String,
    /// Semantic kind to attach
    pub kind: String,
    /// Selector for the descendant whose code becomes the name
    pub name: String,
}

/// A grammar pattern in a JSON definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PatternDefinition {
    /// Elements in order
    Sequence {
        /// Produced key
        key: String,
        /// Element references
        elements: Vec<String>,
    },
    /// Consecutive matches of one reference
    Repetition {
        /// Produced key
        key: String,
        /// Repeated reference
        inner: String,
        /// Whether zero repetitions match
        #[serde(default)]
        optional: bool,
    },
    /// First matching alternative
    Alternation {
        /// Produced key
        key: String,
        /// Alternative references
        alternatives: Vec<String>,
    },
}

impl PatternDefinition {
    fn key(&self) -> &str {
        match self {
            PatternDefinition::Sequence { key, .. }
            | PatternDefinition::Repetition { key, .. }
            | PatternDefinition::Alternation { key, .. } => key,
        }
    }
}

/// Serializable description of a language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageDefinition {
    /// Language name
    pub name: String,
    /// File extensions, without dot
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Interpreter names recognized in a `#!` line
    #[serde(default)]
    pub interpreters: Vec<String>,
    /// Token matchers in priority order
    pub matchers: Vec<TokenMatcher>,
    /// Token kinds excluded from grammar matching
    #[serde(default)]
    pub trivia: Vec<String>,
    /// Grammar patterns
    #[serde(default)]
    pub patterns: Vec<PatternDefinition>,
    /// Keys of patterns applied at the top level; all patterns if empty
    #[serde(default)]
    pub rules: Vec<String>,
    /// Semantic annotation rules
    #[serde(default)]
    pub semantics: Vec<SemanticRule>,
}

/// Matchers, grammar, trivia and semantics of one source language
#[derive(Debug, Clone)]
pub struct Language {
    name: String,
    extensions: Vec<String>,
    interpreters: Vec<String>,
    matchers: Vec<TokenMatcher>,
    grammar: Grammar,
    trivia: HashSet<String>,
    semantics: Vec<SemanticRule>,
}

impl Language {
    /// Create a language without trivia, semantics or file associations
    pub fn new(name: &str, matchers: Vec<TokenMatcher>, grammar: Grammar) -> Self {
        Self {
            name: name.to_string(),
            extensions: Vec::new(),
            interpreters: Vec::new(),
            matchers,
            grammar,
            trivia: HashSet::new(),
            semantics: Vec::new(),
        }
    }

    /// Associate file extensions (without dot)
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Associate interpreter names for `#!` detection
    pub fn with_interpreters<I, S>(mut self, interpreters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interpreters = interpreters.into_iter().map(Into::into).collect();
        self
    }

    /// Declare token kinds as trivia
    pub fn with_trivia<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trivia = kinds.into_iter().map(Into::into).collect();
        self
    }

    /// Add semantic rules
    pub fn with_semantics(mut self, rules: Vec<SemanticRule>) -> Self {
        self.semantics = rules;
        self
    }

    /// Build a language from a definition
    pub fn from_definition(definition: LanguageDefinition) -> Result<Self, DefinitionError> {
        for matcher in &definition.matchers {
            if let TokenMatcher::Regex { pattern, .. } = matcher {
                regex_cache::validate(pattern).map_err(|message| {
                    DefinitionError::InvalidRegex {
                        pattern: pattern.clone(),
                        message,
                    }
                })?;
            }
        }

        let mut builder = GrammarBuilder::new();
        let named: HashMap<String, PatternId> = definition
            .patterns
            .iter()
            .map(|p| (p.key().to_string(), builder.lazy(p.key())))
            .collect();

        let mut bodies: HashMap<String, PatternId> = HashMap::new();
        let mut order = Vec::with_capacity(definition.patterns.len());
        for pattern in &definition.patterns {
            let body = match pattern {
                PatternDefinition::Sequence { key, elements } => {
                    let elements = elements
                        .iter()
                        .map(|r| resolve(&mut builder, &named, r))
                        .collect::<Result<Vec<_>, _>>()?;
                    builder.sequence(key, elements)
                }
                PatternDefinition::Repetition {
                    key,
                    inner,
                    optional,
                } => {
                    let inner = resolve(&mut builder, &named, inner)?;
                    if *optional {
                        builder.zero_or_more(key, inner)
                    } else {
                        builder.one_or_more(key, inner)
                    }
                }
                PatternDefinition::Alternation { key, alternatives } => {
                    let alternatives = alternatives
                        .iter()
                        .map(|r| resolve(&mut builder, &named, r))
                        .collect::<Result<Vec<_>, _>>()?;
                    builder.alternation(key, alternatives)
                }
            };
            builder.define(named[pattern.key()], body);
            bodies.insert(pattern.key().to_string(), body);
            order.push(body);
        }

        if definition.rules.is_empty() {
            order.into_iter().for_each(|body| builder.rule(body));
        } else {
            for rule in &definition.rules {
                let body = bodies
                    .get(rule)
                    .ok_or_else(|| DefinitionError::UnknownPattern { name: rule.clone() })?;
                builder.rule(*body);
            }
        }

        Ok(Language::new(&definition.name, definition.matchers, builder.build()?)
            .with_extensions(definition.extensions)
            .with_interpreters(definition.interpreters)
            .with_trivia(definition.trivia)
            .with_semantics(definition.semantics))
    }

    /// Parse a JSON definition and build the language
    pub fn from_json(json: &str) -> Result<Self, DefinitionError> {
        let definition: LanguageDefinition = serde_json::from_str(json)?;
        Self::from_definition(definition)
    }

    /// Language name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Associated file extensions
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Token matchers in priority order
    pub fn matchers(&self) -> &[TokenMatcher] {
        &self.matchers
    }

    /// Grammar
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// Whether a token kind is trivia
    pub fn is_trivia_kind(&self, kind: &str) -> bool {
        self.trivia.contains(kind)
    }

    /// Whether a node takes part in grammar matching
    pub fn is_relevant(&self, tree: &SyntaxTree, node: NodeId) -> bool {
        tree.token(node)
            .map_or(true, |token| !self.is_trivia_kind(&token.kind))
    }

    /// Whether this language claims the file at `path`
    pub fn handles_path(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    /// Whether the first line of `head` is a `#!` line naming one of this
    /// language's interpreters
    pub fn handles_shebang(&self, head: &[u8]) -> bool {
        let Some(line) = head.strip_prefix(b"#!") else {
            return false;
        };
        let line = line.split(|&b| b == b'\n').next().unwrap_or_default();
        let line = String::from_utf8_lossy(line);
        line.split(|c: char| c.is_whitespace() || c == '/')
            .any(|word| self.interpreters.iter().any(|i| i == word))
    }

    /// Attach semantic annotations below `root`
    pub fn annotate(&self, tree: &mut SyntaxTree, root: NodeId) {
        for rule in &self.semantics {
            let selector = Selector::parse(&rule.name);
            let found: Vec<(NodeId, String)> = tree
                .iterate(root)
                .into_iter()
                .filter(|&n| !tree.node(n).is_token() && tree.node(n).key() == rule.key)
                .filter_map(|n| {
                    let name = selector.select_first(tree, n)?;
                    Some((n, tree.reconstruct_code(name).trim().to_string()))
                })
                .collect();

            for (node, name) in found {
                tree.set_semantic(
                    node,
                    Semantic {
                        kind: rule.kind.clone(),
                        name,
                    },
                );
            }
        }
    }
}

fn resolve(
    builder: &mut GrammarBuilder,
    named: &HashMap<String, PatternId>,
    reference: &str,
) -> Result<PatternId, DefinitionError> {
    let (base, optional) = match reference.strip_suffix('?') {
        Some(base) if !base.is_empty() => (base, true),
        _ => (reference, false),
    };

    let id = match base.strip_prefix('@') {
        Some(name) => *named
            .get(name)
            .ok_or_else(|| DefinitionError::UnknownPattern {
                name: name.to_string(),
            })?,
        None => builder.token(base),
    };
    Ok(if optional { builder.optional(id) } else { id })
}

// ============================================================================
// Shipped languages
// ============================================================================

/// Whitespace-separated words; the fallback for unknown files
pub fn plain_text() -> Language {
    Language::new(
        "plain",
        vec![
            TokenMatcher::regex("\\s+", "T_SPACE"),
            TokenMatcher::regex("\\S+", "T_CONTEXT"),
        ],
        Grammar::empty(),
    )
    .with_extensions(["txt"])
    .with_trivia(["T_SPACE"])
}

const JAVA_KEYWORDS: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "final", "finally",
    "float", "for", "goto", "if", "implements", "import", "instanceof", "int", "interface",
    "long", "native", "new", "package", "private", "protected", "public", "return", "short",
    "static", "strictfp", "super", "switch", "synchronized", "this", "throw", "throws",
    "transient", "try", "void", "volatile", "while", "true", "false", "null",
];

/// Java tokens; no grammar rules
pub fn java() -> Language {
    Language::new(
        "java",
        vec![
            TokenMatcher::regex("\\s+", "T_SPACE"),
            TokenMatcher::regex("//[^\\n]*", "T_COMMENT"),
            TokenMatcher::regex("/\\*(?s:.*?)(\\*/|$)", "T_COMMENT"),
            TokenMatcher::delimited('"', "T_STRING"),
            TokenMatcher::delimited('\'', "T_CHAR"),
            TokenMatcher::keywords(JAVA_KEYWORDS.iter().copied()),
            TokenMatcher::regex("[A-Za-z_$][A-Za-z0-9_$]*", "T_SYMBOL"),
            TokenMatcher::regex("[0-9][0-9_]*(\\.[0-9_]+)?[lLfFdD]?", "T_NUMBER"),
            TokenMatcher::symbols([
                "(", ")", "{", "}", "[", "]", ";", ",", ".", "@", "=", "==", "!=", "<", ">", "<=",
                ">=", "+", "-", "*", "/", "%", "!", "&&", "||", "&", "|", "^", "~", "?", ":",
                "++", "--", "+=", "-=", "*=", "/=", "->", "::",
            ]),
        ],
        Grammar::empty(),
    )
    .with_extensions(["java"])
    .with_trivia(["T_SPACE", "T_COMMENT"])
}

/// Python tokens and a small grammar for imports, classes, functions,
/// returns and expressions
pub fn python() -> Language {
    let mut g = GrammarBuilder::new();
    let expression = g.lazy("expression");

    let name = g.token("T_NAME");
    let number = g.token("T_NUMBER");
    let string = g.token("T_STRING");
    let dot = g.token(".");
    let open = g.token("(");
    let close = g.token(")");
    let comma = g.token(",");
    let colon = g.token(":");

    let attribute = g.sequence("attribute", [dot, name]);
    let next_argument = g.sequence("next_argument", [comma, expression]);
    let more_arguments = g.zero_or_more("more_arguments", next_argument);
    let arguments = g.sequence("arguments", [expression, more_arguments]);
    let maybe_arguments = g.optional(arguments);
    let call = g.sequence("call", [open, maybe_arguments, close]);
    let suffix = g.alternation("suffix", [attribute, call]);
    let group = g.sequence("group", [open, expression, close]);
    let element = g.alternation("element", [name, number, string, group]);
    let suffixes = g.zero_or_more("suffixes", suffix);
    let body = g.sequence("expression", [element, suffixes]);
    g.define(expression, body);

    let kw_import = g.token("T_IMPORT");
    let kw_class = g.token("T_CLASS");
    let kw_def = g.token("T_DEF");
    let kw_return = g.token("T_RETURN");
    let import = g.sequence("import", [kw_import, name]);
    let maybe_bases = g.optional(call);
    let class = g.sequence("class", [kw_class, name, maybe_bases, colon]);
    let function = g.sequence("function", [kw_def, name, call, colon]);
    let ret = g.sequence("return", [kw_return, expression]);

    for rule in [import, class, function, ret, body] {
        g.rule(rule);
    }

    // every pattern above is defined, so building cannot fail
    let grammar = g.build().unwrap_or_default();

    Language::new(
        "python",
        vec![
            TokenMatcher::regex("[ \\t\\f\\r\\n]+", "T_SPACE"),
            TokenMatcher::regex("#[^\\n]*", "T_COMMENT"),
            TokenMatcher::delimited('"', "T_STRING"),
            TokenMatcher::delimited('\'', "T_STRING"),
            TokenMatcher::keywords([
                "and", "as", "class", "def", "elif", "else", "for", "from", "if", "import", "in",
                "is", "lambda", "not", "or", "pass", "return", "while", "with", "yield",
            ]),
            TokenMatcher::regex("[A-Za-z_][A-Za-z0-9_]*", "T_NAME"),
            TokenMatcher::regex("[0-9]+(\\.[0-9]+)?", "T_NUMBER"),
            TokenMatcher::symbols([
                "(", ")", "[", "]", "{", "}", ":", ",", ".", "=", "==", "!=", "<", ">", "<=", ">=",
                "+", "-", "*", "/", "%", "**", "//", "->", "@",
            ]),
        ],
        grammar,
    )
    .with_extensions(["py", "pyw"])
    .with_interpreters(["python", "python3"])
    .with_trivia(["T_SPACE", "T_COMMENT"])
    .with_semantics(vec![
        SemanticRule {
            key: "function".into(),
            kind: "function".into(),
            name: "T_NAME".into(),
        },
        SemanticRule {
            key: "class".into(),
            kind: "class".into(),
            name: "T_NAME".into(),
        },
    ])
}

// ============================================================================
// Selection
// ============================================================================

/// Known languages and the fallback used for unrecognized files
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    languages: Vec<Arc<Language>>,
    fallback: Arc<Language>,
}

impl LanguageRegistry {
    /// Registry with only the plain-text fallback
    pub fn new() -> Self {
        Self {
            languages: Vec::new(),
            fallback: Arc::new(plain_text()),
        }
    }

    /// Registry with the shipped languages
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(java());
        registry.register(python());
        registry
    }

    /// Add a language; later registrations take precedence
    pub fn register(&mut self, language: Language) -> Arc<Language> {
        let language = Arc::new(language);
        self.languages.insert(0, Arc::clone(&language));
        language
    }

    /// Language by name
    pub fn by_name(&self, name: &str) -> Option<Arc<Language>> {
        if self.fallback.name() == name {
            return Some(Arc::clone(&self.fallback));
        }
        self.languages.iter().find(|l| l.name() == name).cloned()
    }

    /// Pick a language by file extension, then by `#!` line
    ///
    /// Falls back to plain text.
    pub fn select(&self, path: &Path, head: &[u8]) -> Arc<Language> {
        if let Some(language) = self
            .languages
            .iter()
            .find(|l| l.handles_path(path))
            .or_else(|| self.languages.iter().find(|l| l.handles_shebang(head)))
        {
            return Arc::clone(language);
        }

        log_warn!(
            "no language for {}, using {}",
            path.display(),
            self.fallback.name()
        );
        Arc::clone(&self.fallback)
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
