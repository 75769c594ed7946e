//! Node patterns and grammars
//!
//! Patterns are stored in a flat table and reference each other by
//! [`PatternId`], the same way atoms reference each other in a grammar
//! table. A [`Lazy`](Pattern::Lazy) entry is a forward reference that is
//! filled in after the patterns it points to exist, which is how recursive
//! rules such as `expression := element suffix*` are written.
//!
//! Matching never mutates the tree. It produces a [`Matched`] plan that
//! describes how many nodes are consumed and which branches to build; the
//! rewrite engine then applies the plan.
//!
//! # Example
//!
//! ```
//! use codeseam::engine::GrammarBuilder;
//!
//! let mut g = GrammarBuilder::new();
//! let name = g.token("T_NAME");
//! let open = g.token("(");
//! let close = g.token(")");
//! let call = g.sequence("call", [name, open, close]);
//! g.rule(call);
//! let grammar = g.build().unwrap();
//! assert_eq!(grammar.produced_key(call), "call");
//! ```

use super::error::DefinitionError;
use super::tree::{NodeId, SyntaxTree};

/// Index of a pattern in its grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternId(u32);

impl PatternId {
    /// Position in the pattern table
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A grammar rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// A single token whose kind or text equals `target`
    Token {
        /// Kind or literal text
        target: String,
    },
    /// Elements in order, collapsed into one branch
    Sequence {
        /// Produced key
        key: String,
        /// Element patterns
        elements: Vec<PatternId>,
    },
    /// Consecutive matches of `inner`, collapsed into one branch
    Repetition {
        /// Produced key
        key: String,
        /// Repeated pattern
        inner: PatternId,
        /// Whether zero repetitions match
        optional: bool,
    },
    /// Zero or one match of `inner`
    Optional {
        /// Inner pattern
        inner: PatternId,
    },
    /// The first alternative that matches
    Alternation {
        /// Produced key
        key: String,
        /// Alternatives in priority order
        alternatives: Vec<PatternId>,
    },
    /// Forward reference
    Lazy {
        /// Produced key
        key: String,
        /// Referenced pattern, once defined
        target: Option<PatternId>,
    },
}

/// How a matched span becomes one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Keep the single consumed node as it is
    Keep,
    /// Build a branch from consecutive parts, each with its own length
    Build {
        /// Key of the new branch
        key: String,
        /// (consumed nodes, plan) per child
        parts: Vec<(usize, Plan)>,
    },
}

/// Result of matching a pattern at a list index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matched {
    /// Number of consumed nodes
    pub len: usize,
    /// Shape of the replacement
    pub plan: Plan,
}

impl Matched {
    fn keep() -> Self {
        Self {
            len: 1,
            plan: Plan::Keep,
        }
    }

    fn empty(key: &str) -> Self {
        Self {
            len: 0,
            plan: Plan::Build {
                key: key.to_string(),
                parts: Vec::new(),
            },
        }
    }

    /// Whether applying the match changes the node list
    pub fn is_rewrite(&self) -> bool {
        self.len > 0 && matches!(self.plan, Plan::Build { .. })
    }
}

/// An immutable pattern table with its top-level rules
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    patterns: Vec<Pattern>,
    rules: Vec<PatternId>,
    triggers: Vec<Vec<String>>,
}

impl Grammar {
    /// Grammar without rules; parsing leaves tokens flat
    pub fn empty() -> Self {
        Self::default()
    }

    /// Pattern by id
    pub fn pattern(&self, id: PatternId) -> &Pattern {
        &self.patterns[id.index()]
    }

    /// All patterns, indexed by [`PatternId::index`]
    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// Top-level rules in declaration order
    pub fn rules(&self) -> &[PatternId] {
        &self.rules
    }

    /// Node keys that can start a match of the `n`th rule
    pub fn trigger_keys(&self, n: usize) -> &[String] {
        &self.triggers[n]
    }

    /// Key of the node a pattern produces
    pub fn produced_key(&self, id: PatternId) -> &str {
        match self.pattern(id) {
            Pattern::Token { target } => target,
            Pattern::Sequence { key, .. }
            | Pattern::Repetition { key, .. }
            | Pattern::Alternation { key, .. }
            | Pattern::Lazy { key, .. } => key,
            Pattern::Optional { inner } => self.produced_key(*inner),
        }
    }

    /// Whether a pattern can match zero nodes
    pub fn can_be_empty(&self, id: PatternId) -> bool {
        self.can_be_empty_guarded(id, &mut Vec::new())
    }

    fn can_be_empty_guarded(&self, id: PatternId, visiting: &mut Vec<PatternId>) -> bool {
        if visiting.contains(&id) {
            return false;
        }
        visiting.push(id);
        let empty = match self.pattern(id) {
            Pattern::Token { .. } => false,
            Pattern::Optional { .. } => true,
            Pattern::Repetition {
                inner, optional, ..
            } => *optional || self.can_be_empty_guarded(*inner, visiting),
            Pattern::Sequence { elements, .. } => elements
                .iter()
                .all(|&e| self.can_be_empty_guarded(e, visiting)),
            Pattern::Alternation { alternatives, .. } => alternatives
                .iter()
                .any(|&a| self.can_be_empty_guarded(a, visiting)),
            Pattern::Lazy { target, .. } => {
                target.is_some_and(|t| self.can_be_empty_guarded(t, visiting))
            }
        };
        visiting.pop();
        empty
    }

    /// Keys a node may carry to be the first node of a match
    ///
    /// That is the produced key of the pattern (an already reduced node)
    /// plus everything its leading elements, up to the first mandatory one,
    /// consume.
    fn first_keys(&self, id: PatternId, visited: &mut Vec<PatternId>, out: &mut Vec<String>) {
        if visited.contains(&id) {
            return;
        }
        visited.push(id);

        let produced = self.produced_key(id);
        if !out.iter().any(|k| k == produced) {
            out.push(produced.to_string());
        }

        match self.pattern(id) {
            Pattern::Token { .. } => {}
            Pattern::Sequence { elements, .. } => {
                for &element in elements {
                    self.first_keys(element, visited, out);
                    if !self.can_be_empty(element) {
                        break;
                    }
                }
            }
            Pattern::Repetition { inner, .. } | Pattern::Optional { inner } => {
                self.first_keys(*inner, visited, out);
            }
            Pattern::Alternation { alternatives, .. } => {
                for &alternative in alternatives {
                    self.first_keys(alternative, visited, out);
                }
            }
            Pattern::Lazy { target, .. } => {
                if let Some(target) = target {
                    self.first_keys(*target, visited, out);
                }
            }
        }
    }

    /// Match pattern `id` against `nodes` starting at index `at`
    pub fn match_at(
        &self,
        tree: &SyntaxTree,
        nodes: &[NodeId],
        at: usize,
        id: PatternId,
    ) -> Option<Matched> {
        self.match_guarded(tree, nodes, at, id, &mut Vec::new())
    }

    /// Refuses to re-enter a (pattern, index) pair already on the stack,
    /// which cuts left recursion through lazy references
    fn match_guarded(
        &self,
        tree: &SyntaxTree,
        nodes: &[NodeId],
        at: usize,
        id: PatternId,
        active: &mut Vec<(PatternId, usize)>,
    ) -> Option<Matched> {
        if active.contains(&(id, at)) {
            return None;
        }
        active.push((id, at));
        let matched = self.match_pattern(tree, nodes, at, id, active);
        active.pop();
        matched
    }

    fn match_pattern(
        &self,
        tree: &SyntaxTree,
        nodes: &[NodeId],
        at: usize,
        id: PatternId,
        active: &mut Vec<(PatternId, usize)>,
    ) -> Option<Matched> {
        let pattern = self.pattern(id);

        // a branch already carrying the produced key matches as-is
        if !matches!(pattern, Pattern::Token { .. } | Pattern::Optional { .. }) {
            if let Some(&node) = nodes.get(at) {
                let node = tree.node(node);
                if !node.is_token() && node.key() == self.produced_key(id) {
                    return Some(Matched::keep());
                }
            }
        }

        match pattern {
            Pattern::Token { target } => {
                let node = tree.node(*nodes.get(at)?);
                (node.is_token() && node.matches_key(target)).then(Matched::keep)
            }

            Pattern::Sequence { key, elements } => {
                let mut cursor = at;
                let mut parts = Vec::with_capacity(elements.len());
                for &element in elements {
                    let m = self.match_guarded(tree, nodes, cursor, element, active)?;
                    if m.len > 0 {
                        cursor += m.len;
                        parts.push((m.len, m.plan));
                    }
                }
                (cursor > at).then(|| Matched {
                    len: cursor - at,
                    plan: Plan::Build {
                        key: key.clone(),
                        parts,
                    },
                })
            }

            Pattern::Repetition {
                key,
                inner,
                optional,
            } => {
                let mut cursor = at;
                let mut parts = Vec::new();
                while let Some(m) = self.match_guarded(tree, nodes, cursor, *inner, active) {
                    if m.len == 0 {
                        break;
                    }
                    cursor += m.len;
                    parts.push((m.len, m.plan));
                }
                if parts.is_empty() {
                    return optional.then(|| Matched::empty(key));
                }
                Some(Matched {
                    len: cursor - at,
                    plan: Plan::Build {
                        key: key.clone(),
                        parts,
                    },
                })
            }

            Pattern::Optional { inner } => Some(
                self.match_guarded(tree, nodes, at, *inner, active)
                    .unwrap_or_else(|| Matched::empty(self.produced_key(*inner))),
            ),

            Pattern::Alternation { key, alternatives } => {
                let node = tree.node(*nodes.get(at)?);
                if alternatives
                    .iter()
                    .any(|&a| node.matches_key(self.produced_key(a)))
                {
                    return Some(Matched {
                        len: 1,
                        plan: Plan::Build {
                            key: key.clone(),
                            parts: vec![(1, Plan::Keep)],
                        },
                    });
                }

                alternatives.iter().find_map(|&alternative| {
                    let m = self.match_guarded(tree, nodes, at, alternative, active)?;
                    (m.len > 0).then(|| Matched {
                        len: m.len,
                        plan: Plan::Build {
                            key: key.clone(),
                            parts: vec![(m.len, m.plan)],
                        },
                    })
                })
            }

            Pattern::Lazy { target, .. } => {
                self.match_guarded(tree, nodes, at, (*target)?, active)
            }
        }
    }
}

/// Builds a [`Grammar`]
#[derive(Debug, Default)]
pub struct GrammarBuilder {
    patterns: Vec<Pattern>,
    rules: Vec<PatternId>,
}

impl GrammarBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, pattern: Pattern) -> PatternId {
        let id = PatternId(self.patterns.len() as u32);
        self.patterns.push(pattern);
        id
    }

    /// Pattern matching one token by kind or text
    pub fn token(&mut self, target: &str) -> PatternId {
        self.push(Pattern::Token {
            target: target.to_string(),
        })
    }

    /// Sequence pattern
    pub fn sequence(
        &mut self,
        key: &str,
        elements: impl IntoIterator<Item = PatternId>,
    ) -> PatternId {
        self.push(Pattern::Sequence {
            key: key.to_string(),
            elements: elements.into_iter().collect(),
        })
    }

    /// Repetition requiring at least one match
    pub fn one_or_more(&mut self, key: &str, inner: PatternId) -> PatternId {
        self.push(Pattern::Repetition {
            key: key.to_string(),
            inner,
            optional: false,
        })
    }

    /// Repetition that also matches zero times
    pub fn zero_or_more(&mut self, key: &str, inner: PatternId) -> PatternId {
        self.push(Pattern::Repetition {
            key: key.to_string(),
            inner,
            optional: true,
        })
    }

    /// Zero-or-one pattern
    pub fn optional(&mut self, inner: PatternId) -> PatternId {
        self.push(Pattern::Optional { inner })
    }

    /// Alternation pattern
    pub fn alternation(
        &mut self,
        key: &str,
        alternatives: impl IntoIterator<Item = PatternId>,
    ) -> PatternId {
        self.push(Pattern::Alternation {
            key: key.to_string(),
            alternatives: alternatives.into_iter().collect(),
        })
    }

    /// Forward reference, to be filled in with [`define`](Self::define)
    pub fn lazy(&mut self, key: &str) -> PatternId {
        self.push(Pattern::Lazy {
            key: key.to_string(),
            target: None,
        })
    }

    /// Point a forward reference at its definition
    pub fn define(&mut self, lazy: PatternId, target: PatternId) {
        if let Some(Pattern::Lazy { target: slot, .. }) = self.patterns.get_mut(lazy.index()) {
            *slot = Some(target);
        }
    }

    /// Apply `id` at the top level during grammar application
    pub fn rule(&mut self, id: PatternId) {
        if !self.rules.contains(&id) {
            self.rules.push(id);
        }
    }

    /// Finish the grammar
    ///
    /// Fails if a forward reference was never defined.
    pub fn build(self) -> Result<Grammar, DefinitionError> {
        if let Some(Pattern::Lazy { key, .. }) = self
            .patterns
            .iter()
            .find(|p| matches!(p, Pattern::Lazy { target: None, .. }))
        {
            return Err(DefinitionError::UndefinedLazy { key: key.clone() });
        }

        let mut grammar = Grammar {
            patterns: self.patterns,
            rules: self.rules,
            triggers: Vec::new(),
        };
        grammar.triggers = grammar
            .rules
            .iter()
            .map(|&rule| {
                let mut keys = Vec::new();
                grammar.first_keys(rule, &mut Vec::new(), &mut keys);
                keys
            })
            .collect();
        Ok(grammar)
    }
}
