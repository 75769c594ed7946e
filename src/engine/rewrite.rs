//! Grammar application
//!
//! Rewrites a flat node list into a forest by applying grammar rules until
//! nothing changes. Live nodes are indexed by key (tokens by kind and by
//! text); each pass walks the rules in declaration order and sweeps the
//! list once per rule, trying only the candidates whose key can start a
//! match, leftmost first. A match replaces the consumed span with one new
//! branch, and the consumed nodes leave the index.
//!
//! Every rewrite either shrinks the list or, for a rewrite that wraps a
//! single node, adds a key that does not yet occur on that node's
//! single-child chain. Both are bounded, so application always reaches a
//! fixpoint. Nodes no rule matches are left as they are.

use super::pattern::{Grammar, Plan};
use super::tree::{NodeId, SyntaxTree};
use hashbrown::{HashMap, HashSet};

/// Move trivia out of the node list onto its relevant neighbors
///
/// A run of trivia is prepended to the next relevant node; trailing trivia
/// is appended to the last relevant node. A list with no relevant node is
/// returned unchanged.
pub fn attach_trivia<F>(tree: &mut SyntaxTree, nodes: Vec<NodeId>, is_relevant: F) -> Vec<NodeId>
where
    F: Fn(&SyntaxTree, NodeId) -> bool,
{
    let mut relevant = Vec::with_capacity(nodes.len());
    let mut pending = Vec::new();

    for node in nodes {
        if is_relevant(tree, node) {
            if !pending.is_empty() {
                tree.prepend_trivia(node, &pending);
                pending.clear();
            }
            relevant.push(node);
        } else {
            pending.push(node);
        }
    }

    if !pending.is_empty() {
        match relevant.last() {
            Some(&last) => tree.append_trivia(last, &pending),
            None => return pending,
        }
    }
    relevant
}

/// Keys a node is filed under: tokens by kind and by text, branches by key
fn node_keys(tree: &SyntaxTree, node: NodeId) -> Vec<&str> {
    let data = tree.node(node);
    match data.as_token() {
        Some(token) if token.code.as_str() != token.kind => {
            vec![token.kind.as_str(), token.code.as_str()]
        }
        Some(token) => vec![token.kind.as_str()],
        None => vec![data.key()],
    }
}

/// Live top-level nodes by the keys that can start a match on them
#[derive(Debug, Default)]
struct Candidates {
    by_key: HashMap<String, HashSet<NodeId>>,
}

impl Candidates {
    fn insert(&mut self, tree: &SyntaxTree, node: NodeId) {
        for key in node_keys(tree, node) {
            self.by_key.entry(key.to_string()).or_default().insert(node);
        }
    }

    fn remove(&mut self, tree: &SyntaxTree, node: NodeId) {
        for key in node_keys(tree, node) {
            if let Some(bucket) = self.by_key.get_mut(key) {
                bucket.remove(&node);
            }
        }
    }

    fn get(&self, key: &str) -> Option<&HashSet<NodeId>> {
        self.by_key.get(key)
    }
}

fn positions(nodes: &[NodeId]) -> HashMap<NodeId, usize> {
    nodes.iter().enumerate().map(|(at, &node)| (node, at)).collect()
}

/// Whether wrapping `node` according to `plan` adds only new keys to its
/// single-child chain
fn admits_wrap(tree: &SyntaxTree, node: NodeId, plan: &Plan) -> bool {
    let mut added: Vec<&str> = Vec::new();
    let mut current = plan;
    while let Plan::Build { key, parts } = current {
        if added.contains(&key.as_str()) {
            return false;
        }
        added.push(key.as_str());
        match parts.as_slice() {
            [(1, inner)] => current = inner,
            _ => break,
        }
    }

    let mut existing = Some(node);
    while let Some(n) = existing {
        let data = tree.node(n);
        if added.iter().any(|k| data.matches_key(k)) {
            return false;
        }
        existing = match data.children() {
            [only] => Some(*only),
            _ => None,
        };
    }
    true
}

/// Build the node described by `plan` over `consumed`
fn build(tree: &mut SyntaxTree, consumed: &[NodeId], plan: &Plan) -> NodeId {
    match plan {
        Plan::Keep => consumed[0],
        Plan::Build { key, parts } => {
            let mut children = Vec::with_capacity(parts.len());
            let mut cursor = 0;
            for (len, part) in parts {
                children.push(build(tree, &consumed[cursor..cursor + len], part));
                cursor += len;
            }
            tree.add_branch(key, children)
        }
    }
}

/// Apply `grammar` to `nodes` until a fixpoint is reached
///
/// Returns the remaining top-level nodes in order.
pub fn apply_grammar(tree: &mut SyntaxTree, nodes: Vec<NodeId>, grammar: &Grammar) -> Vec<NodeId> {
    let mut nodes = nodes;
    if grammar.rules().is_empty() || nodes.is_empty() {
        return nodes;
    }

    let mut candidates = Candidates::default();
    for &node in &nodes {
        candidates.insert(tree, node);
    }
    let mut index = positions(&nodes);

    let mut passes = 0usize;
    let mut rewrites = 0usize;
    loop {
        passes += 1;
        let mut changed = false;

        for (n, &rule) in grammar.rules().iter().enumerate() {
            let mut starts: Vec<usize> = grammar
                .trigger_keys(n)
                .iter()
                .filter_map(|key| candidates.get(key))
                .flatten()
                .filter_map(|node| index.get(node).copied())
                .collect();
            if starts.is_empty() {
                continue;
            }
            starts.sort_unstable();
            starts.dedup();

            // one left-to-right sweep per rule, copying untouched runs
            let before = rewrites;
            let mut rebuilt = Vec::new();
            let mut cursor = 0;
            for at in starts {
                if at < cursor {
                    continue;
                }
                let Some(matched) = grammar.match_at(tree, &nodes, at, rule) else {
                    continue;
                };
                if !matched.is_rewrite()
                    || (matched.len == 1 && !admits_wrap(tree, nodes[at], &matched.plan))
                {
                    continue;
                }

                let consumed = &nodes[at..at + matched.len];
                for &node in consumed {
                    candidates.remove(tree, node);
                }
                let built = build(tree, consumed, &matched.plan);
                candidates.insert(tree, built);

                rebuilt.extend_from_slice(&nodes[cursor..at]);
                rebuilt.push(built);
                cursor = at + matched.len;
                rewrites += 1;
            }

            if rewrites > before {
                rebuilt.extend_from_slice(&nodes[cursor..]);
                nodes = rebuilt;
                index = positions(&nodes);
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }

    log_debug!(
        "grammar applied: {} rewrites in {} passes, {} top-level nodes",
        rewrites,
        passes,
        nodes.len()
    );
    nodes
}
