//! Arena-backed syntax trees
//!
//! All nodes of a tree live in one `Vec` and refer to each other by
//! [`NodeId`]. Parents, children, trivia decorations and the token chain are
//! plain indices, so the cyclic parent/child/neighbor graph has a single
//! owner.
//!
//! # Node Shape
//!
//! - A **token** is a leaf with grammar key [`TOKEN_KEY`], a kind, its coded
//!   characters and its position. Tokens are linked in file order through the
//!   tree's [`TokenChain`].
//! - A **branch** has an ordered child list, a child-to-index map kept in
//!   sync with it, and semantic annotations by kind.
//! - Any node can carry **prepended** and **appended** trivia. Trivia is part
//!   of the reconstructed code but never takes part in grammar matching. The
//!   parent of a trivia node is the node it decorates.
//!
//! Nodes are never freed. Rewrites and merges detach nodes, which then stay
//! in the arena unreachable from the root.

use super::chain::TokenChain;
use super::coded::{CodedBuffer, TextEncoding};
use super::lexer::LexedToken;
use super::position::Position;
use hashbrown::HashMap;
use std::path::{Path, PathBuf};

/// Grammar key of every token
pub const TOKEN_KEY: &str = "token";

/// Grammar key of the root branch
pub const ROOT_KEY: &str = "root";

/// Kind of the placeholder token in an empty tree
pub const NULL_KIND: &str = "T_NULL";

/// Index of a node in its tree's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub(crate) fn from_index(index: usize) -> Self {
        NodeId(index as u32)
    }

    /// Position in the arena
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Annotation attached to a branch, such as a declaration name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Semantic {
    /// Semantic kind, e.g. `"function"`
    pub kind: String,
    /// Name the annotation refers to
    pub name: String,
}

/// Leaf payload
#[derive(Debug, Clone)]
pub struct TokenData {
    /// Token kind
    pub kind: String,
    /// Characters of the token
    pub code: CodedBuffer,
    /// Position of the first character
    pub position: Position,
}

/// Branch payload
#[derive(Debug, Clone, Default)]
pub struct BranchData {
    children: Vec<NodeId>,
    child_index: HashMap<NodeId, usize>,
    semantics: HashMap<String, Semantic>,
}

impl BranchData {
    fn new(children: Vec<NodeId>) -> Self {
        let mut branch = Self {
            children,
            ..Default::default()
        };
        branch.reindex();
        branch
    }

    fn reindex(&mut self) {
        self.child_index = self
            .children
            .iter()
            .enumerate()
            .map(|(i, &c)| (c, i))
            .collect();
    }

    /// Children in order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Semantic annotations by kind
    pub fn semantics(&self) -> &HashMap<String, Semantic> {
        &self.semantics
    }
}

/// Token or branch
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Leaf
    Token(TokenData),
    /// Composite
    Branch(BranchData),
}

/// One arena slot
#[derive(Debug, Clone)]
pub struct Node {
    parent: Option<NodeId>,
    key: String,
    kind: NodeKind,
    prepended: Vec<NodeId>,
    appended: Vec<NodeId>,
    dirty: bool,
}

impl Node {
    fn new(key: String, kind: NodeKind) -> Self {
        Self {
            parent: None,
            key,
            kind,
            prepended: Vec::new(),
            appended: Vec::new(),
            dirty: false,
        }
    }

    /// Grammar key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Parent, or the decorated node for trivia
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Token or branch payload
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Token payload
    pub fn as_token(&self) -> Option<&TokenData> {
        match &self.kind {
            NodeKind::Token(token) => Some(token),
            NodeKind::Branch(_) => None,
        }
    }

    /// Branch payload
    pub fn as_branch(&self) -> Option<&BranchData> {
        match &self.kind {
            NodeKind::Branch(branch) => Some(branch),
            NodeKind::Token(_) => None,
        }
    }

    /// Whether this is a token
    pub fn is_token(&self) -> bool {
        matches!(self.kind, NodeKind::Token(_))
    }

    /// Children, empty for tokens
    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Branch(branch) => &branch.children,
            NodeKind::Token(_) => &[],
        }
    }

    /// Trivia emitted before this node
    pub fn prepended(&self) -> &[NodeId] {
        &self.prepended
    }

    /// Trivia emitted after this node
    pub fn appended(&self) -> &[NodeId] {
        &self.appended
    }

    /// Whether this node or a descendant was edited
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether the node answers to `key`: branch key, token kind or token text
    pub fn matches_key(&self, key: &str) -> bool {
        match &self.kind {
            NodeKind::Token(token) => token.kind == key || token.code.as_str() == key,
            NodeKind::Branch(_) => self.key == key,
        }
    }
}

enum Visit {
    Enter(NodeId),
    Emit(NodeId),
}

/// A syntax tree for one file or file partition
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    nodes: Vec<Node>,
    chain: TokenChain,
    root: Option<NodeId>,
    path: PathBuf,
}

impl SyntaxTree {
    /// Create an empty arena bound to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            nodes: Vec::new(),
            chain: TokenChain::new(),
            root: None,
            path: path.into(),
        }
    }

    /// Tree whose root holds a single empty [`NULL_KIND`] token
    pub fn placeholder(path: impl Into<PathBuf>, encoding: TextEncoding, start: Position) -> Self {
        let mut tree = Self::new(path);
        let token = tree.add_token(NULL_KIND, CodedBuffer::empty(encoding), start);
        let root = tree.add_branch(ROOT_KEY, vec![token]);
        tree.set_root(root);
        tree
    }

    /// Path the root is bound to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rebind the tree to another path
    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = path.into();
    }

    /// Root branch
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Make `id` the root
    pub fn set_root(&mut self, id: NodeId) {
        self.nodes[id.index()].parent = None;
        self.root = Some(id);
    }

    /// Number of arena slots, including detached nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node by id
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Token payload of `id`
    pub fn token(&self, id: NodeId) -> Option<&TokenData> {
        self.node(id).as_token()
    }

    /// Children of `id`
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).children()
    }

    /// Parent of `id`
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Token order shared by all tokens of the tree
    pub fn chain(&self) -> &TokenChain {
        &self.chain
    }

    pub(crate) fn chain_mut(&mut self) -> &mut TokenChain {
        &mut self.chain
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Add a detached token that forms a chain of its own
    pub fn add_token(&mut self, kind: &str, code: CodedBuffer, position: Position) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(Node::new(
            TOKEN_KEY.to_string(),
            NodeKind::Token(TokenData {
                kind: kind.to_string(),
                code,
                position,
            }),
        ));
        self.chain.register(id);
        id
    }

    /// Add lexed tokens, linked in order into one chain
    pub fn add_lexed(&mut self, tokens: &[LexedToken]) -> Vec<NodeId> {
        let mut ids = Vec::with_capacity(tokens.len());
        for token in tokens {
            let id = self.add_token(&token.kind, token.code.clone(), token.position);
            if let Some(&prev) = ids.last() {
                self.chain.append(prev, id);
            }
            ids.push(id);
        }
        ids
    }

    /// Add a branch adopting `children`
    pub fn add_branch(&mut self, key: &str, children: Vec<NodeId>) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        for &child in &children {
            self.nodes[child.index()].parent = Some(id);
        }
        self.nodes.push(Node::new(
            key.to_string(),
            NodeKind::Branch(BranchData::new(children)),
        ));
        id
    }

    /// Insert trivia in front of the existing prepended trivia of `host`
    pub fn prepend_trivia(&mut self, host: NodeId, trivia: &[NodeId]) {
        for &t in trivia {
            self.node_mut(t).parent = Some(host);
        }
        let node = self.node_mut(host);
        node.prepended.splice(0..0, trivia.iter().copied());
    }

    /// Add trivia after the existing appended trivia of `host`
    pub fn append_trivia(&mut self, host: NodeId, trivia: &[NodeId]) {
        for &t in trivia {
            self.node_mut(t).parent = Some(host);
        }
        self.node_mut(host).appended.extend_from_slice(trivia);
    }

    /// Detach a node from its parent and open it up
    ///
    /// Returns the node's trivia and content in code order: prepended trivia,
    /// then the children of a branch or the token itself, then appended
    /// trivia. All returned nodes are parentless. A dissolved branch is left
    /// empty.
    pub(crate) fn dissolve(&mut self, id: NodeId) -> Vec<NodeId> {
        let node = self.node_mut(id);
        node.parent = None;
        let prepended = std::mem::take(&mut node.prepended);
        let appended = std::mem::take(&mut node.appended);
        let middle = match &mut node.kind {
            NodeKind::Token(_) => vec![id],
            NodeKind::Branch(branch) => {
                branch.child_index.clear();
                std::mem::take(&mut branch.children)
            }
        };

        let mut parts = prepended;
        parts.extend(middle);
        parts.extend(appended);
        for &part in &parts {
            self.node_mut(part).parent = None;
        }
        parts
    }

    /// Move every node of `other` into this arena
    ///
    /// Returns the id shift applied to `other`'s nodes; `other`'s root, if
    /// any, is at `other_root.index() + shift`.
    pub fn absorb(&mut self, other: SyntaxTree) -> usize {
        let shift = self.nodes.len();
        let move_id = |id: NodeId| NodeId::from_index(id.index() + shift);

        self.nodes.extend(other.nodes.into_iter().map(|mut node| {
            node.parent = node.parent.map(move_id);
            node.prepended.iter_mut().for_each(|id| *id = move_id(*id));
            node.appended.iter_mut().for_each(|id| *id = move_id(*id));
            if let NodeKind::Branch(branch) = &mut node.kind {
                branch.children.iter_mut().for_each(|id| *id = move_id(*id));
                branch.reindex();
            }
            node
        }));
        self.chain.absorb(other.chain, shift);
        shift
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Index of `child` among the children of `parent`
    pub fn child_index(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.node(parent)
            .as_branch()
            .and_then(|b| b.child_index.get(&child).copied())
    }

    /// Next sibling among the parent's children
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.child_index(parent, id)?;
        self.children(parent).get(index + 1).copied()
    }

    /// Previous sibling among the parent's children
    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.child_index(parent, id)?;
        index
            .checked_sub(1)
            .and_then(|i| self.children(parent).get(i).copied())
    }

    /// Trivia, children and trivia of `id` in code order
    pub fn all_children(&self, id: NodeId) -> Vec<NodeId> {
        let node = self.node(id);
        let mut all = node.prepended.clone();
        all.extend_from_slice(node.children());
        all.extend_from_slice(&node.appended);
        all
    }

    /// First of [`all_children`](Self::all_children)
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        let node = self.node(id);
        node.prepended
            .first()
            .or(node.children().first())
            .or(node.appended.first())
            .copied()
    }

    /// Last of [`all_children`](Self::all_children)
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        let node = self.node(id);
        node.appended
            .last()
            .or(node.children().last())
            .or(node.prepended.last())
            .copied()
    }

    /// First token in code order, trivia included
    pub fn first_token(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            let node = self.node(current);
            if let Some(&first) = node.prepended.first() {
                current = first;
                continue;
            }
            match &node.kind {
                NodeKind::Token(_) => return Some(current),
                NodeKind::Branch(branch) => {
                    current = *branch.children.first().or(node.appended.first())?;
                }
            }
        }
    }

    /// Last token in code order, trivia included
    pub fn last_token(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            let node = self.node(current);
            if let Some(&last) = node.appended.last() {
                current = last;
                continue;
            }
            match &node.kind {
                NodeKind::Token(_) => return Some(current),
                NodeKind::Branch(branch) => {
                    current = *branch.children.last().or(node.prepended.last())?;
                }
            }
        }
    }

    /// Token after `token` in file order
    pub fn next_token(&self, token: NodeId) -> Option<NodeId> {
        self.chain.next(token)
    }

    /// Token before `token` in file order
    pub fn previous_token(&self, token: NodeId) -> Option<NodeId> {
        self.chain.prev(token)
    }

    /// Nodes below `id` in pre-order: node, prepended, children, appended
    pub fn iterate(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            order.push(current);
            let node = self.node(current);
            stack.extend(node.appended.iter().rev());
            stack.extend(node.children().iter().rev());
            stack.extend(node.prepended.iter().rev());
        }
        order
    }

    /// Tokens below `id` in code order, trivia included
    pub fn collect_tokens(&self, id: NodeId) -> Vec<NodeId> {
        let mut tokens = Vec::new();
        let mut stack = vec![Visit::Enter(id)];
        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Emit(token) => tokens.push(token),
                Visit::Enter(current) => {
                    let node = self.node(current);
                    stack.extend(node.appended.iter().rev().map(|&n| Visit::Enter(n)));
                    stack.extend(node.children().iter().rev().map(|&n| Visit::Enter(n)));
                    if node.is_token() {
                        stack.push(Visit::Emit(current));
                    }
                    stack.extend(node.prepended.iter().rev().map(|&n| Visit::Enter(n)));
                }
            }
        }
        tokens
    }

    /// Decoded code of `id`, trivia included
    pub fn reconstruct_code(&self, id: NodeId) -> String {
        let mut code = String::new();
        for token in self.collect_tokens(id) {
            if let Some(data) = self.token(token) {
                code.push_str(data.code.as_str());
            }
        }
        code
    }

    /// Original bytes of `id`, trivia included
    pub fn reconstruct_bytes(&self, id: NodeId) -> Vec<u8> {
        let mut bytes = Vec::new();
        for token in self.collect_tokens(id) {
            if let Some(data) = self.token(token) {
                bytes.extend_from_slice(data.code.as_bytes());
            }
        }
        bytes
    }

    /// Position of the first token
    pub fn position(&self, id: NodeId) -> Option<Position> {
        self.first_token(id)
            .and_then(|t| self.token(t))
            .map(|t| t.position)
    }

    /// Position just past the last token
    pub fn end(&self, id: NodeId) -> Option<Position> {
        self.last_token(id)
            .and_then(|t| self.token(t))
            .map(|t| t.position.advance(t.code.as_str(), t.code.byte_len()))
    }

    /// Token of the root covering the byte `offset`
    pub fn find_at_offset(&self, offset: u64) -> Option<NodeId> {
        let first = self.first_token(self.root?)?;
        self.chain.iter_from(first).find(|&t| {
            self.token(t).is_some_and(|data| {
                let start = data.position.offset;
                offset >= start && offset < start + data.code.byte_len() as u64
            })
        })
    }

    // ========================================================================
    // Editing
    // ========================================================================

    /// Replace the code of a token
    ///
    /// The new token keeps the kind, position, trivia and tree position of
    /// the old one and takes its place in the token chain. It and all its
    /// ancestors are marked dirty. The old token is left detached.
    pub fn replace_token(&mut self, old: NodeId, code: CodedBuffer) -> Option<NodeId> {
        let (kind, position) = {
            let data = self.token(old)?;
            (data.kind.clone(), data.position)
        };
        let new = self.add_token(&kind, code, position);
        self.chain.insert_after(old, new);
        self.chain.remove(old);

        let parent = self.node(old).parent;
        if let Some(parent) = parent {
            let node = self.node_mut(parent);
            let slot = node
                .prepended
                .iter_mut()
                .chain(node.appended.iter_mut())
                .find(|id| **id == old);
            if let Some(slot) = slot {
                *slot = new;
            } else if let NodeKind::Branch(branch) = &mut node.kind {
                if let Some(index) = branch.child_index.remove(&old) {
                    branch.children[index] = new;
                    branch.child_index.insert(new, index);
                }
            }
        } else if self.root == Some(old) {
            self.root = Some(new);
        }

        let prepended = std::mem::take(&mut self.node_mut(old).prepended);
        let appended = std::mem::take(&mut self.node_mut(old).appended);
        self.node_mut(old).parent = None;
        self.node_mut(new).parent = parent;
        self.prepend_trivia(new, &prepended);
        self.append_trivia(new, &appended);

        self.mark_dirty(new);
        Some(new)
    }

    /// Mark `id` and its ancestors dirty
    pub fn mark_dirty(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(n) = current {
            let node = self.node_mut(n);
            node.dirty = true;
            current = node.parent;
        }
    }

    /// Whether the root was edited
    pub fn is_modified(&self) -> bool {
        self.root.is_some_and(|r| self.node(r).dirty)
    }

    /// Forget all edits markers
    pub fn clear_dirty(&mut self) {
        for node in &mut self.nodes {
            node.dirty = false;
        }
    }

    // ========================================================================
    // Semantics
    // ========================================================================

    /// Attach an annotation to a branch, replacing one of the same kind
    pub fn set_semantic(&mut self, id: NodeId, semantic: Semantic) {
        if let NodeKind::Branch(branch) = &mut self.node_mut(id).kind {
            branch.semantics.insert(semantic.kind.clone(), semantic);
        }
    }

    /// Annotation of `kind` on `id`
    pub fn semantic(&self, id: NodeId, kind: &str) -> Option<&Semantic> {
        self.node(id).as_branch()?.semantics.get(kind)
    }
}
