//! Token chains
//!
//! Tokens of one contiguous lexed region are linked through `prev`/`next`
//! independently of the tree shape. Each chain also knows its first and
//! last token. Splicing two chains must not touch every token, so
//! endpoints live in a union-find forest: a token points at an end cell,
//! end cells forward to the cell of the merged chain, and only the root
//! cell holds the current endpoints. Resolution compresses paths, so
//! repeated lookups are amortized O(1).
//!
//! Splicing a chain into itself is a contract violation and panics.

use super::tree::NodeId;
use std::cell::Cell;

const SELF_SPLICE: &str = "cannot splice a token chain into itself";

#[derive(Debug, Clone)]
struct Link {
    prev: Option<NodeId>,
    next: Option<NodeId>,
    /// End cell, possibly stale; resolved through `forward`
    end: Cell<u32>,
}

#[derive(Debug, Clone)]
struct EndCell {
    forward: Cell<u32>,
    first: NodeId,
    last: NodeId,
    size: u32,
}

/// Doubly-linked token order with shared endpoints
#[derive(Debug, Clone, Default)]
pub struct TokenChain {
    links: Vec<Option<Link>>,
    ends: Vec<EndCell>,
}

impl TokenChain {
    /// Create an empty chain set
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `token` a chain of its own
    pub fn register(&mut self, token: NodeId) {
        let index = token.index();
        if self.links.len() <= index {
            self.links.resize(index + 1, None);
        }
        let end = self.new_end(token);
        self.links[index] = Some(Link {
            prev: None,
            next: None,
            end: Cell::new(end),
        });
    }

    fn new_end(&mut self, token: NodeId) -> u32 {
        let cell = self.ends.len() as u32;
        self.ends.push(EndCell {
            forward: Cell::new(cell),
            first: token,
            last: token,
            size: 1,
        });
        cell
    }

    /// Whether `token` was registered
    pub fn contains(&self, token: NodeId) -> bool {
        matches!(self.links.get(token.index()), Some(Some(_)))
    }

    fn link(&self, token: NodeId) -> &Link {
        match self.links.get(token.index()) {
            Some(Some(link)) => link,
            _ => panic!("{token:?} is not part of a token chain"),
        }
    }

    fn link_mut(&mut self, token: NodeId) -> &mut Link {
        match self.links.get_mut(token.index()) {
            Some(Some(link)) => link,
            _ => panic!("{token:?} is not part of a token chain"),
        }
    }

    fn find(&self, cell: u32) -> u32 {
        let mut root = cell;
        loop {
            let up = self.ends[root as usize].forward.get();
            if up == root {
                break;
            }
            root = up;
        }

        let mut current = cell;
        while current != root {
            let up = self.ends[current as usize].forward.get();
            self.ends[current as usize].forward.set(root);
            current = up;
        }
        root
    }

    fn root_of(&self, token: NodeId) -> u32 {
        let link = self.link(token);
        let root = self.find(link.end.get());
        link.end.set(root);
        root
    }

    /// Join two roots; the larger set keeps its cell
    fn union(&mut self, a: u32, b: u32, first: NodeId, last: NodeId) {
        let (root, child) = if self.ends[a as usize].size >= self.ends[b as usize].size {
            (a, b)
        } else {
            (b, a)
        };
        self.ends[child as usize].forward.set(root);
        let size = self.ends[a as usize].size + self.ends[b as usize].size;
        let cell = &mut self.ends[root as usize];
        cell.first = first;
        cell.last = last;
        cell.size = size;
    }

    /// First token of the chain containing `token`
    ///
    /// # Panics
    /// If `token` was never registered.
    pub fn first(&self, token: NodeId) -> NodeId {
        self.ends[self.root_of(token) as usize].first
    }

    /// Last token of the chain containing `token`
    ///
    /// # Panics
    /// If `token` was never registered.
    pub fn last(&self, token: NodeId) -> NodeId {
        self.ends[self.root_of(token) as usize].last
    }

    /// Token after `token`
    pub fn next(&self, token: NodeId) -> Option<NodeId> {
        self.link(token).next
    }

    /// Token before `token`
    pub fn prev(&self, token: NodeId) -> Option<NodeId> {
        self.link(token).prev
    }

    /// Whether both tokens are in one chain
    pub fn same_chain(&self, a: NodeId, b: NodeId) -> bool {
        self.root_of(a) == self.root_of(b)
    }

    /// Append the chain containing `tail` after the chain containing `head`
    pub fn append(&mut self, head: NodeId, tail: NodeId) {
        let ra = self.root_of(head);
        let rb = self.root_of(tail);
        assert!(ra != rb, "{}", SELF_SPLICE);

        let a = &self.ends[ra as usize];
        let (first, a_last) = (a.first, a.last);
        let b = &self.ends[rb as usize];
        let (b_first, last) = (b.first, b.last);

        self.link_mut(a_last).next = Some(b_first);
        self.link_mut(b_first).prev = Some(a_last);
        self.union(ra, rb, first, last);
    }

    /// Splice the chain containing `other` directly after `anchor`
    pub fn insert_after(&mut self, anchor: NodeId, other: NodeId) {
        let ra = self.root_of(anchor);
        let rb = self.root_of(other);
        assert!(ra != rb, "{}", SELF_SPLICE);

        let (b_first, b_last) = {
            let b = &self.ends[rb as usize];
            (b.first, b.last)
        };
        let after = self.link(anchor).next;

        self.link_mut(anchor).next = Some(b_first);
        self.link_mut(b_first).prev = Some(anchor);
        self.link_mut(b_last).next = after;
        if let Some(after) = after {
            self.link_mut(after).prev = Some(b_last);
        }

        let a = &self.ends[ra as usize];
        let first = a.first;
        let last = if after.is_some() { a.last } else { b_last };
        self.union(ra, rb, first, last);
    }

    /// Splice the chain containing `other` directly before `anchor`
    pub fn insert_before(&mut self, anchor: NodeId, other: NodeId) {
        let ra = self.root_of(anchor);
        let rb = self.root_of(other);
        assert!(ra != rb, "{}", SELF_SPLICE);

        let (b_first, b_last) = {
            let b = &self.ends[rb as usize];
            (b.first, b.last)
        };
        let before = self.link(anchor).prev;

        self.link_mut(anchor).prev = Some(b_last);
        self.link_mut(b_last).next = Some(anchor);
        self.link_mut(b_first).prev = before;
        if let Some(before) = before {
            self.link_mut(before).next = Some(b_first);
        }

        let a = &self.ends[ra as usize];
        let first = if before.is_some() { a.first } else { b_first };
        let last = a.last;
        self.union(ra, rb, first, last);
    }

    /// Unlink `token`, leaving it as a chain of its own
    pub fn remove(&mut self, token: NodeId) {
        let root = self.root_of(token);
        let (prev, next) = {
            let link = self.link(token);
            (link.prev, link.next)
        };

        if let Some(prev) = prev {
            self.link_mut(prev).next = next;
        }
        if let Some(next) = next {
            self.link_mut(next).prev = prev;
        }

        let cell = &mut self.ends[root as usize];
        if cell.first == token {
            if let Some(next) = next {
                cell.first = next;
            }
        }
        if cell.last == token {
            if let Some(prev) = prev {
                cell.last = prev;
            }
        }
        cell.size = cell.size.saturating_sub(1).max(1);

        let end = self.new_end(token);
        let link = self.link_mut(token);
        link.prev = None;
        link.next = None;
        link.end.set(end);
    }

    /// Tokens from `token` to the end of its chain
    pub fn iter_from(&self, token: NodeId) -> ChainIter<'_> {
        ChainIter {
            chain: self,
            next: Some(token),
        }
    }

    /// All tokens of the chain containing `token`
    pub fn collect(&self, token: NodeId) -> Vec<NodeId> {
        self.iter_from(self.first(token)).collect()
    }

    /// Take over the chains of another tree whose node ids are shifted by
    /// `shift`
    pub(crate) fn absorb(&mut self, other: TokenChain, shift: usize) {
        let move_id = |id: NodeId| NodeId::from_index(id.index() + shift);
        let end_shift = self.ends.len() as u32;

        if self.links.len() < shift {
            self.links.resize(shift, None);
        }
        self.links.extend(other.links.into_iter().map(|link| {
            link.map(|l| Link {
                prev: l.prev.map(move_id),
                next: l.next.map(move_id),
                end: Cell::new(l.end.get() + end_shift),
            })
        }));
        self.ends.extend(other.ends.into_iter().map(|e| EndCell {
            forward: Cell::new(e.forward.get() + end_shift),
            first: move_id(e.first),
            last: move_id(e.last),
            size: e.size,
        }));
    }
}

/// Forward iterator over a chain
pub struct ChainIter<'a> {
    chain: &'a TokenChain,
    next: Option<NodeId>,
}

impl Iterator for ChainIter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.chain.next(current);
        Some(current)
    }
}
