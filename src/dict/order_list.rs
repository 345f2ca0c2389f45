//! Recency ordering for the dict.
//!
//! An intrusive doubly linked list threaded through [`Slab`] nodes. The head
//! is the most recently used entry, the tail the least recently used, so
//! eviction is always a pop from the tail and promotion is always a move to
//! the head. Every operation here is O(1) and never touches foreign code:
//! adjusting `prev`/`next` pointers cannot invoke a key's `Hash`/`Eq` impl or
//! a value's destructor.

use super::node::{NodeId, Slab};

/// Head/tail cursors for the recency list. Owns no nodes itself; all node
/// storage lives in the [`Slab`] passed to each method.
#[derive(Default)]
pub(crate) struct OrderList {
    head: Option<NodeId>,
    tail: Option<NodeId>,
}

impl OrderList {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn front(&self) -> Option<NodeId> {
        self.head
    }

    pub(crate) fn back(&self) -> Option<NodeId> {
        self.tail
    }

    /// Unlinks `id` from wherever it currently sits in the list.
    pub(crate) fn detach<K, V>(&mut self, slab: &mut Slab<K, V>, id: NodeId) {
        let (prev, next) = {
            let node = slab.get(id);
            (node.prev, node.next)
        };

        match prev {
            Some(p) => slab.get_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => slab.get_mut(n).prev = prev,
            None => self.tail = prev,
        }

        let node = slab.get_mut(id);
        node.prev = None;
        node.next = None;
    }

    /// Links `id` in at the head (most recently used position).
    pub(crate) fn push_front<K, V>(&mut self, slab: &mut Slab<K, V>, id: NodeId) {
        let old_head = self.head;
        {
            let node = slab.get_mut(id);
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            slab.get_mut(h).prev = Some(id);
        }
        self.head = Some(id);
        if self.tail.is_none() {
            self.tail = Some(id);
        }
    }

    /// Moves an already-linked node to the head. No-op if it is already
    /// the head.
    pub(crate) fn promote<K, V>(&mut self, slab: &mut Slab<K, V>, id: NodeId) {
        if self.head == Some(id) {
            return;
        }
        self.detach(slab, id);
        self.push_front(slab, id);
    }

    /// Detaches and returns the tail (least recently used) node, if any.
    pub(crate) fn pop_back<K, V>(&mut self, slab: &mut Slab<K, V>) -> Option<NodeId> {
        let id = self.tail?;
        self.detach(slab, id);
        Some(id)
    }

    pub(crate) fn clear(&mut self) {
        self.head = None;
        self.tail = None;
    }
}
