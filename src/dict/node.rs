//! Arena storage for dict entries.
//!
//! Nodes live in a free-list-backed `Slab` and are addressed by stable
//! [`NodeId`] indices rather than raw pointers, so the order list and index
//! can hold interior references to a node without borrowing it directly.

/// Stable handle to a node inside a [`Slab`].
///
/// Indices are reused once a node is removed, but a `NodeId` is only ever
/// handed out for a currently occupied slot, so callers never need to
/// generation-tag it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(usize);

/// One entry of the dict: a key/value pair, its precomputed hash, and the
/// doubly-linked recency pointers threaded by [`super::order_list::OrderList`].
pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) hash: u64,
    pub(crate) prev: Option<NodeId>,
    pub(crate) next: Option<NodeId>,
}

enum Slot<K, V> {
    Occupied(Node<K, V>),
    Free(Option<usize>),
}

/// Free-list arena owning every node currently in the dict.
///
/// Removed slots are threaded onto an internal free list so that a long
/// sequence of insert/evict cycles reuses storage instead of growing
/// without bound.
pub(crate) struct Slab<K, V> {
    slots: Vec<Slot<K, V>>,
    free_head: Option<usize>,
    len: usize,
}

impl<K, V> Slab<K, V> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_head: None,
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn insert(&mut self, node: Node<K, V>) -> NodeId {
        self.len += 1;
        match self.free_head {
            Some(idx) => {
                let Slot::Free(next_free) = self.slots[idx] else {
                    unreachable!("free_head always points at a Free slot")
                };
                self.free_head = next_free;
                self.slots[idx] = Slot::Occupied(node);
                NodeId(idx)
            }
            None => {
                self.slots.push(Slot::Occupied(node));
                NodeId(self.slots.len() - 1)
            }
        }
    }

    pub(crate) fn remove(&mut self, id: NodeId) -> Node<K, V> {
        let slot = std::mem::replace(&mut self.slots[id.0], Slot::Free(self.free_head));
        self.free_head = Some(id.0);
        self.len -= 1;
        match slot {
            Slot::Occupied(node) => node,
            Slot::Free(_) => unreachable!("remove() called on an already-free NodeId"),
        }
    }

    pub(crate) fn get(&self, id: NodeId) -> &Node<K, V> {
        match &self.slots[id.0] {
            Slot::Occupied(node) => node,
            Slot::Free(_) => unreachable!("get() called on a free NodeId"),
        }
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut Node<K, V> {
        match &mut self.slots[id.0] {
            Slot::Occupied(node) => node,
            Slot::Free(_) => unreachable!("get_mut() called on a free NodeId"),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free_head = None;
        self.len = 0;
    }
}
