//! Hash index over the dict's arena.
//!
//! A small separate-chaining table keyed by a precomputed `u64` hash. Every
//! public [`LruDict`](super::core::LruDict) operation hashes its key exactly
//! once in [`super::core`] before ever touching this index; the index
//! itself never calls `Hash::hash` again, including during resize, because
//! each bucket entry carries the hash it was inserted with.

use super::node::{NodeId, Slab};

/// Separate-chaining hash table mapping a precomputed hash to the node(s)
/// that share it.
pub(crate) struct Index {
    buckets: Vec<Vec<(u64, NodeId)>>,
    len: usize,
}

impl Index {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let slots = capacity.max(1).next_power_of_two();
        Self {
            buckets: vec![Vec::new(); slots],
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    fn slot(&self, hash: u64) -> usize {
        (hash as usize) & (self.buckets.len() - 1)
    }

    /// Finds the node carrying `hash` whose key equals `key`, resolving
    /// collisions with `Eq` rather than recomputing the hash.
    pub(crate) fn find<K, V>(&self, slab: &Slab<K, V>, hash: u64, key: &K) -> Option<NodeId>
    where
        K: Eq,
    {
        self.buckets[self.slot(hash)]
            .iter()
            .find(|(h, id)| *h == hash && &slab.get(*id).key == key)
            .map(|(_, id)| *id)
    }

    pub(crate) fn insert(&mut self, hash: u64, id: NodeId) {
        if self.len + 1 > self.buckets.len() * 3 / 4 {
            self.grow();
        }
        let slot = self.slot(hash);
        self.buckets[slot].push((hash, id));
        self.len += 1;
    }

    pub(crate) fn remove(&mut self, hash: u64, id: NodeId) {
        let slot = self.slot(hash);
        if let Some(pos) = self.buckets[slot].iter().position(|&(_, n)| n == id) {
            self.buckets[slot].swap_remove(pos);
            self.len -= 1;
        }
    }

    fn grow(&mut self) {
        let new_len = self.buckets.len() * 2;
        let mut new_buckets = vec![Vec::new(); new_len];
        for bucket in self.buckets.drain(..) {
            for (hash, id) in bucket {
                let slot = (hash as usize) & (new_len - 1);
                new_buckets[slot].push((hash, id));
            }
        }
        self.buckets = new_buckets;
    }

    pub(crate) fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.len = 0;
    }
}
