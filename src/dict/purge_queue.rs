//! Deferred eviction-callback delivery.
//!
//! Evicted `(key, value)` pairs are appended here while the dict's critical
//! section is held, then claimed and handed to the user's eviction callback
//! strictly after that section ends. This is what lets the callback run
//! arbitrary foreign code — including code that calls back into the same
//! [`LruDict`](super::core::LruDict) — without ever doing so while the
//! internal structure is locked.

/// Default ceiling on concurrently active drain workers. A pathological
/// callback that re-enters the dict and evicts more items can otherwise
/// drive unbounded indirect recursion through nested drains; once this many
/// workers are already claiming, a further claim attempt aborts fast and
/// leaves its items queued for the next opportunity.
pub(crate) const DEFAULT_PENDING_MAX: usize = 65_535;

/// Queue of evicted pairs awaiting callback delivery.
///
/// `pending` counts concurrently active drain workers — callers currently
/// between [`PurgeQueue::try_claim`] and [`PurgeQueue::reclaim`] — not queued
/// items. `append` is unconditional and never refuses: the queue itself has
/// no capacity bound, only the number of simultaneous drainers does.
pub(crate) struct PurgeQueue<K, V> {
    items: Vec<(K, V)>,
    pending: usize,
    max_pending: usize,
}

impl<K, V> PurgeQueue<K, V> {
    pub(crate) fn new(max_pending: usize) -> Self {
        Self {
            items: Vec::new(),
            pending: 0,
            max_pending,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn max_pending(&self) -> usize {
        self.max_pending
    }

    pub(crate) fn set_max_pending(&mut self, max_pending: usize) {
        self.max_pending = max_pending;
    }

    /// Appends an evicted pair. Never refuses: the purge queue has no
    /// capacity limit of its own, so every evicted entry is guaranteed a
    /// path to the callback (see `PurgeQueue::try_claim` for the one
    /// place concurrency is bounded).
    pub(crate) fn append(&mut self, key: K, value: V) {
        self.items.push((key, value));
    }

    /// Claims every item currently queued as a single snapshot, leaving the
    /// queue free to accept new appends immediately, and marks one more
    /// drain worker as active. Returns `None` without claiming anything if
    /// `PENDING_MAX` workers are already active — the caller should leave
    /// the items queued and try again later.
    pub(crate) fn try_claim(&mut self) -> Option<Vec<(K, V)>> {
        if self.pending >= self.max_pending {
            return None;
        }
        self.pending += 1;
        Some(std::mem::take(&mut self.items))
    }

    /// Marks the calling drain worker as finished, regardless of whether
    /// delivery to the callback succeeded, so a later `try_claim` can use
    /// its slot again.
    pub(crate) fn reclaim(&mut self) {
        self.pending = self.pending.saturating_sub(1);
    }

    pub(crate) fn clear(&mut self) -> Vec<(K, V)> {
        self.pending = 0;
        std::mem::take(&mut self.items)
    }
}
