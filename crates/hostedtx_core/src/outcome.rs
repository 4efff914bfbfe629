//! Finalized-outcome cache for client failover.
//!
//! When a transaction commits or rolls back its hosted entry is discarded,
//! but a client that lost its connection mid-commit still needs to learn
//! what happened. The cache keeps the outcome of recently finalized
//! transactions, bounded both by entry count (oldest first) and by age.
//!
//! Lookups take a shared lock and treat expired outcomes as absent without
//! removing them; expired outcomes are dropped by writers and by
//! [`CommitOutcomeCache::prune`].

use crate::types::TransactionId;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct CachedOutcome<O> {
    outcome: O,
    recorded_at: Instant,
}

impl<O> CachedOutcome<O> {
    fn is_expired(&self, retention: Option<Duration>, now: Instant) -> bool {
        retention.is_some_and(|retention| {
            now.saturating_duration_since(self.recorded_at) >= retention
        })
    }
}

#[derive(Debug)]
struct CacheInner<O> {
    entries: HashMap<TransactionId, CachedOutcome<O>>,
    /// Record order. Entries are never refreshed, so this is also age order.
    order: VecDeque<TransactionId>,
}

impl<O> CacheInner<O> {
    fn evict_oldest(&mut self) -> Option<TransactionId> {
        let id = self.order.pop_front()?;
        self.entries.remove(&id);
        Some(id)
    }

    fn prune(&mut self, retention: Option<Duration>, now: Instant) -> usize {
        if retention.is_none() {
            return 0;
        }
        let mut pruned = 0;
        while let Some(id) = self.order.front() {
            let expired = self
                .entries
                .get(id)
                .map_or(true, |cached| cached.is_expired(retention, now));
            if !expired {
                break;
            }
            self.evict_oldest();
            pruned += 1;
        }
        pruned
    }
}

/// Concurrency-safe mapping from transaction id to its final outcome.
pub struct CommitOutcomeCache<O> {
    inner: RwLock<CacheInner<O>>,
    capacity: usize,
    retention: Option<Duration>,
}

impl<O: Clone> CommitOutcomeCache<O> {
    /// Creates an empty cache.
    ///
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize, retention: Option<Duration>) -> Self {
        Self {
            inner: RwLock::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity: capacity.max(1),
            retention,
        }
    }

    /// Records the outcome of a finalized transaction.
    ///
    /// Returns false and keeps the earlier outcome if one is already cached.
    pub fn record(&self, id: TransactionId, outcome: O) -> bool {
        self.record_at(id, outcome, Instant::now())
    }

    pub(crate) fn record_at(&self, id: TransactionId, outcome: O, now: Instant) -> bool {
        let mut inner = self.inner.write();
        inner.prune(self.retention, now);
        if inner.entries.contains_key(&id) {
            return false;
        }

        while inner.entries.len() >= self.capacity {
            match inner.evict_oldest() {
                Some(evicted) => tracing::trace!(txid = %evicted, "outcome evicted for capacity"),
                None => break,
            }
        }
        inner.entries.insert(
            id,
            CachedOutcome {
                outcome,
                recorded_at: now,
            },
        );
        inner.order.push_back(id);
        true
    }

    /// Returns the cached outcome for `id`, if still retained.
    #[must_use]
    pub fn get(&self, id: &TransactionId) -> Option<O> {
        self.get_at(id, Instant::now())
    }

    pub(crate) fn get_at(&self, id: &TransactionId, now: Instant) -> Option<O> {
        let inner = self.inner.read();
        inner
            .entries
            .get(id)
            .filter(|cached| !cached.is_expired(self.retention, now))
            .map(|cached| cached.outcome.clone())
    }

    /// Returns true if an outcome is retained for `id`.
    #[must_use]
    pub fn contains(&self, id: &TransactionId) -> bool {
        self.contains_at(id, Instant::now())
    }

    pub(crate) fn contains_at(&self, id: &TransactionId, now: Instant) -> bool {
        self.inner
            .read()
            .entries
            .get(id)
            .is_some_and(|cached| !cached.is_expired(self.retention, now))
    }

    /// Drops every outcome older than the retention period.
    ///
    /// Returns the number of outcomes removed.
    pub fn prune(&self) -> usize {
        self.prune_at(Instant::now())
    }

    pub(crate) fn prune_at(&self, now: Instant) -> usize {
        self.inner.write().prune(self.retention, now)
    }

    /// Returns the number of retained outcomes, including any that have
    /// expired but not yet been pruned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Returns true if nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// Returns the capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<O> std::fmt::Debug for CommitOutcomeCache<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitOutcomeCache")
            .field("len", &self.inner.read().entries.len())
            .field("capacity", &self.capacity)
            .field("retention", &self.retention)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MemberId;

    fn txid(seq: u64) -> TransactionId {
        TransactionId::new(MemberId::nil(), seq)
    }

    #[test]
    fn record_and_get() {
        let cache = CommitOutcomeCache::new(10, None);
        assert!(cache.record(txid(1), "committed"));
        assert_eq!(cache.get(&txid(1)), Some("committed"));
        assert!(cache.get(&txid(2)).is_none());
    }

    #[test]
    fn second_record_is_noop() {
        let cache = CommitOutcomeCache::new(10, None);
        assert!(cache.record(txid(1), "committed"));
        assert!(!cache.record(txid(1), "rolled back"));
        assert_eq!(cache.get(&txid(1)), Some("committed"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let cache = CommitOutcomeCache::new(2, None);
        cache.record(txid(1), 1);
        cache.record(txid(2), 2);
        cache.record(txid(3), 3);

        assert!(!cache.contains(&txid(1)));
        assert_eq!(cache.get(&txid(2)), Some(2));
        assert_eq!(cache.get(&txid(3)), Some(3));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn expired_outcomes_are_absent() {
        let retention = Duration::from_secs(60);
        let cache = CommitOutcomeCache::new(10, Some(retention));
        let start = Instant::now();

        cache.record_at(txid(1), 1, start);
        cache.record_at(txid(2), 2, start + Duration::from_secs(30));

        assert_eq!(cache.get_at(&txid(1), start + Duration::from_secs(59)), Some(1));
        assert_eq!(cache.get_at(&txid(1), start + Duration::from_secs(61)), None);
        assert_eq!(cache.get_at(&txid(2), start + Duration::from_secs(61)), Some(2));
    }

    #[test]
    fn lookups_leave_expired_outcomes_to_prune() {
        let cache = CommitOutcomeCache::new(10, Some(Duration::from_secs(60)));
        let start = Instant::now();
        cache.record_at(txid(1), 1, start);

        let later = start + Duration::from_secs(61);
        assert_eq!(cache.get_at(&txid(1), later), None);
        assert!(!cache.contains_at(&txid(1), later));
        assert_eq!(cache.len(), 1);

        assert_eq!(cache.prune_at(later), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_lookups_share_the_lock() {
        let cache = CommitOutcomeCache::new(10, None);
        cache.record(txid(1), 1);

        // A reader holding the lock must not stop other readers.
        let guard = cache.inner.read();
        let seen = std::thread::scope(|scope| {
            scope.spawn(|| cache.get(&txid(1))).join().unwrap()
        });
        drop(guard);
        assert_eq!(seen, Some(1));
    }

    #[test]
    fn prune_counts_removed() {
        let cache = CommitOutcomeCache::new(10, Some(Duration::from_secs(5)));
        let start = Instant::now();
        for seq in 0..4 {
            cache.record_at(txid(seq), seq, start + Duration::from_secs(seq));
        }

        assert_eq!(cache.prune_at(start + Duration::from_secs(7)), 3);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.prune_at(start + Duration::from_secs(7)), 0);
    }

    #[test]
    fn no_retention_keeps_forever() {
        let cache = CommitOutcomeCache::new(10, None);
        let start = Instant::now();
        cache.record_at(txid(1), 1, start);
        assert_eq!(
            cache.get_at(&txid(1), start + Duration::from_secs(86_400)),
            Some(1)
        );
    }

    #[test]
    fn zero_capacity_is_one() {
        let cache = CommitOutcomeCache::new(0, None);
        assert_eq!(cache.capacity(), 1);
        cache.record(txid(1), 1);
        cache.record(txid(2), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&txid(2)));
    }
}
