//! Registry of hosted transaction entries.
//!
//! The registry maps each [`TransactionId`] to the entry that currently
//! represents it. At most one entry is registered per id at any instant;
//! readers observe absence, one entry, or a later replacement.
//!
//! The map is a [`DashMap`], so ids on different shards never contend.
//! Creation builds the new entry outside any shard lock and then inserts it
//! through the shard's entry API, so concurrent `get_or_create` calls for
//! one id always agree on the resulting entry. The coordinator holds a
//! shard entry guard across multi-structure steps (finalize, slot reclaim).

use crate::error::{HostedTxError, HostedTxResult};
use crate::hosted::HostedTransaction;
use crate::types::{EntryHandle, TransactionId, TransactionOrigin};
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::Ref;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub(crate) type RegistryEntry<'a, S> = Entry<'a, TransactionId, Arc<HostedTransaction<S>>>;

/// Concurrency-safe mapping from transaction id to its current entry.
pub struct TransactionRegistry<S> {
    entries: DashMap<TransactionId, Arc<HostedTransaction<S>>>,
    next_handle: AtomicU64,
}

impl<S> TransactionRegistry<S> {
    /// Creates an empty registry split into `shard_count` shards.
    ///
    /// The count is rounded up to a power of two, and to at least two.
    pub fn new(shard_count: usize) -> Self {
        let shards = shard_count.max(2).next_power_of_two();
        Self {
            entries: DashMap::with_capacity_and_shard_amount(0, shards),
            next_handle: AtomicU64::new(1),
        }
    }

    fn mint(
        &self,
        id: TransactionId,
        origin: TransactionOrigin,
        state: S,
    ) -> Arc<HostedTransaction<S>> {
        let handle = EntryHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed));
        Arc::new(HostedTransaction::new(id, handle, origin, state))
    }

    /// Returns the entry for `id`, creating it if absent and `eligible`.
    ///
    /// `eligible` and `init` run without any registry lock held and may use
    /// the registry. When several callers race to create one id, each may
    /// build a state but only one entry is registered; the others drop
    /// theirs and return the winner.
    pub fn get_or_create<E, F>(
        &self,
        id: TransactionId,
        origin: TransactionOrigin,
        eligible: E,
        init: F,
    ) -> HostedTxResult<Arc<HostedTransaction<S>>>
    where
        E: FnOnce(&TransactionId) -> bool,
        F: FnOnce(&TransactionId) -> S,
    {
        self.get_or_create_admitted(id, origin, eligible, |_| true, init)
            .map(|(entry, _)| entry)
    }

    /// Like [`get_or_create`](Self::get_or_create), with an extra `admit`
    /// check evaluated while the shard is write-locked, just before the
    /// insert. `admit` must not touch the registry.
    ///
    /// Also returns whether this call registered the entry.
    pub(crate) fn get_or_create_admitted<E, A, F>(
        &self,
        id: TransactionId,
        origin: TransactionOrigin,
        eligible: E,
        admit: A,
        init: F,
    ) -> HostedTxResult<(Arc<HostedTransaction<S>>, bool)>
    where
        E: FnOnce(&TransactionId) -> bool,
        A: FnOnce(&TransactionId) -> bool,
        F: FnOnce(&TransactionId) -> S,
    {
        if let Some(existing) = self.lookup(&id) {
            return Ok((existing, false));
        }
        if !eligible(&id) {
            // Another caller may have created it meanwhile.
            return match self.lookup(&id) {
                Some(existing) => Ok((existing, false)),
                None => Err(HostedTxError::not_eligible(id)),
            };
        }

        let candidate = self.mint(id, origin, init(&id));
        match self.entries.entry(id) {
            Entry::Occupied(occupied) => Ok((Arc::clone(occupied.get()), false)),
            Entry::Vacant(vacant) => {
                if !admit(&id) {
                    return Err(HostedTxError::not_eligible(id));
                }
                vacant.insert(Arc::clone(&candidate));
                tracing::trace!(txid = %id, handle = %candidate.handle(), "hosted entry created");
                Ok((candidate, true))
            }
        }
    }

    /// Returns the current entry for `id`. Never blocks on entry locks and
    /// never creates.
    #[must_use]
    pub fn lookup(&self, id: &TransactionId) -> Option<Arc<HostedTransaction<S>>> {
        self.entries.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Unregisters the entry for `id`, if any.
    ///
    /// Idempotent. The entry's lock is untouched; a thread holding it can
    /// finish and release normally.
    pub fn remove(&self, id: &TransactionId) -> Option<Arc<HostedTransaction<S>>> {
        let removed = self.entries.remove(id).map(|(_, entry)| entry);
        if let Some(entry) = &removed {
            tracing::trace!(txid = %id, handle = %entry.handle(), "hosted entry removed");
        }
        removed
    }

    /// Returns true if an entry is registered for `id`.
    #[must_use]
    pub fn contains(&self, id: &TransactionId) -> bool {
        self.entries.contains_key(id)
    }

    /// Returns the number of registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entries are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the ids of all registered entries, in no particular order.
    #[must_use]
    pub fn ids(&self) -> Vec<TransactionId> {
        self.entries.iter().map(|entry| *entry.key()).collect()
    }

    /// Read-locks the shard holding `id` while the returned guard lives.
    pub(crate) fn get(
        &self,
        id: &TransactionId,
    ) -> Option<Ref<'_, TransactionId, Arc<HostedTransaction<S>>>> {
        self.entries.get(id)
    }

    /// Write-locks the shard holding `id` for a multi-step transition.
    pub(crate) fn entry(&self, id: TransactionId) -> RegistryEntry<'_, S> {
        self.entries.entry(id)
    }
}

impl<S> Default for TransactionRegistry<S> {
    fn default() -> Self {
        Self::new(16)
    }
}

impl<S> std::fmt::Debug for TransactionRegistry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionRegistry")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
