//! Transaction coordinator.
//!
//! The coordinator owns the registry and the outcome cache and implements
//! the protocol by which a worker thread becomes the authoritative executor
//! of a transaction for the duration of one command ("masquerading").
//!
//! ## Per-id states
//!
//! Each transaction id is in exactly one of three states, see
//! [`TransactionSlot`]:
//!
//! | from \ event     | get_or_create | remove  | finalize   | get_lock(E)                 |
//! |------------------|---------------|---------|------------|-----------------------------|
//! | `Absent`         | `Registered`  | -       | `Finalized`| `Registered(E)` (reclaim)   |
//! | `Registered(E)`  | -             | `Absent`| `Finalized`| -                           |
//! | `Registered(E2)` | -             | `Absent`| `Finalized`| `Denied`                    |
//! | `Finalized`      | `NotEligible` | -       | - (no-op)  | `GrantedButFinalized`       |
//!
//! Every transition is decided under the registry shard lock for the id,
//! and finalize removes the entry and records the outcome under that same
//! lock, so no thread ever observes an id as both registered and finalized.
//! Entry locks are never awaited, and caller-supplied closures never run,
//! while a shard lock is held.

use crate::command::TransactionalCommand;
use crate::config::Config;
use crate::error::{HostedTxError, HostedTxResult};
use crate::hosted::{HeldTransaction, HostedTransaction};
use crate::interrupt::Interrupt;
use crate::outcome::CommitOutcomeCache;
use crate::registry::TransactionRegistry;
use dashmap::mapref::entry::Entry;
use crate::stats::CoordinatorStats;
use crate::types::{MemberId, TransactionId, TransactionOrigin};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Builds the opaque state for a newly hosted transaction.
pub type StateFactory<S> = Box<dyn Fn(&TransactionId, TransactionOrigin) -> S + Send + Sync>;

/// Result of validating and locking a candidate entry.
pub enum LockOutcome<S> {
    /// The entry is current and now held by the caller.
    Granted(HeldTransaction<S>),
    /// The transaction was finalized; the entry is held but must only be
    /// observed and torn down.
    GrantedButFinalized(HeldTransaction<S>),
    /// The entry was replaced. Discard it and start over from
    /// `get_or_create` if the command still needs servicing.
    Denied,
}

impl<S> LockOutcome<S> {
    /// Returns true for [`LockOutcome::Granted`].
    #[must_use]
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    /// Returns true for [`LockOutcome::GrantedButFinalized`].
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        matches!(self, Self::GrantedButFinalized(_))
    }

    /// Returns true for [`LockOutcome::Denied`].
    #[must_use]
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied)
    }

    /// Returns the hold, if the lock was granted.
    #[must_use]
    pub fn into_held(self) -> Option<HeldTransaction<S>> {
        match self {
            Self::Granted(held) | Self::GrantedButFinalized(held) => Some(held),
            Self::Denied => None,
        }
    }
}

/// What currently represents a transaction id.
pub enum TransactionSlot<S, O> {
    /// A live entry is hosted.
    Registered(Arc<HostedTransaction<S>>),
    /// Nothing is hosted and no outcome is retained.
    Absent,
    /// The transaction finished with this outcome.
    Finalized(O),
}

impl<S> std::fmt::Debug for LockOutcome<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Granted(held) => f.debug_tuple("Granted").field(held).finish(),
            Self::GrantedButFinalized(held) => {
                f.debug_tuple("GrantedButFinalized").field(held).finish()
            }
            Self::Denied => f.write_str("Denied"),
        }
    }
}

impl<S, O> TransactionSlot<S, O> {
    /// Returns true if a live entry is hosted.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        matches!(self, Self::Registered(_))
    }

    /// Returns true if neither an entry nor an outcome exists.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Returns true if an outcome is retained.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        matches!(self, Self::Finalized(_))
    }
}

impl<S, O: std::fmt::Debug> std::fmt::Debug for TransactionSlot<S, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registered(entry) => f.debug_tuple("Registered").field(entry).finish(),
            Self::Absent => f.write_str("Absent"),
            Self::Finalized(outcome) => f.debug_tuple("Finalized").field(outcome).finish(),
        }
    }
}

fn default_state<S: Default>(_: &TransactionId, _: TransactionOrigin) -> S {
    S::default()
}

/// What the shard-locked check found for a candidate entry.
enum Check {
    Current,
    Reclaimable,
    Finalized,
    Replaced,
}

/// Hosts transaction state for one member and arbitrates access to it.
///
/// `S` is the opaque per-transaction state; `O` is the outcome recorded
/// when a transaction is finalized.
pub struct TxCoordinator<S, O> {
    member: MemberId,
    config: Config,
    registry: TransactionRegistry<S>,
    outcomes: CommitOutcomeCache<O>,
    factory: StateFactory<S>,
    next_seq: AtomicU64,
    stats: CoordinatorStats,
}

impl<S, O: Clone> TxCoordinator<S, O> {
    /// Creates a coordinator for `member`.
    ///
    /// `factory` builds the state of every newly hosted transaction.
    pub fn new<F>(member: MemberId, config: Config, factory: F) -> HostedTxResult<Self>
    where
        F: Fn(&TransactionId, TransactionOrigin) -> S + Send + Sync + 'static,
    {
        config.validate()?;
        tracing::debug!(
            member = %member,
            shards = config.registry_shards,
            outcome_capacity = config.outcome_cache_capacity,
            "transaction coordinator started"
        );
        Ok(Self {
            member,
            registry: TransactionRegistry::new(config.registry_shards),
            outcomes: CommitOutcomeCache::new(
                config.outcome_cache_capacity,
                config.outcome_retention,
            ),
            factory: Box::new(factory),
            next_seq: AtomicU64::new(1),
            stats: CoordinatorStats::new(),
            config,
        })
    }

    /// Creates a coordinator whose transactions start from `S::default()`.
    pub fn with_default_state(member: MemberId, config: Config) -> HostedTxResult<Self>
    where
        S: Default + 'static,
    {
        Self::new(member, config, default_state::<S>)
    }

    /// Returns the member this coordinator runs on.
    #[must_use]
    pub fn member(&self) -> MemberId {
        self.member
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the coordinator counters.
    #[must_use]
    pub fn stats(&self) -> &CoordinatorStats {
        &self.stats
    }

    fn host(
        &self,
        id: TransactionId,
        origin: TransactionOrigin,
        eligible: impl FnOnce(&TransactionId) -> bool,
    ) -> HostedTxResult<Arc<HostedTransaction<S>>> {
        let result = self.registry.get_or_create_admitted(
            id,
            origin,
            |id| !self.outcomes.contains(id) && eligible(id),
            // Rechecked under the shard lock: a finalize may have landed
            // while the state was being built.
            |id| !self.outcomes.contains(id),
            |id| (self.factory)(id, origin),
        );
        match result {
            Ok((entry, created)) => {
                if created {
                    self.stats.record_created();
                }
                Ok(entry)
            }
            Err(err) => {
                if let HostedTxError::NotEligible { .. } = err {
                    self.stats.record_not_eligible();
                }
                Err(err)
            }
        }
    }

    /// Starts a transaction coordinated by this member and hosts it.
    pub fn begin_local(&self) -> HostedTxResult<Arc<HostedTransaction<S>>> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let id = TransactionId::new(self.member, seq);
        let entry = self.host(id, TransactionOrigin::Local, |_| true)?;
        tracing::debug!(txid = %id, handle = %entry.handle(), "local transaction started");
        Ok(entry)
    }

    /// Returns the entry for `id`, creating it if absent and `eligible`.
    ///
    /// Creation is refused while an outcome for `id` is retained.
    pub fn get_or_create(
        &self,
        id: TransactionId,
        eligible: impl FnOnce(&TransactionId) -> bool,
    ) -> HostedTxResult<Arc<HostedTransaction<S>>> {
        self.host(id, TransactionOrigin::Remote, eligible)
    }

    /// Returns the entry currently hosted for `id`.
    #[must_use]
    pub fn lookup(&self, id: &TransactionId) -> Option<Arc<HostedTransaction<S>>> {
        self.registry.lookup(id)
    }

    /// Unregisters the entry for `id` without finalizing it.
    ///
    /// Used by failover cleanup. A thread already holding the entry's lock
    /// keeps it, and may reclaim the slot through [`get_lock`](Self::get_lock).
    pub fn remove(&self, id: &TransactionId) -> Option<Arc<HostedTransaction<S>>> {
        let removed = self.registry.remove(id);
        if let Some(entry) = &removed {
            tracing::debug!(txid = %id, handle = %entry.handle(), "hosted transaction removed");
        }
        removed
    }

    /// Read-only check, used before waiting on the entry lock.
    fn is_replaced(&self, entry: &Arc<HostedTransaction<S>>) -> bool {
        self.registry
            .get(&entry.id())
            .is_some_and(|current| !current.same_entry(entry))
    }

    /// Decides the outcome for a locked entry, putting it back when its
    /// slot is empty and nothing was finalized.
    fn check(&self, entry: &Arc<HostedTransaction<S>>) -> Check {
        match self.registry.entry(entry.id()) {
            Entry::Occupied(current) if current.get().same_entry(entry) => Check::Current,
            Entry::Occupied(_) => Check::Replaced,
            Entry::Vacant(_) if entry.is_finalized() || self.outcomes.contains(&entry.id()) => {
                Check::Finalized
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::clone(entry));
                Check::Reclaimable
            }
        }
    }

    /// Decides whether `entry` still represents its transaction and, if
    /// so, locks it.
    ///
    /// - entry is current: lock it, `Granted`.
    /// - nothing hosted and nothing finalized: lock it and put it back in
    ///   the registry, `Granted`. This lets a worker that lost a race with
    ///   failover cleanup finish deterministically.
    /// - transaction finalized: lock it, `GrantedButFinalized`.
    /// - another entry is hosted: `Denied`, without locking.
    ///
    /// The decision is re-derived under the shard lock once the entry lock
    /// is held, so a removal, replacement or finalize that lands while the
    /// caller waits is reflected in the result. An interrupted wait leaves
    /// the registry untouched.
    pub fn get_lock(
        &self,
        entry: &Arc<HostedTransaction<S>>,
        interrupt: &Interrupt,
    ) -> HostedTxResult<LockOutcome<S>> {
        let id = entry.id();
        if self.is_replaced(entry) {
            self.stats.record_denied();
            tracing::debug!(txid = %id, handle = %entry.handle(), "stale entry denied");
            return Ok(LockOutcome::Denied);
        }

        if let Err(err) = entry.acquire(interrupt) {
            if err.is_interrupted() {
                self.stats.record_interrupted();
                tracing::debug!(txid = %id, "lock wait interrupted");
            }
            return Err(err);
        }

        match self.check(entry) {
            Check::Current => {
                self.stats.record_granted();
                tracing::trace!(txid = %id, handle = %entry.handle(), "lock granted");
                Ok(LockOutcome::Granted(HeldTransaction::new(Arc::clone(entry), false)))
            }
            Check::Reclaimable => {
                self.stats.record_granted();
                self.stats.record_reclaimed();
                tracing::debug!(
                    txid = %id,
                    handle = %entry.handle(),
                    "removed entry reclaimed"
                );
                Ok(LockOutcome::Granted(HeldTransaction::new(Arc::clone(entry), false)))
            }
            Check::Finalized => {
                self.stats.record_granted_finalized();
                tracing::debug!(
                    txid = %id,
                    handle = %entry.handle(),
                    "lock granted on finalized transaction"
                );
                Ok(LockOutcome::GrantedButFinalized(HeldTransaction::new(
                    Arc::clone(entry),
                    true,
                )))
            }
            Check::Replaced => {
                entry.release();
                self.stats.record_denied();
                tracing::debug!(
                    txid = %id,
                    handle = %entry.handle(),
                    "entry replaced while waiting"
                );
                Ok(LockOutcome::Denied)
            }
        }
    }

    /// Records the final outcome of `id` and discards its hosted entry, as
    /// one step with respect to [`get_lock`](Self::get_lock).
    ///
    /// Finalizing an already finalized transaction is a no-op; the first
    /// outcome is kept. Returns the entry that was hosted, if any.
    pub fn finalize(&self, id: TransactionId, outcome: O) -> Option<Arc<HostedTransaction<S>>> {
        let (removed, recorded) = match self.registry.entry(id) {
            Entry::Occupied(occupied) => {
                occupied.get().mark_finalized();
                let recorded = self.outcomes.record(id, outcome);
                (Some(occupied.remove()), recorded)
            }
            // Held so a reclaim cannot slip in before the outcome lands.
            Entry::Vacant(_vacant) => (None, self.outcomes.record(id, outcome)),
        };

        if recorded {
            self.stats.record_finalized();
            tracing::debug!(txid = %id, hosted = removed.is_some(), "transaction finalized");
        }
        removed
    }

    /// Returns the outcome of a recently finalized transaction.
    ///
    /// Lets a reconnecting client learn whether its transaction committed
    /// without touching the registry.
    #[must_use]
    pub fn query_outcome(&self, id: &TransactionId) -> Option<O> {
        self.outcomes.get(id)
    }

    /// Returns true if an outcome for `id` is still retained.
    #[must_use]
    pub fn is_recently_completed(&self, id: &TransactionId) -> bool {
        self.outcomes.contains(id)
    }

    /// Drops finalized outcomes older than the retention period.
    pub fn prune_outcomes(&self) -> usize {
        let pruned = self.outcomes.prune();
        if pruned > 0 {
            tracing::trace!(pruned, "expired transaction outcomes pruned");
        }
        pruned
    }

    /// Returns what currently represents `id`.
    #[must_use]
    pub fn state_of(&self, id: &TransactionId) -> TransactionSlot<S, O> {
        let current = self.registry.get(id);
        if let Some(entry) = &current {
            return TransactionSlot::Registered(Arc::clone(entry.value()));
        }
        match self.outcomes.get(id) {
            Some(outcome) => TransactionSlot::Finalized(outcome),
            None => TransactionSlot::Absent,
        }
    }

    /// Returns true if a live entry is hosted for `id`.
    #[must_use]
    pub fn is_hosted_in_progress(&self, id: &TransactionId) -> bool {
        self.registry.contains(id)
    }

    /// Returns the number of hosted transactions.
    #[must_use]
    pub fn hosted_count(&self) -> usize {
        self.registry.len()
    }

    /// Returns the ids of all hosted transactions.
    #[must_use]
    pub fn hosted_ids(&self) -> Vec<TransactionId> {
        self.registry.ids()
    }

    /// Becomes the executor of `command`'s transaction.
    ///
    /// Finds or creates the hosted entry and runs [`get_lock`](Self::get_lock)
    /// on it. On `Denied` nothing is held and the caller decides whether to
    /// try again. Commands for different transactions never block one
    /// another; commands for one transaction are serialized by its lock.
    pub fn masquerade<C>(
        &self,
        command: &C,
        interrupt: &Interrupt,
    ) -> HostedTxResult<LockOutcome<S>>
    where
        C: TransactionalCommand + ?Sized,
    {
        let id = command.transaction_id();
        if !command.can_participate_in_transaction() {
            self.stats.record_not_eligible();
            return Err(HostedTxError::not_eligible(id));
        }
        let entry = self.get_or_create(id, |_| command.can_start_remote_transaction())?;
        self.get_lock(&entry, interrupt)
    }

    /// Like [`masquerade`](Self::masquerade), but starts over whenever the
    /// entry turns out to have been replaced.
    ///
    /// Gives up with [`HostedTxError::RetriesExhausted`] after
    /// `max_masquerade_attempts` consecutive denials.
    pub fn masquerade_as<C>(
        &self,
        command: &C,
        interrupt: &Interrupt,
    ) -> HostedTxResult<LockOutcome<S>>
    where
        C: TransactionalCommand + ?Sized,
    {
        let attempts = self.config.max_masquerade_attempts;
        for attempt in 1..=attempts {
            match self.masquerade(command, interrupt)? {
                LockOutcome::Denied => {
                    tracing::trace!(
                        txid = %command.transaction_id(),
                        attempt,
                        "masquerade denied, retrying"
                    );
                }
                outcome => return Ok(outcome),
            }
        }
        Err(HostedTxError::RetriesExhausted {
            id: command.transaction_id(),
            attempts,
        })
    }
}

impl<S, O> std::fmt::Debug for TxCoordinator<S, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxCoordinator")
            .field("member", &self.member)
            .field("registry", &self.registry)
            .field("outcomes", &self.outcomes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Outcome {
        Committed,
        RolledBack,
    }

    struct Command {
        id: TransactionId,
        can_start: bool,
        can_participate: bool,
    }

    impl Command {
        fn new(id: TransactionId) -> Self {
            Self {
                id,
                can_start: true,
                can_participate: true,
            }
        }
    }

    impl TransactionalCommand for Command {
        fn transaction_id(&self) -> TransactionId {
            self.id
        }

        fn can_start_remote_transaction(&self) -> bool {
            self.can_start
        }

        fn can_participate_in_transaction(&self) -> bool {
            self.can_participate
        }
    }

    fn coordinator() -> TxCoordinator<Vec<u32>, Outcome> {
        TxCoordinator::with_default_state(MemberId::new(), Config::default()).unwrap()
    }

    fn txid(seq: u64) -> TransactionId {
        TransactionId::new(MemberId::nil(), seq)
    }

    #[test]
    fn rejects_invalid_config() {
        let result = TxCoordinator::<u32, Outcome>::with_default_state(
            MemberId::new(),
            Config::new().registry_shards(0),
        );
        assert!(matches!(result, Err(HostedTxError::InvalidConfig { .. })));
    }

    #[test]
    fn get_or_create_then_lock() {
        let tm = coordinator();
        let entry = tm.get_or_create(txid(1), |_| true).unwrap();
        assert!(tm.lookup(&txid(1)).unwrap().same_entry(&entry));

        let held = tm.get_lock(&entry, &Interrupt::new()).unwrap();
        assert!(held.is_granted());
        assert!(entry.lock().is_held_by_current_thread());
        drop(held);
        assert!(!entry.lock().is_locked());
    }

    #[test]
    fn reclaim_after_removal() {
        let tm = coordinator();
        let entry = tm.get_or_create(txid(1), |_| true).unwrap();
        tm.remove(&txid(1));
        assert!(tm.lookup(&txid(1)).is_none());

        let outcome = tm.get_lock(&entry, &Interrupt::new()).unwrap();
        assert!(outcome.is_granted());
        assert!(tm.lookup(&txid(1)).unwrap().same_entry(&entry));
        assert_eq!(tm.stats().reclaimed(), 1);
    }

    #[test]
    fn finalize_wins() {
        let tm = coordinator();
        let entry = tm.get_or_create(txid(1), |_| true).unwrap();
        tm.finalize(txid(1), Outcome::Committed);

        let outcome = tm.get_lock(&entry, &Interrupt::new()).unwrap();
        assert!(outcome.is_finalized());
        assert!(tm.lookup(&txid(1)).is_none());
        assert_eq!(tm.query_outcome(&txid(1)), Some(Outcome::Committed));

        let held = outcome.into_held().unwrap();
        assert!(held.state_mut().is_err());
    }

    #[test]
    fn replaced_entry_denied() {
        let tm = coordinator();
        let old = tm.get_or_create(txid(1), |_| true).unwrap();
        tm.remove(&txid(1));
        let new = tm.get_or_create(txid(1), |_| true).unwrap();
        assert!(!old.same_entry(&new));

        assert!(tm.get_lock(&old, &Interrupt::new()).unwrap().is_denied());
        assert!(!old.lock().is_locked());
        assert!(tm.get_lock(&new, &Interrupt::new()).unwrap().is_granted());
        assert_eq!(tm.stats().denied(), 1);
    }

    #[test]
    fn finalize_is_idempotent() {
        let tm = coordinator();
        tm.get_or_create(txid(1), |_| true).unwrap();

        assert!(tm.finalize(txid(1), Outcome::Committed).is_some());
        assert!(tm.finalize(txid(1), Outcome::RolledBack).is_none());

        assert_eq!(tm.query_outcome(&txid(1)), Some(Outcome::Committed));
        assert!(tm.lookup(&txid(1)).is_none());
        assert_eq!(tm.stats().finalized(), 1);
    }

    #[test]
    fn finalized_id_cannot_be_recreated() {
        let tm = coordinator();
        tm.finalize(txid(1), Outcome::RolledBack);

        let err = tm.get_or_create(txid(1), |_| true).unwrap_err();
        assert_eq!(err, HostedTxError::not_eligible(txid(1)));
        assert!(tm.state_of(&txid(1)).is_finalized());
    }

    #[test]
    fn evicted_outcome_still_blocks_reclaim_of_finalized_entry() {
        let tm: TxCoordinator<Vec<u32>, Outcome> = TxCoordinator::with_default_state(
            MemberId::new(),
            Config::new().outcome_cache_capacity(1),
        )
        .unwrap();
        let entry = tm.get_or_create(txid(1), |_| true).unwrap();
        tm.finalize(txid(1), Outcome::Committed);
        tm.finalize(txid(2), Outcome::Committed);
        assert!(tm.query_outcome(&txid(1)).is_none());

        let outcome = tm.get_lock(&entry, &Interrupt::new()).unwrap();
        assert!(outcome.is_finalized());
        assert!(tm.state_of(&txid(1)).is_absent());
    }

    #[test]
    fn state_of_tracks_transitions() {
        let tm = coordinator();
        assert!(tm.state_of(&txid(1)).is_absent());

        tm.get_or_create(txid(1), |_| true).unwrap();
        assert!(tm.state_of(&txid(1)).is_registered());

        tm.finalize(txid(1), Outcome::Committed);
        assert!(matches!(
            tm.state_of(&txid(1)),
            TransactionSlot::Finalized(Outcome::Committed)
        ));
    }

    #[test]
    fn begin_local_mints_sequential_ids() {
        let tm = coordinator();
        let first = tm.begin_local().unwrap();
        let second = tm.begin_local().unwrap();

        assert_eq!(first.id().member(), tm.member());
        assert_eq!(second.id().seq(), first.id().seq() + 1);
        assert_eq!(first.origin(), TransactionOrigin::Local);
        assert_eq!(tm.hosted_count(), 2);
        assert!(tm.is_hosted_in_progress(&first.id()));
    }

    #[test]
    fn factory_sees_origin() {
        let tm: TxCoordinator<TransactionOrigin, Outcome> =
            TxCoordinator::new(MemberId::new(), Config::default(), |_, origin| origin).unwrap();
        let local = tm.begin_local().unwrap();
        let remote = tm.get_or_create(txid(5), |_| true).unwrap();

        let interrupt = Interrupt::new();
        let held = tm.get_lock(&local, &interrupt).unwrap().into_held().unwrap();
        assert_eq!(*held.state(), TransactionOrigin::Local);
        drop(held);
        let held = tm.get_lock(&remote, &interrupt).unwrap().into_held().unwrap();
        assert_eq!(*held.state(), TransactionOrigin::Remote);
    }

    #[test]
    fn masquerade_grants_and_creates() {
        let tm = coordinator();
        let outcome = tm.masquerade(&Command::new(txid(1)), &Interrupt::new()).unwrap();
        let held = outcome.into_held().unwrap();
        held.state_mut().unwrap().push(1);
        assert_eq!(held.entry().origin(), TransactionOrigin::Remote);
        assert_eq!(tm.stats().created(), 1);
    }

    #[test]
    fn masquerade_requires_participation() {
        let tm = coordinator();
        let mut command = Command::new(txid(1));
        command.can_participate = false;

        let err = tm.masquerade(&command, &Interrupt::new()).unwrap_err();
        assert_eq!(err, HostedTxError::not_eligible(txid(1)));
        assert!(tm.state_of(&txid(1)).is_absent());
        assert_eq!(tm.stats().not_eligible(), 1);
    }

    #[test]
    fn masquerade_cannot_start_but_can_join() {
        let tm = coordinator();
        let mut command = Command::new(txid(1));
        command.can_start = false;

        assert!(tm.masquerade(&command, &Interrupt::new()).is_err());

        tm.get_or_create(txid(1), |_| true).unwrap();
        assert!(tm
            .masquerade(&command, &Interrupt::new())
            .unwrap()
            .is_granted());
    }

    #[test]
    fn masquerade_on_finalized_transaction_is_rejected() {
        let tm = coordinator();
        tm.finalize(txid(1), Outcome::Committed);

        let err = tm
            .masquerade(&Command::new(txid(1)), &Interrupt::new())
            .unwrap_err();
        assert!(matches!(err, HostedTxError::NotEligible { .. }));
        assert_eq!(tm.query_outcome(&txid(1)), Some(Outcome::Committed));
    }

    #[test]
    fn masquerade_interrupted_before_wait() {
        let tm = coordinator();
        let interrupt = Interrupt::new();
        interrupt.interrupt();

        let err = tm
            .masquerade(&Command::new(txid(1)), &interrupt)
            .unwrap_err();
        assert_eq!(err, HostedTxError::interrupted(Some(txid(1))));
        assert_eq!(tm.stats().interrupted(), 1);

        let entry = tm.lookup(&txid(1)).unwrap();
        assert!(!entry.lock().is_locked());
    }

    #[test]
    fn interrupted_reclaim_leaves_slot_absent() {
        let tm = coordinator();
        let entry = tm.get_or_create(txid(1), |_| true).unwrap();
        tm.remove(&txid(1));

        let interrupt = Interrupt::new();
        interrupt.interrupt();
        assert!(tm.get_lock(&entry, &interrupt).unwrap_err().is_interrupted());
        assert!(tm.state_of(&txid(1)).is_absent());
    }

    #[test]
    fn masquerade_as_returns_granted() {
        let tm = coordinator();
        let outcome = tm
            .masquerade_as(&Command::new(txid(3)), &Interrupt::new())
            .unwrap();
        assert!(outcome.is_granted());
    }

    #[test]
    fn prune_outcomes_without_expiry() {
        let tm = coordinator();
        tm.finalize(txid(1), Outcome::Committed);
        assert_eq!(tm.prune_outcomes(), 0);
        assert!(tm.is_recently_completed(&txid(1)));
    }

    #[test]
    fn hosted_ids_lists_live_entries() {
        let tm = coordinator();
        tm.get_or_create(txid(1), |_| true).unwrap();
        tm.get_or_create(txid(2), |_| true).unwrap();
        tm.finalize(txid(1), Outcome::Committed);

        assert_eq!(tm.hosted_ids(), vec![txid(2)]);
    }
}
