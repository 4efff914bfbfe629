//! Hosted transaction entries.

use crate::error::{HostedTxError, HostedTxResult};
use crate::interrupt::Interrupt;
use crate::lock::TxLock;
use crate::types::{EntryHandle, TransactionId, TransactionOrigin};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The in-memory state object representing one in-flight transaction.
///
/// An entry wraps the opaque transaction state `S` together with the
/// exclusive lock that guards it. Entries are compared by their
/// [`EntryHandle`], never by content.
pub struct HostedTransaction<S> {
    id: TransactionId,
    handle: EntryHandle,
    origin: TransactionOrigin,
    lock: TxLock,
    /// Set once the transaction has been committed or rolled back.
    finalized: AtomicBool,
    state: RwLock<S>,
}

impl<S> HostedTransaction<S> {
    pub(crate) fn new(
        id: TransactionId,
        handle: EntryHandle,
        origin: TransactionOrigin,
        state: S,
    ) -> Self {
        Self {
            id,
            handle,
            origin,
            lock: TxLock::new(),
            finalized: AtomicBool::new(false),
            state: RwLock::new(state),
        }
    }

    /// Returns the transaction this entry represents.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the identity minted for this entry.
    #[must_use]
    pub fn handle(&self) -> EntryHandle {
        self.handle
    }

    /// Returns where the entry was created.
    #[must_use]
    pub fn origin(&self) -> TransactionOrigin {
        self.origin
    }

    /// Returns true if `other` is this very entry.
    #[must_use]
    pub fn same_entry(&self, other: &Self) -> bool {
        self.handle == other.handle
    }

    /// Returns true once the transaction has been committed or rolled back.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }

    pub(crate) fn mark_finalized(&self) {
        self.finalized.store(true, Ordering::Release);
    }

    /// Returns the entry's lock.
    #[must_use]
    pub fn lock(&self) -> &TxLock {
        &self.lock
    }

    /// Blocks until the entry's lock is held or `interrupt` fires.
    pub fn acquire(&self, interrupt: &Interrupt) -> HostedTxResult<()> {
        self.lock
            .acquire(interrupt)
            .map_err(|err| err.with_txid(self.id))
    }

    /// Releases the entry's lock. Must be called by the holder.
    pub fn release(&self) {
        self.lock.release();
    }
}

impl<S> std::fmt::Debug for HostedTransaction<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostedTransaction")
            .field("id", &self.id)
            .field("handle", &self.handle)
            .field("origin", &self.origin)
            .field("locked", &self.lock.is_locked())
            .field("finalized", &self.is_finalized())
            .finish_non_exhaustive()
    }
}

/// Exclusive hold on a hosted entry, released when dropped.
///
/// Produced by the lock protocol. A hold on a finalized transaction may
/// read the wrapped state but refuses to hand out mutable access.
///
/// The hold is bound to the thread that acquired it.
pub struct HeldTransaction<S> {
    entry: Arc<HostedTransaction<S>>,
    finalized: bool,
    _not_send: PhantomData<*const ()>,
}

impl<S> HeldTransaction<S> {
    /// Wraps an entry whose lock the calling thread already holds.
    pub(crate) fn new(entry: Arc<HostedTransaction<S>>, finalized: bool) -> Self {
        debug_assert!(entry.lock.is_held_by_current_thread());
        Self {
            entry,
            finalized,
            _not_send: PhantomData,
        }
    }

    /// Returns the held entry.
    #[must_use]
    pub fn entry(&self) -> &Arc<HostedTransaction<S>> {
        &self.entry
    }

    /// Returns the transaction id.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.entry.id
    }

    /// Returns true if the transaction was already finalized when locked.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Read access to the transaction state.
    pub fn state(&self) -> RwLockReadGuard<'_, S> {
        self.entry.state.read()
    }

    /// Write access to the transaction state.
    ///
    /// Fails for holds on finalized transactions; those may only observe
    /// the outcome and tear down.
    pub fn state_mut(&self) -> HostedTxResult<RwLockWriteGuard<'_, S>> {
        if self.finalized {
            return Err(HostedTxError::invalid_operation(format!(
                "transaction {} is already finalized",
                self.entry.id
            )));
        }
        Ok(self.entry.state.write())
    }

    /// Releases the lock now rather than at end of scope.
    pub fn release(self) {
        drop(self);
    }
}

impl<S> Drop for HeldTransaction<S> {
    fn drop(&mut self) {
        self.entry.lock.release();
    }
}

impl<S> std::fmt::Debug for HeldTransaction<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeldTransaction")
            .field("id", &self.entry.id)
            .field("handle", &self.entry.handle)
            .field("finalized", &self.finalized)
            .finish()
    }
}
