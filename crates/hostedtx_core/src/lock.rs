//! Exclusive, non-reentrant, interruptible transaction lock.

use crate::error::{HostedTxError, HostedTxResult};
use crate::interrupt::Interrupt;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, ThreadId};

#[derive(Default)]
struct LockCore {
    /// Thread currently holding the lock.
    holder: Mutex<Option<ThreadId>>,
    released: Condvar,
}

impl LockCore {
    fn wake_all(&self) {
        let _holder = self.holder.lock();
        self.released.notify_all();
    }
}

/// A binary lock owned by whichever thread acquired it.
///
/// Unlike a mutex guard, ownership is tracked by thread so that the
/// acquire and release can sit in different call frames (the lock protocol
/// acquires, the command layer releases). Waits can be cancelled through an
/// [`Interrupt`].
#[derive(Clone, Default)]
pub struct TxLock {
    core: Arc<LockCore>,
}

impl TxLock {
    /// Creates an unlocked lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the lock is acquired or `interrupt` fires.
    ///
    /// On interruption the lock is left unacquired and
    /// [`HostedTxError::Interrupted`] is returned. Acquiring a lock the
    /// calling thread already holds is an error; the lock is not reentrant.
    pub fn acquire(&self, interrupt: &Interrupt) -> HostedTxResult<()> {
        let me = thread::current().id();
        if interrupt.is_interrupted() {
            return Err(HostedTxError::interrupted(None));
        }

        let core = Arc::clone(&self.core);
        let _registration = interrupt.register(Arc::new(move || core.wake_all()));

        let mut holder = self.core.holder.lock();
        loop {
            match *holder {
                None => {
                    *holder = Some(me);
                    return Ok(());
                }
                Some(owner) if owner == me => {
                    return Err(HostedTxError::invalid_operation(
                        "transaction lock is not reentrant",
                    ));
                }
                Some(_) => {}
            }
            if interrupt.is_interrupted() {
                return Err(HostedTxError::interrupted(None));
            }
            self.core.released.wait(&mut holder);
        }
    }

    /// Blocks until the lock is acquired, ignoring interrupts.
    pub fn acquire_uninterruptibly(&self) -> HostedTxResult<()> {
        let me = thread::current().id();
        let mut holder = self.core.holder.lock();
        loop {
            match *holder {
                None => {
                    *holder = Some(me);
                    return Ok(());
                }
                Some(owner) if owner == me => {
                    return Err(HostedTxError::invalid_operation(
                        "transaction lock is not reentrant",
                    ));
                }
                Some(_) => self.core.released.wait(&mut holder),
            }
        }
    }

    /// Acquires the lock if it is free. Never blocks.
    pub fn try_acquire(&self) -> bool {
        let mut holder = self.core.holder.lock();
        if holder.is_some() {
            return false;
        }
        *holder = Some(thread::current().id());
        true
    }

    /// Releases the lock.
    ///
    /// Must be called by the holding thread. Releasing a lock the caller
    /// does not hold is a programming error: it panics in debug builds and
    /// is logged and ignored otherwise.
    pub fn release(&self) {
        let me = thread::current().id();
        let mut holder = self.core.holder.lock();
        if *holder != Some(me) {
            debug_assert!(
                false,
                "transaction lock released by a thread that does not hold it"
            );
            tracing::error!(
                holder = ?*holder,
                caller = ?me,
                "ignoring release of a transaction lock not held by caller"
            );
            return;
        }
        *holder = None;
        drop(holder);
        self.core.released.notify_one();
    }

    /// Returns true if any thread holds the lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.core.holder.lock().is_some()
    }

    /// Returns true if the calling thread holds the lock.
    #[must_use]
    pub fn is_held_by_current_thread(&self) -> bool {
        *self.core.holder.lock() == Some(thread::current().id())
    }
}

impl std::fmt::Debug for TxLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn acquire_and_release() {
        let lock = TxLock::new();
        let interrupt = Interrupt::new();

        lock.acquire(&interrupt).unwrap();
        assert!(lock.is_locked());
        assert!(lock.is_held_by_current_thread());

        lock.release();
        assert!(!lock.is_locked());
    }

    #[test]
    fn not_reentrant() {
        let lock = TxLock::new();
        lock.acquire(&Interrupt::new()).unwrap();

        let err = lock.acquire(&Interrupt::new()).unwrap_err();
        assert!(matches!(err, HostedTxError::InvalidOperation { .. }));
        assert!(!lock.try_acquire());
        assert!(lock.acquire_uninterruptibly().is_err());

        lock.release();
    }

    #[test]
    fn already_interrupted_fails_fast() {
        let lock = TxLock::new();
        let interrupt = Interrupt::new();
        interrupt.interrupt();

        assert!(lock.acquire(&interrupt).unwrap_err().is_interrupted());
        assert!(!lock.is_locked());
    }

    #[test]
    fn interrupt_wakes_blocked_waiter() {
        let lock = TxLock::new();
        lock.acquire(&Interrupt::new()).unwrap();

        let interrupt = Interrupt::new();
        let (started_tx, started_rx) = mpsc::channel();
        let waiter = {
            let lock = lock.clone();
            let interrupt = interrupt.clone();
            thread::spawn(move || {
                started_tx.send(()).unwrap();
                lock.acquire(&interrupt)
            })
        };

        started_rx.recv().unwrap();
        thread::sleep(Duration::from_millis(20));
        interrupt.interrupt();

        let result = waiter.join().unwrap();
        assert!(result.unwrap_err().is_interrupted());
        assert!(lock.is_held_by_current_thread());
        lock.release();

        // A fresh thread can still take the lock
        let other = {
            let lock = lock.clone();
            thread::spawn(move || {
                lock.acquire(&Interrupt::new()).unwrap();
                lock.release();
            })
        };
        other.join().unwrap();
        assert!(!lock.is_locked());
    }

    #[test]
    fn release_hands_lock_to_waiter() {
        let lock = TxLock::new();
        lock.acquire(&Interrupt::new()).unwrap();

        let waiter = {
            let lock = lock.clone();
            thread::spawn(move || {
                lock.acquire_uninterruptibly().unwrap();
                let held = lock.is_held_by_current_thread();
                lock.release();
                held
            })
        };

        thread::sleep(Duration::from_millis(10));
        lock.release();
        assert!(waiter.join().unwrap());
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "does not hold it")]
    fn release_without_holding_panics_in_debug() {
        let lock = TxLock::new();
        lock.release();
    }

    #[cfg(debug_assertions)]
    #[test]
    fn release_from_other_thread_leaves_lock_held() {
        let lock = TxLock::new();
        lock.acquire(&Interrupt::new()).unwrap();

        let intruder = {
            let lock = lock.clone();
            thread::spawn(move || lock.release())
        };
        assert!(intruder.join().is_err());
        assert!(lock.is_held_by_current_thread());
        lock.release();
    }
}
