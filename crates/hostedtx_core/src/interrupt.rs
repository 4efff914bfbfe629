//! Interrupt tokens for cancelling lock waits.
//!
//! A worker passes an [`Interrupt`] to every blocking lock acquisition.
//! Another thread, such as a shutdown hook or a request timeout, calls
//! [`Interrupt::interrupt`] to wake it, and the wait then fails with
//! [`HostedTxError::Interrupted`](crate::HostedTxError).
//!
//! One token may be shared by several threads (a request group, a whole
//! pool on shutdown); interrupting it wakes every wait using it.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

type Waker = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct InterruptInner {
    interrupted: AtomicBool,
    /// One waker per wait currently using this token.
    wakers: Mutex<Vec<(u64, Waker)>>,
    next_registration: AtomicU64,
}

/// A cloneable cancellation handle for blocking lock waits.
///
/// The interrupted flag is sticky: once set, every subsequent interruptible
/// wait made with this token fails immediately until [`reset`](Self::reset)
/// is called.
#[derive(Clone, Default)]
pub struct Interrupt {
    inner: Arc<InterruptInner>,
}

impl Interrupt {
    /// Creates a token that is not interrupted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interrupts every wait using this token.
    pub fn interrupt(&self) {
        self.inner.interrupted.store(true, Ordering::SeqCst);
        let wakers: Vec<Waker> = self
            .inner
            .wakers
            .lock()
            .iter()
            .map(|(_, waker)| Arc::clone(waker))
            .collect();
        // Called unlocked; a waker may take the lock it wakes.
        for wake in wakers {
            wake();
        }
    }

    /// Returns true if the token has been interrupted.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.inner.interrupted.load(Ordering::SeqCst)
    }

    /// Clears the interrupted flag.
    pub fn reset(&self) {
        self.inner.interrupted.store(false, Ordering::SeqCst);
    }

    /// Installs a waker for the wait about to begin, alongside those of any
    /// other waits sharing the token.
    ///
    /// The waker is removed when the returned registration is dropped.
    pub(crate) fn register(&self, waker: Waker) -> WaitRegistration<'_> {
        let id = self.inner.next_registration.fetch_add(1, Ordering::Relaxed);
        self.inner.wakers.lock().push((id, waker));
        WaitRegistration {
            interrupt: self,
            id,
        }
    }

    fn registered(&self) -> usize {
        self.inner.wakers.lock().len()
    }
}

impl std::fmt::Debug for Interrupt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interrupt")
            .field("interrupted", &self.is_interrupted())
            .field("waits", &self.registered())
            .finish()
    }
}

/// Keeps a waker installed for the duration of one wait.
pub(crate) struct WaitRegistration<'a> {
    interrupt: &'a Interrupt,
    id: u64,
}

impl Drop for WaitRegistration<'_> {
    fn drop(&mut self) {
        self.interrupt
            .inner
            .wakers
            .lock()
            .retain(|(id, _)| *id != self.id);
    }
}
