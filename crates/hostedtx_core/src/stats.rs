//! Coordinator statistics.
//!
//! Counters are updated on every registry transition and lock protocol
//! outcome, and can be read while workers are running.

use std::sync::atomic::{AtomicU64, Ordering};

/// Coordinator counters.
///
/// All counters are atomic and monotonically increasing.
#[derive(Debug, Default)]
pub struct CoordinatorStats {
    /// Entries created (local begins and remote first contact).
    created: AtomicU64,
    /// Lock protocol calls that returned `Granted`.
    granted: AtomicU64,
    /// `Granted` outcomes that had to re-register their entry.
    reclaimed: AtomicU64,
    /// Lock protocol calls that returned `GrantedButFinalized`.
    granted_finalized: AtomicU64,
    /// Lock protocol calls that returned `Denied`.
    denied: AtomicU64,
    /// Transactions finalized.
    finalized: AtomicU64,
    /// Lock waits cut short by an interrupt.
    interrupted: AtomicU64,
    /// Commands rejected as not eligible.
    not_eligible: AtomicU64,
}

impl CoordinatorStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_granted(&self) {
        self.granted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reclaimed(&self) {
        self.reclaimed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_granted_finalized(&self) {
        self.granted_finalized.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_denied(&self) {
        self.denied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_finalized(&self) {
        self.finalized.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_interrupted(&self) {
        self.interrupted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_not_eligible(&self) {
        self.not_eligible.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of entries created.
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Returns the number of `Granted` outcomes.
    pub fn granted(&self) -> u64 {
        self.granted.load(Ordering::Relaxed)
    }

    /// Returns the number of entries re-registered after a concurrent removal.
    pub fn reclaimed(&self) -> u64 {
        self.reclaimed.load(Ordering::Relaxed)
    }

    /// Returns the number of `GrantedButFinalized` outcomes.
    pub fn granted_finalized(&self) -> u64 {
        self.granted_finalized.load(Ordering::Relaxed)
    }

    /// Returns the number of `Denied` outcomes.
    pub fn denied(&self) -> u64 {
        self.denied.load(Ordering::Relaxed)
    }

    /// Returns the number of finalized transactions.
    pub fn finalized(&self) -> u64 {
        self.finalized.load(Ordering::Relaxed)
    }

    /// Returns the number of interrupted lock waits.
    pub fn interrupted(&self) -> u64 {
        self.interrupted.load(Ordering::Relaxed)
    }

    /// Returns the number of not-eligible rejections.
    pub fn not_eligible(&self) -> u64 {
        self.not_eligible.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            created: self.created(),
            granted: self.granted(),
            reclaimed: self.reclaimed(),
            granted_finalized: self.granted_finalized(),
            denied: self.denied(),
            finalized: self.finalized(),
            interrupted: self.interrupted(),
            not_eligible: self.not_eligible(),
        }
    }
}

/// A point-in-time copy of [`CoordinatorStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Entries created.
    pub created: u64,
    /// `Granted` outcomes.
    pub granted: u64,
    /// Entries re-registered after a concurrent removal.
    pub reclaimed: u64,
    /// `GrantedButFinalized` outcomes.
    pub granted_finalized: u64,
    /// `Denied` outcomes.
    pub denied: u64,
    /// Finalized transactions.
    pub finalized: u64,
    /// Interrupted lock waits.
    pub interrupted: u64,
    /// Not-eligible rejections.
    pub not_eligible: u64,
}

impl StatsSnapshot {
    /// Counts recorded since `earlier` was taken.
    #[must_use]
    pub fn delta(&self, earlier: &StatsSnapshot) -> StatsSnapshot {
        StatsSnapshot {
            created: self.created.saturating_sub(earlier.created),
            granted: self.granted.saturating_sub(earlier.granted),
            reclaimed: self.reclaimed.saturating_sub(earlier.reclaimed),
            granted_finalized: self.granted_finalized.saturating_sub(earlier.granted_finalized),
            denied: self.denied.saturating_sub(earlier.denied),
            finalized: self.finalized.saturating_sub(earlier.finalized),
            interrupted: self.interrupted.saturating_sub(earlier.interrupted),
            not_eligible: self.not_eligible.saturating_sub(earlier.not_eligible),
        }
    }
}
