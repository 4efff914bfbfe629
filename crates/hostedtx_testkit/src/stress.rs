//! Stress tests for the masquerade protocol.
//!
//! These harnesses run many worker threads against one coordinator and
//! count operations whose observed behavior breaks the locking contract
//! as failures.

use crate::fixtures::{txid, TestCommand, TestCoordinator, TestOutcome, TestState};
use hostedtx_core::{
    HeldTransaction, HostedTxError, Interrupt, LockOutcome, StatsSnapshot, TransactionId,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// What one stress run did, as seen by the harness and by the coordinator.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Commands whose observed behavior kept the locking contract.
    pub successful_ops: usize,
    /// Commands that broke it, plus lost increments found afterwards.
    pub failed_ops: usize,
    /// Coordinator counters recorded during the run.
    pub stats: StatsSnapshot,
    /// Wall time of the worker phase.
    pub duration: Duration,
}

impl StressTestResult {
    /// Creates a result from harness tallies and the counters recorded
    /// during the run.
    pub fn new(successful: usize, failed: usize, stats: StatsSnapshot, duration: Duration) -> Self {
        Self {
            successful_ops: successful,
            failed_ops: failed,
            stats,
            duration,
        }
    }

    /// Commands issued by the workers, plus any failures found in the
    /// final check.
    pub fn total_ops(&self) -> usize {
        self.successful_ops + self.failed_ops
    }

    /// Commands per second over the worker phase.
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.total_ops() as f64 / secs
        } else {
            0.0
        }
    }

    /// Logs the run at info level.
    pub fn log_summary(&self, name: &str) {
        tracing::info!(
            run = name,
            total = self.total_ops(),
            successful = self.successful_ops,
            failed = self.failed_ops,
            granted = self.stats.granted,
            reclaimed = self.stats.reclaimed,
            granted_finalized = self.stats.granted_finalized,
            denied = self.stats.denied,
            duration_ms = self.duration.as_millis() as u64,
            ops_per_sec = self.throughput(),
            "stress run finished"
        );
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform, across all threads.
    pub operations: usize,
    /// Number of worker threads.
    pub threads: usize,
    /// Number of distinct transactions the workers target.
    pub transactions: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            transactions: 16,
        }
    }
}

impl StressConfig {
    /// A small configuration for unit tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            operations: 2_000,
            threads: 4,
            transactions: 8,
        }
    }

    fn ops_per_thread(&self) -> usize {
        self.operations / self.threads.max(1)
    }

    fn transaction_count(&self) -> u64 {
        self.transactions.max(1) as u64
    }
}

/// Increments the state counter of a held transaction with the read and
/// the write in separate state guards, so only the transaction lock keeps
/// concurrent increments from being lost.
fn increment(held: &HeldTransaction<TestState>) -> bool {
    let seen = held.state().counter;
    thread::yield_now();
    match held.state_mut() {
        Ok(mut state) => {
            state.counter = seen + 1;
            true
        }
        Err(_) => false,
    }
}

/// Sums the counters of the hosted transactions among `ids`, locking each
/// one through the coordinator.
fn counter_total(coordinator: &TestCoordinator, ids: impl Iterator<Item = TransactionId>) -> usize {
    let interrupt = Interrupt::new();
    ids.filter_map(|id| coordinator.lookup(&id))
        .filter_map(|entry| coordinator.get_lock(&entry, &interrupt).ok())
        .filter_map(LockOutcome::into_held)
        .map(|held| {
            let counter = held.state().counter;
            counter as usize
        })
        .sum()
}

/// Runs commands where every thread owns its own transactions.
///
/// Threads never share an id, so no command should ever be denied.
pub fn stress_disjoint_masquerade(
    coordinator: Arc<TestCoordinator>,
    config: &StressConfig,
) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let ops_per_thread = config.ops_per_thread();
    let per_thread = config.transaction_count();

    let before = coordinator.stats().snapshot();
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads as u64)
        .map(|t| {
            let coordinator = Arc::clone(&coordinator);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);

            thread::spawn(move || {
                let interrupt = Interrupt::new();
                for i in 0..ops_per_thread as u64 {
                    let command = TestCommand::new(txid(t * per_thread + i % per_thread));
                    match coordinator.masquerade(&command, &interrupt) {
                        Ok(LockOutcome::Granted(held)) if increment(&held) => {
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        _ => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    for h in handles {
        let _ = h.join();
    }

    let duration = start.elapsed();
    // Taken before the final checks, which lock and finalize on their own.
    let stats = coordinator.stats().snapshot().delta(&before);
    let successful = successful.load(Ordering::Relaxed);
    let mut failed = failed.load(Ordering::Relaxed);

    let ids = (0..config.threads as u64 * per_thread).map(txid);
    let counted = counter_total(&coordinator, ids);
    if counted != successful {
        tracing::warn!(successful, counted, "disjoint stress lost increments");
    }
    failed += successful.abs_diff(counted);

    StressTestResult::new(successful, failed, stats, duration)
}

/// Runs commands where all threads compete for the same transactions.
///
/// Each command performs an unguarded read-modify-write of its
/// transaction's counter. A lost increment means two threads executed one
/// transaction at the same time and is counted as a failure.
pub fn stress_contended_masquerade(
    coordinator: Arc<TestCoordinator>,
    config: &StressConfig,
) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let ops_per_thread = config.ops_per_thread();
    let transactions = config.transaction_count();

    let before = coordinator.stats().snapshot();
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads as u64)
        .map(|t| {
            let coordinator = Arc::clone(&coordinator);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);

            thread::spawn(move || {
                let interrupt = Interrupt::new();
                for i in 0..ops_per_thread as u64 {
                    let command = TestCommand::new(txid((t + i) % transactions));
                    match coordinator.masquerade_as(&command, &interrupt) {
                        Ok(LockOutcome::Granted(held)) if increment(&held) => {
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        _ => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    for h in handles {
        let _ = h.join();
    }

    let duration = start.elapsed();
    // Taken before the final checks, which lock and finalize on their own.
    let stats = coordinator.stats().snapshot().delta(&before);
    let successful = successful.load(Ordering::Relaxed);
    let mut failed = failed.load(Ordering::Relaxed);

    let counted = counter_total(&coordinator, (0..transactions).map(txid));
    if counted != successful {
        tracing::warn!(successful, counted, "contended stress lost increments");
    }
    failed += successful.abs_diff(counted);

    StressTestResult::new(successful, failed, stats, duration)
}

/// Runs contended commands while a cleanup thread races them.
///
/// The cleanup thread keeps removing hosted entries the way failover
/// cleanup does, finalizes the lower half of the transactions midway, and
/// finalizes the rest once the workers are done. Workers count as
/// successful when they are granted a current entry, granted a finalized
/// one, or refused because the transaction already has an outcome. At the
/// end every transaction must be finalized and nothing may remain hosted.
pub fn stress_failover_churn(
    coordinator: Arc<TestCoordinator>,
    config: &StressConfig,
) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicBool::new(false));
    let ops_per_thread = config.ops_per_thread();
    let transactions = config.transaction_count();

    let before = coordinator.stats().snapshot();
    let start = Instant::now();

    let workers: Vec<_> = (0..config.threads as u64)
        .map(|t| {
            let coordinator = Arc::clone(&coordinator);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);

            thread::spawn(move || {
                let interrupt = Interrupt::new();
                for i in 0..ops_per_thread as u64 {
                    let id = txid((t + i) % transactions);
                    let ok = match coordinator.masquerade_as(&TestCommand::new(id), &interrupt) {
                        Ok(LockOutcome::Granted(held)) => increment(&held),
                        Ok(LockOutcome::GrantedButFinalized(held)) => {
                            held.is_finalized() && held.state_mut().is_err()
                        }
                        Err(HostedTxError::NotEligible { .. }) => {
                            coordinator.is_recently_completed(&id)
                        }
                        Ok(LockOutcome::Denied) | Err(_) => false,
                    };
                    let counter = if ok { &successful } else { &failed };
                    counter.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    let cleaner = {
        let coordinator = Arc::clone(&coordinator);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut round = 0u64;
            while !done.load(Ordering::Acquire) {
                coordinator.remove(&txid(round % transactions));
                if round == transactions * 8 {
                    for seq in 0..transactions / 2 {
                        coordinator.finalize(txid(seq), TestOutcome::Committed);
                    }
                }
                round += 1;
                thread::yield_now();
            }
        })
    };

    for h in workers {
        let _ = h.join();
    }
    done.store(true, Ordering::Release);
    let _ = cleaner.join();

    for seq in 0..transactions {
        coordinator.finalize(txid(seq), TestOutcome::RolledBack);
    }

    let duration = start.elapsed();
    let stats = coordinator.stats().snapshot().delta(&before);
    let successful = successful.load(Ordering::Relaxed);
    let mut failed = failed.load(Ordering::Relaxed);

    for seq in 0..transactions {
        let id = txid(seq);
        if !coordinator.state_of(&id).is_finalized() || coordinator.is_hosted_in_progress(&id) {
            tracing::warn!(txid = %id, "transaction still hosted after churn");
            failed += 1;
        }
    }

    StressTestResult::new(successful, failed, stats, duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test_coordinator;

    #[test]
    fn test_stress_disjoint_masquerade() {
        let coordinator = test_coordinator();
        let result = stress_disjoint_masquerade(Arc::clone(&coordinator), &StressConfig::quick());
        result.log_summary("disjoint masquerade");
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.stats.denied, 0);
        assert_eq!(result.stats.reclaimed, 0);
        assert_eq!(result.stats.granted as usize, result.successful_ops);
    }

    #[test]
    fn test_stress_contended_masquerade() {
        let coordinator = test_coordinator();
        let result = stress_contended_masquerade(coordinator, &StressConfig::quick());
        result.log_summary("contended masquerade");
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.successful_ops, StressConfig::quick().operations);
        assert_eq!(result.stats.granted as usize, result.successful_ops);
        assert_eq!(result.stats.denied, 0);
    }

    #[test]
    fn test_stress_failover_churn() {
        let coordinator = test_coordinator();
        let result = stress_failover_churn(Arc::clone(&coordinator), &StressConfig::quick());
        result.log_summary("failover churn");
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.total_ops(), StressConfig::quick().operations);
        assert_eq!(result.stats.finalized, StressConfig::quick().transactions as u64);
        assert_eq!(coordinator.hosted_count(), 0);
    }

    #[test]
    fn result_reports_throughput() {
        let result = StressTestResult::new(
            30,
            10,
            StatsSnapshot::default(),
            Duration::from_millis(500),
        );
        assert_eq!(result.total_ops(), 40);
        assert!((result.throughput() - 80.0).abs() < 1e-9);

        let instant = StressTestResult::new(1, 0, StatsSnapshot::default(), Duration::ZERO);
        assert_eq!(instant.throughput(), 0.0);
    }
}
