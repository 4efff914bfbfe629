//! Property-based test generators using proptest.
//!
//! Provides strategies for generating registry operation sequences, and a
//! sequential reference model that predicts what the coordinator must do
//! for each of them.

use crate::fixtures::{txid, TestOutcome};
use hostedtx_core::TransactionId;
use proptest::prelude::*;
use std::collections::HashMap;

/// Strategy for generating transaction ids from a small sequence range, so
/// operations in a sequence collide on the same ids.
pub fn transaction_id_strategy(max_seq: u64) -> impl Strategy<Value = TransactionId> {
    (0..max_seq.max(1)).prop_map(txid)
}

/// Strategy for generating outcomes.
pub fn outcome_strategy() -> impl Strategy<Value = TestOutcome> {
    prop_oneof![Just(TestOutcome::Committed), Just(TestOutcome::RolledBack)]
}

/// An operation against the coordinator.
#[derive(Debug, Clone)]
pub enum RegistryOp {
    /// Find or create the entry for an id.
    GetOrCreate {
        /// Transaction sequence number.
        seq: u64,
        /// Whether creation is allowed.
        eligible: bool,
    },
    /// Unregister the entry for an id, as failover cleanup does.
    Remove {
        /// Transaction sequence number.
        seq: u64,
    },
    /// Finalize an id.
    Finalize {
        /// Transaction sequence number.
        seq: u64,
        /// Outcome to record.
        outcome: TestOutcome,
    },
    /// Run the lock protocol on a previously obtained entry.
    GetLock {
        /// Picks an entry among those obtained so far, modulo their count.
        pick: usize,
    },
}

/// Strategy for generating registry operations over ids `0..max_seq`.
pub fn registry_op_strategy(max_seq: u64) -> impl Strategy<Value = RegistryOp> {
    let seq = 0..max_seq.max(1);
    prop_oneof![
        3 => (seq.clone(), prop::bool::weighted(0.8))
            .prop_map(|(seq, eligible)| RegistryOp::GetOrCreate { seq, eligible }),
        1 => seq.clone().prop_map(|seq| RegistryOp::Remove { seq }),
        1 => (seq, outcome_strategy())
            .prop_map(|(seq, outcome)| RegistryOp::Finalize { seq, outcome }),
        3 => any::<usize>().prop_map(|pick| RegistryOp::GetLock { pick }),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn registry_ops_strategy(
    max_seq: u64,
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<RegistryOp>> {
    prop::collection::vec(registry_op_strategy(max_seq), min_ops..max_ops)
}

/// Model state of one transaction id. An id with no slot is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSlot {
    /// The entry with this index is hosted.
    Registered(usize),
    /// The transaction finished with this outcome.
    Finalized(TestOutcome),
}

/// Predicted result of a lock protocol call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelLock {
    /// The entry was current, or was reclaimed.
    Granted,
    /// The transaction was finalized.
    GrantedButFinalized,
    /// Another entry is hosted.
    Denied,
}

#[derive(Debug, Clone)]
struct ModelEntry {
    seq: u64,
    finalized: bool,
}

/// Sequential reference model of the per-id states.
///
/// Entries are numbered in creation order. Tests keep the real entries in
/// a vector in the same order, so an entry index names both.
#[derive(Debug, Clone, Default)]
pub struct SlotModel {
    slots: HashMap<u64, ModelSlot>,
    entries: Vec<ModelEntry>,
}

impl SlotModel {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the model state of `seq`, `None` when absent.
    pub fn slot(&self, seq: u64) -> Option<ModelSlot> {
        self.slots.get(&seq).copied()
    }

    /// Returns the number of entries created so far.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns the sequence number of entry `index`.
    pub fn entry_seq(&self, index: usize) -> u64 {
        self.entries[index].seq
    }

    /// Returns the number of hosted entries.
    pub fn hosted_count(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, ModelSlot::Registered(_)))
            .count()
    }

    /// Predicts `get_or_create`: the index of the returned entry, or `None`
    /// when creation is refused.
    pub fn get_or_create(&mut self, seq: u64, eligible: bool) -> Option<usize> {
        match self.slots.get(&seq) {
            Some(ModelSlot::Registered(index)) => Some(*index),
            Some(ModelSlot::Finalized(_)) => None,
            None if eligible => {
                let index = self.entries.len();
                self.entries.push(ModelEntry {
                    seq,
                    finalized: false,
                });
                self.slots.insert(seq, ModelSlot::Registered(index));
                Some(index)
            }
            None => None,
        }
    }

    /// Predicts `remove`: the index of the unregistered entry.
    pub fn remove(&mut self, seq: u64) -> Option<usize> {
        match self.slots.get(&seq) {
            Some(ModelSlot::Registered(index)) => {
                let index = *index;
                self.slots.remove(&seq);
                Some(index)
            }
            _ => None,
        }
    }

    /// Predicts `finalize`: the index of the entry that was hosted.
    ///
    /// A transaction that already has an outcome keeps it.
    pub fn finalize(&mut self, seq: u64, outcome: TestOutcome) -> Option<usize> {
        match self.slots.get(&seq).copied() {
            Some(ModelSlot::Finalized(_)) => None,
            Some(ModelSlot::Registered(index)) => {
                self.entries[index].finalized = true;
                self.slots.insert(seq, ModelSlot::Finalized(outcome));
                Some(index)
            }
            None => {
                self.slots.insert(seq, ModelSlot::Finalized(outcome));
                None
            }
        }
    }

    /// Predicts `get_lock` on entry `index`, reclaiming its slot when the
    /// id is absent.
    pub fn get_lock(&mut self, index: usize) -> ModelLock {
        let entry = &self.entries[index];
        let seq = entry.seq;
        match self.slots.get(&seq) {
            Some(ModelSlot::Registered(current)) if *current == index => ModelLock::Granted,
            Some(ModelSlot::Registered(_)) => ModelLock::Denied,
            Some(ModelSlot::Finalized(_)) => ModelLock::GrantedButFinalized,
            None if entry.finalized => ModelLock::GrantedButFinalized,
            None => {
                self.slots.insert(seq, ModelSlot::Registered(index));
                ModelLock::Granted
            }
        }
    }
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_reclaims_removed_entry() {
        let mut model = SlotModel::new();
        let entry = model.get_or_create(1, true).unwrap();
        assert_eq!(model.remove(1), Some(entry));
        assert_eq!(model.slot(1), None);

        assert_eq!(model.get_lock(entry), ModelLock::Granted);
        assert_eq!(model.slot(1), Some(ModelSlot::Registered(entry)));
    }

    #[test]
    fn model_denies_replaced_entry() {
        let mut model = SlotModel::new();
        let first = model.get_or_create(1, true).unwrap();
        model.remove(1);
        let second = model.get_or_create(1, true).unwrap();

        assert_ne!(first, second);
        assert_eq!(model.get_lock(first), ModelLock::Denied);
        assert_eq!(model.get_lock(second), ModelLock::Granted);
    }

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn transaction_ids_stay_in_range(id in transaction_id_strategy(4)) {
            prop_assert!(id.seq() < 4);
        }

        #[test]
        fn first_outcome_is_kept(ops in registry_ops_strategy(4, 1, 64)) {
            let mut model = SlotModel::new();
            let mut first: HashMap<u64, TestOutcome> = HashMap::new();

            for op in ops {
                match op {
                    RegistryOp::GetOrCreate { seq, eligible } => {
                        model.get_or_create(seq, eligible);
                    }
                    RegistryOp::Remove { seq } => {
                        model.remove(seq);
                    }
                    RegistryOp::Finalize { seq, outcome } => {
                        model.finalize(seq, outcome);
                        first.entry(seq).or_insert(outcome);
                    }
                    RegistryOp::GetLock { pick } => {
                        if model.entry_count() > 0 {
                            model.get_lock(pick % model.entry_count());
                        }
                    }
                }
            }

            for (seq, outcome) in first {
                prop_assert_eq!(model.slot(seq), Some(ModelSlot::Finalized(outcome)));
            }
        }
    }
}
