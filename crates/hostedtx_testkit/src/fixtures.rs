//! Test fixtures and coordinator helpers.
//!
//! Provides a concrete transaction state, outcome and command type so tests
//! can drive a [`TxCoordinator`] without a messaging layer.

use hostedtx_core::{Config, MemberId, TransactionId, TransactionalCommand, TxCoordinator};
use std::sync::{Arc, Once};
use tracing_subscriber::EnvFilter;

/// Transaction state used by tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TestState {
    /// Operations applied by commands, in order.
    pub ops: Vec<String>,
    /// Incremented by every command body; used to detect lost updates.
    pub counter: u64,
}

/// Final outcome recorded by tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestOutcome {
    /// The transaction committed.
    Committed,
    /// The transaction rolled back.
    RolledBack,
}

/// A coordinator over the test state and outcome.
pub type TestCoordinator = TxCoordinator<TestState, TestOutcome>;

/// A command with configurable capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestCommand {
    id: TransactionId,
    can_start: bool,
    can_participate: bool,
}

impl TestCommand {
    /// A command that may start and join `id`.
    pub fn new(id: TransactionId) -> Self {
        Self {
            id,
            can_start: true,
            can_participate: true,
        }
    }

    /// A command that may join but not start a transaction.
    #[must_use]
    pub fn not_starting(mut self) -> Self {
        self.can_start = false;
        self
    }

    /// A command that runs outside any transaction.
    #[must_use]
    pub fn not_participating(mut self) -> Self {
        self.can_participate = false;
        self
    }
}

impl TransactionalCommand for TestCommand {
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

/// Member id shared by fixture transaction ids.
pub fn test_member() -> MemberId {
    MemberId::nil()
}

/// Transaction id `seq` coordinated by [`test_member`].
pub fn txid(seq: u64) -> TransactionId {
    TransactionId::new(test_member(), seq)
}

/// Creates a coordinator with the default configuration.
pub fn test_coordinator() -> Arc<TestCoordinator> {
    test_coordinator_with(Config::default())
}

/// Creates a coordinator with `config`.
pub fn test_coordinator_with(config: Config) -> Arc<TestCoordinator> {
    init_tracing();
    Arc::new(
        TestCoordinator::with_default_state(MemberId::new(), config)
            .expect("Failed to create test coordinator"),
    )
}

/// Installs a test-writer tracing subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to `warn`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostedtx_core::Interrupt;

    #[test]
    fn command_builders() {
        let command = TestCommand::new(txid(1));
        assert!(command.can_start_remote_transaction());
        assert!(command.can_participate_in_transaction());

        let joining = command.not_starting();
        assert!(!joining.can_start_remote_transaction());
        assert!(joining.can_participate_in_transaction());

        assert!(!command.not_participating().can_participate_in_transaction());
    }

    #[test]
    fn coordinator_fixture_runs_commands() {
        let coordinator = test_coordinator();
        let held = coordinator
            .masquerade(&TestCommand::new(txid(1)), &Interrupt::new())
            .unwrap()
            .into_held()
            .unwrap();

        held.state_mut().unwrap().counter += 1;
        assert_eq!(held.state().counter, 1);
    }
}
