//! # hostedtx core
//!
//! Hosted transaction state for a partitioned in-memory data grid.
//!
//! Many message-handling threads race to find, create, lock, replace and
//! finalize the in-memory state of one distributed transaction. This crate
//! provides:
//! - [`TransactionRegistry`]: transaction id to current entry, with atomic
//!   create-if-absent
//! - [`HostedTransaction`]: the entry, an opaque state plus an exclusive,
//!   interruptible [`TxLock`]
//! - [`CommitOutcomeCache`]: outcomes of finalized transactions, kept for
//!   client failover
//! - [`TxCoordinator`]: the validate-and-lock protocol and `masquerade`,
//!   the single call the command layer uses to run one command as a
//!   transaction
//!
//! ## Usage
//!
//! ```
//! use hostedtx_core::{Config, Interrupt, LockOutcome, MemberId, TransactionId, TxCoordinator};
//!
//! let coordinator: TxCoordinator<Vec<String>, bool> =
//!     TxCoordinator::with_default_state(MemberId::new(), Config::default())?;
//! let interrupt = Interrupt::new();
//!
//! let id = TransactionId::new(MemberId::new(), 1);
//! let entry = coordinator.get_or_create(id, |_| true)?;
//! if let LockOutcome::Granted(held) = coordinator.get_lock(&entry, &interrupt)? {
//!     held.state_mut()?.push("put k1".to_string());
//! }
//!
//! coordinator.finalize(id, true);
//! assert_eq!(coordinator.query_outcome(&id), Some(true));
//! # Ok::<(), hostedtx_core::HostedTxError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod command;
mod config;
mod coordinator;
mod error;
mod hosted;
mod interrupt;
mod lock;
mod outcome;
mod registry;
mod stats;
mod types;

pub use command::TransactionalCommand;
pub use config::Config;
pub use coordinator::{LockOutcome, StateFactory, TransactionSlot, TxCoordinator};
pub use error::{HostedTxError, HostedTxResult};
pub use hosted::{HeldTransaction, HostedTransaction};
pub use interrupt::Interrupt;
pub use lock::TxLock;
pub use outcome::CommitOutcomeCache;
pub use registry::TransactionRegistry;
pub use stats::{CoordinatorStats, StatsSnapshot};
pub use types::{EntryHandle, MemberId, TransactionId, TransactionOrigin};
