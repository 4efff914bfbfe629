//! Error types for hosted transaction coordination.

use crate::types::TransactionId;
use thiserror::Error;

/// Result type for hosted transaction operations.
pub type HostedTxResult<T> = Result<T, HostedTxError>;

/// Errors that can occur while hosting or masquerading as a transaction.
///
/// A stale entry reference is not an error; it is reported as
/// [`LockOutcome::Denied`](crate::LockOutcome::Denied).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostedTxError {
    /// The command may neither create nor join a transaction state.
    #[error("command not eligible to host transaction {id}")]
    NotEligible {
        /// The transaction the command referred to.
        id: TransactionId,
    },

    /// A lock wait was interrupted before the lock was acquired.
    #[error("interrupted while waiting for transaction lock{}", fmt_txid(.id))]
    Interrupted {
        /// The transaction whose lock was being awaited, if known.
        id: Option<TransactionId>,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// Configuration rejected by [`Config::validate`](crate::Config::validate).
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the offending setting.
        message: String,
    },

    /// The entry kept being replaced while masquerading.
    #[error("transaction {id} was replaced {attempts} times while masquerading")]
    RetriesExhausted {
        /// The transaction being masqueraded.
        id: TransactionId,
        /// Number of attempts made.
        attempts: usize,
    },
}

fn fmt_txid(id: &Option<TransactionId>) -> String {
    match id {
        Some(id) => format!(" on {id}"),
        None => String::new(),
    }
}

impl HostedTxError {
    /// Creates a not eligible error.
    pub fn not_eligible(id: TransactionId) -> Self {
        Self::NotEligible { id }
    }

    /// Creates an interrupted error.
    pub fn interrupted(id: Option<TransactionId>) -> Self {
        Self::Interrupted { id }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns true if the error came from an interrupted lock wait.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }

    /// Attaches a transaction id to an interrupted error that lacks one.
    pub(crate) fn with_txid(self, txid: TransactionId) -> Self {
        match self {
            Self::Interrupted { id: None } => Self::Interrupted { id: Some(txid) },
            other => other,
        }
    }
}
