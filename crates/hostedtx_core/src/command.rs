//! The view of an inbound command needed to masquerade as its transaction.

use crate::types::TransactionId;

/// An inbound message or client request that runs inside a transaction.
///
/// Implemented by the messaging layer. The two capability predicates jointly
/// decide whether the command may create or join hosted transaction state.
pub trait TransactionalCommand {
    /// The transaction this command belongs to.
    fn transaction_id(&self) -> TransactionId;

    /// Whether this command may create the hosted state when none exists.
    fn can_start_remote_transaction(&self) -> bool;

    /// Whether this command may run inside a hosted transaction at all.
    fn can_participate_in_transaction(&self) -> bool;
}

impl<C: TransactionalCommand + ?Sized> TransactionalCommand for &C {
    fn transaction_id(&self) -> TransactionId {
        (**self).transaction_id()
    }

    fn can_start_remote_transaction(&self) -> bool {
        (**self).can_start_remote_transaction()
    }

    fn can_participate_in_transaction(&self) -> bool {
        (**self).can_participate_in_transaction()
    }
}
