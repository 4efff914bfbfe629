//! Core type definitions for hosted transactions.

use std::fmt;
use uuid::Uuid;

/// Identity of a cluster member that coordinates transactions.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemberId(Uuid);

impl MemberId {
    /// Creates a new random member ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The all-zero member ID.
    #[must_use]
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Creates a member ID from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MemberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemberId({})", self.0)
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one distributed transaction.
///
/// A transaction is named by the member that coordinates it and a sequence
/// number that member hands out monotonically. Equality is by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransactionId {
    member: MemberId,
    seq: u64,
}

impl TransactionId {
    /// Creates a transaction ID.
    #[must_use]
    pub const fn new(member: MemberId, seq: u64) -> Self {
        Self { member, seq }
    }

    /// Returns the coordinating member.
    #[must_use]
    pub const fn member(&self) -> MemberId {
        self.member
    }

    /// Returns the member-scoped sequence number.
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}:{}", self.member, self.seq)
    }
}

/// Stable identity of one hosted entry.
///
/// Handles are minted once per created entry and never reused within a
/// registry, so two entries for the same transaction are told apart by
/// their handle even when their contents are identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryHandle(u64);

impl EntryHandle {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw handle value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry:{}", self.0)
    }
}

/// Where a hosted entry was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOrigin {
    /// Started on this member by a local `begin`.
    Local,
    /// Created on first message from another member or a client.
    Remote,
}
