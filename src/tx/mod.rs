//! Transaction pipeline: reads and three-phase-committed writes against a
//! mount point's pooled stores.
//!
//! Transactions are created by a mount point's [`DataBroker`]. Capabilities
//! are split into two traits: [`DataRead`] and [`DataWrite`].
//! [`ReadOnlyTransaction`] and [`WriteOnlyTransaction`] implement one each;
//! [`ReadWriteTransaction`] composes both.

pub mod broker;
pub mod commit;
pub mod id;
pub mod notify;
pub mod read;
pub mod read_write;
pub mod write;

use std::fmt;
use std::future::Future;

use serde::Serialize;
use serde_json::Value;

pub use broker::{DataBroker, ListenerRegistration};
pub use commit::{CommitCompletion, CommitCoordinator, CommitFuture, CommitResult};
pub use id::TransactionId;
pub use notify::NotificationPool;
pub use read::ReadOnlyTransaction;
pub use read_write::ReadWriteTransaction;
pub use write::WriteOnlyTransaction;

use crate::error::TransactionError;
use crate::store::{DataPath, StoreKind};

/// One phase of the three-phase commit protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommitPhase {
    /// Every cohort votes on whether the transaction can commit.
    CanCommit,
    /// Every cohort prepares the commit.
    PreCommit,
    /// Every cohort makes the changes visible.
    Commit,
}

impl CommitPhase {
    /// All phases, in protocol order.
    pub const ALL: [Self; 3] = [Self::CanCommit, Self::PreCommit, Self::Commit];

    /// Returns the protocol name of the phase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CanCommit => "CAN_COMMIT",
            Self::PreCommit => "PRE_COMMIT",
            Self::Commit => "COMMIT",
        }
    }
}

impl fmt::Display for CommitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Created, not yet submitted.
    Open,
    /// Cohorts are voting.
    CanCommit,
    /// Cohorts are preparing.
    PreCommit,
    /// Cohorts are committing.
    Commit,
    /// Committed.
    Done,
    /// A phase failed; cohorts are being aborted.
    Aborting,
    /// Aborted after a failure.
    Failed,
}

impl From<CommitPhase> for TransactionState {
    fn from(phase: CommitPhase) -> Self {
        match phase {
            CommitPhase::CanCommit => Self::CanCommit,
            CommitPhase::PreCommit => Self::PreCommit,
            CommitPhase::Commit => Self::Commit,
        }
    }
}

/// Read capability of a transaction.
///
/// At most one read may be outstanding per transaction: a read (or
/// `exists`) occupies the transaction until [`close`](Self::close) is
/// called, unless it fails.
pub trait DataRead: Send + Sync {
    /// Reads the node at `path` from the `kind` store.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::IllegalState`] if a previous read was not
    /// closed, or [`TransactionError::Store`] if the store read fails.
    fn read(
        &self,
        kind: StoreKind,
        path: &DataPath,
    ) -> impl Future<Output = Result<Option<Value>, TransactionError>> + Send;

    /// Returns `true` if a node exists at `path`. Subject to the same
    /// single-read rule as [`read`](Self::read).
    ///
    /// # Errors
    ///
    /// Same as [`read`](Self::read).
    fn exists(
        &self,
        kind: StoreKind,
        path: &DataPath,
    ) -> impl Future<Output = Result<bool, TransactionError>> + Send {
        async move { Ok(self.read(kind, path).await?.is_some()) }
    }

    /// Releases the read slot.
    fn close(&self);
}

/// Write capability of a transaction.
///
/// Writes are staged until [`submit`](Self::submit); both `submit` and
/// [`cancel`](Self::cancel) consume the transaction.
pub trait DataWrite: Send {
    /// Stages a replace of the node at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::InvalidPath`] for the root path, or
    /// [`TransactionError::Store`] if staging fails.
    fn put(
        &mut self,
        kind: StoreKind,
        path: DataPath,
        value: Value,
    ) -> impl Future<Output = Result<(), TransactionError>> + Send;

    /// Stages a deep merge into the node at `path`.
    ///
    /// # Errors
    ///
    /// Same as [`put`](Self::put).
    fn merge(
        &mut self,
        kind: StoreKind,
        path: DataPath,
        value: Value,
    ) -> impl Future<Output = Result<(), TransactionError>> + Send;

    /// Stages removal of the node at `path`.
    ///
    /// # Errors
    ///
    /// Same as [`put`](Self::put).
    fn delete(
        &mut self,
        kind: StoreKind,
        path: DataPath,
    ) -> impl Future<Output = Result<(), TransactionError>> + Send;

    /// Discards every staged modification. Returns `true`.
    fn cancel(self) -> bool;

    /// Starts the three-phase commit of the staged modifications.
    fn submit(self) -> CommitFuture;
}
