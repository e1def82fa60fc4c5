//! Read-write transactions.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use super::broker::BrokerContext;
use super::commit::CommitFuture;
use super::{DataRead, DataWrite, ReadOnlyTransaction, TransactionId, WriteOnlyTransaction};
use crate::error::TransactionError;
use crate::store::{DataPath, StoreKind};

/// Transaction combining a read side and a write side.
///
/// Reads of a store kind the transaction has written to observe the
/// transaction's own pending writes.
#[derive(Debug)]
pub struct ReadWriteTransaction {
    read: ReadOnlyTransaction,
    write: WriteOnlyTransaction,
}

impl ReadWriteTransaction {
    pub(crate) fn new(id: TransactionId, context: &Arc<BrokerContext>) -> Self {
        Self {
            read: ReadOnlyTransaction::new(id, Arc::clone(context)),
            write: WriteOnlyTransaction::new(id, Arc::clone(context)),
        }
    }

    /// Returns the transaction identifier.
    #[must_use]
    pub const fn id(&self) -> TransactionId {
        self.write.id()
    }
}

impl DataRead for ReadWriteTransaction {
    fn read(
        &self,
        kind: StoreKind,
        path: &DataPath,
    ) -> impl Future<Output = Result<Option<Value>, TransactionError>> + Send {
        self.read.read_through(kind, path, self.write.staged(kind))
    }

    fn close(&self) {
        self.read.close();
    }
}

impl DataWrite for ReadWriteTransaction {
    fn put(
        &mut self,
        kind: StoreKind,
        path: DataPath,
        value: Value,
    ) -> impl Future<Output = Result<(), TransactionError>> + Send {
        self.write.put(kind, path, value)
    }

    fn merge(
        &mut self,
        kind: StoreKind,
        path: DataPath,
        value: Value,
    ) -> impl Future<Output = Result<(), TransactionError>> + Send {
        self.write.merge(kind, path, value)
    }

    fn delete(
        &mut self,
        kind: StoreKind,
        path: DataPath,
    ) -> impl Future<Output = Result<(), TransactionError>> + Send {
        self.write.delete(kind, path)
    }

    fn cancel(self) -> bool {
        self.write.cancel()
    }

    fn submit(self) -> CommitFuture {
        self.write.submit()
    }
}
