//! Read-only transactions.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;

use super::broker::BrokerContext;
use super::{DataRead, TransactionId};
use crate::error::TransactionError;
use crate::store::{DataPath, StoreKind, StoreWriteTransaction};

/// Guards the single outstanding read of a transaction.
#[derive(Debug, Default)]
pub(crate) struct ReadSlot {
    busy: AtomicBool,
}

impl ReadSlot {
    fn claim(&self, id: TransactionId) -> Result<(), TransactionError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| {
                TransactionError::IllegalState(format!(
                    "transaction {id} already has an open read, close it before reading again"
                ))
            })
    }

    fn release(&self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Transaction reading committed data of a mount point.
#[derive(Debug)]
pub struct ReadOnlyTransaction {
    id: TransactionId,
    context: Arc<BrokerContext>,
    slot: ReadSlot,
}

impl ReadOnlyTransaction {
    pub(crate) fn new(id: TransactionId, context: Arc<BrokerContext>) -> Self {
        Self {
            id,
            context,
            slot: ReadSlot::default(),
        }
    }

    /// Returns the transaction identifier.
    #[must_use]
    pub const fn id(&self) -> TransactionId {
        self.id
    }

    /// Reads `path`, preferring `staged` (the caller's own pending writes)
    /// over committed data.
    pub(crate) async fn read_through(
        &self,
        kind: StoreKind,
        path: &DataPath,
        staged: Option<&StoreWriteTransaction>,
    ) -> Result<Option<Value>, TransactionError> {
        self.slot.claim(self.id)?;
        tracing::debug!(
            tx_id = %self.id,
            node_id = %self.context.node_id,
            store = %kind,
            %path,
            "read"
        );
        let result = match staged {
            Some(staged) => staged.read(path).map_err(TransactionError::from),
            None => self.context.read_committed(kind, path),
        };
        if let Err(err) = &result {
            tracing::error!(
                tx_id = %self.id,
                node_id = %self.context.node_id,
                store = %kind,
                %path,
                error = %err,
                "failed to read store"
            );
            self.slot.release();
        }
        result
    }
}

impl DataRead for ReadOnlyTransaction {
    fn read(
        &self,
        kind: StoreKind,
        path: &DataPath,
    ) -> impl Future<Output = Result<Option<Value>, TransactionError>> + Send {
        self.read_through(kind, path, None)
    }

    fn close(&self) {
        self.slot.release();
    }
}
