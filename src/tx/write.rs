//! Write-only transactions.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use super::broker::BrokerContext;
use super::commit::{CommitCoordinator, CommitFuture};
use super::{DataWrite, TransactionId};
use crate::error::TransactionError;
use crate::store::{CommitCohort, DataPath, StoreKind, StoreWriteTransaction};

/// Transaction staging writes against a mount point.
///
/// Opens at most one store write transaction per [`StoreKind`] it touches;
/// each becomes one cohort at submit time.
#[derive(Debug)]
pub struct WriteOnlyTransaction {
    id: TransactionId,
    context: Arc<BrokerContext>,
    staged: BTreeMap<StoreKind, StoreWriteTransaction>,
}

impl WriteOnlyTransaction {
    pub(crate) fn new(id: TransactionId, context: Arc<BrokerContext>) -> Self {
        Self {
            id,
            context,
            staged: BTreeMap::new(),
        }
    }

    /// Returns the transaction identifier.
    #[must_use]
    pub const fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the pending writes for `kind`, if any were staged.
    pub(crate) fn staged(&self, kind: StoreKind) -> Option<&StoreWriteTransaction> {
        self.staged.get(&kind)
    }

    fn store_transaction(&mut self, kind: StoreKind) -> Result<&mut StoreWriteTransaction, TransactionError> {
        match self.staged.entry(kind) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let store = self.context.store(kind);
                Ok(entry.insert(store.new_write_transaction()?))
            }
        }
    }

    fn trace(&self, operation: &'static str, kind: StoreKind, path: &DataPath) {
        tracing::debug!(
            tx_id = %self.id,
            node_id = %self.context.node_id,
            store = %kind,
            %path,
            operation,
            "staged write"
        );
    }
}

fn require_path(path: &DataPath) -> Result<(), TransactionError> {
    if path.is_empty() {
        return Err(TransactionError::InvalidPath(
            "writes must target a node below the mount root".to_string(),
        ));
    }
    Ok(())
}

impl DataWrite for WriteOnlyTransaction {
    fn put(
        &mut self,
        kind: StoreKind,
        path: DataPath,
        value: Value,
    ) -> impl Future<Output = Result<(), TransactionError>> + Send {
        async move {
            require_path(&path)?;
            self.trace("put", kind, &path);
            self.store_transaction(kind)?.put(path, value)?;
            Ok(())
        }
    }

    fn merge(
        &mut self,
        kind: StoreKind,
        path: DataPath,
        value: Value,
    ) -> impl Future<Output = Result<(), TransactionError>> + Send {
        async move {
            require_path(&path)?;
            self.trace("merge", kind, &path);
            self.store_transaction(kind)?.merge(path, value)?;
            Ok(())
        }
    }

    fn delete(
        &mut self,
        kind: StoreKind,
        path: DataPath,
    ) -> impl Future<Output = Result<(), TransactionError>> + Send {
        async move {
            require_path(&path)?;
            self.trace("delete", kind, &path);
            self.store_transaction(kind)?.delete(path)?;
            Ok(())
        }
    }

    fn cancel(self) -> bool {
        tracing::debug!(
            tx_id = %self.id,
            node_id = %self.context.node_id,
            stores = self.staged.len(),
            "transaction cancelled"
        );
        true
    }

    fn submit(self) -> CommitFuture {
        let cohorts: Vec<Box<dyn CommitCohort>> = self
            .staged
            .into_values()
            .filter(|tx| !tx.modifications().is_empty())
            .map(|tx| Box::new(tx.ready()) as Box<dyn CommitCohort>)
            .collect();
        tracing::debug!(
            tx_id = %self.id,
            node_id = %self.context.node_id,
            cohorts = cohorts.len(),
            "transaction submitted"
        );
        if cohorts.is_empty() {
            return CommitFuture::ready(self.id, Ok(()));
        }
        CommitCoordinator::new(self.id, self.context.node_id.clone(), cohorts)
            .submit(Arc::clone(&self.context.notifier))
    }
}
