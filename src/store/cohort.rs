//! Commit participants.
//!
//! A [`CommitCohort`] is one store's side of a three-phase commit. The
//! transaction coordinator drives every cohort of a transaction through
//! CAN_COMMIT, PRE_COMMIT and COMMIT, or ABORT on the first failure.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use super::memory::{InMemoryStore, Modification};
use crate::error::StoreError;

/// One participant in a three-phase commit.
///
/// Each phase is invoked at most once, in order; `abort` may follow any of
/// them. Implementations must tolerate `abort` without a prior phase.
pub trait CommitCohort: Send + fmt::Debug {
    /// Returns a name identifying the participant in logs.
    fn name(&self) -> &str;

    /// Votes on whether the transaction can commit.
    fn can_commit(&mut self) -> BoxFuture<'_, Result<bool, StoreError>>;

    /// Prepares the commit so that `commit` cannot fail on validation.
    fn pre_commit(&mut self) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Makes the prepared changes visible.
    fn commit(&mut self) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Discards any prepared state.
    fn abort(&mut self) -> BoxFuture<'_, Result<(), StoreError>>;
}

/// Cohort over an [`InMemoryStore`], produced by
/// [`StoreWriteTransaction::ready`](super::StoreWriteTransaction::ready).
#[derive(Debug)]
pub struct InMemoryCohort {
    store: Arc<InMemoryStore>,
    base_version: u64,
    modifications: Vec<Modification>,
    prepared: Option<Prepared>,
}

#[derive(Debug)]
struct Prepared {
    candidate: Value,
    version: u64,
}

impl InMemoryCohort {
    pub(crate) fn new(store: Arc<InMemoryStore>, base_version: u64, modifications: Vec<Modification>) -> Self {
        Self {
            store,
            base_version,
            modifications,
            prepared: None,
        }
    }

    /// Returns the sealed modifications.
    #[must_use]
    pub fn modifications(&self) -> &[Modification] {
        &self.modifications
    }
}

impl CommitCohort for InMemoryCohort {
    fn name(&self) -> &str {
        self.store.name()
    }

    fn can_commit(&mut self) -> BoxFuture<'_, Result<bool, StoreError>> {
        Box::pin(async move { self.store.can_commit(self.base_version, &self.modifications) })
    }

    fn pre_commit(&mut self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let (candidate, version) = self.store.prepare(self.base_version, &self.modifications)?;
            self.prepared = Some(Prepared { candidate, version });
            Ok(())
        })
    }

    fn commit(&mut self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let Some(prepared) = self.prepared.take() else {
                return Err(StoreError::NotPrepared {
                    store: self.store.name().to_string(),
                    operation: "commit",
                });
            };
            self.store
                .install(prepared.candidate, prepared.version, &self.modifications)?;
            Ok(())
        })
    }

    fn abort(&mut self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            if self.prepared.take().is_some() {
                tracing::debug!(store = %self.store.name(), "discarded prepared candidate");
            }
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::test_support::test_store;
    use crate::store::{DataPath, StoreKind};

    #[tokio::test]
    async fn full_commit_makes_changes_visible() {
        let store = test_store(StoreKind::Configuration);
        let Ok(mut tx) = store.new_write_transaction() else {
            panic!("open failed");
        };
        assert!(tx.put(DataPath::parse("system/hostname"), json!("r1")).is_ok());
        let mut cohort = tx.ready();

        assert!(matches!(cohort.can_commit().await, Ok(true)));
        assert!(cohort.pre_commit().await.is_ok());
        assert!(cohort.commit().await.is_ok());

        let Ok(snapshot) = store.snapshot() else {
            panic!("snapshot failed");
        };
        assert_eq!(snapshot.version(), 1);
        let Ok(Some(hostname)) = snapshot.read(&DataPath::parse("system/hostname")) else {
            panic!("hostname missing");
        };
        assert_eq!(hostname, json!("r1"));
    }

    #[tokio::test]
    async fn commit_without_pre_commit_is_rejected() {
        let store = test_store(StoreKind::Configuration);
        let Ok(tx) = store.new_write_transaction() else {
            panic!("open failed");
        };
        let mut cohort = tx.ready();
        assert!(matches!(
            cohort.commit().await,
            Err(StoreError::NotPrepared { operation: "commit", .. })
        ));
    }

    #[tokio::test]
    async fn abort_discards_prepared_candidate() {
        let store = test_store(StoreKind::Configuration);
        let Ok(mut tx) = store.new_write_transaction() else {
            panic!("open failed");
        };
        assert!(tx.put(DataPath::parse("system"), json!({"a": 1})).is_ok());
        let mut cohort = tx.ready();
        assert!(cohort.pre_commit().await.is_ok());
        assert!(cohort.abort().await.is_ok());
        assert!(cohort.commit().await.is_err());
        assert!(matches!(store.version(), Ok(0)));
    }

    #[tokio::test]
    async fn second_writer_on_same_path_loses() {
        let store = test_store(StoreKind::Configuration);
        let (Ok(mut first), Ok(mut second)) =
            (store.new_write_transaction(), store.new_write_transaction())
        else {
            panic!("open failed");
        };
        assert!(first.put(DataPath::parse("interfaces/eth0"), json!({})).is_ok());
        assert!(second.merge(DataPath::parse("interfaces"), json!({"eth1": {}})).is_ok());

        let mut first = first.ready();
        assert!(first.pre_commit().await.is_ok());
        assert!(first.commit().await.is_ok());

        let mut second = second.ready();
        assert!(matches!(second.can_commit().await, Ok(false)));
        assert!(matches!(
            second.pre_commit().await,
            Err(StoreError::Conflict { .. })
        ));
    }

    #[tokio::test]
    async fn interleaved_commits_on_disjoint_paths_both_succeed() {
        let store = test_store(StoreKind::Configuration);
        let (Ok(mut a), Ok(mut b)) = (store.new_write_transaction(), store.new_write_transaction()) else {
            panic!("open failed");
        };
        assert!(a.put(DataPath::parse("system/hostname"), json!("r1")).is_ok());
        assert!(b.put(DataPath::parse("interfaces/eth0"), json!({"up": true})).is_ok());
        let (mut a, mut b) = (a.ready(), b.ready());

        assert!(matches!(a.can_commit().await, Ok(true)));
        assert!(matches!(b.can_commit().await, Ok(true)));
        assert!(a.pre_commit().await.is_ok());
        assert!(b.pre_commit().await.is_ok());
        assert!(a.commit().await.is_ok());
        assert!(b.commit().await.is_ok());

        let Ok(snapshot) = store.snapshot() else {
            panic!("snapshot failed");
        };
        assert_eq!(snapshot.version(), 2);
        assert!(matches!(snapshot.read(&DataPath::parse("system/hostname")), Ok(Some(_))));
        assert!(matches!(snapshot.read(&DataPath::parse("interfaces/eth0/up")), Ok(Some(_))));
    }
}
