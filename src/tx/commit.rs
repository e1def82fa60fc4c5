//! Three-phase commit coordination.
//!
//! [`CommitCoordinator`] drives the cohorts of one submitted transaction
//! through CAN_COMMIT, PRE_COMMIT and COMMIT. A phase runs on all cohorts
//! concurrently; the next phase starts only once every cohort finished the
//! previous one. The first failure aborts every cohort and becomes the
//! caller's result. Failures raised while aborting are logged, never
//! reported.
//!
//! ```text
//! OPEN ─► CAN_COMMIT ─► PRE_COMMIT ─► COMMIT ─► DONE
//!             │              │           │
//!             └──────────────┴───────────┴─► ABORTING ─► FAILED
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::StreamExt;
use futures_util::future::join_all;
use futures_util::stream::FuturesUnordered;
use tokio::sync::oneshot;

use super::notify::NotificationPool;
use super::{CommitPhase, TransactionId, TransactionState};
use crate::domain::NodeId;
use crate::error::{StoreError, TransactionError};
use crate::store::CommitCohort;

/// Result delivered to the submitter of a transaction.
pub type CommitResult = Result<(), TransactionError>;

/// Single-use completion handle.
///
/// The sender is consumed by the first terminal state; later attempts are
/// ignored and reported as `false`.
#[derive(Debug)]
pub struct CommitCompletion {
    sender: Option<oneshot::Sender<CommitResult>>,
}

impl CommitCompletion {
    /// Creates a completion handle and the future observing it.
    #[must_use]
    pub fn new(id: TransactionId) -> (Self, CommitFuture) {
        let (sender, receiver) = oneshot::channel();
        (
            Self {
                sender: Some(sender),
            },
            CommitFuture { id, receiver },
        )
    }

    /// Delivers `result` unless a result was already delivered.
    pub fn complete(&mut self, result: CommitResult) -> bool {
        match self.sender.take() {
            // The caller may have dropped its future; the commit stands.
            Some(sender) => {
                let _ = sender.send(result);
                true
            }
            None => false,
        }
    }
}

/// Future resolving to the outcome of a submitted transaction.
///
/// Dropping it does not cancel the commit.
#[derive(Debug)]
#[must_use = "dropping a CommitFuture ignores the commit outcome"]
pub struct CommitFuture {
    id: TransactionId,
    receiver: oneshot::Receiver<CommitResult>,
}

impl CommitFuture {
    /// Returns a future that is already resolved with `result`.
    pub(crate) fn ready(id: TransactionId, result: CommitResult) -> Self {
        let (mut completion, future) = CommitCompletion::new(id);
        completion.complete(result);
        future
    }

    /// Returns the identifier of the submitted transaction.
    #[must_use]
    pub const fn id(&self) -> TransactionId {
        self.id
    }
}

impl Future for CommitFuture {
    type Output = CommitResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(TransactionError::Abandoned)))
    }
}

/// Drives the cohorts of one transaction through the commit protocol.
#[derive(Debug)]
pub struct CommitCoordinator {
    id: TransactionId,
    node_id: NodeId,
    cohorts: Vec<Box<dyn CommitCohort>>,
    state: TransactionState,
}

impl CommitCoordinator {
    /// Creates a coordinator in the `Open` state.
    #[must_use]
    pub fn new(id: TransactionId, node_id: NodeId, cohorts: Vec<Box<dyn CommitCohort>>) -> Self {
        Self {
            id,
            node_id,
            cohorts,
            state: TransactionState::Open,
        }
    }

    /// Returns the current protocol state.
    #[must_use]
    pub const fn state(&self) -> TransactionState {
        self.state
    }

    /// Starts the commit on a spawned task and returns its outcome future.
    ///
    /// The terminal result is handed to the caller through `notifier`.
    pub fn submit(self, notifier: Arc<NotificationPool>) -> CommitFuture {
        let (mut completion, future) = CommitCompletion::new(self.id);
        tokio::spawn(async move {
            let mut coordinator = self;
            let result = coordinator.run().await;
            notifier
                .dispatch(async move {
                    completion.complete(result);
                })
                .await;
        });
        future
    }

    /// Runs the protocol to a terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionError::PhaseFailure`] carrying the phase and the
    /// original cause of the first failure.
    pub async fn run(&mut self) -> CommitResult {
        tracing::debug!(
            tx_id = %self.id,
            node_id = %self.node_id,
            cohorts = self.cohorts.len(),
            "commit started"
        );
        for phase in CommitPhase::ALL {
            self.transition(TransactionState::from(phase));
            if let Err(cause) = self.run_phase(phase).await {
                tracing::warn!(
                    tx_id = %self.id,
                    node_id = %self.node_id,
                    phase = %phase,
                    error = %cause,
                    "commit phase failed, aborting"
                );
                self.abort().await;
                self.transition(TransactionState::Failed);
                return Err(TransactionError::PhaseFailure { phase, cause });
            }
        }
        self.transition(TransactionState::Done);
        Ok(())
    }

    async fn run_phase(&mut self, phase: CommitPhase) -> Result<(), StoreError> {
        let mut pending: FuturesUnordered<_> = self
            .cohorts
            .iter_mut()
            .map(|cohort| run_cohort_phase(cohort.as_mut(), phase))
            .collect();

        let mut first_failure = None;
        while let Some(result) = pending.next().await {
            if let Err(err) = result
                && first_failure.is_none()
            {
                first_failure = Some(err);
            }
        }
        first_failure.map_or(Ok(()), Err)
    }

    async fn abort(&mut self) {
        self.transition(TransactionState::Aborting);
        let id = self.id;
        let results = join_all(self.cohorts.iter_mut().map(|cohort| async move {
            let outcome = cohort.abort().await;
            (cohort.name().to_string(), outcome)
        }))
        .await;
        for (store, outcome) in results {
            if let Err(err) = outcome {
                tracing::error!(tx_id = %id, %store, error = %err, "abort failed");
            }
        }
    }

    fn transition(&mut self, next: TransactionState) {
        tracing::trace!(tx_id = %self.id, from = ?self.state, to = ?next, "transaction state change");
        self.state = next;
    }
}

async fn run_cohort_phase(cohort: &mut dyn CommitCohort, phase: CommitPhase) -> Result<(), StoreError> {
    match phase {
        CommitPhase::CanCommit => {
            let vote = cohort.can_commit().await?;
            if vote {
                Ok(())
            } else {
                Err(StoreError::Rejected(cohort.name().to_string()))
            }
        }
        CommitPhase::PreCommit => cohort.pre_commit().await,
        CommitPhase::Commit => cohort.commit().await,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures_util::future::BoxFuture;

    use super::*;

    /// Scripted cohort counting every call.
    #[derive(Debug, Default)]
    struct Calls {
        can_commit: AtomicUsize,
        pre_commit: AtomicUsize,
        commit: AtomicUsize,
        abort: AtomicUsize,
    }

    #[derive(Debug)]
    struct ScriptedCohort {
        name: String,
        vote: Result<bool, StoreError>,
        fail_pre_commit: bool,
        fail_commit: bool,
        fail_abort: bool,
        calls: Arc<Calls>,
    }

    impl ScriptedCohort {
        fn new(name: &str, calls: &Arc<Calls>) -> Self {
            Self {
                name: name.to_string(),
                vote: Ok(true),
                fail_pre_commit: false,
                fail_commit: false,
                fail_abort: false,
                calls: Arc::clone(calls),
            }
        }
    }

    impl CommitCohort for ScriptedCohort {
        fn name(&self) -> &str {
            &self.name
        }

        fn can_commit(&mut self) -> BoxFuture<'_, Result<bool, StoreError>> {
            self.calls.can_commit.fetch_add(1, Ordering::SeqCst);
            let vote = self.vote.clone();
            Box::pin(async move { vote })
        }

        fn pre_commit(&mut self) -> BoxFuture<'_, Result<(), StoreError>> {
            self.calls.pre_commit.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail_pre_commit;
            Box::pin(async move {
                if fail {
                    Err(StoreError::Internal("pre-commit exploded".to_string()))
                } else {
                    Ok(())
                }
            })
        }

        fn commit(&mut self) -> BoxFuture<'_, Result<(), StoreError>> {
            self.calls.commit.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail_commit;
            let name = self.name.clone();
            Box::pin(async move {
                if fail {
                    Err(StoreError::Conflict { path: format!("/{name}") })
                } else {
                    Ok(())
                }
            })
        }

        fn abort(&mut self) -> BoxFuture<'_, Result<(), StoreError>> {
            self.calls.abort.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail_abort;
            Box::pin(async move {
                if fail {
                    Err(StoreError::Internal("abort exploded".to_string()))
                } else {
                    Ok(())
                }
            })
        }
    }

    fn coordinator(cohorts: Vec<ScriptedCohort>) -> CommitCoordinator {
        CommitCoordinator::new(
            TransactionId::new(),
            NodeId::new("r1"),
            cohorts
                .into_iter()
                .map(|c| Box::new(c) as Box<dyn CommitCohort>)
                .collect(),
        )
    }

    #[tokio::test]
    async fn all_phases_run_in_order_on_success() {
        let calls = Arc::new(Calls::default());
        let mut coordinator = coordinator(vec![
            ScriptedCohort::new("cfg", &calls),
            ScriptedCohort::new("oper", &calls),
        ]);
        tokio_test::assert_ok!(coordinator.run().await);
        assert_eq!(coordinator.state(), TransactionState::Done);
        assert_eq!(calls.can_commit.load(Ordering::SeqCst), 2);
        assert_eq!(calls.pre_commit.load(Ordering::SeqCst), 2);
        assert_eq!(calls.commit.load(Ordering::SeqCst), 2);
        assert_eq!(calls.abort.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn can_commit_error_wins_over_abort_error() {
        let calls = Arc::new(Calls::default());
        let mut failing = ScriptedCohort::new("cfg", &calls);
        failing.vote = Err(StoreError::Internal("validation backend down".to_string()));
        failing.fail_abort = true;
        let mut coordinator = coordinator(vec![failing]);

        let result = coordinator.run().await;
        let Err(TransactionError::PhaseFailure { phase, cause }) = result else {
            panic!("expected phase failure, got {result:?}");
        };
        assert_eq!(phase, CommitPhase::CanCommit);
        assert!(matches!(cause, StoreError::Internal(ref m) if m == "validation backend down"));
        assert_eq!(calls.pre_commit.load(Ordering::SeqCst), 0);
        assert_eq!(calls.commit.load(Ordering::SeqCst), 0);
        assert_eq!(calls.abort.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.state(), TransactionState::Failed);
    }

    #[tokio::test]
    async fn negative_vote_is_rejected_without_cause() {
        let calls = Arc::new(Calls::default());
        let mut no = ScriptedCohort::new("cfg", &calls);
        no.vote = Ok(false);
        let mut coordinator = coordinator(vec![no, ScriptedCohort::new("oper", &calls)]);

        let result = coordinator.run().await;
        let Err(TransactionError::PhaseFailure { phase, cause }) = result else {
            panic!("expected phase failure, got {result:?}");
        };
        assert_eq!(phase, CommitPhase::CanCommit);
        assert!(matches!(cause, StoreError::Rejected(ref name) if name == "cfg"));
        // every cohort is aborted, including the one that voted yes
        assert_eq!(calls.abort.load(Ordering::SeqCst), 2);
        assert_eq!(calls.pre_commit.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pre_commit_failure_skips_commit() {
        let calls = Arc::new(Calls::default());
        let mut failing = ScriptedCohort::new("cfg", &calls);
        failing.fail_pre_commit = true;
        let mut coordinator = coordinator(vec![failing]);

        let result = coordinator.run().await;
        assert!(matches!(
            result.as_ref().map_err(TransactionError::phase),
            Err(Some(CommitPhase::PreCommit))
        ));
        assert_eq!(calls.commit.load(Ordering::SeqCst), 0);
        assert_eq!(calls.abort.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn commit_failure_aborts_and_reports_commit_phase() {
        let calls = Arc::new(Calls::default());
        let mut failing = ScriptedCohort::new("cfg", &calls);
        failing.fail_commit = true;
        let mut coordinator = coordinator(vec![failing, ScriptedCohort::new("oper", &calls)]);

        let result = coordinator.run().await;
        let Err(TransactionError::PhaseFailure { phase, cause }) = result else {
            panic!("expected phase failure, got {result:?}");
        };
        assert_eq!(phase, CommitPhase::Commit);
        assert!(matches!(cause, StoreError::Conflict { ref path } if path == "/cfg"));
        assert_eq!(calls.pre_commit.load(Ordering::SeqCst), 2);
        assert_eq!(calls.commit.load(Ordering::SeqCst), 2);
        assert_eq!(calls.abort.load(Ordering::SeqCst), 2);
        assert_eq!(coordinator.state(), TransactionState::Failed);
    }

    #[tokio::test]
    async fn several_failures_in_one_phase_yield_one_phase_failure() {
        let calls = Arc::new(Calls::default());
        let mut cfg = ScriptedCohort::new("cfg", &calls);
        cfg.fail_pre_commit = true;
        let mut oper = ScriptedCohort::new("oper", &calls);
        oper.fail_pre_commit = true;
        let mut coordinator = coordinator(vec![cfg, oper]);

        let result = coordinator.run().await;
        let Err(TransactionError::PhaseFailure { phase, cause }) = result else {
            panic!("expected phase failure, got {result:?}");
        };
        assert_eq!(phase, CommitPhase::PreCommit);
        assert!(matches!(cause, StoreError::Internal(ref m) if m == "pre-commit exploded"));
        // both cohorts ran the phase, then both were aborted exactly once
        assert_eq!(calls.pre_commit.load(Ordering::SeqCst), 2);
        assert_eq!(calls.commit.load(Ordering::SeqCst), 0);
        assert_eq!(calls.abort.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn submitted_result_is_delivered_through_pool() {
        let calls = Arc::new(Calls::default());
        let coordinator = coordinator(vec![ScriptedCohort::new("cfg", &calls)]);
        let future = coordinator.submit(Arc::new(NotificationPool::new(1, 1)));
        tokio_test::assert_ok!(future.await);
        assert_eq!(calls.commit.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn completion_is_delivered_once() {
        let (mut completion, future) = CommitCompletion::new(TransactionId::new());
        assert!(completion.complete(Ok(())));
        assert!(!completion.complete(Err(TransactionError::Abandoned)));
        assert!(future.await.is_ok());
    }

    #[tokio::test]
    async fn dropped_completion_reports_abandoned() {
        let (completion, future) = CommitCompletion::new(TransactionId::new());
        drop(completion);
        assert!(matches!(future.await, Err(TransactionError::Abandoned)));
    }
}
