//! Submission lifecycle of a batch: `Idle -> Submitting -> Resolved`, with local cancel.
//!
//! Every submission is tagged with a generation number. Cancelling, or dropping the
//! future returned by [`BatchSubmitter::submit`], bumps the generation, so whatever the
//! collaborator answers afterwards is compared against a stale tag and discarded.
//!
//! All methods take `&self`. The state lock is never held across an `.await`, which lets
//! [`BatchSubmitter::cancel`] run while a submission is suspended. Submitting must happen
//! inside a Tokio runtime: the call is bounded with `tokio::time::timeout` and the
//! resolution lookup runs on a spawned task.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::batch::BatchRequest;
use crate::collaborator::SigningCollaborator;
use crate::config::SubmitterConfig;
use crate::error::{MultisendError, ResolutionLookupError, Result, SubmissionError, TaxonomyCode};
use crate::types::{RequestId, ResolutionRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Submitting,
    Resolved(RequestId),
}

/// What happened to a submission that did not fail.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// The collaborator accepted the batch. `lookup` resolves to its status; dropping it
    /// leaves the lookup running in the background.
    Resolved {
        request_id: RequestId,
        lookup: ResolutionLookup,
    },
    /// The submission was cancelled locally before the collaborator answered.
    Discarded,
}

/// Handle to the best-effort status lookup started after acceptance.
#[derive(Debug)]
pub struct ResolutionLookup {
    request_id: RequestId,
    handle: JoinHandle<std::result::Result<ResolutionRecord, ResolutionLookupError>>,
}

impl ResolutionLookup {
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub async fn wait(self) -> std::result::Result<ResolutionRecord, ResolutionLookupError> {
        match self.handle.await {
            Ok(result) => result,
            Err(err) => Err(ResolutionLookupError {
                request_id: self.request_id,
                message: format!("lookup task failed: {err}"),
            }),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: SubmissionState,
    generation: u64,
    last_error: Option<SubmissionError>,
}

pub struct BatchSubmitter {
    collaborator: Arc<dyn SigningCollaborator>,
    config: SubmitterConfig,
    inner: Mutex<Inner>,
}

impl BatchSubmitter {
    pub fn new(collaborator: Arc<dyn SigningCollaborator>, config: SubmitterConfig) -> Self {
        Self {
            collaborator,
            config,
            inner: Mutex::new(Inner {
                state: SubmissionState::Idle,
                generation: 0,
                last_error: None,
            }),
        }
    }

    pub fn state(&self) -> SubmissionState {
        self.lock().state.clone()
    }

    pub fn is_submitting(&self) -> bool {
        self.lock().state == SubmissionState::Submitting
    }

    /// The failure that most recently sent the submitter back to `Idle`.
    pub fn last_error(&self) -> Option<SubmissionError> {
        self.lock().last_error.clone()
    }

    /// Sends `batch` to the collaborator and waits for it to be accepted.
    ///
    /// Rejection, collaborator errors and timeouts all return the submitter to `Idle`
    /// and surface as a [`SubmissionError`], so the same batch can be submitted again.
    pub async fn submit(&self, batch: &BatchRequest) -> Result<SubmitOutcome> {
        let generation = {
            let mut inner = self.lock();
            if inner.state == SubmissionState::Submitting {
                return Err(MultisendError::submission(
                    TaxonomyCode::Submission5003,
                    "a batch is already being submitted",
                ));
            }
            inner.generation += 1;
            inner.state = SubmissionState::Submitting;
            inner.last_error = None;
            inner.generation
        };
        let mut in_flight = InFlight {
            submitter: self,
            generation,
            armed: true,
        };
        info!(generation, instructions = batch.len(), "submitting batch");

        let response = tokio::time::timeout(
            self.config.submit_timeout,
            self.collaborator.send_batch(&batch.instructions),
        )
        .await;
        in_flight.armed = false;

        let mut inner = self.lock();
        if inner.generation != generation {
            debug!(generation, "discarding response to a cancelled submission");
            return Ok(SubmitOutcome::Discarded);
        }

        let failure = match response {
            Ok(Ok(request_id)) => {
                info!(%request_id, "batch accepted");
                inner.state = SubmissionState::Resolved(request_id.clone());
                drop(inner);
                let lookup = self.spawn_lookup(request_id.clone());
                return Ok(SubmitOutcome::Resolved { request_id, lookup });
            }
            Ok(Err(err)) => SubmissionError {
                code: TaxonomyCode::Submission5001,
                message: format!("{err:#}"),
            },
            Err(_) => SubmissionError {
                code: TaxonomyCode::Submission5002,
                message: format!(
                    "no response from the signing environment within {:?}",
                    self.config.submit_timeout
                ),
            },
        };

        error!(code = %failure.code, message = %failure.message, "batch submission failed");
        inner.state = SubmissionState::Idle;
        inner.last_error = Some(failure.clone());
        Err(failure.into())
    }

    /// Stops tracking an in-flight submission. Returns `false` when nothing was in flight.
    ///
    /// Nothing is sent to the collaborator; a request it already accepted stays accepted.
    pub fn cancel(&self) -> bool {
        let mut inner = self.lock();
        if inner.state != SubmissionState::Submitting {
            return false;
        }
        inner.generation += 1;
        inner.state = SubmissionState::Idle;
        info!(generation = inner.generation, "submission cancelled locally");
        true
    }

    /// Returns a resolved submitter to `Idle` for the next composition.
    pub fn reset(&self) -> bool {
        let mut inner = self.lock();
        if !matches!(inner.state, SubmissionState::Resolved(_)) {
            return false;
        }
        inner.state = SubmissionState::Idle;
        true
    }

    fn spawn_lookup(&self, request_id: RequestId) -> ResolutionLookup {
        let collaborator = Arc::clone(&self.collaborator);
        let timeout = self.config.resolution_timeout;
        let task_request_id = request_id.clone();

        let handle = tokio::spawn(async move {
            let failure = match tokio::time::timeout(
                timeout,
                collaborator.get_request_status(&task_request_id),
            )
            .await
            {
                Ok(Ok(record)) => {
                    info!(
                        request_id = %record.request_id,
                        status = ?record.status,
                        transaction_hash = ?record.transaction_hash,
                        "request resolution"
                    );
                    return Ok(record);
                }
                Ok(Err(err)) => format!("{err:#}"),
                Err(_) => format!("no status within {timeout:?}"),
            };

            let err = ResolutionLookupError {
                request_id: task_request_id,
                message: failure,
            };
            warn!(%err, "resolution lookup failed");
            Err(err)
        });

        ResolutionLookup { request_id, handle }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resets the submitter if a `submit` future is dropped before the collaborator answers.
struct InFlight<'a> {
    submitter: &'a BatchSubmitter,
    generation: u64,
    armed: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.submitter.lock();
        if inner.generation == self.generation && inner.state == SubmissionState::Submitting {
            inner.generation += 1;
            inner.state = SubmissionState::Idle;
            debug!(generation = self.generation, "submission dropped while in flight");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use anyhow::anyhow;
    use tokio::sync::{mpsc, oneshot};

    use super::*;
    use crate::batch::build;
    use crate::collaborator::MockSigningCollaborator;
    use crate::types::{ResolutionStatus, TransferEntry, TransferInstruction};

    type Gate = oneshot::Sender<anyhow::Result<RequestId>>;

    /// Holds every `send_batch` call until the test opens its gate.
    struct GatedCollaborator {
        gates: Mutex<VecDeque<oneshot::Receiver<anyhow::Result<RequestId>>>>,
        entered: mpsc::UnboundedSender<()>,
        status_calls: AtomicUsize,
    }

    impl GatedCollaborator {
        fn new(calls: usize) -> (Arc<Self>, Vec<Gate>, mpsc::UnboundedReceiver<()>) {
            let (senders, receivers): (Vec<_>, VecDeque<_>) =
                (0..calls).map(|_| oneshot::channel()).unzip();
            let (entered, entered_rx) = mpsc::unbounded_channel();
            let collaborator = Arc::new(Self {
                gates: Mutex::new(receivers),
                entered,
                status_calls: AtomicUsize::new(0),
            });
            (collaborator, senders, entered_rx)
        }
    }

    #[async_trait::async_trait]
    impl SigningCollaborator for GatedCollaborator {
        async fn send_batch(&self, _instructions: &[TransferInstruction]) -> anyhow::Result<RequestId> {
            let gate = self
                .gates
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected send_batch call");
            self.entered.send(()).unwrap();
            gate.await.unwrap_or_else(|_| Err(anyhow!("gate dropped")))
        }

        async fn get_request_status(&self, request_id: &RequestId) -> anyhow::Result<ResolutionRecord> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            Ok(pending_record(request_id))
        }
    }

    fn pending_record(request_id: &RequestId) -> ResolutionRecord {
        ResolutionRecord {
            request_id: request_id.clone(),
            status: ResolutionStatus::Pending,
            transaction_hash: None,
        }
    }

    fn two_entry_batch() -> BatchRequest {
        build(&[TransferEntry::new("A", "1"), TransferEntry::new("B", "2")]).unwrap()
    }

    fn submitter(collaborator: Arc<dyn SigningCollaborator>) -> Arc<BatchSubmitter> {
        Arc::new(BatchSubmitter::new(collaborator, SubmitterConfig::default()))
    }

    #[tokio::test]
    async fn accepted_batch_resolves_and_looks_up_status() {
        let mut mock = MockSigningCollaborator::new();
        mock.expect_send_batch()
            .times(1)
            .returning(|_| Ok(RequestId::new("0xsafe")));
        mock.expect_get_request_status()
            .times(1)
            .returning(|request_id| {
                Ok(ResolutionRecord {
                    request_id: request_id.clone(),
                    status: ResolutionStatus::Confirmed,
                    transaction_hash: Some("0xfeed".to_string()),
                })
            });
        let submitter = submitter(Arc::new(mock));

        let outcome = submitter.submit(&two_entry_batch()).await.unwrap();
        let SubmitOutcome::Resolved { request_id, lookup } = outcome else {
            panic!("expected resolved outcome");
        };
        assert_eq!(request_id, RequestId::new("0xsafe"));
        assert_eq!(submitter.state(), SubmissionState::Resolved(request_id));

        let record = lookup.wait().await.unwrap();
        assert_eq!(record.status, ResolutionStatus::Confirmed);
        assert_eq!(record.transaction_hash.as_deref(), Some("0xfeed"));
    }

    #[tokio::test]
    async fn instructions_reach_the_collaborator_in_order() {
        let mut mock = MockSigningCollaborator::new();
        mock.expect_send_batch()
            .withf(|instructions| {
                let destinations: Vec<&str> = instructions
                    .iter()
                    .map(|instruction| instruction.destination.as_str())
                    .collect();
                destinations == ["A", "B"]
                    && instructions[0].amount.to_string() == "1000000000000000000"
                    && instructions[1].amount.to_string() == "2000000000000000000"
            })
            .times(1)
            .returning(|_| Ok(RequestId::new("0x1")));
        mock.expect_get_request_status()
            .returning(|request_id| Ok(pending_record(request_id)));
        let submitter = submitter(Arc::new(mock));

        let outcome = submitter.submit(&two_entry_batch()).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Resolved { .. }));
    }

    #[tokio::test]
    async fn rejection_returns_to_idle_and_allows_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut mock = MockSigningCollaborator::new();
        mock.expect_send_batch().times(2).returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(anyhow!("user rejected the request"))
            } else {
                Ok(RequestId::new("0x2"))
            }
        });
        mock.expect_get_request_status()
            .returning(|request_id| Ok(pending_record(request_id)));
        let submitter = submitter(Arc::new(mock));
        let batch = two_entry_batch();

        let err = submitter.submit(&batch).await.unwrap_err();
        assert_eq!(err.code(), 5001);
        assert!(err.to_string().contains("user rejected"));
        assert_eq!(submitter.state(), SubmissionState::Idle);
        assert_eq!(submitter.last_error().unwrap().code, TaxonomyCode::Submission5001);

        let outcome = submitter.submit(&batch).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Resolved { .. }));
        assert!(submitter.last_error().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_lookup_keeps_resolved_state() {
        let mut mock = MockSigningCollaborator::new();
        mock.expect_send_batch()
            .returning(|_| Ok(RequestId::new("0x3")));
        mock.expect_get_request_status()
            .returning(|_| Err(anyhow!("transaction service unavailable")));
        let submitter = submitter(Arc::new(mock));

        let SubmitOutcome::Resolved { lookup, .. } =
            submitter.submit(&two_entry_batch()).await.unwrap()
        else {
            panic!("expected resolved outcome");
        };
        let err = lookup.wait().await.unwrap_err();
        assert_eq!(err.request_id, RequestId::new("0x3"));
        assert!(err.message.contains("unavailable"));
        assert_eq!(
            submitter.state(),
            SubmissionState::Resolved(RequestId::new("0x3"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_submission_times_out() {
        let (collaborator, _gates, _entered) = GatedCollaborator::new(1);
        let submitter = BatchSubmitter::new(
            collaborator,
            SubmitterConfig {
                submit_timeout: Duration::from_secs(5),
                ..SubmitterConfig::default()
            },
        );

        let err = submitter.submit(&two_entry_batch()).await.unwrap_err();
        assert_eq!(err.code(), 5002);
        assert_eq!(submitter.state(), SubmissionState::Idle);
    }

    #[tokio::test]
    async fn late_success_after_cancel_is_discarded() {
        let (collaborator, mut gates, mut entered) = GatedCollaborator::new(1);
        let submitter = submitter(collaborator.clone());

        let task = tokio::spawn({
            let submitter = Arc::clone(&submitter);
            async move { submitter.submit(&two_entry_batch()).await }
        });
        entered.recv().await.unwrap();
        assert_eq!(submitter.state(), SubmissionState::Submitting);

        assert!(submitter.cancel());
        assert_eq!(submitter.state(), SubmissionState::Idle);

        gates.remove(0).send(Ok(RequestId::new("0xlate"))).unwrap();
        let outcome = task.await.unwrap().unwrap();
        assert!(matches!(outcome, SubmitOutcome::Discarded));
        assert_eq!(submitter.state(), SubmissionState::Idle);
        assert_eq!(collaborator.status_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancel_from_the_same_task_while_submit_is_suspended() {
        let (collaborator, mut gates, mut entered) = GatedCollaborator::new(1);
        let submitter = submitter(collaborator);
        let gate = gates.remove(0);
        let batch = two_entry_batch();

        let canceller = async {
            entered.recv().await.unwrap();
            assert!(submitter.cancel());
            gate.send(Ok(RequestId::new("0xlate"))).unwrap();
        };
        let (outcome, ()) = futures::future::join(submitter.submit(&batch), canceller).await;

        assert!(matches!(outcome, Ok(SubmitOutcome::Discarded)));
        assert_eq!(submitter.state(), SubmissionState::Idle);
    }

    #[tokio::test]
    async fn late_failure_after_cancel_is_discarded() {
        let (collaborator, mut gates, mut entered) = GatedCollaborator::new(1);
        let submitter = submitter(collaborator);

        let task = tokio::spawn({
            let submitter = Arc::clone(&submitter);
            async move { submitter.submit(&two_entry_batch()).await }
        });
        entered.recv().await.unwrap();
        assert!(submitter.cancel());

        gates.remove(0).send(Err(anyhow!("boom"))).unwrap();
        assert!(matches!(task.await.unwrap(), Ok(SubmitOutcome::Discarded)));
        assert_eq!(submitter.state(), SubmissionState::Idle);
        assert!(submitter.last_error().is_none());
    }

    #[tokio::test]
    async fn stale_completion_does_not_clobber_a_newer_submission() {
        let (collaborator, mut gates, mut entered) = GatedCollaborator::new(2);
        let submitter = submitter(collaborator);

        let first = tokio::spawn({
            let submitter = Arc::clone(&submitter);
            async move { submitter.submit(&two_entry_batch()).await }
        });
        entered.recv().await.unwrap();
        assert!(submitter.cancel());

        let second = tokio::spawn({
            let submitter = Arc::clone(&submitter);
            async move { submitter.submit(&two_entry_batch()).await }
        });
        entered.recv().await.unwrap();

        let first_gate = gates.remove(0);
        let second_gate = gates.remove(0);
        second_gate.send(Ok(RequestId::new("0xnew"))).unwrap();
        assert!(matches!(
            second.await.unwrap(),
            Ok(SubmitOutcome::Resolved { .. })
        ));

        first_gate.send(Ok(RequestId::new("0xold"))).unwrap();
        assert!(matches!(first.await.unwrap(), Ok(SubmitOutcome::Discarded)));
        assert_eq!(
            submitter.state(),
            SubmissionState::Resolved(RequestId::new("0xnew"))
        );
    }

    #[tokio::test]
    async fn second_submit_while_in_flight_is_rejected() {
        let (collaborator, mut gates, mut entered) = GatedCollaborator::new(1);
        let submitter = submitter(collaborator);

        let task = tokio::spawn({
            let submitter = Arc::clone(&submitter);
            async move { submitter.submit(&two_entry_batch()).await }
        });
        entered.recv().await.unwrap();

        let err = submitter.submit(&two_entry_batch()).await.unwrap_err();
        assert_eq!(err.code(), 5003);
        assert_eq!(submitter.state(), SubmissionState::Submitting);

        gates.remove(0).send(Ok(RequestId::new("0x4"))).unwrap();
        assert!(matches!(
            task.await.unwrap(),
            Ok(SubmitOutcome::Resolved { .. })
        ));
    }

    #[tokio::test]
    async fn dropping_the_submit_future_returns_to_idle() {
        let (collaborator, _gates, mut entered) = GatedCollaborator::new(1);
        let submitter = submitter(collaborator);

        let task = tokio::spawn({
            let submitter = Arc::clone(&submitter);
            async move { submitter.submit(&two_entry_batch()).await }
        });
        entered.recv().await.unwrap();
        task.abort();
        let _ = task.await;

        assert_eq!(submitter.state(), SubmissionState::Idle);
    }

    #[test]
    fn cancel_and_reset_outside_their_states_are_no_ops() {
        let submitter = BatchSubmitter::new(
            Arc::new(MockSigningCollaborator::new()),
            SubmitterConfig::default(),
        );
        assert!(!submitter.cancel());
        assert!(!submitter.reset());
        assert_eq!(submitter.state(), SubmissionState::Idle);
    }

    #[tokio::test]
    async fn reset_returns_resolved_to_idle() {
        let mut mock = MockSigningCollaborator::new();
        mock.expect_send_batch()
            .returning(|_| Ok(RequestId::new("0x5")));
        mock.expect_get_request_status()
            .returning(|request_id| Ok(pending_record(request_id)));
        let submitter = submitter(Arc::new(mock));

        submitter.submit(&two_entry_batch()).await.unwrap();
        assert!(!submitter.cancel());
        assert!(submitter.reset());
        assert_eq!(submitter.state(), SubmissionState::Idle);
    }
}
