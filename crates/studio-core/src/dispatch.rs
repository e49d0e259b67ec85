//! Batch dispatcher
//!
//! Fans one batch out into N concurrent generation calls and joins them:
//! - Each call is isolated: an error, timeout or panic becomes that slot's
//!   failure and never touches its siblings
//! - Results are reported only once all N calls settled, in slot order
//! - Settled batches come back over a channel tagged with their batch id so
//!   the orchestrator can discard stale ones
//! - At most `max_in_flight_batches` batch tasks stay alive; dispatching past
//!   the bound aborts the oldest superseded task

use crate::client::{GenerationClient, GenerationRequest};
use crate::config::GenerationSettings;
use crate::error::{GenerationError, StudioError};
use crate::types::BatchId;
use crate::variant::VariantOutcome;
use futures::future::join_all;
use futures::FutureExt;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// All outcomes of one batch, in slot order
#[derive(Debug)]
pub struct SettledBatch {
    pub batch: BatchId,
    pub outcomes: Vec<VariantOutcome>,
    /// Wall time from dispatch to the last call settling
    pub elapsed: Duration,
}

/// Dispatcher statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Batches handed to the runtime
    pub batches_dispatched: usize,
    /// Settled batches received back (active or stale)
    pub batches_settled: usize,
    /// Superseded batch tasks aborted to respect the in-flight bound
    pub batches_aborted: usize,
}

#[derive(Debug)]
struct InFlight {
    batch: BatchId,
    handle: JoinHandle<()>,
}

/// Fans batches out to a generation client
pub struct BatchDispatcher {
    client: Arc<dyn GenerationClient>,
    variant_timeout: Option<Duration>,
    max_in_flight: usize,
    in_flight: VecDeque<InFlight>,
    settled_tx: mpsc::UnboundedSender<SettledBatch>,
    settled_rx: mpsc::UnboundedReceiver<SettledBatch>,
    stats: DispatchStats,
}

impl std::fmt::Debug for BatchDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchDispatcher")
            .field("variant_timeout", &self.variant_timeout)
            .field("max_in_flight", &self.max_in_flight)
            .field("in_flight", &self.in_flight.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl BatchDispatcher {
    /// Create new dispatcher
    #[must_use]
    pub fn new(client: Arc<dyn GenerationClient>, settings: &GenerationSettings) -> Self {
        let (settled_tx, settled_rx) = mpsc::unbounded_channel();
        Self {
            client,
            variant_timeout: settings.variant_timeout(),
            max_in_flight: settings.max_in_flight_batches.max(1),
            in_flight: VecDeque::new(),
            settled_tx,
            settled_rx,
            stats: DispatchStats::default(),
        }
    }

    /// Start all calls of a batch concurrently and return immediately.
    ///
    /// `requests[i]` must target slot `i`.
    ///
    /// # Errors
    /// Returns [`StudioError::NoRuntime`] outside a Tokio runtime
    pub fn dispatch(&mut self, batch: BatchId, requests: Vec<GenerationRequest>) -> Result<(), StudioError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| StudioError::NoRuntime)?;

        self.prune_finished();
        while self.in_flight.len() >= self.max_in_flight {
            let Some(oldest) = self.in_flight.pop_front() else {
                break;
            };
            oldest.handle.abort();
            self.stats.batches_aborted += 1;
            tracing::warn!(
                batch = %oldest.batch,
                max_in_flight = self.max_in_flight,
                "Aborting superseded batch to respect in-flight bound"
            );
        }

        tracing::debug!(%batch, calls = requests.len(), "Spawning batch");
        let handle = runtime.spawn(run_batch(
            Arc::clone(&self.client),
            batch,
            requests,
            self.variant_timeout,
            self.settled_tx.clone(),
        ));
        self.in_flight.push_back(InFlight { batch, handle });
        self.stats.batches_dispatched += 1;
        Ok(())
    }

    /// Next settled batch, waiting if calls are still outstanding.
    ///
    /// Returns `None` when nothing is in flight and nothing is queued.
    pub async fn next_settled(&mut self) -> Option<SettledBatch> {
        self.prune_finished();
        let settled = match self.settled_rx.try_recv() {
            Ok(settled) => settled,
            Err(_) if self.in_flight.is_empty() => return None,
            Err(_) => self.settled_rx.recv().await?,
        };
        self.forget(settled.batch);
        self.stats.batches_settled += 1;
        Some(settled)
    }

    /// Settled batch if one is already queued
    pub fn try_next_settled(&mut self) -> Option<SettledBatch> {
        let settled = self.settled_rx.try_recv().ok()?;
        self.forget(settled.batch);
        self.stats.batches_settled += 1;
        Some(settled)
    }

    /// Batch tasks still running or not yet collected
    #[inline]
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether a batch task is still tracked
    #[inline]
    #[must_use]
    pub fn is_in_flight(&self, batch: BatchId) -> bool {
        self.in_flight.iter().any(|f| f.batch == batch)
    }

    #[inline]
    #[must_use]
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    // A finished task has already queued its result, so dropping it from
    // the list never loses a message.
    fn prune_finished(&mut self) {
        self.in_flight.retain(|f| !f.handle.is_finished());
    }

    fn forget(&mut self, batch: BatchId) {
        self.in_flight.retain(|f| f.batch != batch);
    }
}

async fn run_batch(
    client: Arc<dyn GenerationClient>,
    batch: BatchId,
    requests: Vec<GenerationRequest>,
    timeout: Option<Duration>,
    settled_tx: mpsc::UnboundedSender<SettledBatch>,
) {
    let started = Instant::now();
    let calls = requests
        .iter()
        .map(|request| generate_one(client.as_ref(), request, timeout));
    let outcomes = join_all(calls).await;

    let settled = SettledBatch {
        batch,
        outcomes,
        elapsed: started.elapsed(),
    };
    if settled_tx.send(settled).is_err() {
        tracing::debug!(%batch, "Orchestrator dropped before batch settled");
    }
}

async fn generate_one(
    client: &dyn GenerationClient,
    request: &GenerationRequest,
    timeout: Option<Duration>,
) -> VariantOutcome {
    let call = AssertUnwindSafe(client.generate(request)).catch_unwind();
    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(joined) => joined,
            Err(_) => Ok(Err(GenerationError::TimedOut {
                duration_secs: limit.as_secs(),
            })),
        },
        None => call.await,
    };

    let result = match joined {
        Ok(result) => result.and_then(crate::client::GenerationOutput::into_artifact),
        Err(payload) => Err(GenerationError::Panicked(panic_message(payload.as_ref()))),
    };

    if let Err(err) = &result {
        tracing::warn!(batch = %request.batch, slot = request.slot, error = %err, "Variant failed");
    } else {
        tracing::debug!(batch = %request.batch, slot = request.slot, "Variant succeeded");
    }
    result.into()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::GenerationOutput;
    use crate::types::RequestDescription;
    use async_trait::async_trait;
    use crate::variant::VariantStatus;

    /// Sleeps `delays_ms[slot]`, then echoes the slot; slot 1 fails when asked
    struct SlotEcho {
        delays_ms: Vec<u64>,
        fail_slot: Option<usize>,
    }

    #[async_trait]
    impl GenerationClient for SlotEcho {
        async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, GenerationError> {
            tokio::time::sleep(Duration::from_millis(self.delays_ms[request.slot])).await;
            if self.fail_slot == Some(request.slot) {
                return Err(GenerationError::Backend(format!("slot {}", request.slot)));
            }
            Ok(GenerationOutput::new(format!("slot-{}", request.slot)))
        }
    }

    struct Panics;

    #[async_trait]
    impl GenerationClient for Panics {
        async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, GenerationError> {
            if request.slot == 0 {
                panic!("renderer exploded");
            }
            Ok(GenerationOutput::new("<ok/>"))
        }
    }

    fn requests(batch: BatchId, n: usize) -> Vec<GenerationRequest> {
        let description = Arc::new(RequestDescription::new("crm"));
        (0..n)
            .map(|slot| GenerationRequest {
                batch,
                slot,
                batch_size: n,
                model: "m".to_string(),
                instructions: String::new(),
                description: Arc::clone(&description),
            })
            .collect()
    }

    fn settings() -> GenerationSettings {
        GenerationSettings {
            batch_size: 3,
            max_in_flight_batches: 2,
            variant_timeout_secs: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn outcomes_follow_slot_order_not_completion_order() {
        let client = Arc::new(SlotEcho {
            delays_ms: vec![300, 10, 150],
            fail_slot: None,
        });
        let mut dispatcher = BatchDispatcher::new(client, &settings());
        let batch = BatchId::new();
        dispatcher.dispatch(batch, requests(batch, 3)).unwrap();

        let settled = dispatcher.next_settled().await.unwrap();
        assert_eq!(settled.batch, batch);
        for (slot, outcome) in settled.outcomes.iter().enumerate() {
            match outcome {
                VariantOutcome::Succeeded(artifact) => {
                    assert_eq!(artifact.source(), format!("slot-{slot}"));
                }
                VariantOutcome::Failed(err) => panic!("unexpected failure: {err}"),
            }
        }
        // Calls ran concurrently: total time tracks the slowest call.
        assert!(settled.elapsed < Duration::from_millis(400));
        assert!(dispatcher.next_settled().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn one_failure_does_not_touch_siblings() {
        let client = Arc::new(SlotEcho {
            delays_ms: vec![5, 5, 5],
            fail_slot: Some(1),
        });
        let mut dispatcher = BatchDispatcher::new(client, &settings());
        let batch = BatchId::new();
        dispatcher.dispatch(batch, requests(batch, 3)).unwrap();

        let statuses: Vec<_> = dispatcher
            .next_settled()
            .await
            .unwrap()
            .outcomes
            .iter()
            .map(VariantOutcome::status)
            .collect();
        assert_eq!(
            statuses,
            vec![VariantStatus::Succeeded, VariantStatus::Failed, VariantStatus::Succeeded]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_fails_only_the_slow_slot() {
        let client = Arc::new(SlotEcho {
            delays_ms: vec![10, 5_000, 10],
            fail_slot: None,
        });
        let settings = GenerationSettings {
            variant_timeout_secs: Some(1),
            ..settings()
        };
        let mut dispatcher = BatchDispatcher::new(client, &settings);
        let batch = BatchId::new();
        dispatcher.dispatch(batch, requests(batch, 3)).unwrap();

        let settled = dispatcher.next_settled().await.unwrap();
        assert_eq!(
            settled.outcomes[1],
            VariantOutcome::Failed(GenerationError::TimedOut { duration_secs: 1 })
        );
        assert_eq!(settled.outcomes[0].status(), VariantStatus::Succeeded);
        assert_eq!(settled.outcomes[2].status(), VariantStatus::Succeeded);
    }

    #[tokio::test]
    async fn panic_is_recorded_as_failure() {
        let mut dispatcher = BatchDispatcher::new(Arc::new(Panics), &settings());
        let batch = BatchId::new();
        dispatcher.dispatch(batch, requests(batch, 2)).unwrap();

        let settled = dispatcher.next_settled().await.unwrap();
        assert_eq!(
            settled.outcomes[0],
            VariantOutcome::Failed(GenerationError::Panicked("renderer exploded".to_string()))
        );
        assert_eq!(settled.outcomes[1].status(), VariantStatus::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_bound_aborts_oldest() {
        let client = Arc::new(SlotEcho {
            delays_ms: vec![1_000, 1_000, 1_000],
            fail_slot: None,
        });
        let mut dispatcher = BatchDispatcher::new(client, &settings());
        let first = BatchId::new();
        let second = BatchId::new();
        let third = BatchId::new();
        dispatcher.dispatch(first, requests(first, 3)).unwrap();
        dispatcher.dispatch(second, requests(second, 3)).unwrap();
        dispatcher.dispatch(third, requests(third, 3)).unwrap();

        assert_eq!(dispatcher.in_flight(), 2);
        assert!(!dispatcher.is_in_flight(first));
        assert_eq!(dispatcher.stats().batches_aborted, 1);

        let mut received = Vec::new();
        while let Some(settled) = dispatcher.next_settled().await {
            received.push(settled.batch);
        }
        assert!(!received.contains(&first));
        assert_eq!(received.len(), 2);
    }

    #[test]
    fn dispatch_outside_runtime_is_an_error() {
        let client = Arc::new(SlotEcho {
            delays_ms: vec![0],
            fail_slot: None,
        });
        let mut dispatcher = BatchDispatcher::new(client, &settings());
        let batch = BatchId::new();
        let result = dispatcher.dispatch(batch, requests(batch, 1));
        assert!(matches!(result, Err(StudioError::NoRuntime)));
    }
}
