mod error;
mod event;
mod phase;
mod worker;

use std::{num::NonZeroUsize, sync::Arc};

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use tokio::{
    runtime::{Builder, Runtime},
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

pub use error::{Result, SupervisorError};
pub use event::{RunEvent, RunOutcome, Snapshot};
pub use phase::{RunId, RunPhase};

use crate::{
    dataset::Dataset,
    params::HyperParameters,
    schedule::Schedule,
    stats::StatisticsConfig,
    termination::StopCondition,
    trainer::EpochTrainer,
};
use worker::WorkerLoop;

/// Per-run policy: how coefficients evolve, when to stop, how often to publish.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub schedule: Schedule,
    pub stop: StopCondition,
    /// Publish a snapshot every this many epochs. The final epoch is always published.
    pub publish_every: NonZeroUsize,
    pub min_samples: usize,
    pub statistics: Option<StatisticsConfig>,
}

impl RunPlan {
    /// Creates a plan with a constant schedule that publishes every epoch.
    pub fn new(stop: StopCondition) -> Self {
        Self {
            schedule: Schedule::Constant,
            stop,
            publish_every: NonZeroUsize::MIN,
            min_samples: 1,
            statistics: None,
        }
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn publish_every(mut self, every: NonZeroUsize) -> Self {
        self.publish_every = every;
        self
    }

    pub fn min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    pub fn with_statistics(mut self, statistics: StatisticsConfig) -> Self {
        self.statistics = Some(statistics);
        self
    }
}

/// Runs at most one cancellable training loop at a time and reports its
/// progress without ever blocking on the UI.
///
/// Owned by the UI thread. The worker runs on a dedicated blocking thread and
/// talks back only through the event channel drained with
/// [`TrainingSupervisor::try_event`].
///
/// `stop`, `wait` and `Drop` block the calling thread and must not be called
/// from inside an async runtime.
pub struct TrainingSupervisor<V> {
    runtime: Runtime,
    phase: Arc<Mutex<RunPhase>>,
    cancel: CancellationToken,
    worker: Option<JoinHandle<RunOutcome>>,
    events_tx: UnboundedSender<RunEvent<V>>,
    events_rx: UnboundedReceiver<RunEvent<V>>,
    runs: u64,
}

impl<V: Send + 'static> TrainingSupervisor<V> {
    /// Creates an idle supervisor.
    ///
    /// # Errors
    /// Returns `SupervisorError::Runtime` if the worker runtime can't be built.
    pub fn new() -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .thread_name("training-worker")
            .build()?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Self {
            runtime,
            phase: Arc::new(Mutex::new(RunPhase::Idle)),
            cancel: CancellationToken::new(),
            worker: None,
            events_tx,
            events_rx,
            runs: 0,
        })
    }

    /// Starts a run on a fresh worker.
    ///
    /// # Args
    /// * `params` - Validated settings; the run keeps its own copy.
    /// * `dataset` - Training rows, checked against `plan.min_samples` here.
    /// * `trainer` - The training primitive, moved onto the worker.
    /// * `plan` - Schedule, stop condition and publish rate.
    ///
    /// # Returns
    /// The new run's id. A `RunEvent::Started` is queued before any progress.
    ///
    /// # Errors
    /// `AlreadyRunning` while a run is active, `InvalidDataset` if the data is
    /// unusable. The supervisor is left untouched in both cases.
    pub fn start<T>(
        &mut self,
        params: HyperParameters,
        dataset: Dataset,
        trainer: T,
        plan: RunPlan,
    ) -> Result<RunId>
    where
        T: EpochTrainer<Visual = V>,
    {
        if self.phase().is_active() {
            warn!("start rejected: a run is already active");
            return Err(SupervisorError::AlreadyRunning);
        }

        if let Err(e) = dataset.validate(plan.min_samples) {
            warn!("start rejected: {e}");
            return Err(e.into());
        }

        // A run that ended on its own still has a handle to collect.
        self.reap();

        self.runs += 1;
        let run_id = RunId(self.runs);
        self.cancel = CancellationToken::new();
        *self.phase.lock() = RunPhase::Running;

        info!(
            "starting run {run_id}: {params} samples={} stop={:?} schedule={:?}",
            dataset.len(),
            plan.stop,
            plan.schedule
        );

        let params = Arc::new(params);
        let _ = self.events_tx.send(RunEvent::Started {
            run_id,
            params: HyperParameters::clone(&params),
        });

        let worker = WorkerLoop {
            run_id,
            trainer,
            dataset,
            params,
            plan,
            cancel: self.cancel.clone(),
            phase: Arc::clone(&self.phase),
            events: self.events_tx.clone(),
        };
        self.worker = Some(self.runtime.spawn_blocking(move || worker.run()));

        Ok(run_id)
    }

    /// Requests cancellation and blocks until the worker has exited.
    ///
    /// The wait is bounded by one epoch, since the worker polls the flag at
    /// every epoch boundary.
    ///
    /// # Returns
    /// How the run ended, or `None` if no run was active.
    pub fn stop(&mut self) -> Option<RunOutcome> {
        let worker = self.worker.take()?;

        let was_running = {
            let mut phase = self.phase.lock();
            let running = *phase == RunPhase::Running;
            if running {
                *phase = RunPhase::Stopping;
            }
            running
        };

        debug!("stop requested, waiting for worker");
        self.cancel.cancel();
        let outcome = self.join(worker);

        if was_running {
            outcome
        } else {
            None
        }
    }

    /// Blocks until the active run ends on its own.
    ///
    /// # Returns
    /// How the run ended, or `None` if there is nothing to wait for.
    pub fn wait(&mut self) -> Option<RunOutcome> {
        let worker = self.worker.take()?;
        self.join(worker)
    }

    pub fn phase(&self) -> RunPhase {
        *self.phase.lock()
    }

    pub fn is_running(&self) -> bool {
        self.phase() == RunPhase::Running
    }

    /// Returns the next pending event without blocking.
    pub fn try_event(&mut self) -> Option<RunEvent<V>> {
        self.events_rx.try_recv().ok()
    }

    /// Returns every pending event, oldest first, without blocking.
    pub fn drain_events(&mut self) -> Vec<RunEvent<V>> {
        std::iter::from_fn(|| self.try_event()).collect()
    }

    fn reap(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.join(worker);
        }
    }

    fn join(&mut self, worker: JoinHandle<RunOutcome>) -> Option<RunOutcome> {
        let outcome = match self.runtime.block_on(worker) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("training worker aborted: {e}");
                None
            }
        };

        *self.phase.lock() = RunPhase::Idle;
        outcome
    }
}

impl<V> Drop for TrainingSupervisor<V> {
    fn drop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        info!("supervisor closing, stopping active run");
        self.cancel.cancel();
        if let Err(e) = self.runtime.block_on(worker) {
            error!("training worker aborted: {e}");
        }
        *self.phase.lock() = RunPhase::Idle;
    }
}
