use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::Instant,
};

use log::{debug, error, info};
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use super::{RunEvent, RunId, RunOutcome, RunPhase, RunPlan, Snapshot};
use crate::{
    dataset::Dataset,
    params::HyperParameters,
    schedule::Rates,
    stats::StatisticsWriter,
    termination::StopReason,
    trainer::{EpochContext, EpochTrainer},
};

/// Drives one run: schedule, epoch, snapshot, publish, check, repeat.
///
/// Owns the trainer and the dataset for the whole run; the UI only ever
/// sees values moved out through `events`.
pub(super) struct WorkerLoop<T: EpochTrainer> {
    pub(super) run_id: RunId,
    pub(super) trainer: T,
    pub(super) dataset: Dataset,
    pub(super) params: Arc<HyperParameters>,
    pub(super) plan: RunPlan,
    pub(super) cancel: CancellationToken,
    pub(super) phase: Arc<Mutex<RunPhase>>,
    pub(super) events: UnboundedSender<RunEvent<T::Visual>>,
}

impl<T: EpochTrainer> WorkerLoop<T> {
    /// Runs epochs until the stop condition, a cancellation or a failure.
    ///
    /// Cancellation is polled once per epoch, before and after it runs.
    pub(super) fn run(mut self) -> RunOutcome {
        let started = Instant::now();
        let base = Rates::from_params(&self.params);
        let limit = self.plan.stop.iteration_limit();

        let mut stats = match self
            .plan
            .statistics
            .as_ref()
            .map(StatisticsWriter::create)
            .transpose()
        {
            Ok(stats) => stats,
            Err(e) => return self.finish(0, None, Err(e.to_string()), started),
        };

        let mut completed = 0;
        let mut last_error = None;

        let result = loop {
            if self.cancel.is_cancelled() {
                break Ok(StopReason::Cancelled);
            }

            // 1) Coefficients for this epoch.
            let rates = self.plan.schedule.rates(base, completed, limit);
            let ctx = EpochContext::new(
                completed,
                rates,
                Arc::clone(&self.params),
                self.cancel.clone(),
            );

            // Statistics pair each epoch's error with the weights it started from.
            let weights = match stats.as_ref().filter(|s| s.wants_weights()) {
                Some(_) => match guarded(|| self.trainer.weights()) {
                    Ok(weights) => weights,
                    Err(panic) => break Err(panic),
                },
                None => None,
            };

            // 2) One epoch of the training primitive.
            let trainer = &mut self.trainer;
            let dataset = &self.dataset;
            let error = match guarded(|| trainer.train_epoch(dataset, &ctx)) {
                Ok(Ok(error)) => error,
                Ok(Err(e)) => break Err(e.to_string()),
                Err(panic) => break Err(panic),
            };
            completed += 1;
            last_error = Some(error);

            if let Some(stats) = stats.as_mut() {
                if let Err(e) = stats.record(error, weights.as_deref()) {
                    break Err(e.to_string());
                }
            }

            // 3) Termination check, so the last epoch is always published.
            let stop = if self.cancel.is_cancelled() {
                Some(StopReason::Cancelled)
            } else {
                self.plan.stop.check(completed, error)
            };

            // 4) Snapshot and publish.
            if stop.is_some() || completed % self.plan.publish_every.get() == 0 {
                let visual = match guarded(|| self.trainer.visualize()) {
                    Ok(visual) => visual,
                    Err(panic) => break Err(panic),
                };

                self.publish(Snapshot {
                    iteration: completed,
                    error,
                    rates,
                    visual,
                    elapsed: started.elapsed(),
                });
            }

            if let Some(reason) = stop {
                break Ok(reason);
            }
        };

        let result = match (result, stats.map(StatisticsWriter::finish)) {
            (Ok(_), Some(Err(e))) => Err(e.to_string()),
            (result, _) => result,
        };

        self.finish(completed, last_error, result, started)
    }

    fn publish(&self, snapshot: Snapshot<T::Visual>) {
        let msg = RunEvent::Progress {
            run_id: self.run_id,
            snapshot,
        };
        if self.events.send(msg).is_err() {
            debug!("event receiver dropped: run={}", self.run_id);
        }
    }

    /// Frees the run slot, then tells the UI how the run ended.
    fn finish(
        self,
        iterations: usize,
        last_error: Option<f64>,
        result: Result<StopReason, String>,
        started: Instant,
    ) -> RunOutcome {
        let outcome = RunOutcome {
            run_id: self.run_id,
            iterations,
            last_error,
            reason: result.as_ref().copied().unwrap_or(StopReason::Failed),
            elapsed: started.elapsed(),
        };

        *self.phase.lock() = RunPhase::Idle;

        let msg = match result {
            Ok(reason) => {
                info!(
                    "run {} finished: reason={} iterations={} error={:?}",
                    self.run_id, reason, iterations, last_error
                );
                RunEvent::Finished(outcome.clone())
            }
            Err(message) => {
                error!(
                    "run {} failed after {} iterations: {}",
                    self.run_id, iterations, message
                );
                RunEvent::Failed {
                    outcome: outcome.clone(),
                    message,
                }
            }
        };

        if self.events.send(msg).is_err() {
            debug!("event receiver dropped: run={}", self.run_id);
        }

        outcome
    }
}

/// Runs trainer code, turning a panic into a one-line failure message.
fn guarded<R>(f: impl FnOnce() -> R) -> Result<R, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(panic_message)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("training step panicked: {detail}")
}
