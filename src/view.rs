use log::debug;

use crate::{
    dataset::Dataset,
    params::HyperParameters,
    supervisor::{Result, RunEvent, RunId, RunOutcome, RunPlan, Snapshot, TrainingSupervisor},
    termination::StopReason,
    trainer::EpochTrainer,
};

/// The narrow surface the supervisor's owner renders through.
pub trait TrainingUi<V> {
    /// Enables or disables the parameter-editing controls.
    fn set_controls_enabled(&mut self, enabled: bool);

    /// Shows the newest snapshot. Superseded snapshots may be skipped.
    fn show_progress(&mut self, snapshot: &Snapshot<V>);

    /// Shows a one-line failure message.
    fn run_failed(&mut self, message: &str);

    fn run_finished(&mut self, _outcome: &RunOutcome) {}
}

/// UI-thread side of a supervised run.
///
/// Drains the supervisor's events once per frame, forwards the newest
/// snapshot and keeps the error history for charting.
pub struct RunView<V> {
    run_id: Option<RunId>,
    latest: Option<Snapshot<V>>,
    errors: Vec<(usize, f64)>,
    status: Option<String>,
}

impl<V> Default for RunView<V> {
    fn default() -> Self {
        Self {
            run_id: None,
            latest: None,
            errors: Vec::new(),
            status: None,
        }
    }
}

impl<V: Send + 'static> RunView<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a run and disables the controls right away.
    ///
    /// # Errors
    /// Forwards the supervisor's refusal; the UI is left as it was.
    pub fn start<T, U>(
        &mut self,
        supervisor: &mut TrainingSupervisor<V>,
        ui: &mut U,
        params: HyperParameters,
        dataset: Dataset,
        trainer: T,
        plan: RunPlan,
    ) -> Result<RunId>
    where
        T: EpochTrainer<Visual = V>,
        U: TrainingUi<V>,
    {
        let run_id = supervisor.start(params, dataset, trainer, plan)?;
        self.tick(supervisor, ui);
        Ok(run_id)
    }

    /// Stops the active run, if any, and applies its final events.
    pub fn stop<U: TrainingUi<V>>(
        &mut self,
        supervisor: &mut TrainingSupervisor<V>,
        ui: &mut U,
    ) -> Option<RunOutcome> {
        let outcome = supervisor.stop();
        self.tick(supervisor, ui);
        outcome
    }

    /// Applies every pending event. Never blocks.
    ///
    /// Should be called once per UI frame.
    pub fn tick<U: TrainingUi<V>>(&mut self, supervisor: &mut TrainingSupervisor<V>, ui: &mut U) {
        let mut fresh = false;

        while let Some(event) = supervisor.try_event() {
            // Render what arrived before a lifecycle change.
            if fresh && !matches!(event, RunEvent::Progress { .. }) {
                self.render(ui);
                fresh = false;
            }
            fresh |= self.apply(event, ui);
        }

        if fresh {
            self.render(ui);
        }
    }

    /// Returns true if the event carried a new snapshot.
    fn apply<U: TrainingUi<V>>(&mut self, event: RunEvent<V>, ui: &mut U) -> bool {
        match event {
            RunEvent::Progress { run_id, snapshot } => {
                if Some(run_id) != self.run_id {
                    debug!("dropping snapshot of stale run {run_id}");
                    return false;
                }
                self.errors.push((snapshot.iteration, snapshot.error));
                self.latest = Some(snapshot);
                return true;
            }

            RunEvent::Started { run_id, params } => {
                self.run_id = Some(run_id);
                self.latest = None;
                self.errors.clear();
                self.status = Some(format!("run {run_id} started: {params}"));
                ui.set_controls_enabled(false);
            }

            RunEvent::Finished(outcome) => {
                self.status = Some(match outcome.reason {
                    StopReason::Cancelled => format!("stopped at iteration {}", outcome.iterations),
                    reason => format!("{reason} after {} iterations", outcome.iterations),
                });
                ui.run_finished(&outcome);
                ui.set_controls_enabled(true);
            }

            RunEvent::Failed { outcome, message } => {
                self.status = Some(format!(
                    "failed at iteration {}: {message}",
                    outcome.iterations
                ));
                ui.run_failed(&message);
                ui.set_controls_enabled(true);
            }
        }

        false
    }

    fn render<U: TrainingUi<V>>(&self, ui: &mut U) {
        if let Some(snapshot) = &self.latest {
            ui.show_progress(snapshot);
        }
    }

    /// The newest snapshot received for the current run.
    pub fn latest(&self) -> Option<&Snapshot<V>> {
        self.latest.as_ref()
    }

    /// `(iteration, error)` of every snapshot received for the current run.
    pub fn errors(&self) -> &[(usize, f64)] {
        &self.errors
    }

    /// One-line description of the last lifecycle change.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }
}
