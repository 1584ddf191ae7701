use std::time::Duration;

use crate::{params::HyperParameters, schedule::Rates, termination::StopReason};

use super::RunId;

/// Immutable copy of the worker's training state at a publish point.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<V> {
    /// Epochs completed, 1-based.
    pub iteration: usize,
    pub error: f64,
    /// Coefficients used for this epoch.
    pub rates: Rates,
    pub visual: V,
    pub elapsed: Duration,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub iterations: usize,
    pub last_error: Option<f64>,
    pub reason: StopReason,
    pub elapsed: Duration,
}

/// Messages from the worker to the UI thread, in the order they happened.
#[derive(Debug, Clone)]
pub enum RunEvent<V> {
    Started {
        run_id: RunId,
        params: HyperParameters,
    },
    Progress {
        run_id: RunId,
        snapshot: Snapshot<V>,
    },
    Finished(RunOutcome),
    Failed {
        outcome: RunOutcome,
        message: String,
    },
}

impl<V> RunEvent<V> {
    pub fn run_id(&self) -> RunId {
        match self {
            RunEvent::Started { run_id, .. } | RunEvent::Progress { run_id, .. } => *run_id,
            RunEvent::Finished(outcome) | RunEvent::Failed { outcome, .. } => outcome.run_id,
        }
    }

    /// Returns true for the last event of a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunEvent::Finished(_) | RunEvent::Failed { .. })
    }
}
