use std::{error::Error, fmt, sync::Arc};

use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::{dataset::Dataset, params::HyperParameters, schedule::Rates};

/// A failure reported by a training primitive. Fatal to the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainerError(String);

impl TrainerError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl fmt::Display for TrainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Error for TrainerError {}

/// What the worker hands the training primitive for one epoch.
#[derive(Debug, Clone)]
pub struct EpochContext {
    iteration: usize,
    rates: Rates,
    params: Arc<HyperParameters>,
    cancel: CancellationToken,
}

impl EpochContext {
    pub(crate) fn new(
        iteration: usize,
        rates: Rates,
        params: Arc<HyperParameters>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            iteration,
            rates,
            params,
            cancel,
        }
    }

    /// 0-based index of the epoch being run.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// The scheduled coefficients for this epoch.
    pub fn rates(&self) -> Rates {
        self.rates
    }

    /// The settings the run was started with.
    pub fn params(&self) -> &HyperParameters {
        &self.params
    }

    /// Lets an expensive epoch bail out early once a stop was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// The training primitive a run drives, one epoch at a time.
///
/// Implementations own their network; nothing else touches it during a run.
pub trait EpochTrainer: Send + 'static {
    /// Derived data the UI renders (a map, a path, a curve).
    type Visual: Send + 'static;

    /// Runs one epoch over `data` and returns its error metric.
    ///
    /// # Errors
    /// Any error ends the run. It is not retried.
    fn train_epoch(&mut self, data: &Dataset, ctx: &EpochContext) -> Result<f64, TrainerError>;

    /// Captures the current visualization data.
    fn visualize(&self) -> Self::Visual;

    /// Current weights, one row per neuron, for statistics export.
    fn weights(&self) -> Option<Vec<Vec<f64>>> {
        None
    }
}

/// Adapts a closure into an [`EpochTrainer`] with no visualization.
pub struct FnTrainer<F> {
    step: F,
}

/// Wraps an epoch-step closure.
pub fn from_fn<F>(step: F) -> FnTrainer<F>
where
    F: FnMut(&Dataset, &EpochContext) -> Result<f64, TrainerError> + Send + 'static,
{
    FnTrainer { step }
}

impl<F> EpochTrainer for FnTrainer<F>
where
    F: FnMut(&Dataset, &EpochContext) -> Result<f64, TrainerError> + Send + 'static,
{
    type Visual = ();

    fn train_epoch(&mut self, data: &Dataset, ctx: &EpochContext) -> Result<f64, TrainerError> {
        (self.step)(data, ctx)
    }

    fn visualize(&self) {}
}

/// Range for random initial weights.
///
/// Passed explicitly to whatever builds a network.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitRange {
    pub min: f64,
    pub max: f64,
}

impl InitRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Draws one weight. A degenerate range always yields `min`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.max <= self.min {
            return self.min;
        }
        rng.random_range(self.min..self.max)
    }

    /// Draws `rows` x `cols` weights.
    pub fn matrix<R: Rng + ?Sized>(&self, rng: &mut R, rows: usize, cols: usize) -> Vec<Vec<f64>> {
        (0..rows)
            .map(|_| (0..cols).map(|_| self.sample(rng)).collect())
            .collect()
    }
}

impl Default for InitRange {
    fn default() -> Self {
        Self::new(0.0, 1.0)
    }
}
